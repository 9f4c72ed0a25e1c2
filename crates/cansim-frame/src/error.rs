/// Errors that can occur while building or parsing frames.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    /// The payload does not fit into a classic CAN frame.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The identifier does not fit the selected identifier format.
    #[error("identifier {id:#x} exceeds {bits}-bit range")]
    IdOutOfRange { id: u32, bits: u8 },

    /// The data length code is outside 0..=8.
    #[error("invalid data length code {0} (max 8)")]
    InvalidDlc(u8),

    /// Fewer bytes than a complete wire frame were supplied.
    #[error("truncated wire frame ({len} bytes, need {need})")]
    Truncated { len: usize, need: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
