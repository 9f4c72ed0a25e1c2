use std::io;

/// Errors that can occur in CAN transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The channel name cannot name a network interface.
    #[error("invalid channel name {name:?}: {reason}")]
    InvalidChannelName { name: String, reason: &'static str },

    /// Creating the raw socket failed.
    #[error("socket creation failed: {0}")]
    Socket(io::Error),

    /// The channel name does not resolve to an interface index.
    #[error("interface lookup for {name} failed: {source}")]
    InterfaceLookup { name: String, source: io::Error },

    /// Binding the socket to the interface failed.
    #[error("failed to bind to {name}: {source}")]
    Bind { name: String, source: io::Error },

    /// Releasing the socket failed.
    #[error("socket close failed: {0}")]
    Close(io::Error),

    /// A readiness poll failed.
    #[error("socket poll error: {0}")]
    Poll(io::Error),

    /// Writing a frame failed.
    #[error("couldn't send CAN frame: {0}")]
    Write(io::Error),

    /// Fewer bytes than a full frame were written.
    #[error("short write ({written} bytes, expected {expected})")]
    ShortWrite { written: usize, expected: usize },

    /// Reading a frame failed.
    #[error("socket read error: {0}")]
    Read(io::Error),

    /// The selected transport does not exist on this platform.
    #[error("{0} transport is not supported on this platform")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, TransportError>;
