use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::id::{id_mask, is_valid_id, CAN_EFF_FLAG, CAN_EFF_MASK, CAN_ERR_FLAG, CAN_RTR_FLAG};

/// Size of a classic `struct can_frame` on the wire: id (4) + dlc (1) + pad (3) + data (8).
pub const WIRE_FRAME_SIZE: usize = 16;

/// Largest data length code of a classic CAN frame.
pub const MAX_DLC: u8 = 8;

/// A CAN frame as seen by callers of the controller.
///
/// Used for both the transmit and the receive direction. `data` always holds
/// eight bytes; only the first `dlc` of them are meaningful.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ControllerFrame {
    /// Error frame.
    pub is_error: bool,
    /// Remote transmission request.
    pub is_remote: bool,
    /// Extended (29-bit) identifier format.
    pub is_extended: bool,
    /// Identifier; only the low 11 bits are used for standard frames.
    pub id: u32,
    /// Data length code.
    pub dlc: u8,
    /// Frame data.
    pub data: [u8; 8],
}

impl ControllerFrame {
    /// Build a data frame, validating identifier range and payload length.
    pub fn new(id: u32, extended: bool, payload: &[u8]) -> Result<Self> {
        check_id(id, extended)?;
        if payload.len() > MAX_DLC as usize {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_DLC as usize,
            });
        }

        let mut data = [0u8; 8];
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            is_extended: extended,
            id,
            dlc: payload.len() as u8,
            data,
            ..Self::default()
        })
    }

    /// Build a remote frame requesting `dlc` bytes.
    pub fn remote(id: u32, extended: bool, dlc: u8) -> Result<Self> {
        check_id(id, extended)?;
        if dlc > MAX_DLC {
            return Err(FrameError::InvalidDlc(dlc));
        }
        Ok(Self {
            is_remote: true,
            is_extended: extended,
            id,
            dlc,
            ..Self::default()
        })
    }

    /// The meaningful data bytes. Clamped to 8 so an oversized `dlc` never reads out of bounds.
    pub fn payload(&self) -> &[u8] {
        &self.data[..usize::from(self.dlc.min(MAX_DLC))]
    }

    /// Data viewed as four native-endian half-words.
    pub fn data16(&self) -> [u16; 4] {
        std::array::from_fn(|i| u16::from_ne_bytes([self.data[2 * i], self.data[2 * i + 1]]))
    }

    /// Data viewed as two native-endian words.
    pub fn data32(&self) -> [u32; 2] {
        std::array::from_fn(|i| {
            let mut word = [0u8; 4];
            word.copy_from_slice(&self.data[4 * i..4 * i + 4]);
            u32::from_ne_bytes(word)
        })
    }

    /// Data viewed as one native-endian double word.
    pub fn data64(&self) -> u64 {
        u64::from_ne_bytes(self.data)
    }

    /// Overwrite the data with four native-endian half-words.
    pub fn set_data16(&mut self, words: [u16; 4]) {
        for (chunk, word) in self.data.chunks_exact_mut(2).zip(words) {
            chunk.copy_from_slice(&word.to_ne_bytes());
        }
    }

    /// Overwrite the data with two native-endian words.
    pub fn set_data32(&mut self, words: [u32; 2]) {
        for (chunk, word) in self.data.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_ne_bytes());
        }
    }

    /// Overwrite the data with one native-endian double word.
    pub fn set_data64(&mut self, word: u64) {
        self.data = word.to_ne_bytes();
    }
}

fn check_id(id: u32, extended: bool) -> Result<()> {
    if is_valid_id(id, extended) {
        Ok(())
    } else {
        Err(FrameError::IdOutOfRange {
            id,
            bits: if extended { 29 } else { 11 },
        })
    }
}

/// A frame in the host's raw socket layout (`struct can_frame`).
///
/// ```text
/// ┌──────────────────┬─────────┬──────────────┬──────────────────┐
/// │ can_id (4B, NE)  │ dlc (1B)│ pad/res (3B) │ data (8B)        │
/// │ EFF|RTR|ERR|id29 │         │ zero         │                  │
/// └──────────────────┴─────────┴──────────────┴──────────────────┘
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C, align(8))]
pub struct WireFrame {
    /// Identifier with flag bits in the top three bits.
    pub can_id: u32,
    /// Data length code.
    pub can_dlc: u8,
    pad: u8,
    res0: u8,
    len8_dlc: u8,
    /// Frame data.
    pub data: [u8; 8],
}

impl WireFrame {
    /// Create a wire frame from its public fields.
    pub fn new(can_id: u32, can_dlc: u8, data: [u8; 8]) -> Self {
        Self {
            can_id,
            can_dlc,
            data,
            ..Self::default()
        }
    }

    /// Serialize into the exact bytes the kernel expects.
    pub fn to_bytes(&self) -> [u8; WIRE_FRAME_SIZE] {
        let mut out = [0u8; WIRE_FRAME_SIZE];
        out[0..4].copy_from_slice(&self.can_id.to_ne_bytes());
        out[4] = self.can_dlc;
        out[5] = self.pad;
        out[6] = self.res0;
        out[7] = self.len8_dlc;
        out[8..16].copy_from_slice(&self.data);
        out
    }

    /// Parse a wire frame from raw bytes. Extra trailing bytes are ignored.
    pub fn from_bytes(src: &[u8]) -> Result<Self> {
        if src.len() < WIRE_FRAME_SIZE {
            return Err(FrameError::Truncated {
                len: src.len(),
                need: WIRE_FRAME_SIZE,
            });
        }

        let mut id = [0u8; 4];
        id.copy_from_slice(&src[0..4]);
        let mut data = [0u8; 8];
        data.copy_from_slice(&src[8..16]);

        Ok(Self {
            can_id: u32::from_ne_bytes(id),
            can_dlc: src[4],
            pad: src[5],
            res0: src[6],
            len8_dlc: src[7],
            data,
        })
    }
}

/// Convert a controller frame into the wire layout.
///
/// All eight data bytes are copied regardless of `dlc`; the length field is
/// authoritative for the receiver.
pub fn encode(frame: &ControllerFrame) -> WireFrame {
    let can_id = flag(frame.is_error, CAN_ERR_FLAG)
        | flag(frame.is_remote, CAN_RTR_FLAG)
        | flag(frame.is_extended, CAN_EFF_FLAG)
        | (frame.id & CAN_EFF_MASK);
    WireFrame::new(can_id, frame.dlc, frame.data)
}

fn flag(set: bool, bit: u32) -> u32 {
    if set {
        bit
    } else {
        0
    }
}

/// Convert a wire frame into the controller representation.
///
/// Total: defined for every bit pattern a wire frame can hold.
pub fn decode(wire: &WireFrame) -> ControllerFrame {
    ControllerFrame {
        is_error: wire.can_id & CAN_ERR_FLAG == CAN_ERR_FLAG,
        is_remote: wire.can_id & CAN_RTR_FLAG == CAN_RTR_FLAG,
        is_extended: wire.can_id & CAN_EFF_FLAG == CAN_EFF_FLAG,
        id: wire.can_id & CAN_EFF_MASK,
        dlc: wire.can_dlc,
        data: wire.data,
    }
}

/// Append the wire bytes of `frame` to `dst`.
pub fn encode_wire(frame: &WireFrame, dst: &mut BytesMut) {
    dst.reserve(WIRE_FRAME_SIZE);
    dst.put_slice(&frame.to_bytes());
}

/// The identifier masked to its declared format.
pub fn effective_id(frame: &ControllerFrame) -> u32 {
    frame.id & id_mask(frame.is_extended)
}
