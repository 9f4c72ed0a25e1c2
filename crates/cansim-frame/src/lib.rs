//! CAN frame representations and the codec between them.
//!
//! Two shapes of the same frame live here:
//! - [`ControllerFrame`], the bitfield-oriented view callers of a CAN
//!   controller work with (flags, 29-bit identifier, length, 8 data bytes)
//! - [`WireFrame`], the byte-level layout of a Linux `struct can_frame`
//!
//! [`encode`] and [`decode`] convert between them. Neither needs any OS
//! resource, so everything in this crate is testable in isolation.

pub mod codec;
pub mod error;
pub mod id;

pub use codec::{
    decode, effective_id, encode, encode_wire, ControllerFrame, WireFrame, MAX_DLC, WIRE_FRAME_SIZE,
};
pub use error::{FrameError, Result};
pub use id::{CAN_EFF_FLAG, CAN_EFF_MASK, CAN_ERR_FLAG, CAN_RTR_FLAG, CAN_SFF_MASK};
