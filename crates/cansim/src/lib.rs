//! Emulated interrupt-driven CAN controller on top of a host raw socket.
//!
//! # Crate Structure
//!
//! - [`frame`]: Controller and wire frame representations and the codec
//! - [`transport`]: Raw CAN socket sessions (SocketCAN, loopback bus)
//! - [`driver`]: Controller emulation: mailboxes, inbound queue, interrupt service

/// Re-export frame types.
pub mod frame {
    pub use cansim_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use cansim_transport::*;
}

/// Re-export driver types.
pub mod driver {
    pub use cansim_driver::*;
}

pub use cansim_driver::{ControllerFrame, Driver, DriverConfig, SessionConfig, TransportKind};
