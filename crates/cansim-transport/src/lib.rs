//! Raw CAN socket transport.
//!
//! Moves single wire frames between the driver and the host:
//! - SocketCAN raw sockets (Linux)
//! - An in-process loopback bus that behaves like a `vcan` interface
//!
//! This layer never interprets frames; it only opens, polls, reads and
//! writes them. Everything above builds on the [`Session`] type.

pub mod error;
pub mod loopback;
pub mod session;

#[cfg(target_os = "linux")]
pub mod socketcan;

pub use error::{Result, TransportError};
pub use loopback::LoopbackPort;
pub use session::{Session, SessionConfig, TransportKind};

#[cfg(target_os = "linux")]
pub use socketcan::SocketCan;
