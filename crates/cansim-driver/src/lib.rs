//! Interrupt-driven CAN controller emulation.
//!
//! Makes a readiness-polled host socket look like a mailbox-based CAN
//! peripheral. A [`Driver`] owns the transport [`Session`] while ready,
//! exposes controller operations (transmit, receive, mailbox checks) and a
//! simulated interrupt service step that moves at most one inbound frame
//! per call into a fixed-capacity [`InboundQueue`].
//!
//! Transport faults are unrecoverable at this layer: they are reported as a
//! [`Fault`] to the driver's halt handler, which by default aborts the
//! process.
//!
//! [`Session`]: cansim_transport::Session

pub mod config;
pub mod driver;
pub mod error;
pub mod isr;
pub mod queue;
pub mod ticker;
pub mod timeout;
pub mod waiters;

pub use cansim_frame::ControllerFrame;
pub use cansim_transport::{SessionConfig, TransportKind};
pub use config::{DriverConfig, DEFAULT_RX_FIFO_SIZE};
pub use driver::{
    Driver, DriverState, DriverStats, Mailbox, ANY_MAILBOX, RX_MAILBOXES, TX_MAILBOXES,
};
pub use error::{abort_on_fault, DriverError, Fault, HaltHandler, Result};
pub use queue::{InboundQueue, QueueFull, SlotHandle, Timeout};
pub use ticker::{ServiceTicker, DEFAULT_TICK};
pub use timeout::WaitTimeout;
pub use waiters::{ThreadQueue, WakeReason};
