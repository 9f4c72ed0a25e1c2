use cansim_transport::TransportError;
use tracing::error;

/// An unrecoverable environment fault.
///
/// Raised when the host transport misbehaves (socket creation, bind, close,
/// poll, short write, read error). There is no retry path: the fault is
/// handed to the driver's [`HaltHandler`].
#[derive(Debug, thiserror::Error)]
#[error("{context}: {source}")]
pub struct Fault {
    /// What the driver was doing.
    pub context: &'static str,
    /// The transport failure.
    #[source]
    pub source: TransportError,
}

/// Called with every [`Fault`]; never returns.
pub type HaltHandler = fn(&Fault) -> !;

/// Default halt handler: log the fault and abort the process.
pub fn abort_on_fault(fault: &Fault) -> ! {
    error!(%fault, "unrecoverable CAN driver fault, halting");
    std::process::abort()
}

/// Recoverable errors of the driver crate's auxiliary services.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The service ticker thread could not be started.
    #[error("failed to spawn service ticker: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DriverError>;
