use std::fmt;

use cansim_driver::{DriverError, Fault};
use cansim_frame::FrameError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    CliError::new(USAGE, format!("{context}: {err}"))
}

pub fn driver_error(context: &str, err: DriverError) -> CliError {
    match err {
        DriverError::Spawn(source) => CliError::new(FAILURE, format!("{context}: {source}")),
    }
}

/// Halt handler for the CLI: report the fault and exit instead of aborting.
pub fn exit_on_fault(fault: &Fault) -> ! {
    tracing::error!(%fault, "unrecoverable CAN driver fault");
    eprintln!("error: {fault}");
    std::process::exit(TRANSPORT_ERROR)
}
