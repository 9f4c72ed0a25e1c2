use crate::error::{abort_on_fault, HaltHandler};

/// Default number of inbound frame slots.
pub const DEFAULT_RX_FIFO_SIZE: usize = 4;

/// Static configuration of a [`Driver`](crate::Driver).
///
/// The transport channel is not part of this; it is supplied to
/// [`Driver::start`](crate::Driver::start).
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Inbound frame queue capacity. Default: 4.
    pub rx_fifo_size: usize,
    /// Invoked on unrecoverable transport faults. Default: log and abort.
    pub halt: HaltHandler,
}

impl DriverConfig {
    /// Override the inbound queue capacity.
    pub fn with_rx_fifo_size(mut self, rx_fifo_size: usize) -> Self {
        self.rx_fifo_size = rx_fifo_size;
        self
    }

    /// Override the halt handler.
    pub fn with_halt_handler(mut self, halt: HaltHandler) -> Self {
        self.halt = halt;
        self
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            rx_fifo_size: DEFAULT_RX_FIFO_SIZE,
            halt: abort_on_fault,
        }
    }
}
