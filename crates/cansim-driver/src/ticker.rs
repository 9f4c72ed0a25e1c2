use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::driver::Driver;
use crate::error::Result;

/// Default interval between idle service calls.
pub const DEFAULT_TICK: Duration = Duration::from_millis(1);

/// Background thread standing in for the timer interrupt.
///
/// Calls [`Driver::serve_interrupt`] back to back while it finds work and
/// sleeps one tick whenever it finds none.
#[derive(Debug)]
pub struct ServiceTicker {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ServiceTicker {
    /// Start ticking `driver` every `tick`.
    pub fn spawn(driver: Arc<Driver>, tick: Duration) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let handle = {
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("can-isr".to_string())
                .spawn(move || {
                    debug!(?tick, "service ticker running");
                    while running.load(Ordering::Acquire) {
                        if !driver.serve_interrupt() {
                            thread::sleep(tick);
                        }
                    }
                    debug!("service ticker stopped");
                })?
        };
        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop ticking and wait for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ServiceTicker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
