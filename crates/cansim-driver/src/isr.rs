//! Simulated interrupt context marker.
//!
//! The service step runs inside an [`IsrGuard`]; code that may suspend the
//! calling thread asserts it is not running under one.

use std::cell::Cell;

thread_local! {
    static IN_ISR: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as running the simulated interrupt until dropped.
#[must_use = "the interrupt context ends when the guard is dropped"]
pub struct IsrGuard {
    was_in_isr: bool,
}

/// Enter the simulated interrupt context.
pub fn enter() -> IsrGuard {
    let was_in_isr = IN_ISR.with(|flag| flag.replace(true));
    IsrGuard { was_in_isr }
}

/// True while the current thread is inside the simulated interrupt.
pub fn in_isr() -> bool {
    IN_ISR.with(Cell::get)
}

impl Drop for IsrGuard {
    fn drop(&mut self) {
        IN_ISR.with(|flag| flag.set(self.was_in_isr));
    }
}
