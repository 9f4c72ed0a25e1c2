//! Queue of threads parked until an interrupt wakes them.

use std::sync::{Condvar, Mutex, MutexGuard};

use crate::isr;
use crate::timeout::WaitTimeout;

/// Why a parked thread resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// The readiness condition already held; the thread never parked.
    Ready,
    /// Woken by [`ThreadQueue::dequeue_next`].
    Woken,
    /// Woken by [`ThreadQueue::dequeue_all`] (driver stopped).
    Reset,
    /// The timeout elapsed first.
    Timeout,
}

#[derive(Debug, Default)]
struct WaitState {
    waiting: usize,
    wakeups: usize,
    /// Bumped by every `dequeue_all`.
    resets: u64,
}

/// Threads waiting for an event signalled from interrupt context.
///
/// A wake only reaches threads that are already parked; waking an empty
/// queue is a no-op.
#[derive(Debug, Default)]
pub struct ThreadQueue {
    state: Mutex<WaitState>,
    cond: Condvar,
}

impl ThreadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park the calling thread until woken or `timeout` expires, unless
    /// `ready` already holds.
    ///
    /// `ready` is evaluated under the queue lock, so a wake issued after it
    /// returned `false` cannot be missed.
    pub fn enqueue_timeout_unless(
        &self,
        timeout: WaitTimeout,
        ready: impl Fn() -> bool,
    ) -> WakeReason {
        let mut state = self.lock_state();
        if ready() {
            return WakeReason::Ready;
        }
        if timeout.is_immediate() {
            return WakeReason::Timeout;
        }
        debug_assert!(!isr::in_isr(), "thread parked from interrupt context");

        let deadline = timeout.deadline();
        let resets = state.resets;
        state.waiting += 1;
        loop {
            if state.resets != resets {
                state.waiting -= 1;
                return WakeReason::Reset;
            }
            if state.wakeups > 0 {
                state.wakeups -= 1;
                state.waiting -= 1;
                return WakeReason::Woken;
            }

            state = match WaitTimeout::until(deadline) {
                WaitTimeout::Immediate => {
                    state.waiting -= 1;
                    return WakeReason::Timeout;
                }
                WaitTimeout::Infinite => self
                    .cond
                    .wait(state)
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
                WaitTimeout::After(left) => {
                    self.cond
                        .wait_timeout(state, left)
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .0
                }
            };
        }
    }

    /// Wake the next parked thread, if any. Returns whether one was woken.
    pub fn dequeue_next(&self) -> bool {
        let mut state = self.lock_state();
        if state.waiting <= state.wakeups {
            return false;
        }
        state.wakeups += 1;
        drop(state);
        // Any parked thread may consume the wakeup, so wake all and let one win.
        self.cond.notify_all();
        true
    }

    /// Wake every parked thread with [`WakeReason::Reset`].
    pub fn dequeue_all(&self) {
        let mut state = self.lock_state();
        state.resets = state.resets.wrapping_add(1);
        state.wakeups = 0;
        drop(state);
        self.cond.notify_all();
    }

    /// Number of threads currently parked and not yet woken.
    pub fn waiting(&self) -> usize {
        let state = self.lock_state();
        state.waiting.saturating_sub(state.wakeups)
    }

    fn lock_state(&self) -> MutexGuard<'_, WaitState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;

    fn wait_for_parked(queue: &ThreadQueue, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while queue.waiting() < count {
            assert!(Instant::now() < deadline, "threads never parked");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn ready_condition_skips_parking() {
        let queue = ThreadQueue::new();
        assert_eq!(
            queue.enqueue_timeout_unless(WaitTimeout::Infinite, || true),
            WakeReason::Ready
        );
    }

    #[test]
    fn immediate_timeout_never_parks() {
        let queue = ThreadQueue::new();
        assert_eq!(
            queue.enqueue_timeout_unless(WaitTimeout::Immediate, || false),
            WakeReason::Timeout
        );
        assert_eq!(queue.waiting(), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "thread parked from interrupt context")]
    fn parking_inside_isr_is_rejected() {
        let queue = ThreadQueue::new();
        let _isr = isr::enter();
        queue.enqueue_timeout_unless(WaitTimeout::After(Duration::from_millis(1)), || false);
    }

    #[test]
    fn huge_timeout_still_honours_ready() {
        let queue = ThreadQueue::new();
        assert_eq!(
            queue.enqueue_timeout_unless(WaitTimeout::After(Duration::MAX), || true),
            WakeReason::Ready
        );
    }

    #[test]
    fn wake_without_waiters_is_lost() {
        let queue = ThreadQueue::new();
        assert!(!queue.dequeue_next());
        assert_eq!(
            queue.enqueue_timeout_unless(WaitTimeout::After(Duration::from_millis(10)), || false),
            WakeReason::Timeout
        );
    }

    #[test]
    fn dequeue_next_wakes_exactly_one() {
        let queue = Arc::new(ThreadQueue::new());
        let sleepers: Vec<_> = (0..2)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    queue.enqueue_timeout_unless(
                        WaitTimeout::After(Duration::from_millis(300)),
                        || false,
                    )
                })
            })
            .collect();

        wait_for_parked(&queue, 2);
        assert!(queue.dequeue_next());

        let mut reasons: Vec<_> = sleepers.into_iter().map(|h| h.join().unwrap()).collect();
        reasons.sort_by_key(|r| *r == WakeReason::Timeout);
        assert_eq!(reasons, vec![WakeReason::Woken, WakeReason::Timeout]);
    }

    #[test]
    fn dequeue_all_resets_everyone() {
        let queue = Arc::new(ThreadQueue::new());
        let sleepers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.enqueue_timeout_unless(WaitTimeout::Infinite, || false))
            })
            .collect();

        wait_for_parked(&queue, 3);
        queue.dequeue_all();
        for sleeper in sleepers {
            assert_eq!(sleeper.join().unwrap(), WakeReason::Reset);
        }
        assert_eq!(queue.waiting(), 0);
    }
}
