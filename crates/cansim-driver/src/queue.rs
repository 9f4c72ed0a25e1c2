//! Fixed-capacity inbound frame ring.
//!
//! Slots move through `Empty → ClaimedByProducer → Full → ClaimedByConsumer
//! → Empty`. Ownership of a slot is carried by a [`SlotHandle`] holding its
//! index. The ring lock only covers index bookkeeping; frame copies go
//! through the slot's own cell, which the handle holder has to itself.
//!
//! When every slot is taken, [`InboundQueue::claim_empty_slot`] refuses the
//! claim: the newest frame is the one that gets dropped.

use std::sync::{Condvar, Mutex, MutexGuard};

use cansim_frame::ControllerFrame;

use crate::isr;
use crate::timeout::WaitTimeout;

/// No empty slot was available to the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("inbound queue full ({capacity} slots)")]
pub struct QueueFull {
    pub capacity: usize,
}

/// No full slot became available before the timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("timed out waiting for a frame")]
pub struct Timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Empty,
    ClaimedByProducer,
    Full,
    ClaimedByConsumer,
}

/// Exclusive access to one slot, obtained from a claim or an acquire.
#[derive(Debug)]
#[must_use = "a claimed slot must be published or released"]
pub struct SlotHandle {
    index: usize,
}

impl SlotHandle {
    /// Ring position of the slot.
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug)]
struct Ring {
    states: Vec<SlotState>,
    /// Next slot the producer claims.
    write: usize,
    /// Next slot a consumer acquires.
    read: usize,
    full: usize,
}

/// Single-producer ring of frame-sized slots shared with consumer threads.
#[derive(Debug)]
pub struct InboundQueue {
    ring: Mutex<Ring>,
    not_empty: Condvar,
    slots: Box<[Mutex<ControllerFrame>]>,
}

impl InboundQueue {
    /// Create a queue with `capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "inbound queue needs at least one slot");
        Self {
            ring: Mutex::new(Ring {
                states: vec![SlotState::Empty; capacity],
                write: 0,
                read: 0,
                full: 0,
            }),
            not_empty: Condvar::new(),
            slots: (0..capacity)
                .map(|_| Mutex::new(ControllerFrame::default()))
                .collect(),
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Claim the next free slot in ring order. Producer context only.
    pub fn claim_empty_slot(&self) -> Result<SlotHandle, QueueFull> {
        let mut ring = self.lock_ring();
        let index = ring.write;
        if ring.states[index] != SlotState::Empty {
            return Err(QueueFull {
                capacity: self.capacity(),
            });
        }
        ring.states[index] = SlotState::ClaimedByProducer;
        ring.write = (index + 1) % self.capacity();
        Ok(SlotHandle { index })
    }

    /// Fill a claimed slot and make it visible to consumers.
    pub fn publish_slot(&self, handle: SlotHandle, frame: ControllerFrame) {
        *lock(&self.slots[handle.index]) = frame;

        let mut ring = self.lock_ring();
        debug_assert_eq!(ring.states[handle.index], SlotState::ClaimedByProducer);
        ring.states[handle.index] = SlotState::Full;
        ring.full += 1;
        drop(ring);
        self.not_empty.notify_one();
    }

    /// Take the oldest full slot, waiting up to `timeout` for one to appear.
    ///
    /// Must not be called with a blocking timeout from the simulated
    /// interrupt context.
    pub fn acquire_full_slot(&self, timeout: WaitTimeout) -> Result<SlotHandle, Timeout> {
        debug_assert!(
            timeout.is_immediate() || !isr::in_isr(),
            "blocking acquire from interrupt context"
        );

        let deadline = timeout.deadline();
        let mut ring = self.lock_ring();
        loop {
            let index = ring.read;
            if ring.states[index] == SlotState::Full {
                ring.states[index] = SlotState::ClaimedByConsumer;
                ring.read = (index + 1) % self.capacity();
                ring.full -= 1;
                return Ok(SlotHandle { index });
            }

            ring = match WaitTimeout::until(deadline) {
                WaitTimeout::Immediate => return Err(Timeout),
                WaitTimeout::Infinite => self
                    .not_empty
                    .wait(ring)
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
                WaitTimeout::After(left) => {
                    self.not_empty
                        .wait_timeout(ring, left)
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .0
                }
            };
        }
    }

    /// Copy the frame out of an acquired slot.
    pub fn read_slot(&self, handle: &SlotHandle) -> ControllerFrame {
        *lock(&self.slots[handle.index])
    }

    /// Return an acquired slot to the empty pool.
    pub fn release_slot(&self, handle: SlotHandle) {
        let mut ring = self.lock_ring();
        debug_assert_eq!(ring.states[handle.index], SlotState::ClaimedByConsumer);
        ring.states[handle.index] = SlotState::Empty;
    }

    /// Acquire, copy and release in one step; `None` if nothing is queued.
    pub fn try_pop(&self) -> Option<ControllerFrame> {
        let handle = self.acquire_full_slot(WaitTimeout::Immediate).ok()?;
        let frame = self.read_slot(&handle);
        self.release_slot(handle);
        Some(frame)
    }

    /// True if no slot is currently full.
    pub fn is_empty(&self) -> bool {
        self.full_count() == 0
    }

    /// Number of full slots at this instant.
    pub fn full_count(&self) -> usize {
        self.lock_ring().full
    }

    /// Discard every queued frame. Only valid while no slot is claimed.
    pub fn reset(&self) {
        let mut ring = self.lock_ring();
        debug_assert!(ring
            .states
            .iter()
            .all(|state| matches!(state, SlotState::Empty | SlotState::Full)));
        ring.states.fill(SlotState::Empty);
        ring.write = 0;
        ring.read = 0;
        ring.full = 0;
    }

    fn lock_ring(&self) -> MutexGuard<'_, Ring> {
        lock(&self.ring)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
