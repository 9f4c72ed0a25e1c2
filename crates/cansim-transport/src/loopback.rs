//! In-process loopback bus.
//!
//! Ports opened on the same channel name share one virtual bus. A frame
//! written by one port is delivered to every other port on that bus, never
//! back to its sender, which is what a raw socket on a `vcan` interface sees
//! with default socket options. Frames travel as raw wire bytes.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use cansim_frame::{WireFrame, WIRE_FRAME_SIZE};
use tracing::{debug, trace, warn};

use crate::error::Result;

/// Frames buffered per port before new arrivals are dropped.
pub const DEFAULT_PORT_BACKLOG: usize = 1024;

type Inbox = Arc<Mutex<VecDeque<[u8; WIRE_FRAME_SIZE]>>>;

struct Attachment {
    id: u64,
    inbox: Inbox,
    backlog: usize,
}

#[derive(Default)]
struct Bus {
    ports: Vec<Attachment>,
}

fn buses() -> MutexGuard<'static, HashMap<String, Bus>> {
    static BUSES: OnceLock<Mutex<HashMap<String, Bus>>> = OnceLock::new();
    BUSES
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock_inbox(inbox: &Inbox) -> MutexGuard<'_, VecDeque<[u8; WIRE_FRAME_SIZE]>> {
    inbox.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

static NEXT_PORT_ID: AtomicU64 = AtomicU64::new(1);

/// One attachment to a named loopback bus.
#[derive(Debug)]
pub struct LoopbackPort {
    id: u64,
    channel: String,
    inbox: Inbox,
}

impl LoopbackPort {
    /// Attach to the bus named `channel`, creating it if needed.
    pub fn open(channel: &str) -> Self {
        Self::with_backlog(channel, DEFAULT_PORT_BACKLOG)
    }

    /// Attach with an explicit receive backlog.
    pub fn with_backlog(channel: &str, backlog: usize) -> Self {
        let id = NEXT_PORT_ID.fetch_add(1, Ordering::Relaxed);
        let inbox: Inbox = Arc::new(Mutex::new(VecDeque::new()));
        buses()
            .entry(channel.to_string())
            .or_default()
            .ports
            .push(Attachment {
                id,
                inbox: Arc::clone(&inbox),
                backlog,
            });
        debug!(channel, port = id, "attached to loopback bus");
        Self {
            id,
            channel: channel.to_string(),
            inbox,
        }
    }

    /// Detach from the bus.
    pub fn close(self) -> Result<()> {
        // Detaching happens in Drop.
        Ok(())
    }

    /// Always writable: the virtual bus never applies backpressure.
    pub fn poll_writable(&self) -> Result<bool> {
        Ok(true)
    }

    /// True if a frame is waiting in this port's inbox.
    pub fn poll_readable(&self) -> Result<bool> {
        Ok(!lock_inbox(&self.inbox).is_empty())
    }

    /// Deliver one frame to every other port on the bus.
    pub fn write_frame(&self, frame: &WireFrame) -> Result<()> {
        let bytes = frame.to_bytes();
        let registry = buses();
        if let Some(bus) = registry.get(&self.channel) {
            for port in bus.ports.iter().filter(|port| port.id != self.id) {
                let mut queue = lock_inbox(&port.inbox);
                if queue.len() >= port.backlog {
                    warn!(channel = %self.channel, port = port.id, "loopback backlog full, dropping frame");
                    continue;
                }
                queue.push_back(bytes);
            }
        }
        trace!(channel = %self.channel, can_id = frame.can_id, "loopback frame written");
        Ok(())
    }

    /// Take the oldest pending frame, if any.
    pub fn read_frame(&self) -> Result<Option<WireFrame>> {
        let Some(bytes) = lock_inbox(&self.inbox).pop_front() else {
            return Ok(None);
        };
        // Every queued entry is a complete frame by construction.
        Ok(WireFrame::from_bytes(&bytes).ok())
    }

    /// Name of the bus this port is attached to.
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl Drop for LoopbackPort {
    fn drop(&mut self) {
        let mut registry = buses();
        if let Some(bus) = registry.get_mut(&self.channel) {
            bus.ports.retain(|port| port.id != self.id);
            if bus.ports.is_empty() {
                registry.remove(&self.channel);
            }
        }
        debug!(channel = %self.channel, port = self.id, "detached from loopback bus");
    }
}
