use std::fmt;
use std::str::FromStr;

use cansim_frame::WireFrame;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::loopback::LoopbackPort;

/// Interface names are limited to `IFNAMSIZ - 1` bytes on Linux.
pub const MAX_CHANNEL_NAME_LEN: usize = 15;

/// Which host transport backs a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// SocketCAN raw socket (Linux only).
    SocketCan,
    /// In-process loopback bus.
    Loopback,
}

impl TransportKind {
    /// Transport name for diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::SocketCan => "socketcan",
            TransportKind::Loopback => "loopback",
        }
    }
}

impl Default for TransportKind {
    fn default() -> Self {
        if cfg!(target_os = "linux") {
            TransportKind::SocketCan
        } else {
            TransportKind::Loopback
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "socketcan" => Ok(TransportKind::SocketCan),
            "loopback" => Ok(TransportKind::Loopback),
            other => Err(format!("unknown transport: {other}")),
        }
    }
}

/// Configuration for opening a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Host interface (or loopback bus) to bind to, e.g. `"vcan0"`.
    pub channel_name: String,
    /// Backing transport.
    pub transport: TransportKind,
}

impl SessionConfig {
    /// Configuration for `channel_name` on the default transport.
    pub fn new(channel_name: impl Into<String>) -> Self {
        Self {
            channel_name: channel_name.into(),
            transport: TransportKind::default(),
        }
    }

    /// Override the transport.
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("vcan0")
    }
}

/// An open CAN channel that moves one wire frame at a time.
pub struct Session {
    inner: SessionInner,
}

enum SessionInner {
    #[cfg(target_os = "linux")]
    SocketCan(crate::socketcan::SocketCan),
    Loopback(LoopbackPort),
}

impl Session {
    /// Open and bind a session according to `config`.
    pub fn open(config: &SessionConfig) -> Result<Self> {
        validate_channel_name(&config.channel_name)?;

        let inner = match config.transport {
            #[cfg(target_os = "linux")]
            TransportKind::SocketCan => {
                SessionInner::SocketCan(crate::socketcan::SocketCan::open(&config.channel_name)?)
            }
            #[cfg(not(target_os = "linux"))]
            TransportKind::SocketCan => {
                return Err(TransportError::Unsupported(TransportKind::SocketCan.as_str()))
            }
            TransportKind::Loopback => {
                SessionInner::Loopback(LoopbackPort::open(&config.channel_name))
            }
        };

        debug!(
            channel = %config.channel_name,
            transport = %config.transport,
            "CAN session open"
        );
        Ok(Self { inner })
    }

    /// Release the underlying socket.
    pub fn close(self) -> Result<()> {
        match self.inner {
            #[cfg(target_os = "linux")]
            SessionInner::SocketCan(socket) => socket.close(),
            SessionInner::Loopback(port) => port.close(),
        }
    }

    /// Zero-timeout check whether a frame can be written.
    pub fn poll_writable(&self) -> Result<bool> {
        match &self.inner {
            #[cfg(target_os = "linux")]
            SessionInner::SocketCan(socket) => socket.poll_writable(),
            SessionInner::Loopback(port) => port.poll_writable(),
        }
    }

    /// Zero-timeout check whether a frame is waiting.
    pub fn poll_readable(&self) -> Result<bool> {
        match &self.inner {
            #[cfg(target_os = "linux")]
            SessionInner::SocketCan(socket) => socket.poll_readable(),
            SessionInner::Loopback(port) => port.poll_readable(),
        }
    }

    /// Write exactly one frame.
    pub fn write_frame(&self, frame: &WireFrame) -> Result<()> {
        match &self.inner {
            #[cfg(target_os = "linux")]
            SessionInner::SocketCan(socket) => socket.write_frame(frame),
            SessionInner::Loopback(port) => port.write_frame(frame),
        }
    }

    /// Attempt to read one frame; `Ok(None)` when nothing complete is available.
    pub fn read_frame(&self) -> Result<Option<WireFrame>> {
        match &self.inner {
            #[cfg(target_os = "linux")]
            SessionInner::SocketCan(socket) => socket.read_frame(),
            SessionInner::Loopback(port) => port.read_frame(),
        }
    }

    /// Channel this session is bound to.
    pub fn channel(&self) -> &str {
        match &self.inner {
            #[cfg(target_os = "linux")]
            SessionInner::SocketCan(socket) => socket.channel(),
            SessionInner::Loopback(port) => port.channel(),
        }
    }

    /// Transport backing this session.
    pub fn transport(&self) -> TransportKind {
        match &self.inner {
            #[cfg(target_os = "linux")]
            SessionInner::SocketCan(_) => TransportKind::SocketCan,
            SessionInner::Loopback(_) => TransportKind::Loopback,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("transport", &self.transport().as_str())
            .field("channel", &self.channel())
            .finish()
    }
}

fn validate_channel_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "empty"
    } else if name.len() > MAX_CHANNEL_NAME_LEN {
        "longer than 15 bytes"
    } else {
        return Ok(());
    };
    Err(TransportError::InvalidChannelName {
        name: name.to_string(),
        reason,
    })
}
