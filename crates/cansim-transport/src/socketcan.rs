use std::ffi::CString;
use std::io;
use std::mem::size_of;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

use cansim_frame::{WireFrame, WIRE_FRAME_SIZE};
use tracing::{debug, trace, warn};

use crate::error::{Result, TransportError};

/// SocketCAN raw socket bound to one interface.
///
/// The socket is opened non-blocking; readiness is queried with zero-timeout
/// polls so none of the operations here ever suspend the caller.
#[derive(Debug)]
pub struct SocketCan {
    fd: OwnedFd,
    channel: String,
    if_index: u32,
}

impl SocketCan {
    /// Create a raw CAN socket and bind it to the named interface (e.g. `"vcan0"`).
    pub fn open(channel: &str) -> Result<Self> {
        let name = CString::new(channel).map_err(|_| TransportError::InvalidChannelName {
            name: channel.to_string(),
            reason: "contains a NUL byte",
        })?;

        // SAFETY: plain syscall with constant arguments; the result is checked below.
        let raw = unsafe {
            libc::socket(
                libc::PF_CAN,
                libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                libc::CAN_RAW,
            )
        };
        if raw < 0 {
            return Err(TransportError::Socket(io::Error::last_os_error()));
        }
        // SAFETY: `raw` is a freshly created descriptor owned by nobody else.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        // SAFETY: `name` is a valid NUL-terminated string for the duration of the call.
        let if_index = unsafe { libc::if_nametoindex(name.as_ptr()) };
        if if_index == 0 {
            return Err(TransportError::InterfaceLookup {
                name: channel.to_string(),
                source: io::Error::last_os_error(),
            });
        }

        // SAFETY: all-zero is a valid `sockaddr_can`.
        let mut addr: libc::sockaddr_can = unsafe { std::mem::zeroed() };
        addr.can_family = libc::AF_CAN as libc::sa_family_t;
        addr.can_ifindex = if_index as libc::c_int;

        // SAFETY: `addr` outlives the call and the length matches its type.
        let rc = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                (&addr as *const libc::sockaddr_can).cast::<libc::sockaddr>(),
                size_of::<libc::sockaddr_can>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(TransportError::Bind {
                name: channel.to_string(),
                source: io::Error::last_os_error(),
            });
        }

        debug!(channel, if_index, "bound raw CAN socket");
        Ok(Self {
            fd,
            channel: channel.to_string(),
            if_index,
        })
    }

    /// Close the socket, reporting a failing `close(2)`.
    pub fn close(self) -> Result<()> {
        let raw = self.fd.into_raw_fd();
        // SAFETY: ownership of `raw` was released above, so it is closed exactly once.
        if unsafe { libc::close(raw) } < 0 {
            return Err(TransportError::Close(io::Error::last_os_error()));
        }
        debug!(channel = %self.channel, "closed raw CAN socket");
        Ok(())
    }

    /// True if a frame can be written without blocking.
    pub fn poll_writable(&self) -> Result<bool> {
        poll_once(self.fd.as_raw_fd(), libc::POLLOUT)
    }

    /// True if a frame is waiting to be read.
    pub fn poll_readable(&self) -> Result<bool> {
        poll_once(self.fd.as_raw_fd(), libc::POLLIN)
    }

    /// Write exactly one frame.
    pub fn write_frame(&self, frame: &WireFrame) -> Result<()> {
        let bytes = frame.to_bytes();
        // SAFETY: `bytes` is a live buffer of exactly `WIRE_FRAME_SIZE` bytes.
        let written = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                bytes.as_ptr().cast::<libc::c_void>(),
                WIRE_FRAME_SIZE,
            )
        };
        if written < 0 {
            return Err(TransportError::Write(io::Error::last_os_error()));
        }
        if written as usize != WIRE_FRAME_SIZE {
            return Err(TransportError::ShortWrite {
                written: written as usize,
                expected: WIRE_FRAME_SIZE,
            });
        }
        trace!(can_id = frame.can_id, dlc = frame.can_dlc, "frame written");
        Ok(())
    }

    /// Attempt to read one frame.
    ///
    /// Returns `Ok(None)` when nothing is pending or the datagram was shorter
    /// than a classic frame.
    pub fn read_frame(&self) -> Result<Option<WireFrame>> {
        let mut buf = [0u8; WIRE_FRAME_SIZE];
        // SAFETY: `buf` is a writable buffer of exactly `WIRE_FRAME_SIZE` bytes.
        let read = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr().cast::<libc::c_void>(),
                WIRE_FRAME_SIZE,
            )
        };
        if read < 0 {
            let err = io::Error::last_os_error();
            return match err.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(None),
                _ => Err(TransportError::Read(err)),
            };
        }

        Ok(frame_from_datagram(&self.channel, &buf[..read as usize]))
    }

    /// Name of the bound interface.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Kernel interface index the socket is bound to.
    pub fn if_index(&self) -> u32 {
        self.if_index
    }
}

impl AsRawFd for SocketCan {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// A datagram shorter than a classic frame counts as no data.
fn frame_from_datagram(channel: &str, datagram: &[u8]) -> Option<WireFrame> {
    match WireFrame::from_bytes(datagram) {
        Ok(frame) => Some(frame),
        Err(err) => {
            warn!(channel, %err, "discarding short read");
            None
        }
    }
}

fn poll_once(fd: RawFd, events: libc::c_short) -> Result<bool> {
    let mut poll_fd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };

    loop {
        // SAFETY: `poll_fd` is a valid pollfd array of length one.
        let ready = unsafe { libc::poll(&mut poll_fd, 1, 0) };
        if ready >= 0 {
            return Ok(ready != 0);
        }

        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            continue;
        }
        return Err(TransportError::Poll(err));
    }
}
