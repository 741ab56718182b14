//! Opaque descriptor handles returned by a session launch
//!
//! A handle records which process created it (pid and parent pid, for
//! diagnostics) alongside the descriptor itself. Handles never close
//! their descriptor on drop: the three standard-stream handles alias
//! descriptors the process still needs, so closing is always an explicit,
//! idempotent call.

use std::os::unix::io::RawFd;

use nix::errno::Errno;
use nix::unistd::{self, getpid, getppid, Pid};
use tracing::debug;

use crate::error::{Error, Result};

/// Sentinel stored once a handle has been closed
const CLOSED: RawFd = -1;

/// A handle around one file descriptor with a liveness flag
#[derive(Debug)]
pub struct FdHandle {
    /// Process that created the handle
    pid: Pid,
    /// Parent of that process (diagnostic only)
    ppid: Pid,
    /// The descriptor, or `None` once closed
    fd: Option<RawFd>,
    /// Opt-in per-handle diagnostics
    debug: bool,
}

impl FdHandle {
    /// Wrap a descriptor. The handle does not take responsibility for
    /// closing it on drop.
    pub fn new(fd: RawFd) -> Self {
        Self {
            pid: getpid(),
            ppid: getppid(),
            fd: Some(fd),
            debug: false,
        }
    }

    /// Enable or disable per-handle diagnostics
    pub fn set_debug(&mut self, enabled: bool) {
        self.debug = enabled;
    }

    /// The raw descriptor, or `-1` once closed
    pub fn fd(&self) -> RawFd {
        self.fd.unwrap_or(CLOSED)
    }

    /// One blocking read of at most `max_len` bytes.
    ///
    /// May return fewer bytes than requested; returns an empty buffer at
    /// end of stream. Fails with `EBADF` on a closed handle.
    pub fn read(&self, max_len: usize) -> Result<Vec<u8>> {
        let fd = self.live_fd()?;
        let mut buf = vec![0u8; max_len];

        // SAFETY: buf stays alive across the call and the length matches
        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        let n = Errno::result(n).map_err(Error::Io)? as usize;

        buf.truncate(n);
        if self.debug {
            debug!(pid = %self.pid, ppid = %self.ppid, fd, n, "read");
        }
        Ok(buf)
    }

    /// One blocking write.
    ///
    /// An explicit `len` larger than the buffer is clamped to the buffer
    /// size. Returns the number of bytes actually written, which may be
    /// fewer than requested.
    pub fn write(&self, buf: &[u8], len: Option<usize>) -> Result<usize> {
        let fd = self.live_fd()?;
        let requested = len.unwrap_or(buf.len()).min(buf.len());

        // SAFETY: the slice bound above keeps the pointer/length pair valid
        let n = unsafe { libc::write(fd, buf.as_ptr().cast(), requested) };
        let n = Errno::result(n).map_err(Error::Io)? as usize;

        if self.debug {
            debug!(pid = %self.pid, ppid = %self.ppid, fd, requested, n, "write");
        }
        Ok(n)
    }

    /// Close the descriptor. Safe to call any number of times; only the
    /// first call has an effect.
    pub fn close(&mut self) {
        if let Some(fd) = self.fd.take() {
            if self.debug {
                debug!(pid = %self.pid, ppid = %self.ppid, fd, "close");
            }
            let _ = unistd::close(fd);
        }
    }

    fn live_fd(&self) -> Result<RawFd> {
        self.fd.ok_or(Error::Io(Errno::EBADF))
    }
}
