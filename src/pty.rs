//! PTY master allocation
//!
//! Opens the master side of a new pseudoterminal pair and resolves the
//! slave device path. The master descriptor is owned by the returned
//! value and is closed on every failure path, so allocation never leaks
//! a descriptor.

use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::io::{AsRawFd, IntoRawFd, RawFd};

use nix::fcntl::OFlag;
use nix::pty::{grantpt, posix_openpt, ptsname, unlockpt, PtyMaster};

use crate::error::{Error, Result};

/// Default capacity for the resolved slave device path, terminator
/// included. Large enough for every known pts naming scheme.
pub const DEFAULT_NAME_CAPACITY: usize = 1024;

/// An allocated pseudoterminal master with its resolved slave path
#[derive(Debug)]
pub struct Pty {
    /// The PTY master file descriptor
    master: PtyMaster,
    /// Path to the slave device
    slave_path: String,
}

impl Pty {
    /// Allocate a new PTY pair.
    ///
    /// Opens the master in read-write, non-controlling mode, grants and
    /// unlocks the slave, and resolves the slave device path. Fails with
    /// [`Error::NameOverflow`] if the path plus its terminator does not
    /// fit `name_capacity`.
    pub fn open(name_capacity: usize) -> Result<Self> {
        let master =
            posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).map_err(Error::Allocation)?;
        grantpt(&master).map_err(Error::Allocation)?;
        unlockpt(&master).map_err(Error::Allocation)?;

        // SAFETY: ptsname is not thread-safe, but we copy the result into
        // an owned String before any other pty call can clobber it
        let slave_path = unsafe { ptsname(&master) }.map_err(Error::Allocation)?;

        // Dropping `master` on the error paths above and below closes the
        // descriptor, matching the no-leak guarantee.
        if slave_path.len() + 1 > name_capacity {
            return Err(Error::NameOverflow {
                len: slave_path.len(),
                capacity: name_capacity,
            });
        }

        Ok(Self { master, slave_path })
    }

    /// Path to the slave device
    pub fn slave_path(&self) -> &str {
        &self.slave_path
    }

    /// Raw descriptor of the master side
    pub fn master_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }

    /// Give up ownership of the master descriptor without closing it
    pub fn into_master_fd(self) -> RawFd {
        self.master.into_raw_fd()
    }
}

impl AsRawFd for Pty {
    fn as_raw_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }
}

impl AsFd for Pty {
    fn as_fd(&self) -> BorrowedFd<'_> {
        // SAFETY: the master descriptor stays open for the lifetime of self
        unsafe { BorrowedFd::borrow_raw(self.master.as_raw_fd()) }
    }
}
