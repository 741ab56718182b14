//! Session launch: fork a child onto a fresh PTY
//!
//! One call produces two execution contexts. The parent keeps the master
//! side and its own standard streams, with the invoking terminal switched
//! to raw mode; the child becomes a new session leader attached to the
//! slave, with the invoker's terminal attributes and window geometry
//! replicated onto it and its standard streams redirected there.
//!
//! The fork boundary provides no synchronization: the parent must not
//! assume the child finished attaching before it starts raw-mode I/O.

use std::ffi::{CStr, CString};
use std::os::fd::BorrowedFd;
use std::os::unix::io::RawFd;

use nix::errno::Errno;
use nix::fcntl::{self, OFlag};
use nix::libc::{STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use nix::sys::stat::Mode;
use nix::sys::termios::{self, SetArg, Termios};
use nix::unistd::{self, fork, setsid, ForkResult, Pid};

use crate::error::{ChildStep, Error, Result};
use crate::fd::FdHandle;
use crate::pty::{Pty, DEFAULT_NAME_CAPACITY};
use crate::raw::RawModeGuard;
use crate::size::WindowSize;

/// Result of a session launch: one variant per execution context.
///
/// Exactly one variant is observed per process. The original process
/// sees `Parent`; the new process sees `Child` on success or
/// `ChildFailed` when a post-fork setup step failed.
#[derive(Debug)]
pub enum Session {
    /// The original process. Carries the child pid and four handles:
    /// the PTY master plus the parent's own standard streams.
    Parent {
        child: Pid,
        master: FdHandle,
        stdin: FdHandle,
        stdout: FdHandle,
        stderr: FdHandle,
    },
    /// The new process, fully attached to the slave PTY. The three
    /// handles cover the redirected standard streams. The caller is
    /// expected to [`exec`] a new image next.
    Child {
        stdin: FdHandle,
        stdout: FdHandle,
        stderr: FdHandle,
    },
    /// The new process, with setup aborted at `step`. Standard streams
    /// may be partially redirected; no rollback is attempted. The caller
    /// should exit promptly, since continuing to run the original image
    /// in this state is almost never intended.
    ChildFailed { step: ChildStep, errno: Errno },
}

impl Session {
    /// Launch a session using the process's standard input as the
    /// invoking terminal. See [`Session::launch_on`].
    pub fn launch(guard: &mut RawModeGuard) -> Result<Session> {
        Self::launch_on(guard, STDIN_FILENO)
    }

    /// Launch a session, treating `invoker` as the invoking terminal.
    ///
    /// Captures the invoker's attributes and window geometry, allocates
    /// a PTY pair, and forks. In the parent, switches the invoker to raw
    /// mode through `guard` (best effort; never fails the launch) and
    /// returns [`Session::Parent`]. In the child, attaches to the slave
    /// and returns [`Session::Child`] or [`Session::ChildFailed`].
    ///
    /// Errors returned through `Result` all occur before the fork, so an
    /// `Err` means no process was created (the allocated master, if any,
    /// is already closed).
    pub fn launch_on(guard: &mut RawModeGuard, invoker: RawFd) -> Result<Session> {
        // SAFETY: the caller keeps the invoker descriptor open
        let invoker_bfd = unsafe { BorrowedFd::borrow_raw(invoker) };
        let attrs = termios::tcgetattr(invoker_bfd).map_err(Error::Setup)?;
        let size = WindowSize::from_fd(invoker).map_err(Error::Setup)?;

        let pty = Pty::open(DEFAULT_NAME_CAPACITY)?;

        // Everything the child needs is prepared before the fork: the
        // child branch must not touch the allocator, since another
        // thread of the launching process may hold its lock at fork time.
        let slave_path = CString::new(pty.slave_path())
            .map_err(|_| Error::Allocation(Errno::EINVAL))?;
        let master_fd = pty.master_fd();

        // SAFETY: between fork and return/exec the child branch only
        // calls syscalls, no allocation
        match unsafe { fork() }.map_err(Error::Fork)? {
            ForkResult::Parent { child } => {
                guard.switch_to_raw(invoker);
                Ok(Session::Parent {
                    child,
                    master: FdHandle::new(pty.into_master_fd()),
                    stdin: FdHandle::new(STDIN_FILENO),
                    stdout: FdHandle::new(STDOUT_FILENO),
                    stderr: FdHandle::new(STDERR_FILENO),
                })
            }
            ForkResult::Child => {
                // Freeing the inherited Pty would free its String; leave
                // it be and close the master by raw descriptor instead.
                std::mem::forget(pty);
                Ok(attach_child(master_fd, &slave_path, &attrs, size))
            }
        }
    }
}

/// Post-fork attach sequence, child context only.
///
/// Stops at the first failing step; partially redirected streams are
/// left as they are. Runs between fork and exec, so nothing here may
/// allocate.
fn attach_child(master_fd: RawFd, slave_path: &CStr, attrs: &Termios, size: WindowSize) -> Session {
    if let Err(errno) = setsid() {
        return Session::ChildFailed {
            step: ChildStep::NewSession,
            errno,
        };
    }

    // The inherited master belongs to the parent branch.
    let _ = unistd::close(master_fd);

    let slave_fd = match fcntl::open(slave_path, OFlag::O_RDWR, Mode::empty()) {
        Ok(fd) => fd,
        Err(errno) => {
            return Session::ChildFailed {
                step: ChildStep::OpenSlave,
                errno,
            }
        }
    };

    // Claim the slave as controlling terminal. Session creation above
    // already detached us, but an explicit claim is required on Linux
    // when the slave was opened after setsid.
    // SAFETY: TIOCSCTTY is a valid ioctl on an open tty descriptor
    let rc = unsafe { libc::ioctl(slave_fd, libc::TIOCSCTTY as libc::c_ulong, 0) };
    if rc < 0 {
        return Session::ChildFailed {
            step: ChildStep::SetControllingTty,
            errno: Errno::last(),
        };
    }

    // SAFETY: slave_fd is open for the rest of this function
    let slave_bfd = unsafe { BorrowedFd::borrow_raw(slave_fd) };
    if let Err(errno) = termios::tcsetattr(slave_bfd, SetArg::TCSANOW, attrs) {
        return Session::ChildFailed {
            step: ChildStep::CopyAttributes,
            errno,
        };
    }
    if let Err(errno) = size.apply(slave_fd) {
        return Session::ChildFailed {
            step: ChildStep::CopyWindowSize,
            errno,
        };
    }

    for std_fd in [STDIN_FILENO, STDOUT_FILENO, STDERR_FILENO] {
        if let Err(errno) = unistd::dup2(slave_fd, std_fd) {
            return Session::ChildFailed {
                step: ChildStep::RedirectStdio,
                errno,
            };
        }
    }
    if slave_fd > STDERR_FILENO {
        let _ = unistd::close(slave_fd);
    }

    Session::Child {
        stdin: FdHandle::new(STDIN_FILENO),
        stdout: FdHandle::new(STDOUT_FILENO),
        stderr: FdHandle::new(STDERR_FILENO),
    }
}

/// Replace the process image.
///
/// `path` becomes argv[0], followed by `args`. Only returns on failure,
/// with the originating OS error code; the process keeps running its
/// original image in that case.
pub fn exec(path: &str, args: &[&str]) -> Result<std::convert::Infallible> {
    let path_cstr = CString::new(path).map_err(|_| Error::Exec(Errno::EINVAL))?;

    let mut argv: Vec<CString> = Vec::with_capacity(args.len() + 1);
    argv.push(path_cstr.clone());
    for arg in args {
        argv.push(CString::new(*arg).map_err(|_| Error::Exec(Errno::EINVAL))?);
    }

    unistd::execv(&path_cstr, &argv).map_err(Error::Exec)?;
    unreachable!()
}
