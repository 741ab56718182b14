//! Error types for PTY session operations

use std::fmt;

use nix::errno::Errno;
use thiserror::Error;

/// The child-branch setup step that failed.
///
/// Each step maps to one syscall in the post-fork attach sequence; the
/// launcher stops at the first failing step without attempting rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStep {
    /// `setsid` (detach from the inherited controlling terminal)
    NewSession,
    /// Opening the slave device by path
    OpenSlave,
    /// `TIOCSCTTY` (claim the slave as controlling terminal)
    SetControllingTty,
    /// Replicating the captured terminal attributes onto the slave
    CopyAttributes,
    /// Replicating the captured window geometry onto the slave
    CopyWindowSize,
    /// Duplicating the slave onto stdin/stdout/stderr
    RedirectStdio,
}

impl fmt::Display for ChildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChildStep::NewSession => "setsid",
            ChildStep::OpenSlave => "open slave",
            ChildStep::SetControllingTty => "set controlling tty",
            ChildStep::CopyAttributes => "copy terminal attributes",
            ChildStep::CopyWindowSize => "copy window size",
            ChildStep::RedirectStdio => "redirect stdio",
        };
        f.write_str(name)
    }
}

/// PTY session error type
#[derive(Error, Debug)]
pub enum Error {
    /// Reading the invoker's terminal attributes or geometry failed
    /// before anything was created
    #[error("failed to read invoking terminal state: {0}")]
    Setup(Errno),

    /// PTY pair allocation failed
    #[error("failed to allocate pty: {0}")]
    Allocation(Errno),

    /// The resolved slave device path does not fit the provided capacity
    /// (terminator included)
    #[error("slave path of {len} bytes does not fit name capacity {capacity}")]
    NameOverflow { len: usize, capacity: usize },

    /// Process creation failed; the allocated master was closed
    #[error("fork failed: {0}")]
    Fork(Errno),

    /// A post-fork setup step failed inside the child
    #[error("child setup failed ({step}): {errno}")]
    ChildSetup { step: ChildStep, errno: Errno },

    /// Read or write on an established handle failed
    #[error("descriptor I/O failed: {0}")]
    Io(Errno),

    /// Image replacement failed; the process still runs its original image
    #[error("exec failed: {0}")]
    Exec(Errno),
}

impl Error {
    /// The originating OS error code, if the variant carries one.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Error::Setup(e)
            | Error::Allocation(e)
            | Error::Fork(e)
            | Error::Io(e)
            | Error::Exec(e) => Some(*e),
            Error::ChildSetup { errno, .. } => Some(*errno),
            Error::NameOverflow { .. } => None,
        }
    }
}

/// Result type for PTY session operations
pub type Result<T> = std::result::Result<T, Error>;
