//! PTY session primitive for Unix
//!
//! Allocates a pseudoterminal pair, forks a child attached to the slave
//! side as its controlling terminal, and propagates the invoking
//! terminal's mode and geometry to the child. The invoker's terminal is
//! switched to raw mode in the parent and restored when the owning
//! [`RawModeGuard`] is released.
//!
//! Key pieces:
//! - [`Pty`]: master allocation with slave-path resolution
//! - [`Session`]: the fork orchestration, one variant per execution context
//! - [`RawModeGuard`]: raw-mode switch with restore-on-drop
//! - [`FdHandle`]: read/write/close on the descriptors a launch hands back
//!
//! Reference: https://www.man7.org/linux/man-pages/man3/posix_openpt.3.html

mod error;
mod fd;
mod pty;
mod raw;
mod session;
mod size;

pub use error::{ChildStep, Error, Result};
pub use fd::FdHandle;
pub use pty::{Pty, DEFAULT_NAME_CAPACITY};
pub use raw::RawModeGuard;
pub use session::{exec, Session};
pub use size::WindowSize;
