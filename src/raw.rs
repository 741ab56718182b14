//! Raw-mode switching for the invoking terminal
//!
//! `RawModeGuard` owns the single per-process saved-state slot: the first
//! successful raw switch in a process records the original attributes, and
//! the guard restores them when it is released. The slot is keyed by the
//! owning process id so a forked child that inherits the guard cannot
//! restore (or clobber) the parent's terminal state.

use std::os::fd::BorrowedFd;
use std::os::unix::io::RawFd;

use nix::sys::termios::{
    self, InputFlags, LocalFlags, OutputFlags, SetArg, SpecialCharacterIndices, Termios,
};
use nix::unistd::{getpid, Pid};

/// Saved terminal state, keyed to the process that captured it
struct Snapshot {
    owner: Pid,
    fd: RawFd,
    original: Termios,
}

/// RAII guard for raw terminal mode
///
/// Holds at most one snapshot per process. Dropping the guard restores
/// the terminal if and only if the current process is the snapshot owner.
pub struct RawModeGuard {
    snapshot: Option<Snapshot>,
}

impl RawModeGuard {
    /// Create a guard with an empty snapshot slot
    pub fn new() -> Self {
        Self { snapshot: None }
    }

    /// Switch `fd` to raw mode, best effort.
    ///
    /// Silently does nothing when `fd` is not a terminal or when the
    /// attributes cannot be applied; in either case no snapshot is
    /// recorded and the terminal is left untouched. On success the
    /// original attributes are recorded unless this process already owns
    /// a snapshot (a second switch reuses the slot and keeps the first
    /// capture; a forked child overwrites its inherited copy).
    pub fn switch_to_raw(&mut self, fd: RawFd) {
        // SAFETY: the caller keeps fd open for the duration of the call
        let bfd = unsafe { BorrowedFd::borrow_raw(fd) };

        let original = match termios::tcgetattr(bfd) {
            Ok(t) => t,
            Err(_) => return,
        };

        let mut raw = original.clone();
        raw.local_flags &= !(LocalFlags::ICANON
            | LocalFlags::ISIG
            | LocalFlags::IEXTEN
            | LocalFlags::ECHO);
        raw.input_flags &= !(InputFlags::BRKINT
            | InputFlags::ICRNL
            | InputFlags::IGNBRK
            | InputFlags::IGNCR
            | InputFlags::INLCR
            | InputFlags::INPCK
            | InputFlags::ISTRIP
            | InputFlags::IXON
            | InputFlags::PARMRK);
        raw.output_flags &= !OutputFlags::OPOST;
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;

        // Flush pending output before the switch; leave the terminal
        // untouched if the apply fails.
        if termios::tcsetattr(bfd, SetArg::TCSAFLUSH, &raw).is_err() {
            return;
        }

        let me = getpid();
        match &self.snapshot {
            Some(s) if s.owner == me => {}
            _ => {
                self.snapshot = Some(Snapshot {
                    owner: me,
                    fd,
                    original,
                });
            }
        }
    }

    /// Restore the recorded attributes immediately (no flush delay).
    ///
    /// A no-op unless the current process id matches the snapshot owner,
    /// which makes the call safe from a forked child sharing the guard.
    /// Returns whether the attributes were applied.
    pub fn restore(&self) -> bool {
        match &self.snapshot {
            Some(s) if s.owner == getpid() => {
                // SAFETY: the snapshot records a descriptor the owner
                // captured from; it is the owner's job to keep it open
                let bfd = unsafe { BorrowedFd::borrow_raw(s.fd) };
                termios::tcsetattr(bfd, SetArg::TCSANOW, &s.original).is_ok()
            }
            _ => false,
        }
    }

    /// Whether this guard currently holds a snapshot
    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    #[cfg(test)]
    fn disown(&mut self) {
        if let Some(s) = &mut self.snapshot {
            s.owner = Pid::from_raw(s.owner.as_raw().wrapping_add(1));
        }
    }
}

impl Default for RawModeGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}
