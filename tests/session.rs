//! End-to-end session tests
//!
//! These tests run headless: the "invoking terminal" is fabricated from
//! the slave side of a scratch PTY pair, so no real controlling terminal
//! is needed. The launch tests fork the test process; the child branch
//! always either execs or exits.

use std::fs::File;
use std::os::fd::BorrowedFd;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;

use nix::poll::{poll, PollFd, PollFlags};
use nix::sys::signal::{kill, Signal};
use nix::sys::termios::{self, LocalFlags};
use nix::sys::wait::waitpid;

use pty_session::{exec, Pty, RawModeGuard, Session, DEFAULT_NAME_CAPACITY};

/// A scratch PTY whose slave stands in for the invoking terminal
fn fabricated_tty() -> (Pty, File) {
    let pty = Pty::open(DEFAULT_NAME_CAPACITY).unwrap();
    let slave = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY)
        .open(pty.slave_path())
        .unwrap();
    (pty, slave)
}

/// Wait until `fd` is readable, panicking after `timeout_ms`
fn wait_readable(fd: i32, timeout_ms: i32) {
    // SAFETY: the caller keeps fd open across the call
    let bfd = unsafe { BorrowedFd::borrow_raw(fd) };
    let mut fds = [PollFd::new(&bfd, PollFlags::POLLIN)];
    let n = poll(&mut fds, timeout_ms).unwrap();
    assert!(n > 0, "timed out waiting for fd {fd} to become readable");
}

#[test]
fn launch_attaches_child_and_master_carries_echo() {
    let (_outer, invoker) = fabricated_tty();
    let mut guard = RawModeGuard::new();

    match Session::launch_on(&mut guard, invoker.as_raw_fd()).unwrap() {
        Session::Child { stdin, stdout, stderr } => {
            // Child context: the three handles must alias fds 0..=2,
            // then replace the image with something that keeps the
            // slave busy for the parent to talk to.
            if stdin.fd() != 0 || stdout.fd() != 1 || stderr.fd() != 2 {
                std::process::exit(2);
            }
            let _ = exec("/bin/cat", &[]);
            std::process::exit(127);
        }
        Session::ChildFailed { .. } => {
            // Child context, setup failed: exit without running the
            // harness any further.
            std::process::exit(1);
        }
        Session::Parent {
            child,
            mut master,
            stdin,
            stdout,
            stderr,
        } => {
            // Five result values: pid plus four handles.
            assert!(child.as_raw() > 0);
            assert_eq!(stdin.fd(), 0);
            assert_eq!(stdout.fd(), 1);
            assert_eq!(stderr.fd(), 2);
            assert!(master.fd() > 2);

            // The fabricated invoker was switched to raw mode.
            assert!(guard.has_snapshot());
            let attrs = termios::tcgetattr(&invoker).unwrap();
            assert!(!attrs.local_flags.contains(LocalFlags::ECHO));

            // The slave inherited the invoker's cooked attributes, so
            // bytes written to the master come back as terminal echo
            // (plus cat's copy once the child is attached).
            master.write(b"echo hi\n", None).unwrap();
            wait_readable(master.fd(), 5000);
            let bytes = master.read(64).unwrap();
            assert!(
                bytes.windows(7).any(|w| w == b"echo hi"),
                "expected echoed bytes, got {:?}",
                String::from_utf8_lossy(&bytes)
            );

            let _ = kill(child, Signal::SIGTERM);
            master.close();
            let _ = waitpid(child, None);

            // Releasing the guard restores the invoker's attributes.
            drop(guard);
            let attrs = termios::tcgetattr(&invoker).unwrap();
            assert!(attrs.local_flags.contains(LocalFlags::ECHO));
        }
    }
}

#[test]
fn launch_completes_while_other_threads_allocate() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    // Keep the allocator busy on other threads across the fork. The
    // child branch must not take the allocator lock, or it can inherit
    // it held and never attach.
    let stop = Arc::new(AtomicBool::new(false));
    let churners: Vec<_> = (0..2)
        .map(|_| {
            let stop = stop.clone();
            std::thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    std::hint::black_box(vec![0u8; 4096]);
                }
            })
        })
        .collect();

    let (_outer, invoker) = fabricated_tty();
    let mut guard = RawModeGuard::new();

    match Session::launch_on(&mut guard, invoker.as_raw_fd()).unwrap() {
        Session::Child { .. } => {
            let _ = exec("/bin/cat", &[]);
            std::process::exit(127);
        }
        Session::ChildFailed { .. } => std::process::exit(1),
        Session::Parent {
            child, mut master, ..
        } => {
            // A child wedged before attaching would never produce the
            // echo; the bounded wait turns that into a failure instead
            // of a hang.
            master.write(b"ping\n", None).unwrap();
            wait_readable(master.fd(), 5000);
            assert!(!master.read(64).unwrap().is_empty());

            let _ = kill(child, Signal::SIGTERM);
            master.close();
            let _ = waitpid(child, None);
        }
    }

    stop.store(true, Ordering::Relaxed);
    for t in churners {
        let _ = t.join();
    }
}

#[test]
fn launch_on_closed_descriptor_creates_nothing() {
    let mut guard = RawModeGuard::new();
    let err = Session::launch_on(&mut guard, -1).unwrap_err();
    assert!(matches!(err, pty_session::Error::Setup(_)));
    assert!(!guard.has_snapshot());
}

#[cfg(target_os = "linux")]
#[test]
fn one_byte_capacity_fails_without_descriptor_leak() {
    let count = || std::fs::read_dir("/proc/self/fd").unwrap().count();
    let before = count();
    let err = Pty::open(1).unwrap_err();
    assert!(matches!(err, pty_session::Error::NameOverflow { .. }));
    assert_eq!(count(), before);
}
