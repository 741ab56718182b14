//! PTY relay
//!
//! A small CLI that launches a PTY session running the user's shell and
//! relays bytes between the invoking terminal and the session master.
//! The invoking terminal stays in raw mode until the relay exits.

use std::os::fd::BorrowedFd;
use std::process::ExitCode;

use nix::libc::STDIN_FILENO;
use nix::poll::{poll, PollFd, PollFlags};
use nix::sys::wait::waitpid;

use pty_session::{exec, RawModeGuard, Session};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut guard = RawModeGuard::new();

    match Session::launch(&mut guard) {
        Err(e) => {
            eprintln!("pty-relay: {e}");
            ExitCode::FAILURE
        }
        Ok(Session::ChildFailed { step, errno }) => {
            eprintln!("pty-relay: child setup failed ({step}): {errno}");
            // Partially redirected streams: nothing sensible left to do.
            ExitCode::FAILURE
        }
        Ok(Session::Child { .. }) => {
            let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
            let err = match exec(&shell, &[]) {
                Err(e) => e,
                Ok(never) => match never {},
            };
            eprintln!("pty-relay: {err}");
            ExitCode::from(127)
        }
        Ok(Session::Parent {
            child,
            mut master,
            stdin,
            stdout,
            ..
        }) => {
            tracing::debug!(%child, master_fd = master.fd(), "session launched");
            let status = relay(&stdin, &stdout, &master);
            master.close();
            let _ = waitpid(child, None);
            // guard drops here and restores the invoking terminal
            status
        }
    }
}

/// Shuttle bytes between the invoker's stdin and the session master
/// until either side reaches end of stream.
fn relay(
    stdin: &pty_session::FdHandle,
    stdout: &pty_session::FdHandle,
    master: &pty_session::FdHandle,
) -> ExitCode {
    loop {
        // SAFETY: both descriptors stay open for the duration of the poll
        let stdin_bfd = unsafe { BorrowedFd::borrow_raw(STDIN_FILENO) };
        let master_bfd = unsafe { BorrowedFd::borrow_raw(master.fd()) };
        let mut fds = [
            PollFd::new(&stdin_bfd, PollFlags::POLLIN),
            PollFd::new(&master_bfd, PollFlags::POLLIN),
        ];

        match poll(&mut fds, 100) {
            Ok(0) => continue,
            Ok(_) => {}
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => {
                eprintln!("pty-relay: poll: {e}");
                return ExitCode::FAILURE;
            }
        }

        let stdin_ready = fds[0]
            .revents()
            .is_some_and(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP));
        let master_ready = fds[1]
            .revents()
            .is_some_and(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP));

        if stdin_ready {
            match stdin.read(4096) {
                Ok(bytes) if bytes.is_empty() => return ExitCode::SUCCESS,
                Ok(bytes) => {
                    if write_all(master, &bytes).is_err() {
                        return ExitCode::SUCCESS;
                    }
                }
                Err(_) => return ExitCode::FAILURE,
            }
        }

        if master_ready {
            match master.read(65536) {
                Ok(bytes) if bytes.is_empty() => return ExitCode::SUCCESS,
                Ok(bytes) => {
                    if write_all(stdout, &bytes).is_err() {
                        return ExitCode::FAILURE;
                    }
                }
                // EIO from the master means the child side hung up
                Err(_) => return ExitCode::SUCCESS,
            }
        }
    }
}

fn write_all(handle: &pty_session::FdHandle, mut bytes: &[u8]) -> Result<(), pty_session::Error> {
    while !bytes.is_empty() {
        let n = handle.write(bytes, None)?;
        bytes = &bytes[n..];
    }
    Ok(())
}
