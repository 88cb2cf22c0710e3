// src/exec/signal.rs

//! Graceful termination request.
//!
//! On Unix this is `SIGTERM`. Windows has no equivalent for console
//! programs, so the request falls back to `TerminateProcess` and the
//! "graceful" path always wins there.

use std::io;

use tokio::process::Child;

#[cfg(unix)]
pub fn request_terminate(child: &mut Child) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    // Already reaped: nothing to signal.
    let Some(pid) = child.id() else {
        return Ok(());
    };

    let pid = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

#[cfg(not(unix))]
pub fn request_terminate(child: &mut Child) -> io::Result<()> {
    match child.start_kill() {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
        Err(e) => Err(e),
    }
}
