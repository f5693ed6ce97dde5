//! Process termination primitives.
//!
//! Shutdown is two-phase: [`terminate_gracefully`] (SIGTERM), a bounded poll
//! with [`wait_for_exit`], then [`force_kill`] (SIGKILL) and another poll.
//! Sending a signal to a PID that no longer exists is not an error; the poll
//! that follows confirms the exit.

use crate::check::LivenessChecker;
use keeper_common::{ProcessError, ProcessResult};
use std::time::Duration;
use tracing::debug;

/// Delivers shutdown signals. The supervisor holds this as a trait object so
/// tests can observe signals without touching real processes.
pub trait Signaller: Send + Sync {
    fn terminate(&self, pid: u32) -> ProcessResult<()>;

    fn kill(&self, pid: u32) -> ProcessResult<()>;
}

/// Signals through the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSignaller;

impl Signaller for OsSignaller {
    fn terminate(&self, pid: u32) -> ProcessResult<()> {
        terminate_gracefully(pid)
    }

    fn kill(&self, pid: u32) -> ProcessResult<()> {
        force_kill(pid)
    }
}

/// Ask a process to shut down (SIGTERM).
pub fn terminate_gracefully(pid: u32) -> ProcessResult<()> {
    send_signal(pid, Sig::Term)
}

/// Kill a process outright (SIGKILL).
pub fn force_kill(pid: u32) -> ProcessResult<()> {
    send_signal(pid, Sig::Kill)
}

#[derive(Debug, Clone, Copy)]
enum Sig {
    Term,
    Kill,
}

impl Sig {
    fn name(self) -> &'static str {
        match self {
            Sig::Term => "SIGTERM",
            Sig::Kill => "SIGKILL",
        }
    }
}

fn send_signal(pid: u32, sig: Sig) -> ProcessResult<()> {
    if pid == 0 || pid > i32::MAX as u32 {
        return Err(ProcessError::signal_failed(pid, sig.name(), "invalid PID"));
    }

    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let signal = match sig {
            Sig::Term => Signal::SIGTERM,
            Sig::Kill => Signal::SIGKILL,
        };

        match kill(Pid::from_raw(pid as i32), signal) {
            Ok(()) => {
                debug!(pid, signal = sig.name(), "Signal delivered");
                Ok(())
            }
            Err(Errno::ESRCH) => {
                debug!(pid, signal = sig.name(), "Process already gone");
                Ok(())
            }
            Err(e) => Err(ProcessError::signal_failed(pid, sig.name(), e.to_string())),
        }
    }

    #[cfg(not(unix))]
    {
        Err(ProcessError::unsupported(sig.name()))
    }
}

/// Poll `checker` until `pid` is dead.
///
/// Checks once immediately and then up to `attempts` more times, sleeping
/// `interval` before each. Returns `Ok(true)` once the process is confirmed
/// dead and `Ok(false)` if it is still alive after the last attempt.
pub async fn wait_for_exit(
    checker: &dyn LivenessChecker,
    pid: u32,
    attempts: u32,
    interval: Duration,
) -> ProcessResult<bool> {
    if !checker.is_alive(pid)? {
        return Ok(true);
    }
    for attempt in 1..=attempts {
        tokio::time::sleep(interval).await;
        if !checker.is_alive(pid)? {
            debug!(pid, attempt, "Process exit confirmed");
            return Ok(true);
        }
    }
    Ok(false)
}
