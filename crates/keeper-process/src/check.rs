//! Process liveness checking.
//!
//! A PID is alive when the OS process table has a non-zombie entry for it.
//! Zombies count as dead: the service has exited and only its exit status is
//! waiting to be collected, so a PID file naming one is stale.

use keeper_common::ProcessResult;

/// Answers whether a PID currently names a running process.
///
/// Implementations hold no state; every call is a fresh query. The supervisor
/// takes this as a trait object so tests can script liveness without real
/// processes.
pub trait LivenessChecker: Send + Sync {
    fn is_alive(&self, pid: u32) -> ProcessResult<bool>;
}

/// Liveness backed by the host's process table.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsLiveness;

impl LivenessChecker for OsLiveness {
    fn is_alive(&self, pid: u32) -> ProcessResult<bool> {
        if !process_exists(pid)? {
            return Ok(false);
        }
        Ok(!crate::usage::is_zombie(pid))
    }
}

/// Check if a process with the given PID exists.
///
/// On Unix this uses `kill(pid, 0)`, which delivers no signal but reports
/// whether the target exists. `EPERM` means the process exists but belongs to
/// another user, so it counts as existing.
///
/// PID 0 and values that do not fit a positive `pid_t` never exist; passing
/// them to `kill` would address a process group instead.
///
/// ```rust,no_run
/// use keeper_process::process_exists;
///
/// if process_exists(1234).unwrap() {
///     println!("Process 1234 is running");
/// }
/// ```
pub fn process_exists(pid: u32) -> ProcessResult<bool> {
    if pid == 0 || pid > i32::MAX as u32 {
        return Ok(false);
    }

    #[cfg(unix)]
    {
        process_exists_unix(pid)
    }

    #[cfg(not(unix))]
    {
        Err(keeper_common::ProcessError::unsupported("process_exists"))
    }
}

#[cfg(unix)]
fn process_exists_unix(pid: u32) -> ProcessResult<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(Errno::EPERM) => Ok(true),
        Err(e) => Err(keeper_common::ProcessError::query_failed(
            pid,
            format!("kill(0) failed: {}", e),
        )),
    }
}
