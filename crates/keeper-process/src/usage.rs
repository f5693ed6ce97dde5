//! Per-process usage sampling via `sysinfo`.

use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, System};
use tracing::debug;

/// Point-in-time usage of a single process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessUsage {
    /// Resident memory in bytes.
    pub memory_bytes: u64,
    /// Time since the process started.
    pub uptime: Duration,
}

fn refreshed(pid: u32) -> Option<System> {
    let mut system = System::new();
    let sysinfo_pid = Pid::from_u32(pid);
    // Without an explicit refresh sysinfo reports nothing for the PID.
    if system.refresh_process_specifics(sysinfo_pid, ProcessRefreshKind::new().with_memory()) {
        Some(system)
    } else {
        None
    }
}

/// Sample memory and uptime for `pid`. `None` when the process is gone or
/// the platform does not expose it.
pub fn process_usage(pid: u32) -> Option<ProcessUsage> {
    let system = refreshed(pid)?;
    let process = system.process(Pid::from_u32(pid))?;

    let usage = ProcessUsage {
        memory_bytes: process.memory(),
        uptime: Duration::from_secs(process.run_time()),
    };
    debug!(
        pid,
        memory_bytes = usage.memory_bytes,
        uptime_secs = usage.uptime.as_secs(),
        "Sampled process usage"
    );
    Some(usage)
}

/// True when `pid` is a zombie: exited, with its status not yet collected.
pub fn is_zombie(pid: u32) -> bool {
    refreshed(pid)
        .and_then(|system| {
            system
                .process(Pid::from_u32(pid))
                .map(|p| p.status() == ProcessStatus::Zombie)
        })
        .unwrap_or(false)
}
