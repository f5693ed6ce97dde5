//! Service process spawning.

use crate::output::open_append;
use keeper_common::{ProcessError, ProcessResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tracing::{debug, info, warn};

/// Everything needed to launch the supervised service.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub program: String,
    pub args: Vec<String>,
    pub working_directory: Option<PathBuf>,
    pub environment: HashMap<String, String>,
    /// Receives the child's stdout (opened for append).
    pub stdout_path: PathBuf,
    /// Receives the child's stderr (opened for append).
    pub stderr_path: PathBuf,
}

/// Spawn the service detached from the caller's terminal and return its PID.
///
/// The child gets its own process group so a Ctrl+C aimed at the supervisor
/// does not reach it, and both output streams append to the configured log
/// files so a rotator truncating them does not leave holes.
///
/// A background task waits on the child for as long as the current Tokio
/// runtime lives, so a service that dies while the supervisor is still running
/// does not linger as a zombie. Must be called from within a Tokio runtime.
pub fn spawn_service(request: &SpawnRequest) -> ProcessResult<u32> {
    let stdout = open_append(&request.stdout_path)
        .map_err(|e| ProcessError::spawn_failed(&request.program, e.to_string()))?;
    let stderr = open_append(&request.stderr_path)
        .map_err(|e| ProcessError::spawn_failed(&request.program, e.to_string()))?;

    let mut cmd = std::process::Command::new(&request.program);
    cmd.args(&request.args)
        .envs(&request.environment)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));

    if let Some(ref wd) = request.working_directory {
        cmd.current_dir(wd);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = tokio::process::Command::from(cmd)
        .spawn()
        .map_err(|e| ProcessError::spawn_failed(&request.program, e.to_string()))?;

    let pid = child
        .id()
        .ok_or_else(|| ProcessError::spawn_failed(&request.program, "child exited before reporting a PID"))?;

    info!(pid, program = %request.program, args = ?request.args, "Service process spawned");

    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => debug!(pid, %status, "Service process exited"),
            Err(e) => warn!(pid, error = %e, "Failed to wait for service process"),
        }
    });

    Ok(pid)
}
