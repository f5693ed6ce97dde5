//! Error types for the keeper workspace.
//!
//! Two layers:
//! - [`ProcessError`] covers OS-level work (signals, spawning, PID files,
//!   locks) and is what the leaf crates return.
//! - [`SupervisorError`] is the taxonomy the `start`/`stop`/`restart`/`status`
//!   commands report to their caller. Every variant maps to a process exit code
//!   through [`SupervisorError::exit_code`].
//!
//! ```
//! use keeper_common::{SupervisorError, SupervisorResult};
//!
//! fn stop() -> SupervisorResult<()> {
//!     Err(SupervisorError::NotRunning)
//! }
//!
//! let err = stop().unwrap_err();
//! assert_eq!(err.exit_code(), 3);
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by low-level process and filesystem primitives.
#[derive(Error, Debug, Clone)]
pub enum ProcessError {
    #[error("Process spawn failed: {program} - {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("Failed to send {signal} to PID {pid}: {reason}")]
    SignalFailed {
        pid: u32,
        signal: String,
        reason: String,
    },

    #[error("Failed to query process {pid}: {reason}")]
    QueryFailed { pid: u32, reason: String },

    #[error("PID file error at {}: {reason}", .path.display())]
    PidFile { path: PathBuf, reason: String },

    #[error("Lock error at {}: {reason}", .path.display())]
    Lock { path: PathBuf, reason: String },

    #[error("Operation not supported on this platform: {operation}")]
    Unsupported { operation: String },
}

impl ProcessError {
    pub fn spawn_failed(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            program: program.into(),
            reason: reason.into(),
        }
    }

    pub fn signal_failed(pid: u32, signal: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SignalFailed {
            pid,
            signal: signal.into(),
            reason: reason.into(),
        }
    }

    pub fn query_failed(pid: u32, reason: impl Into<String>) -> Self {
        Self::QueryFailed {
            pid,
            reason: reason.into(),
        }
    }

    pub fn pid_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::PidFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn lock(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Lock {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }
}

/// Result type for process primitives.
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;

/// Errors reported by supervisor commands.
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// A confirmed-live process already holds the PID file.
    #[error("Service already running (PID {pid})")]
    AlreadyRunning { pid: u32 },

    /// No PID file exists.
    #[error("Service is not running")]
    NotRunning,

    /// The process was spawned but died during the grace period.
    #[error("Service failed to start: {reason}")]
    StartFailed { reason: String, log_tail: Vec<String> },

    /// The process survived SIGTERM and SIGKILL.
    #[error("Failed to stop PID {pid}: {reason}")]
    StopFailed { pid: u32, reason: String },

    /// Something else is bound to the service port.
    #[error("Port {port} is already in use by another process")]
    PortInUse { port: u16 },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl SupervisorError {
    pub fn start_failed(reason: impl Into<String>, log_tail: Vec<String>) -> Self {
        Self::StartFailed {
            reason: reason.into(),
            log_tail,
        }
    }

    pub fn stop_failed(pid: u32, reason: impl Into<String>) -> Self {
        Self::StopFailed {
            pid,
            reason: reason.into(),
        }
    }

    /// Process exit code the CLI uses for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            SupervisorError::AlreadyRunning { .. } => exit_codes::ALREADY_RUNNING,
            SupervisorError::NotRunning => exit_codes::NOT_RUNNING,
            SupervisorError::StartFailed { .. } => exit_codes::START_FAILED,
            SupervisorError::PortInUse { .. } => exit_codes::PORT_IN_USE,
            _ => exit_codes::FAILURE,
        }
    }
}

/// Result type for supervisor commands.
pub type SupervisorResult<T> = std::result::Result<T, SupervisorError>;

/// Exit codes shared by the CLI and its tests.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const ALREADY_RUNNING: i32 = 2;
    pub const NOT_RUNNING: i32 = 3;
    pub const START_FAILED: i32 = 4;
    pub const PROBE_UNHEALTHY: i32 = 5;
    pub const PORT_IN_USE: i32 = 6;
    pub const PARTIAL_FAILURE: i32 = 7;
}
