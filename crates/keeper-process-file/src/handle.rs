use serde::Serialize;
use std::path::PathBuf;

/// A running service as the supervisor knows it.
///
/// Only `pid` is persisted (in the PID file); the port and paths are fixed by
/// configuration and rejoined when the handle is rebuilt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessHandle {
    pub pid: u32,
    pub port: u16,
    pub pid_file: PathBuf,
    pub log_file: PathBuf,
    pub error_log_file: PathBuf,
}

/// The configuration-fixed part of a [`ProcessHandle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandleTemplate {
    pub port: u16,
    pub pid_file: PathBuf,
    pub log_file: PathBuf,
    pub error_log_file: PathBuf,
}

impl HandleTemplate {
    pub fn bind(&self, pid: u32) -> ProcessHandle {
        ProcessHandle {
            pid,
            port: self.port,
            pid_file: self.pid_file.clone(),
            log_file: self.log_file.clone(),
            error_log_file: self.error_log_file.clone(),
        }
    }
}
