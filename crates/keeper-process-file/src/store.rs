//! PID file persistence.
//!
//! The supervisor never treats the file as the state itself: it reads a
//! [`PidRecord`] through a [`HandleStore`], decides what is true using
//! liveness evidence, and writes the outcome back. [`PidFileStore`] is the
//! on-disk implementation; [`MemoryHandleStore`] lets tests exercise the
//! same logic without touching the filesystem.

use async_trait::async_trait;
use keeper_common::{ProcessError, ProcessResult};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What a store currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PidRecord {
    /// No PID file: the canonical "not running" signal.
    Absent,
    Pid(u32),
    /// A PID file exists but does not contain a usable PID.
    Corrupt(String),
}

/// Persistence for the supervised PID.
#[async_trait]
pub trait HandleStore: Send + Sync {
    async fn load(&self) -> ProcessResult<PidRecord>;

    async fn save(&self, pid: u32) -> ProcessResult<()>;

    /// Remove the record. Removing an absent record succeeds.
    async fn remove(&self) -> ProcessResult<()>;

    /// Human-readable location, for log lines.
    fn location(&self) -> String;
}

/// Plain-text PID file: the PID followed by a newline.
#[derive(Debug, Clone)]
pub struct PidFileStore {
    path: PathBuf,
}

impl PidFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_pid(content: &str) -> Option<u32> {
    content.trim().parse::<u32>().ok().filter(|pid| *pid > 0)
}

#[async_trait]
impl HandleStore for PidFileStore {
    async fn load(&self) -> ProcessResult<PidRecord> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PidRecord::Absent),
            Err(e) => {
                return Err(ProcessError::pid_file(
                    &self.path,
                    format!("Failed to read PID file: {}", e),
                ))
            }
        };

        match parse_pid(&content) {
            Some(pid) => Ok(PidRecord::Pid(pid)),
            None => {
                warn!(path = %self.path.display(), content = %content.trim(), "PID file does not contain a valid PID");
                Ok(PidRecord::Corrupt(content))
            }
        }
    }

    /// Atomic write: temp file in the same directory, then rename.
    async fn save(&self, pid: u32) -> ProcessResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ProcessError::pid_file(
                    &self.path,
                    format!("Failed to create directory {}: {}", parent.display(), e),
                )
            })?;
        }

        let temp_path = self.path.with_extension("pid.tmp");
        tokio::fs::write(&temp_path, format!("{}\n", pid))
            .await
            .map_err(|e| ProcessError::pid_file(&self.path, format!("Failed to write PID file: {}", e)))?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| ProcessError::pid_file(&self.path, format!("Failed to rename PID file: {}", e)))?;

        info!(pid, path = %self.path.display(), "Wrote PID file");
        Ok(())
    }

    async fn remove(&self) -> ProcessResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "Removed PID file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "PID file already absent");
                Ok(())
            }
            Err(e) => Err(ProcessError::pid_file(
                &self.path,
                format!("Failed to delete PID file: {}", e),
            )),
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory store that counts mutations.
#[derive(Debug, Default)]
pub struct MemoryHandleStore {
    record: Mutex<Option<PidRecord>>,
    mutations: Mutex<u32>,
}

impl MemoryHandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `pid`, as if a previous run had written it.
    pub fn with_pid(pid: u32) -> Self {
        Self {
            record: Mutex::new(Some(PidRecord::Pid(pid))),
            mutations: Mutex::new(0),
        }
    }

    pub fn with_record(record: PidRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
            mutations: Mutex::new(0),
        }
    }

    /// Number of `save`/`remove` calls that changed the record.
    pub fn mutations(&self) -> u32 {
        *self.mutations.lock()
    }

    pub fn current(&self) -> PidRecord {
        self.record.lock().clone().unwrap_or(PidRecord::Absent)
    }
}

#[async_trait]
impl HandleStore for MemoryHandleStore {
    async fn load(&self) -> ProcessResult<PidRecord> {
        Ok(self.current())
    }

    async fn save(&self, pid: u32) -> ProcessResult<()> {
        *self.record.lock() = Some(PidRecord::Pid(pid));
        *self.mutations.lock() += 1;
        Ok(())
    }

    async fn remove(&self) -> ProcessResult<()> {
        if self.record.lock().take().is_some() {
            *self.mutations.lock() += 1;
        }
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
