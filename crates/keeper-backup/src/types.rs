use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    /// Verbatim copy of the state JSON document.
    StateSnapshot,
    /// Gzipped tar of the log directory.
    LogBundle,
}

impl std::fmt::Display for BackupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupKind::StateSnapshot => write!(f, "state snapshot"),
            BackupKind::LogBundle => write!(f, "log bundle"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backup {
    pub kind: BackupKind,
    pub timestamp: DateTime<Utc>,
    pub path: PathBuf,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{kind} backup failed at {}: {reason}", .path.display())]
pub struct BackupError {
    pub kind: BackupKind,
    pub path: PathBuf,
    pub reason: String,
}

impl BackupError {
    pub fn new(kind: BackupKind, path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self {
            kind,
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Everything one backup pass did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackupReport {
    pub created: Vec<Backup>,
    /// Sources that did not exist, so nothing was backed up for them.
    pub skipped: Vec<PathBuf>,
    pub evicted: Vec<PathBuf>,
    pub errors: Vec<BackupError>,
}

impl BackupReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for BackupReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "created {}, skipped {}, evicted {}, errors {}",
            self.created.len(),
            self.skipped.len(),
            self.evicted.len(),
            self.errors.len()
        )
    }
}
