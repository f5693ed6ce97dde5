//! Core types for log rotation

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// One archived copy of a live log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedLog {
    /// File name of the live log it was taken from, e.g. `server.log`.
    pub source_name: String,
    pub timestamp: DateTime<Utc>,
    /// False when gzip failed and the plain copy was kept instead.
    pub compressed: bool,
    pub path: PathBuf,
}

/// Step of a rotation pass an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationStage {
    Inspect,
    Copy,
    Compress,
    Truncate,
    Evict,
}

impl std::fmt::Display for RotationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RotationStage::Inspect => write!(f, "inspect"),
            RotationStage::Copy => write!(f, "copy"),
            RotationStage::Compress => write!(f, "compress"),
            RotationStage::Truncate => write!(f, "truncate"),
            RotationStage::Evict => write!(f, "evict"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{stage} failed for {}: {reason}", .path.display())]
pub struct RotationError {
    pub path: PathBuf,
    pub stage: RotationStage,
    pub reason: String,
}

impl RotationError {
    pub fn new(path: impl Into<PathBuf>, stage: RotationStage, reason: impl std::fmt::Display) -> Self {
        Self {
            path: path.into(),
            stage,
            reason: reason.to_string(),
        }
    }
}

/// Everything one rotation pass did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RotationReport {
    pub archived: Vec<ArchivedLog>,
    /// Live logs left alone because they were missing or empty.
    pub skipped: Vec<PathBuf>,
    pub evicted: Vec<PathBuf>,
    pub errors: Vec<RotationError>,
}

impl RotationReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for RotationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "archived {}, skipped {}, evicted {}, errors {}",
            self.archived.len(),
            self.skipped.len(),
            self.evicted.len(),
            self.errors.len()
        )
    }
}
