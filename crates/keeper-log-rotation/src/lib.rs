//! # Keeper Log Rotation
//!
//! Archiving, compression and age-based eviction of the service's log files.
//!
//! Live logs are rotated with copy-then-truncate so a running service keeps
//! writing through its existing file handles.

pub mod rotator;
pub mod types;

// Re-export main types
pub use rotator::{LogRotator, DEFAULT_RETENTION};
pub use types::{ArchivedLog, RotationError, RotationReport, RotationStage};
