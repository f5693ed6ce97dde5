//! # Keeper Backup
//!
//! Timestamped backups of the service's state document and log directory,
//! with age-based eviction.

pub mod scheduler;
pub mod types;

pub use scheduler::{BackupScheduler, DEFAULT_RETENTION};
pub use types::{Backup, BackupError, BackupKind, BackupReport};
