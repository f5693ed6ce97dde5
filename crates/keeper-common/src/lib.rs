//! # Keeper Common
//!
//! Types shared by every keeper crate: the error taxonomy and the
//! timestamp/retention helpers used by log rotation and backups.

pub mod errors;
pub mod retention;

// Re-export commonly used items
pub use errors::{exit_codes, ProcessError, ProcessResult, SupervisorError, SupervisorResult};
