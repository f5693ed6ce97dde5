//! # Keeper Supervisor
//!
//! Lifecycle control for a single local service.
//!
//! This crate provides:
//! - [`Supervisor`] - start/stop/restart/status over a PID file
//! - Configuration loading, environment overrides and validation
//!
//! Rotation and backups are configured here and run by their own crates.

pub mod config;
pub mod supervisor;

// Re-export main types
pub use config::{
    BackupSettings, KeeperConfig, PathsConfig, ProbeSettings, ResolvedPaths, RotationSettings,
    ServiceConfig, TimingConfig,
};
pub use supervisor::{
    ServiceStatus, StopOutcome, Supervisor, SupervisorSettings, Timing, START_FAILURE_LOG_LINES,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
