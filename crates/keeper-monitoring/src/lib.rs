//! # Keeper Monitoring
//!
//! HTTP health probing for the supervised service.
//!
//! This crate provides:
//! - [`HttpGetter`], the transport seam, with the hyper-backed [`HyperGetter`]
//! - [`HealthProbe`], bounded-retry probing producing a [`HealthReport`]

pub mod http;
pub mod probe;

use std::time::Duration;
use thiserror::Error;

/// Transport-level health check failures.
#[derive(Error, Debug, Clone)]
pub enum HealthCheckError {
    #[error("Health check timeout after {timeout:?}: {url}")]
    Timeout { url: String, timeout: Duration },

    #[error("Health check connection failed: {url} - {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Invalid health check URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

pub type HealthCheckResult<T> = Result<T, HealthCheckError>;

pub use http::{health_url, HttpGetter, HyperGetter};
pub use probe::{HealthProbe, HealthReport, HealthStatus, ProbeConfig};
