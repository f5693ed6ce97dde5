//! Bounded-retry HTTP health probe.
//!
//! The probe answers "is the service answering HTTP?" and nothing else. It
//! never inspects process state and never fails: an unreachable service is
//! an [`HealthStatus::Unhealthy`] report.

use crate::http::HttpGetter;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Retry budget for a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    pub attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(2),
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Outcome of one probe run.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub url: String,
    pub status: HealthStatus,
    /// Requests actually issued.
    pub attempts: u32,
    pub last_status_code: Option<u16>,
    pub last_error: Option<String>,
    pub checked_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

pub struct HealthProbe {
    getter: Arc<dyn HttpGetter>,
    config: ProbeConfig,
}

impl HealthProbe {
    pub fn new(getter: Arc<dyn HttpGetter>, config: ProbeConfig) -> Self {
        Self { getter, config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Probe with the full retry budget, stopping at the first 200.
    pub async fn probe(&self, url: &str) -> HealthReport {
        self.run(url, self.config.attempts.max(1)).await
    }

    /// A single request, no retries.
    pub async fn probe_once(&self, url: &str) -> HealthReport {
        self.run(url, 1).await
    }

    async fn run(&self, url: &str, attempts: u32) -> HealthReport {
        let started = Instant::now();
        let mut last_status_code = None;
        let mut last_error = None;
        let mut issued = 0;

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.delay).await;
            }
            issued = attempt;

            match self.getter.get_status(url, self.config.timeout).await {
                Ok(200) => {
                    debug!(url, attempt, "Health probe succeeded");
                    return HealthReport {
                        url: url.to_string(),
                        status: HealthStatus::Healthy,
                        attempts: attempt,
                        last_status_code: Some(200),
                        last_error: None,
                        checked_at: Utc::now(),
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    };
                }
                Ok(code) => {
                    debug!(url, attempt, status = code, "Health probe got non-200 status");
                    last_status_code = Some(code);
                    last_error = Some(format!("Unexpected status code: {}", code));
                }
                Err(e) => {
                    debug!(url, attempt, error = %e, "Health probe request failed");
                    last_status_code = None;
                    last_error = Some(e.to_string());
                }
            }

            if attempt < attempts {
                info!(url, attempt, attempts, "Health check failed, retrying");
            }
        }

        warn!(
            url,
            attempts = issued,
            error = last_error.as_deref().unwrap_or("unknown"),
            "Service unhealthy"
        );

        HealthReport {
            url: url.to_string(),
            status: HealthStatus::Unhealthy,
            attempts: issued,
            last_status_code,
            last_error,
            checked_at: Utc::now(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}
