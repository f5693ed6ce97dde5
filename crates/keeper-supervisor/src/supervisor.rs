//! Supervisor - start/stop/restart/status for the managed service
//!
//! The PID file is the only record that the service is running. Every
//! operation starts by reading it and checking the PID against the OS:
//! - no file: not running
//! - file naming a live process: running
//! - file naming a dead process (or unreadable content): stale, removed on sight
//!
//! The file is written only after the spawned process survived its start
//! grace period, and removed only after its exit was observed. Mutating
//! operations run under [`SupervisorLock`] so concurrent invocations
//! serialize on the same PID file.

use keeper_common::{SupervisorError, SupervisorResult};
use keeper_monitoring::{HealthProbe, HealthReport, HttpGetter, HyperGetter, ProbeConfig};
use keeper_process::{
    process_usage, spawn_service, tail_lines, wait_for_exit, LivenessChecker, OsLiveness,
    OsSignaller, Signaller, SpawnRequest,
};
use keeper_process_file::{
    HandleStore, HandleTemplate, PidFileStore, PidRecord, ProcessHandle, SupervisorLock,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Lines of `error.log` attached to a start failure.
pub const START_FAILURE_LOG_LINES: usize = 20;

const FORCE_KILL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Supervisor timing knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    /// How long a freshly spawned process must survive before it counts as started.
    pub start_grace: Duration,
    pub stop_retries: u32,
    pub stop_backoff: Duration,
    pub force_kill_timeout: Duration,
    pub restart_settle: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            start_grace: Duration::from_secs(3),
            stop_retries: 10,
            stop_backoff: Duration::from_secs(1),
            force_kill_timeout: Duration::from_secs(3),
            restart_settle: Duration::from_secs(2),
        }
    }
}

/// Resolved settings the supervisor runs with
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub launch: SpawnRequest,
    pub handle: HandleTemplate,
    /// Bind address checked by the port preflight.
    pub host: String,
    pub health_url: String,
    pub check_port: bool,
    pub timing: Timing,
    pub probe: ProbeConfig,
}

/// What `status` observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ServiceStatus {
    NotRunning,
    Running {
        pid: u32,
        port: u16,
        uptime: Option<Duration>,
        memory_bytes: Option<u64>,
        /// Result of a single health request.
        responding: bool,
    },
    /// A PID file for a dead process was found and removed by this call.
    StaleHandle { pid: u32 },
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceStatus::NotRunning => write!(f, "not running"),
            ServiceStatus::StaleHandle { pid } => {
                write!(f, "not running (removed stale PID file for {})", pid)
            }
            ServiceStatus::Running {
                pid,
                port,
                uptime,
                memory_bytes,
                responding,
            } => {
                write!(f, "running (PID {}, port {}", pid, port)?;
                if let Some(uptime) = uptime {
                    write!(f, ", up {}s", uptime.as_secs())?;
                }
                if let Some(bytes) = memory_bytes {
                    write!(f, ", {:.1} MB", *bytes as f64 / (1024.0 * 1024.0))?;
                }
                let health = if *responding { "responding" } else { "not responding" };
                write!(f, ", {})", health)
            }
        }
    }
}

/// How a successful stop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    /// Exited after SIGTERM.
    Graceful { pid: u32 },
    /// Needed SIGKILL.
    Forced { pid: u32 },
}

impl StopOutcome {
    pub fn pid(&self) -> u32 {
        match self {
            StopOutcome::Graceful { pid } | StopOutcome::Forced { pid } => *pid,
        }
    }
}

/// PID file contents checked against the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Observed {
    Absent,
    Alive(u32),
    /// Dead PID, or 0 for unreadable content.
    Stale(u32),
}

pub struct Supervisor {
    settings: SupervisorSettings,
    store: Arc<dyn HandleStore>,
    liveness: Arc<dyn LivenessChecker>,
    signaller: Arc<dyn Signaller>,
    probe: HealthProbe,
    lock_path: PathBuf,
}

impl Supervisor {
    /// Supervisor over the real PID file, process table, signals and HTTP.
    pub fn new(settings: SupervisorSettings) -> Self {
        let store = Arc::new(PidFileStore::new(settings.handle.pid_file.clone()));
        Self::with_parts(
            settings,
            store,
            Arc::new(OsLiveness),
            Arc::new(OsSignaller),
            Arc::new(HyperGetter::new()),
        )
    }

    pub fn with_parts(
        settings: SupervisorSettings,
        store: Arc<dyn HandleStore>,
        liveness: Arc<dyn LivenessChecker>,
        signaller: Arc<dyn Signaller>,
        getter: Arc<dyn HttpGetter>,
    ) -> Self {
        let lock_path = SupervisorLock::path_for(&settings.handle.pid_file);
        let probe = HealthProbe::new(getter, settings.probe);
        Self {
            settings,
            store,
            liveness,
            signaller,
            probe,
            lock_path,
        }
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// Start the service unless it is already running.
    pub async fn start(&self) -> SupervisorResult<ProcessHandle> {
        let _lock = self.lock().await?;
        self.start_locked().await
    }

    /// Stop the service: SIGTERM, bounded wait, then SIGKILL.
    pub async fn stop(&self) -> SupervisorResult<StopOutcome> {
        let _lock = self.lock().await?;
        self.stop_locked().await
    }

    /// Stop (tolerating any failure), settle, start.
    pub async fn restart(&self) -> SupervisorResult<ProcessHandle> {
        let _lock = self.lock().await?;

        match self.stop_locked().await {
            Ok(outcome) => info!(pid = outcome.pid(), ?outcome, "Stopped service for restart"),
            Err(SupervisorError::NotRunning) => info!("Service was not running, starting it"),
            Err(e) => warn!(error = %e, "Stop failed during restart, attempting start anyway"),
        }

        debug!(settle = ?self.settings.timing.restart_settle, "Waiting before start");
        tokio::time::sleep(self.settings.timing.restart_settle).await;

        self.start_locked().await
    }

    pub async fn status(&self) -> SupervisorResult<ServiceStatus> {
        let _lock = self.lock().await?;

        match self.observe().await? {
            Observed::Absent => Ok(ServiceStatus::NotRunning),
            Observed::Stale(pid) => {
                self.clear_stale(pid).await?;
                Ok(ServiceStatus::StaleHandle { pid })
            }
            Observed::Alive(pid) => {
                let usage = process_usage(pid);
                let report = self.probe.probe_once(&self.settings.health_url).await;
                Ok(ServiceStatus::Running {
                    pid,
                    port: self.settings.handle.port,
                    uptime: usage.map(|u| u.uptime),
                    memory_bytes: usage.map(|u| u.memory_bytes),
                    responding: report.is_healthy(),
                })
            }
        }
    }

    /// Probe the health endpoint with the full retry budget.
    ///
    /// Independent of the PID file; an unhealthy result is a report, not an error.
    pub async fn health(&self) -> HealthReport {
        self.probe.probe(&self.settings.health_url).await
    }

    async fn lock(&self) -> SupervisorResult<SupervisorLock> {
        Ok(SupervisorLock::acquire(&self.lock_path).await?)
    }

    async fn observe(&self) -> SupervisorResult<Observed> {
        match self.store.load().await? {
            PidRecord::Absent => Ok(Observed::Absent),
            PidRecord::Corrupt(_) => Ok(Observed::Stale(0)),
            PidRecord::Pid(pid) => {
                if self.liveness.is_alive(pid)? {
                    Ok(Observed::Alive(pid))
                } else {
                    Ok(Observed::Stale(pid))
                }
            }
        }
    }

    async fn clear_stale(&self, pid: u32) -> SupervisorResult<()> {
        warn!(pid, pid_file = %self.store.location(), "Removing stale PID file");
        self.store.remove().await?;
        Ok(())
    }

    async fn start_locked(&self) -> SupervisorResult<ProcessHandle> {
        match self.observe().await? {
            Observed::Alive(pid) => return Err(SupervisorError::AlreadyRunning { pid }),
            Observed::Stale(pid) => self.clear_stale(pid).await?,
            Observed::Absent => {}
        }

        if self.settings.check_port {
            ensure_port_free(&self.settings.host, self.settings.handle.port)?;
        }

        let pid = spawn_service(&self.settings.launch)?;
        info!(
            pid,
            port = self.settings.handle.port,
            grace = ?self.settings.timing.start_grace,
            "Service spawned, waiting for it to settle"
        );

        tokio::time::sleep(self.settings.timing.start_grace).await;

        if !self.liveness.is_alive(pid)? {
            let log_tail = tail_lines(&self.settings.handle.error_log_file, START_FAILURE_LOG_LINES)
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Could not read error log");
                    Vec::new()
                });
            error!(pid, "Service exited during start grace period");
            return Err(SupervisorError::start_failed(
                format!(
                    "process {} exited within {:?} of starting",
                    pid, self.settings.timing.start_grace
                ),
                log_tail,
            ));
        }

        if let Err(e) = self.store.save(pid).await {
            // Without a PID file nothing could ever stop it.
            error!(pid, error = %e, "Failed to record PID, killing the new process");
            if let Err(kill_err) = self.signaller.kill(pid) {
                warn!(pid, error = %kill_err, "Failed to kill unrecorded process");
            }
            return Err(e.into());
        }

        let handle = self.settings.handle.bind(pid);
        info!(pid, port = handle.port, "Service started");
        Ok(handle)
    }

    async fn stop_locked(&self) -> SupervisorResult<StopOutcome> {
        let pid = match self.observe().await? {
            Observed::Absent => return Err(SupervisorError::NotRunning),
            Observed::Stale(pid) => {
                self.clear_stale(pid).await?;
                return Err(SupervisorError::NotRunning);
            }
            Observed::Alive(pid) => pid,
        };

        let timing = &self.settings.timing;
        info!(pid, "Stopping service (SIGTERM)");
        self.signaller.terminate(pid)?;

        if wait_for_exit(&*self.liveness, pid, timing.stop_retries, timing.stop_backoff).await? {
            self.store.remove().await?;
            info!(pid, "Service stopped gracefully");
            return Ok(StopOutcome::Graceful { pid });
        }

        let waited = graceful_wait(timing);
        warn!(pid, ?waited, "Service ignored SIGTERM, sending SIGKILL");
        self.signaller.kill(pid)?;

        let polls = poll_count(timing.force_kill_timeout, FORCE_KILL_POLL_INTERVAL);
        if wait_for_exit(&*self.liveness, pid, polls, FORCE_KILL_POLL_INTERVAL).await? {
            self.store.remove().await?;
            info!(pid, "Service force-killed");
            return Ok(StopOutcome::Forced { pid });
        }

        error!(pid, "Service survived SIGKILL, keeping PID file");
        Err(SupervisorError::stop_failed(
            pid,
            format!(
                "process still alive {:?} after SIGKILL",
                timing.force_kill_timeout
            ),
        ))
    }
}

/// Upper bound on how long a graceful stop waits, saturating on overflow.
fn graceful_wait(timing: &Timing) -> Duration {
    timing
        .stop_backoff
        .checked_mul(timing.stop_retries)
        .unwrap_or(Duration::MAX)
}

fn poll_count(total: Duration, interval: Duration) -> u32 {
    let polls = total.as_millis() / interval.as_millis().max(1);
    u32::try_from(polls).unwrap_or(u32::MAX).max(1)
}

/// Fail with `PortInUse` if something already listens on `host:port`.
///
/// Only "address in use" is conclusive; any other bind error is logged and
/// left for the service itself to report.
fn ensure_port_free(host: &str, port: u16) -> SupervisorResult<()> {
    match std::net::TcpListener::bind((host, port)) {
        Ok(listener) => {
            drop(listener);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            warn!(host, port, "Port already in use");
            Err(SupervisorError::PortInUse { port })
        }
        Err(e) => {
            warn!(host, port, error = %e, "Port preflight inconclusive, continuing");
            Ok(())
        }
    }
}
