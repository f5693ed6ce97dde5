use crate::supervisor::{SupervisorSettings, Timing};
use anyhow::{Context, Result};
use keeper_backup::BackupScheduler;
use keeper_log_rotation::LogRotator;
use keeper_monitoring::ProbeConfig;
use keeper_process::SpawnRequest;
use keeper_process_file::HandleTemplate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod validation;

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeeperConfig {
    /// Base directory for every relative path below. Defaults to the
    /// current directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<PathBuf>,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub probe: ProbeSettings,
    #[serde(default)]
    pub rotation: RotationSettings,
    #[serde(default)]
    pub backup: BackupSettings,
}

/// The supervised service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub executable: String,
    /// `{host}`, `{port}` and `{workers}` are substituted at launch.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: u32,
    /// Required, no default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_path: Option<String>,
    #[serde(default = "default_true")]
    pub check_port: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            executable: String::new(),
            args: Vec::new(),
            working_directory: None,
            environment: HashMap::new(),
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
            health_path: None,
            check_port: true,
        }
    }
}

/// Artifact locations; relative paths resolve against `install_dir`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_log_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,
}

/// Fully resolved artifact locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub pid_file: PathBuf,
    pub log_dir: PathBuf,
    pub log_file: PathBuf,
    pub error_log_file: PathBuf,
    pub archive_dir: PathBuf,
    pub state_file: PathBuf,
    pub backup_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_start_grace", with = "duration_serde")]
    pub start_grace: Duration,
    #[serde(default = "default_stop_retries")]
    pub stop_retries: u32,
    #[serde(default = "default_stop_backoff", with = "duration_serde")]
    pub stop_backoff: Duration,
    #[serde(default = "default_force_kill_timeout", with = "duration_serde")]
    pub force_kill_timeout: Duration,
    #[serde(default = "default_restart_settle", with = "duration_serde")]
    pub restart_settle: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            start_grace: default_start_grace(),
            stop_retries: default_stop_retries(),
            stop_backoff: default_stop_backoff(),
            force_kill_timeout: default_force_kill_timeout(),
            restart_settle: default_restart_settle(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSettings {
    #[serde(default = "default_probe_attempts")]
    pub attempts: u32,
    #[serde(default = "default_probe_delay", with = "duration_serde")]
    pub delay: Duration,
    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            attempts: default_probe_attempts(),
            delay: default_probe_delay(),
            timeout: default_probe_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationSettings {
    #[serde(default = "default_rotation_retention", with = "duration_serde")]
    pub retention: Duration,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            retention: default_rotation_retention(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSettings {
    #[serde(default = "default_backup_retention", with = "duration_serde")]
    pub retention: Duration,
    #[serde(default = "default_state_kind")]
    pub state_kind: String,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            retention: default_backup_retention(),
            state_kind: default_state_kind(),
        }
    }
}

impl KeeperConfig {
    /// Load the effective configuration: the YAML file if given (defaults
    /// otherwise), then `KEEPER_*` environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// [`KeeperConfig::load`] with an explicit environment lookup.
    pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::parse_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::parse_file(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config = Self::parse_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    fn parse_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse YAML configuration")
    }

    /// Apply `KEEPER_*` overrides on top of the file values.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("KEEPER_INSTALL_DIR") {
            self.install_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("KEEPER_EXECUTABLE") {
            self.service.executable = v;
        }
        if let Some(v) = get("KEEPER_HOST") {
            self.service.host = v;
        }
        if let Some(v) = get("KEEPER_PORT") {
            self.service.port = v
                .trim()
                .parse()
                .with_context(|| format!("KEEPER_PORT is not a valid port: {}", v))?;
        }
        if let Some(v) = get("KEEPER_WORKERS") {
            self.service.workers = v
                .trim()
                .parse()
                .with_context(|| format!("KEEPER_WORKERS is not a valid count: {}", v))?;
        }
        if let Some(v) = get("KEEPER_HEALTH_PATH") {
            self.service.health_path = Some(v);
        }
        if let Some(v) = get("KEEPER_PID_FILE") {
            self.paths.pid_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("KEEPER_LOG_FILE") {
            self.paths.log_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("KEEPER_ERROR_LOG_FILE") {
            self.paths.error_log_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("KEEPER_STATE_FILE") {
            self.paths.state_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("KEEPER_BACKUP_DIR") {
            self.paths.backup_dir = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    pub fn install_dir(&self) -> PathBuf {
        self.install_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn resolved_paths(&self) -> ResolvedPaths {
        let base = self.install_dir();
        let resolve = |configured: &Option<PathBuf>, fallback: PathBuf| -> PathBuf {
            let path = configured.clone().unwrap_or(fallback);
            if path.is_absolute() {
                path
            } else {
                base.join(path)
            }
        };

        let log_dir = resolve(&self.paths.log_dir, PathBuf::from("logs"));
        ResolvedPaths {
            pid_file: resolve(&self.paths.pid_file, PathBuf::from("server.pid")),
            log_file: resolve(&self.paths.log_file, log_dir.join("server.log")),
            error_log_file: resolve(&self.paths.error_log_file, log_dir.join("error.log")),
            archive_dir: log_dir.join("archive"),
            state_file: resolve(&self.paths.state_file, PathBuf::from("data/state.json")),
            backup_dir: resolve(&self.paths.backup_dir, PathBuf::from("backups")),
            log_dir,
        }
    }

    /// Service arguments with placeholders filled in.
    pub fn service_args(&self) -> Vec<String> {
        let port = self.service.port.to_string();
        let workers = self.service.workers.to_string();
        self.service
            .args
            .iter()
            .map(|arg| {
                arg.replace("{host}", &self.service.host)
                    .replace("{port}", &port)
                    .replace("{workers}", &workers)
            })
            .collect()
    }

    pub fn health_url(&self) -> String {
        keeper_monitoring::health_url(
            &self.service.host,
            self.service.port,
            self.service.health_path.as_deref().unwrap_or("/"),
        )
    }

    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            attempts: self.probe.attempts,
            delay: self.probe.delay,
            timeout: self.probe.timeout,
        }
    }

    /// Everything the supervisor needs, resolved.
    pub fn supervisor_settings(&self) -> SupervisorSettings {
        let paths = self.resolved_paths();
        let working_directory = match &self.service.working_directory {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.install_dir().join(dir),
            None => self.install_dir(),
        };

        SupervisorSettings {
            launch: SpawnRequest {
                program: self.service.executable.clone(),
                args: self.service_args(),
                working_directory: Some(working_directory),
                environment: self.service.environment.clone(),
                stdout_path: paths.log_file.clone(),
                stderr_path: paths.error_log_file.clone(),
            },
            handle: HandleTemplate {
                port: self.service.port,
                pid_file: paths.pid_file,
                log_file: paths.log_file,
                error_log_file: paths.error_log_file,
            },
            host: self.service.host.clone(),
            health_url: self.health_url(),
            check_port: self.service.check_port,
            timing: Timing {
                start_grace: self.timing.start_grace,
                stop_retries: self.timing.stop_retries,
                stop_backoff: self.timing.stop_backoff,
                force_kill_timeout: self.timing.force_kill_timeout,
                restart_settle: self.timing.restart_settle,
            },
            probe: self.probe_config(),
        }
    }
}

impl KeeperConfig {
    /// Rotator over `server.log` and `error.log`.
    pub fn log_rotator(&self) -> LogRotator {
        let paths = self.resolved_paths();
        LogRotator::new(
            vec![paths.log_file, paths.error_log_file],
            paths.archive_dir,
            self.rotation.retention,
        )
    }

    pub fn backup_scheduler(&self) -> BackupScheduler {
        let paths = self.resolved_paths();
        BackupScheduler::new(paths.state_file, paths.log_dir, paths.backup_dir)
            .with_state_kind(self.backup.state_kind.clone())
            .with_retention(self.backup.retention)
    }
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_workers() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

fn default_start_grace() -> Duration {
    Duration::from_secs(3)
}

fn default_stop_retries() -> u32 {
    10
}

fn default_stop_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_force_kill_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_restart_settle() -> Duration {
    Duration::from_secs(2)
}

fn default_probe_attempts() -> u32 {
    3
}

fn default_probe_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_rotation_retention() -> Duration {
    Duration::from_secs(30 * 24 * 60 * 60)
}

fn default_backup_retention() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

fn default_state_kind() -> String {
    "state".to_string()
}

// Custom serialization for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() != 0 {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        } else {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let number = |digits: &str, scale: u64| -> Result<u64, String> {
            digits
                .trim()
                .parse::<u64>()
                .ok()
                .and_then(|n| n.checked_mul(scale))
                .ok_or_else(|| format!("Invalid duration: {}", s))
        };

        // Check for "ms" BEFORE "s" since "ms" ends with 's'
        if let Some(n) = s.strip_suffix("ms") {
            Ok(Duration::from_millis(number(n, 1)?))
        } else if let Some(n) = s.strip_suffix('s') {
            Ok(Duration::from_secs(number(n, 1)?))
        } else if let Some(n) = s.strip_suffix('m') {
            Ok(Duration::from_secs(number(n, 60)?))
        } else if let Some(n) = s.strip_suffix('h') {
            Ok(Duration::from_secs(number(n, 60 * 60)?))
        } else if let Some(n) = s.strip_suffix('d') {
            Ok(Duration::from_secs(number(n, 24 * 60 * 60)?))
        } else {
            Err(format!("Duration must end with 'ms', 's', 'm', 'h' or 'd': {}", s))
        }
    }
}
