// E2E test framework for keeper
//
// Each scenario gets a private install directory and a free port, writes a
// YAML config pointing at the `fakesvc` binary, and drives the real
// `Supervisor` against it.

pub mod keeper_cli;

pub use keeper_cli::{CliOutput, KeeperCli};

use keeper_process::{force_kill, LivenessChecker, OsLiveness};
use keeper_supervisor::{KeeperConfig, ResolvedPaths, Supervisor};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Health path `fakesvc` is started with.
pub const HEALTH_PATH: &str = "/api/health";

/// Options for a scenario's config
#[derive(Debug, Clone)]
pub struct TestConfigOptions {
    /// Extra `fakesvc` arguments, e.g. `--ignore-sigterm`.
    pub fakesvc_args: Vec<String>,
    pub start_grace_ms: u64,
    pub stop_retries: u32,
    pub stop_backoff_ms: u64,
    pub force_kill_timeout_ms: u64,
    pub probe_attempts: u32,
    pub probe_delay_ms: u64,
}

impl Default for TestConfigOptions {
    fn default() -> Self {
        Self {
            fakesvc_args: Vec::new(),
            start_grace_ms: 800,
            stop_retries: 20,
            stop_backoff_ms: 100,
            force_kill_timeout_ms: 2000,
            probe_attempts: 3,
            probe_delay_ms: 200,
        }
    }
}

/// One scenario's install directory, port and config.
///
/// Dropping it kills whatever the PID file still names.
pub struct TestEnv {
    dir: TempDir,
    port: u16,
    config: KeeperConfig,
}

impl TestEnv {
    pub fn new(fakesvc: &Path, options: TestConfigOptions) -> Self {
        let dir = tempfile::Builder::new()
            .prefix("keeper-e2e-")
            .tempdir()
            .expect("Failed to create test directory");
        let port = free_port();

        let yaml = render_config(dir.path(), fakesvc, port, &options);
        std::fs::write(dir.path().join("keeper.yaml"), &yaml).expect("Failed to write config");
        let config = KeeperConfig::load_from_string(&yaml)
            .unwrap_or_else(|e| panic!("Invalid test config: {:#}\n{}", e, yaml));

        Self { dir, port, config }
    }

    pub fn install_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn config(&self) -> &KeeperConfig {
        &self.config
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("keeper.yaml")
    }

    pub fn paths(&self) -> ResolvedPaths {
        self.config.resolved_paths()
    }

    /// A fresh supervisor over this env's config.
    pub fn supervisor(&self) -> Supervisor {
        Supervisor::new(self.config.supervisor_settings())
    }

    /// The `keeper` binary pointed at this env's config file.
    pub fn cli(&self) -> KeeperCli {
        KeeperCli::new(self.config_path(), self.install_dir().to_path_buf())
    }

    /// PID currently recorded in the PID file, if any.
    pub fn recorded_pid(&self) -> Option<u32> {
        std::fs::read_to_string(self.paths().pid_file)
            .ok()
            .and_then(|content| content.trim().parse().ok())
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        if let Some(pid) = self.recorded_pid() {
            if OsLiveness.is_alive(pid).unwrap_or(false) {
                println!("Cleaning up leftover service process {}", pid);
                let _ = force_kill(pid);
            }
        }
    }
}

fn render_config(dir: &Path, fakesvc: &Path, port: u16, options: &TestConfigOptions) -> String {
    let mut args = vec![
        "--host".to_string(),
        "{host}".to_string(),
        "--port".to_string(),
        "{port}".to_string(),
        "--health-path".to_string(),
        HEALTH_PATH.to_string(),
    ];
    args.extend(options.fakesvc_args.iter().cloned());
    let args = args
        .iter()
        .map(|a| format!("    - {:?}\n", a))
        .collect::<String>();

    format!(
        r#"install_dir: {dir:?}
service:
  executable: {exe:?}
  args:
{args}  host: 127.0.0.1
  port: {port}
  health_path: {health}
timing:
  start_grace: {grace}ms
  stop_retries: {retries}
  stop_backoff: {backoff}ms
  force_kill_timeout: {force}ms
  restart_settle: 200ms
probe:
  attempts: {attempts}
  delay: {delay}ms
  timeout: 1s
"#,
        dir = dir.display().to_string(),
        exe = fakesvc.display().to_string(),
        args = args,
        port = port,
        health = HEALTH_PATH,
        grace = options.start_grace_ms,
        retries = options.stop_retries,
        backoff = options.stop_backoff_ms,
        force = options.force_kill_timeout_ms,
        attempts = options.probe_attempts,
        delay = options.probe_delay_ms,
    )
}

/// Ask the OS for a port nobody is listening on.
pub fn free_port() -> u16 {
    let listener =
        std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind an ephemeral port");
    listener
        .local_addr()
        .expect("Failed to read local address")
        .port()
}

/// Route supervisor logs to the test output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Run a scenario with the usual banners, panicking on failure.
pub async fn run_scenario<F, Fut>(name: &str, scenario: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), String>>,
{
    init_tracing();

    println!("\n========================================");
    println!("TEST: {}", name);
    println!("========================================\n");

    match scenario().await {
        Ok(()) => {
            println!("\n========================================");
            println!("✓ TEST PASSED: {}", name);
            println!("========================================\n");
        }
        Err(e) => {
            println!("\n========================================");
            println!("✗ TEST FAILED: {}", name);
            println!("Error: {}", e);
            println!("========================================\n");
            panic!("Test failed: {}", e);
        }
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
