use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keeper_common::{exit_codes, SupervisorError};
use keeper_process::tail_lines;
use keeper_supervisor::{KeeperConfig, ServiceStatus, StopOutcome, Supervisor};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

/// keeper - keep one local HTTP service alive
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML)
    #[arg(short, long, value_name = "FILE", env = "KEEPER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the service if it is not running
    Start,
    /// Stop the service (SIGTERM, then SIGKILL)
    Stop,
    /// Stop then start the service
    Restart,
    /// Report whether the service is running
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Probe the health endpoint with retries
    Health {
        /// Restart the service when the probe reports unhealthy
        #[arg(long)]
        restart: bool,
        /// Print the health report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the tail of the service log
    Logs {
        /// Show error.log instead of server.log
        #[arg(long)]
        errors: bool,
        /// Number of lines
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
    },
    /// Archive, compress and evict the service logs
    Rotate,
    /// Back up the state file and the log directory
    Backup,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = initialize_logging(args.debug) {
        eprintln!("failed to initialize logging: {:#}", e);
        return ExitCode::from(exit_codes::FAILURE as u8);
    }

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            println!("error: {:#}", e);
            exit_codes::FAILURE
        }
    };
    ExitCode::from(code as u8)
}

async fn run(args: Args) -> Result<i32> {
    let config = KeeperConfig::load(args.config.as_deref())?;
    debug!(install_dir = %config.install_dir().display(), "Configuration loaded");

    match args.command {
        Command::Start => {
            let supervisor = Supervisor::new(config.supervisor_settings());
            Ok(report(supervisor.start().await.map(|handle| {
                format!("started (PID {}, port {})", handle.pid, handle.port)
            })))
        }
        Command::Stop => {
            let supervisor = Supervisor::new(config.supervisor_settings());
            Ok(report(supervisor.stop().await.map(|outcome| match outcome {
                StopOutcome::Graceful { pid } => format!("stopped (PID {})", pid),
                StopOutcome::Forced { pid } => format!("stopped (PID {}, forced)", pid),
            })))
        }
        Command::Restart => {
            let supervisor = Supervisor::new(config.supervisor_settings());
            Ok(report(supervisor.restart().await.map(|handle| {
                format!("restarted (PID {}, port {})", handle.pid, handle.port)
            })))
        }
        Command::Status { json } => {
            let supervisor = Supervisor::new(config.supervisor_settings());
            match supervisor.status().await {
                Ok(status) => {
                    if json {
                        println!("{}", serde_json::to_string(&status)?);
                    } else {
                        println!("{}", status);
                    }
                    Ok(match status {
                        ServiceStatus::Running { .. } => exit_codes::SUCCESS,
                        ServiceStatus::NotRunning | ServiceStatus::StaleHandle { .. } => {
                            exit_codes::NOT_RUNNING
                        }
                    })
                }
                Err(e) => Ok(report::<String>(Err(e))),
            }
        }
        Command::Health { restart, json } => {
            let supervisor = Supervisor::new(config.supervisor_settings());
            let health = supervisor.health().await;
            if json {
                println!("{}", serde_json::to_string(&health)?);
            } else if health.is_healthy() {
                println!("healthy ({}, {} attempt(s))", health.url, health.attempts);
            } else {
                println!(
                    "unhealthy ({}, {} attempt(s): {})",
                    health.url,
                    health.attempts,
                    health.last_error.as_deref().unwrap_or("unknown error")
                );
            }
            if health.is_healthy() {
                return Ok(exit_codes::SUCCESS);
            }

            if !restart {
                return Ok(exit_codes::PROBE_UNHEALTHY);
            }

            warn!("Restarting unhealthy service");
            Ok(report(supervisor.restart().await.map(|handle| {
                format!("restarted (PID {}, port {})", handle.pid, handle.port)
            })))
        }
        Command::Logs { errors, lines } => {
            let paths = config.resolved_paths();
            let path = if errors { paths.error_log_file } else { paths.log_file };
            let tail = tail_lines(&path, lines)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            for line in tail {
                println!("{}", line);
            }
            Ok(exit_codes::SUCCESS)
        }
        Command::Rotate => {
            let rotator = config.log_rotator();
            let report = tokio::task::spawn_blocking(move || rotator.rotate())
                .await
                .context("Rotation task failed")?;
            for e in &report.errors {
                warn!("{}", e);
            }
            println!("rotation: {}", report);
            Ok(if report.is_clean() {
                exit_codes::SUCCESS
            } else {
                exit_codes::PARTIAL_FAILURE
            })
        }
        Command::Backup => {
            let scheduler = config.backup_scheduler();
            let report = tokio::task::spawn_blocking(move || scheduler.run())
                .await
                .context("Backup task failed")?;
            for e in &report.errors {
                warn!("{}", e);
            }
            println!("backup: {}", report);
            Ok(if report.is_clean() {
                exit_codes::SUCCESS
            } else {
                exit_codes::PARTIAL_FAILURE
            })
        }
    }
}

/// Print the one-line outcome and map it to an exit code.
fn report<T: std::fmt::Display>(result: Result<T, SupervisorError>) -> i32 {
    match result {
        Ok(summary) => {
            info!("{}", summary);
            println!("{}", summary);
            exit_codes::SUCCESS
        }
        Err(e) => {
            if let SupervisorError::StartFailed { log_tail, .. } = &e {
                for line in log_tail {
                    eprintln!("  | {}", line);
                }
            }
            println!("{}", e);
            e.exit_code()
        }
    }
}

fn initialize_logging(debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(())
}
