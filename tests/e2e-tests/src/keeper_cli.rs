//! Drives the `keeper` binary for E2E testing
//!
//! Every call is a separate process, so the service is never the caller's
//! child once `start` has returned.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

/// Outcome of one `keeper` invocation
#[derive(Debug, Clone)]
pub struct CliOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CliOutput {
    /// Fail unless the process exited with `expected`.
    pub fn expect_code(&self, expected: i32) -> Result<&Self, String> {
        if self.code == expected {
            Ok(self)
        } else {
            Err(format!(
                "expected exit code {}, got {}\nstdout:\n{}\nstderr:\n{}",
                expected, self.code, self.stdout, self.stderr
            ))
        }
    }
}

/// `keeper --config <file>` bound to one test env
pub struct KeeperCli {
    binary: PathBuf,
    config_path: PathBuf,
    working_dir: PathBuf,
}

impl KeeperCli {
    pub fn new(config_path: PathBuf, working_dir: PathBuf) -> Self {
        Self {
            binary: keeper_path().to_path_buf(),
            config_path,
            working_dir,
        }
    }

    pub fn run(&self, args: &[&str]) -> Result<CliOutput, String> {
        println!("$ keeper {}", args.join(" "));
        let output = Command::new(&self.binary)
            .arg("--config")
            .arg(&self.config_path)
            .args(args)
            .current_dir(&self.working_dir)
            .env_remove("KEEPER_CONFIG")
            .output()
            .map_err(|e| format!("Failed to run {}: {}", self.binary.display(), e))?;

        let result = CliOutput {
            // Killed by a signal counts as a distinct failure.
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        println!("  -> exit {}: {}", result.code, result.stdout.trim());
        Ok(result)
    }
}

/// Path to the `keeper` binary, building it when this test run has not.
///
/// The binary lives in another workspace package, so it sits next to the
/// test executable only when the whole workspace was built.
pub fn keeper_path() -> &'static Path {
    static PATH: OnceLock<PathBuf> = OnceLock::new();
    PATH.get_or_init(|| {
        let mut dir = env::current_exe()
            .expect("Failed to get current exe path")
            .parent()
            .expect("Failed to get parent dir")
            .to_path_buf();
        if dir.ends_with("deps") {
            dir.pop();
        }
        let path = dir.join(format!("keeper{}", env::consts::EXE_SUFFIX));
        if path.exists() {
            return path;
        }

        println!("Building keeper binary for {}", dir.display());
        let mut cmd = Command::new(env!("CARGO"));
        cmd.args(["build", "-p", "keeper", "--bin", "keeper"])
            .current_dir(env!("CARGO_MANIFEST_DIR"));
        if dir.ends_with("release") {
            cmd.arg("--release");
        }
        let status = cmd.status().expect("Failed to run cargo build");
        if !status.success() || !path.exists() {
            panic!("keeper binary not found at: {}", path.display());
        }
        path
    })
}
