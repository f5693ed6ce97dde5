//! Advisory lock serializing supervisor commands.
//!
//! Held for the whole of start/stop/restart and for status's stale cleanup,
//! so two concurrent invocations cannot both pass the "no PID file" check.
//! The lock file itself is never deleted: removing it while another
//! invocation waits on it would let a third lock a fresh inode.

use keeper_common::{ProcessError, ProcessResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exclusive `flock` on a lock file; released on drop.
#[derive(Debug)]
pub struct SupervisorLock {
    path: PathBuf,
    #[cfg(unix)]
    _lock: nix::fcntl::Flock<std::fs::File>,
}

impl SupervisorLock {
    /// Lock path that pairs with a PID file: `<pid_file>.lock`.
    pub fn path_for(pid_file: &Path) -> PathBuf {
        let mut name = pid_file.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Wait for the lock without blocking the async runtime.
    pub async fn acquire(path: &Path) -> ProcessResult<Self> {
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::acquire_blocking(&owned))
            .await
            .map_err(|e| ProcessError::lock(path, format!("Lock task failed: {}", e)))?
    }

    /// Block the calling thread until the lock is held.
    pub fn acquire_blocking(path: &Path) -> ProcessResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ProcessError::lock(path, format!("Failed to create directory: {}", e)))?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| ProcessError::lock(path, format!("Failed to open lock file: {}", e)))?;

        #[cfg(unix)]
        {
            use nix::fcntl::{Flock, FlockArg};

            let lock = Flock::lock(file, FlockArg::LockExclusive)
                .map_err(|(_, errno)| ProcessError::lock(path, format!("flock failed: {}", errno)))?;
            debug!(path = %path.display(), "Supervisor lock acquired");
            Ok(Self {
                path: path.to_path_buf(),
                _lock: lock,
            })
        }

        #[cfg(not(unix))]
        {
            drop(file);
            Err(ProcessError::unsupported("flock"))
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SupervisorLock {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "Supervisor lock released");
    }
}
