//! Point-in-time backups of the state document and the log directory.
//!
//! A pass is best-effort: the state snapshot and the log bundle are taken
//! independently, then expired backups of each kind are evicted. Sources
//! are only ever read.

use crate::types::{Backup, BackupError, BackupKind, BackupReport};
use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use keeper_common::retention::{evict_expired, format_timestamp, unique_path};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const STATE_SUFFIX: &str = ".json";
const BUNDLE_SUFFIX: &str = ".tar.gz";
const BUNDLE_PREFIX: &str = "logs";

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct BackupScheduler {
    state_file: PathBuf,
    state_kind: String,
    log_dir: PathBuf,
    backup_dir: PathBuf,
    retention: Duration,
}

impl BackupScheduler {
    pub fn new(
        state_file: impl Into<PathBuf>,
        log_dir: impl Into<PathBuf>,
        backup_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            state_file: state_file.into(),
            state_kind: "state".to_string(),
            log_dir: log_dir.into(),
            backup_dir: backup_dir.into(),
            retention: DEFAULT_RETENTION,
        }
    }

    /// Name prefix of state snapshots, `<state_kind>_<ts>.json`.
    pub fn with_state_kind(mut self, kind: impl Into<String>) -> Self {
        self.state_kind = kind.into();
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn run(&self) -> BackupReport {
        self.run_at(Utc::now())
    }

    /// Run a pass as if the clock read `now`.
    pub fn run_at(&self, now: DateTime<Utc>) -> BackupReport {
        let mut report = BackupReport::default();

        if let Err(e) = fs::create_dir_all(&self.backup_dir) {
            warn!(dir = %self.backup_dir.display(), error = %e, "Cannot create backup directory");
            report
                .errors
                .push(BackupError::new(BackupKind::StateSnapshot, &self.backup_dir, &e));
            report
                .errors
                .push(BackupError::new(BackupKind::LogBundle, &self.backup_dir, &e));
            return report;
        }

        match self.snapshot_state(now) {
            Ok(Some(backup)) => report.created.push(backup),
            Ok(None) => report.skipped.push(self.state_file.clone()),
            Err(e) => report.errors.push(e),
        }

        match self.bundle_logs(now, &mut report.errors) {
            Ok(Some(backup)) => report.created.push(backup),
            Ok(None) => report.skipped.push(self.log_dir.clone()),
            Err(e) => report.errors.push(e),
        }

        self.evict(now, &mut report);

        info!(
            created = report.created.len(),
            skipped = report.skipped.len(),
            evicted = report.evicted.len(),
            errors = report.errors.len(),
            "Backup pass finished"
        );
        report
    }

    /// Copy the state file verbatim. `Ok(None)` when there is no state file.
    pub fn snapshot_state(&self, now: DateTime<Utc>) -> Result<Option<Backup>, BackupError> {
        let kind = BackupKind::StateSnapshot;
        if !self.state_file.is_file() {
            debug!(path = %self.state_file.display(), "No state file, skipping snapshot");
            return Ok(None);
        }

        let stem = format!("{}_{}", self.state_kind, format_timestamp(now));
        let target = unique_path(&self.backup_dir, &stem, STATE_SUFFIX);
        let partial = partial_path(&target);

        let result = fs::copy(&self.state_file, &partial).and_then(|_| fs::rename(&partial, &target));
        if let Err(e) = result {
            let _ = fs::remove_file(&partial);
            warn!(path = %self.state_file.display(), error = %e, "State snapshot failed");
            return Err(BackupError::new(kind, &self.state_file, e));
        }

        info!(source = %self.state_file.display(), backup = %target.display(), "State snapshot written");
        Ok(Some(Backup {
            kind,
            timestamp: now,
            path: target,
        }))
    }

    /// Tar and gzip every regular file under the log directory.
    ///
    /// Files that cannot be read are recorded in `errors` and left out of the
    /// bundle. `Ok(None)` when there is no log directory.
    pub fn bundle_logs(
        &self,
        now: DateTime<Utc>,
        errors: &mut Vec<BackupError>,
    ) -> Result<Option<Backup>, BackupError> {
        let kind = BackupKind::LogBundle;
        if !self.log_dir.is_dir() {
            debug!(path = %self.log_dir.display(), "No log directory, skipping bundle");
            return Ok(None);
        }

        let stem = format!("{}_{}", BUNDLE_PREFIX, format_timestamp(now));
        let target = unique_path(&self.backup_dir, &stem, BUNDLE_SUFFIX);
        let partial = partial_path(&target);

        let result = self
            .write_bundle(&partial, errors)
            .and_then(|files| fs::rename(&partial, &target).map(|_| files));
        let files = match result {
            Ok(files) => files,
            Err(e) => {
                let _ = fs::remove_file(&partial);
                warn!(path = %self.log_dir.display(), error = %e, "Log bundle failed");
                return Err(BackupError::new(kind, &target, e));
            }
        };

        info!(source = %self.log_dir.display(), backup = %target.display(), files, "Log bundle written");
        Ok(Some(Backup {
            kind,
            timestamp: now,
            path: target,
        }))
    }

    fn write_bundle(&self, dest: &Path, errors: &mut Vec<BackupError>) -> io::Result<usize> {
        let writer = BufWriter::new(File::create(dest)?);
        let mut builder = tar::Builder::new(GzEncoder::new(writer, Compression::default()));
        let root_name = self
            .log_dir
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(BUNDLE_PREFIX));
        let backup_dir = self.backup_dir.clone();
        let mut files = 0;

        let walker = WalkDir::new(&self.log_dir)
            .follow_links(false)
            .into_iter()
            // Never bundle our own output if it lives under the log dir.
            .filter_entry(move |entry| entry.path() != backup_dir);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.log_dir.clone());
                    errors.push(BackupError::new(BackupKind::LogBundle, path, &e));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let name = match path.strip_prefix(&self.log_dir) {
                Ok(relative) => root_name.join(relative),
                Err(_) => continue,
            };

            // Read the whole file first so a writer appending or a rotation
            // truncating it cannot change the size under the tar header.
            let data = match fs::read(path) {
                Ok(data) => data,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "Log file vanished during backup");
                    continue;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot read log file for backup");
                    errors.push(BackupError::new(BackupKind::LogBundle, path, e));
                    continue;
                }
            };

            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(mtime_secs(path));
            builder.append_data(&mut header, &name, data.as_slice())?;
            files += 1;
        }

        let encoder = builder.into_inner()?;
        let mut writer = encoder.finish()?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(files)
    }

    fn evict(&self, now: DateTime<Utc>, report: &mut BackupReport) {
        let state_prefix = format!("{}_", self.state_kind);
        let bundle_prefix = format!("{}_", BUNDLE_PREFIX);

        let suffix_of = |name: &str| -> Option<&'static str> {
            if name.starts_with(&state_prefix) && name.ends_with(STATE_SUFFIX) {
                Some(STATE_SUFFIX)
            } else if name.starts_with(&bundle_prefix) && name.ends_with(BUNDLE_SUFFIX) {
                Some(BUNDLE_SUFFIX)
            } else {
                None
            }
        };

        match evict_expired(&self.backup_dir, now, self.retention, suffix_of) {
            Ok(eviction) => {
                report.evicted = eviction.evicted;
                for (path, e) in eviction.failures {
                    let kind = kind_of(&path);
                    report.errors.push(BackupError::new(kind, path, e));
                }
            }
            Err(e) => {
                warn!(dir = %self.backup_dir.display(), error = %e, "Failed to scan backup directory");
                report
                    .errors
                    .push(BackupError::new(BackupKind::StateSnapshot, &self.backup_dir, e));
            }
        }
    }
}

fn kind_of(path: &Path) -> BackupKind {
    if path.to_string_lossy().ends_with(BUNDLE_SUFFIX) {
        BackupKind::LogBundle
    } else {
        BackupKind::StateSnapshot
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

fn mtime_secs(path: &Path) -> u64 {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
