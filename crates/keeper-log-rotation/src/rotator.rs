//! Copy-then-truncate log rotation.
//!
//! The service keeps its log files open with `O_APPEND` for its whole life,
//! so a live file is never renamed or deleted: its content is copied into
//! the archive directory, the live file is truncated in place as soon as the
//! copy is complete, and the copy is compressed afterwards. The writer's next
//! append lands at offset zero of the same inode.

use crate::types::{ArchivedLog, RotationError, RotationReport, RotationStage};
use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use keeper_common::retention::{evict_expired, format_timestamp, unique_stem};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const PLAIN_SUFFIX: &str = ".log";
const COMPRESSED_SUFFIX: &str = ".log.gz";

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct LogRotator {
    sources: Vec<PathBuf>,
    archive_dir: PathBuf,
    retention: Duration,
}

impl LogRotator {
    pub fn new(sources: Vec<PathBuf>, archive_dir: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            sources,
            archive_dir: archive_dir.into(),
            retention,
        }
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    pub fn rotate(&self) -> RotationReport {
        self.rotate_at(Utc::now())
    }

    /// Rotate as if the clock read `now`.
    pub fn rotate_at(&self, now: DateTime<Utc>) -> RotationReport {
        let mut report = RotationReport::default();

        for source in &self.sources {
            self.rotate_source(source, now, &mut report);
        }

        match evict_expired(&self.archive_dir, now, self.retention, archive_suffix) {
            Ok(eviction) => {
                report.evicted = eviction.evicted;
                report.errors.extend(
                    eviction
                        .failures
                        .into_iter()
                        .map(|(path, e)| RotationError::new(path, RotationStage::Evict, e)),
                );
            }
            Err(e) => {
                warn!(dir = %self.archive_dir.display(), error = %e, "Failed to scan archive directory");
                report
                    .errors
                    .push(RotationError::new(&self.archive_dir, RotationStage::Evict, e));
            }
        }

        info!(
            archived = report.archived.len(),
            skipped = report.skipped.len(),
            evicted = report.evicted.len(),
            errors = report.errors.len(),
            "Log rotation finished"
        );
        report
    }

    fn rotate_source(&self, source: &Path, now: DateTime<Utc>, report: &mut RotationReport) {
        let len = match fs::metadata(source) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %source.display(), "Log file missing, skipping");
                report.skipped.push(source.to_path_buf());
                return;
            }
            Err(e) => {
                report.errors.push(RotationError::new(source, RotationStage::Inspect, e));
                return;
            }
        };
        if len == 0 {
            debug!(path = %source.display(), "Log file empty, skipping");
            report.skipped.push(source.to_path_buf());
            return;
        }

        let source_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "log".to_string());

        if let Err(e) = fs::create_dir_all(&self.archive_dir) {
            report
                .errors
                .push(RotationError::new(&self.archive_dir, RotationStage::Copy, e));
            return;
        }

        let stem = unique_stem(
            &self.archive_dir,
            &format!("{}_{}", stem, format_timestamp(now)),
            &[PLAIN_SUFFIX, COMPRESSED_SUFFIX],
        );
        let plain = self.archive_dir.join(format!("{}{}", stem, PLAIN_SUFFIX));
        let compressed = self.archive_dir.join(format!("{}{}", stem, COMPRESSED_SUFFIX));

        if let Err(e) = fs::copy(source, &plain) {
            warn!(path = %source.display(), error = %e, "Failed to copy log into archive");
            let _ = fs::remove_file(&plain);
            report.errors.push(RotationError::new(source, RotationStage::Copy, e));
            return;
        }

        // The plain copy holds the content now; clear the live file before
        // compressing so the writer's appends during gzip stay in place.
        if let Err(e) = truncate_in_place(source) {
            warn!(path = %source.display(), error = %e, "Failed to truncate live log");
            report.errors.push(RotationError::new(source, RotationStage::Truncate, e));
        }

        let archived = match gzip_file(&plain, &compressed) {
            Ok(()) => {
                if let Err(e) = fs::remove_file(&plain) {
                    report.errors.push(RotationError::new(&plain, RotationStage::Compress, e));
                }
                ArchivedLog {
                    source_name,
                    timestamp: now,
                    compressed: true,
                    path: compressed,
                }
            }
            Err(e) => {
                warn!(path = %plain.display(), error = %e, "Compression failed, keeping plain copy");
                report.errors.push(RotationError::new(&plain, RotationStage::Compress, e));
                ArchivedLog {
                    source_name,
                    timestamp: now,
                    compressed: false,
                    path: plain,
                }
            }
        };

        info!(source = %source.display(), archive = %archived.path.display(), bytes = len, "Rotated log");
        report.archived.push(archived);
    }
}

fn archive_suffix(name: &str) -> Option<&'static str> {
    if name.ends_with(COMPRESSED_SUFFIX) {
        Some(COMPRESSED_SUFFIX)
    } else if name.ends_with(PLAIN_SUFFIX) {
        Some(PLAIN_SUFFIX)
    } else {
        None
    }
}

/// Gzip `src` into `dest` via a `.partial` file so `dest` is never half-written.
fn gzip_file(src: &Path, dest: &Path) -> io::Result<()> {
    let mut partial = dest.as_os_str().to_os_string();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let result = (|| {
        let mut reader = BufReader::new(File::open(src)?);
        let writer = BufWriter::new(File::create(&partial)?);
        let mut encoder = GzEncoder::new(writer, Compression::default());
        io::copy(&mut reader, &mut encoder)?;
        let mut writer = encoder.finish()?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        fs::rename(&partial, dest)
    })();

    if result.is_err() && partial.is_file() {
        let _ = fs::remove_file(&partial);
    }
    result
}

fn truncate_in_place(path: &Path) -> io::Result<()> {
    OpenOptions::new().write(true).open(path)?.set_len(0)
}
