//! Timestamped artifact naming and age-based eviction.
//!
//! Archived logs and backups are named `<prefix>_<YYYYmmdd_HHMMSS><suffix>`,
//! optionally with a `-<n>` disambiguator before the suffix. Their age is read
//! from that timestamp, falling back to the file's mtime when the name does
//! not carry one.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// `strftime` format of artifact timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const TIMESTAMP_LEN: usize = 15;

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Extract the timestamp from `<prefix>_<ts>[-n]<suffix>`.
pub fn timestamp_from_name(name: &str, suffix: &str) -> Option<DateTime<Utc>> {
    let stem = name.strip_suffix(suffix)?;

    // Drop a trailing "-<n>" disambiguator.
    let stem = match stem.rsplit_once('-') {
        Some((head, tail)) if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) => head,
        _ => stem,
    };

    if stem.len() <= TIMESTAMP_LEN {
        return None;
    }
    let split = stem.len() - TIMESTAMP_LEN;
    if !stem.is_char_boundary(split) || !stem[..split].ends_with('_') {
        return None;
    }
    parse_timestamp(&stem[split..])
}

/// Creation time of an artifact: name timestamp first, then mtime.
pub fn artifact_time(path: &Path, suffix: &str) -> Option<DateTime<Utc>> {
    let from_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| timestamp_from_name(n, suffix));

    from_name.or_else(|| {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    })
}

/// True when `created` is strictly older than `retention` at `now`.
pub fn is_expired(created: DateTime<Utc>, now: DateTime<Utc>, retention: Duration) -> bool {
    match (now - created).to_std() {
        Ok(age) => age > retention,
        // Timestamps in the future are never expired.
        Err(_) => false,
    }
}

/// First free path of the form `<dir>/<stem><suffix>`, `<dir>/<stem>-1<suffix>`, ...
pub fn unique_path(dir: &Path, stem: &str, suffix: &str) -> PathBuf {
    let stem = unique_stem(dir, stem, &[suffix]);
    dir.join(format!("{}{}", stem, suffix))
}

/// First stem of the form `<stem>`, `<stem>-1`, ... for which no
/// `<dir>/<stem><suffix>` exists for any of `suffixes`.
pub fn unique_stem(dir: &Path, stem: &str, suffixes: &[&str]) -> String {
    let taken = |candidate: &str| {
        suffixes
            .iter()
            .any(|suffix| dir.join(format!("{}{}", candidate, suffix)).exists())
    };
    if !taken(stem) {
        return stem.to_string();
    }
    let mut n = 1u32;
    loop {
        let candidate = format!("{}-{}", stem, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Outcome of an eviction sweep.
#[derive(Debug, Default)]
pub struct Eviction {
    pub evicted: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, std::io::Error)>,
}

/// Delete every managed artifact in `dir` older than `retention`.
///
/// `suffix_of` returns the artifact suffix for file names this sweep owns and
/// `None` for anything else, which is left alone. A missing directory is an
/// empty sweep.
pub fn evict_expired<F>(
    dir: &Path,
    now: DateTime<Utc>,
    retention: Duration,
    suffix_of: F,
) -> std::io::Result<Eviction>
where
    F: Fn(&str) -> Option<&'static str>,
{
    let mut eviction = Eviction::default();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(eviction),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to read directory entry, skipping");
                eviction.failures.push((dir.to_path_buf(), e));
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(suffix) = suffix_of(name) else {
            continue;
        };
        let Some(created) = artifact_time(&path, suffix) else {
            warn!(path = %path.display(), "Cannot determine artifact age, keeping it");
            continue;
        };
        if !is_expired(created, now, retention) {
            continue;
        }

        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Evicted expired artifact");
                eviction.evicted.push(path);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to evict artifact");
                eviction.failures.push((path, e));
            }
        }
    }

    Ok(eviction)
}
