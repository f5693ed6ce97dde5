//! Service output files.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Open `path` for appending, creating it and its parent directories.
pub fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Last `count` lines of a text file. A missing file has no lines.
pub fn tail_lines(path: &Path, count: usize) -> std::io::Result<Vec<String>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut tail = VecDeque::with_capacity(count);
    for line in BufReader::new(file).split(b'\n') {
        let line = line?;
        if tail.len() == count {
            tail.pop_front();
        }
        if count > 0 {
            tail.push_back(String::from_utf8_lossy(&line).into_owned());
        }
    }
    Ok(tail.into_iter().collect())
}
