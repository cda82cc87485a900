//! Log setup: stderr plus an append-only, size-rotated log file.
//!
//! Rotated files are named `.1`, `.2`, etc. (max 5 rotations); the oldest
//! is dropped.

use crate::config::LogOptions;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Maximum number of rotated log files to keep.
const MAX_ROTATIONS: u32 = 5;

/// Append-only log file that rotates itself once it reaches `max_bytes`.
pub struct RotatingFile {
    file: File,
    path: PathBuf,
    max_bytes: u64,
    /// Approximate current size (may drift slightly; re-checked on rotation).
    current_size: u64,
}

impl RotatingFile {
    /// Open or create the log file.
    pub fn open(path: &Path, max_bytes: u64) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            file,
            path: path.to_path_buf(),
            max_bytes,
            current_size,
        })
    }

    /// Rotate log files: scraping.log → scraping.log.1, .1 → .2, etc.
    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        let oldest = rotation_path(&self.path, MAX_ROTATIONS);
        if oldest.exists() {
            let _ = std::fs::remove_file(&oldest);
        }

        for i in (1..MAX_ROTATIONS).rev() {
            let from = rotation_path(&self.path, i);
            if from.exists() {
                let _ = std::fs::rename(&from, rotation_path(&self.path, i + 1));
            }
        }

        let _ = std::fs::rename(&self.path, rotation_path(&self.path, 1));

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.current_size = 0;

        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.current_size > 0 && self.current_size + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let written = self.file.write(buf)?;
        self.current_size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Build path for a rotated log file: `scraping.log.1`, `scraping.log.2`, etc.
fn rotation_path(base: &Path, index: u32) -> PathBuf {
    let name = format!(
        "{}.{index}",
        base.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("scraping.log")
    );
    base.with_file_name(name)
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `verbose`.
pub fn init(options: &LogOptions, verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let file = RotatingFile::open(&options.path, options.max_bytes)
        .with_context(|| format!("failed to open log file: {}", options.path.display()))?;

    let file_layer = if options.json {
        fmt::layer()
            .json()
            .with_writer(Mutex::new(file))
            .boxed()
    } else {
        fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .boxed()
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_path() {
        let p = rotation_path(Path::new("/var/log/scraping.log"), 3);
        assert_eq!(p, PathBuf::from("/var/log/scraping.log.3"));
    }

    #[test]
    fn test_appends_without_rotation_under_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scraping.log");
        std::fs::write(&path, "old line\n").unwrap();

        let mut log = RotatingFile::open(&path, 1024).unwrap();
        log.write_all(b"new line\n").unwrap();
        log.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old line\nnew line\n");
        assert!(!rotation_path(&path, 1).exists());
    }

    #[test]
    fn test_rotates_at_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scraping.log");

        let mut log = RotatingFile::open(&path, 16).unwrap();
        log.write_all(b"0123456789\n").unwrap();
        log.write_all(b"abcdefghij\n").unwrap();
        log.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "abcdefghij\n");
        assert_eq!(
            std::fs::read_to_string(rotation_path(&path, 1)).unwrap(),
            "0123456789\n"
        );
    }

    #[test]
    fn test_keeps_at_most_max_rotations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scraping.log");

        let mut log = RotatingFile::open(&path, 4).unwrap();
        for i in 0..(MAX_ROTATIONS + 3) {
            log.write_all(format!("line{i}\n").as_bytes()).unwrap();
        }
        log.flush().unwrap();

        for i in 1..=MAX_ROTATIONS {
            assert!(rotation_path(&path, i).exists(), "missing rotation {i}");
        }
        assert!(!rotation_path(&path, MAX_ROTATIONS + 1).exists());
        let last = MAX_ROTATIONS + 2;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), format!("line{last}\n"));
    }
}
