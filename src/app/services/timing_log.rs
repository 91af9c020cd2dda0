//! Per-file timing report for tensor runs.
//!
//! Collects one entry per loaded file (path, elapsed load time, record
//! count) and writes the report once per run.

use crate::{Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// One loaded file's timing entry
#[derive(Debug, Clone)]
pub struct TimingEntry {
    pub path: PathBuf,
    pub elapsed: Duration,
    pub record_count: usize,
}

/// Accumulated per-file timing entries for one run
#[derive(Debug, Default)]
pub struct TimingLog {
    entries: Vec<TimingEntry>,
}

impl TimingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: &Path, elapsed: Duration, record_count: usize) {
        self.entries.push(TimingEntry {
            path: path.to_path_buf(),
            elapsed,
            record_count,
        });
    }

    pub fn entries(&self) -> &[TimingEntry] {
        &self.entries
    }

    /// Write the report: a timestamped header followed by one line per file
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::File::create(path)
            .map_err(|e| Error::io(format!("Failed to create '{}'", path.display()), e))?;

        writeln!(
            file,
            "# Loading log written {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(file, "# file\telapsed_ms\trecords")?;
        for entry in &self.entries {
            writeln!(
                file,
                "{}\t{}\t{}",
                entry.path.display(),
                entry.elapsed.as_millis(),
                entry.record_count
            )?;
        }

        info!(
            "Saved loading log with {} entries to {}",
            self.entries.len(),
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_entries_accumulate_in_order() {
        let mut log = TimingLog::new();
        log.record(Path::new("/a/one.txt"), Duration::from_millis(12), 100);
        log.record(Path::new("/a/two.txt"), Duration::from_millis(7), 0);

        assert_eq!(log.entries().len(), 2);
        assert_eq!(log.entries()[0].record_count, 100);
        assert_eq!(log.entries()[1].elapsed, Duration::from_millis(7));
    }

    #[test]
    fn test_save_writes_header_and_lines() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("loading_log.txt");

        let mut log = TimingLog::new();
        log.record(Path::new("/a/one.txt"), Duration::from_millis(12), 100);
        log.save(&out).unwrap();

        let content = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("# Loading log written "));
        assert!(lines[2].contains("one.txt"));
        assert!(lines[2].ends_with("12\t100"));
    }

    #[test]
    fn test_empty_log_still_writes_header() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("loading_log.txt");

        TimingLog::new().save(&out).unwrap();
        let content = std::fs::read_to_string(&out).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
