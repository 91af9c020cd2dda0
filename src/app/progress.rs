//! Progress reporting and cooperative cancellation for sorting runs.
//!
//! The pipeline never talks to `indicatif` directly: it reports through the
//! [`ProgressSink`] trait and polls a shared cancellation token via
//! [`RunContext`], which is passed explicitly into every stage.

use crate::{Error, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The three independent progress counters a run emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    /// Directories scanned over the whole run
    Directories,
    /// Files scanned, reset per directory
    Files,
    /// Lines scanned, reset per file (table sink only)
    Lines,
}

/// Outward progress boundary: counters plus a human-readable status string
pub trait ProgressSink: Send + Sync {
    /// Report a counter update for one stage
    fn report(&self, stage: ProgressStage, current: u64, total: u64, message: &str);

    /// Emit a terminal status message for the run
    fn finish(&self, message: &str);
}

/// Context threaded through every pipeline stage: one stop signal inward,
/// three progress streams outward
#[derive(Clone)]
pub struct RunContext {
    token: CancellationToken,
    progress: Arc<dyn ProgressSink>,
}

impl RunContext {
    pub fn new(token: CancellationToken, progress: Arc<dyn ProgressSink>) -> Self {
        Self { token, progress }
    }

    /// Context with a fresh token and no progress output, for tests
    pub fn detached() -> Self {
        Self::new(CancellationToken::new(), Arc::new(NullProgress))
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Poll the stop signal at a loop boundary
    pub fn check_interrupted(&self) -> Result<()> {
        if self.token.is_cancelled() {
            Err(Error::interrupted("stop signal received"))
        } else {
            Ok(())
        }
    }

    pub fn report(&self, stage: ProgressStage, current: u64, total: u64, message: &str) {
        self.progress.report(stage, current, total, message);
    }

    pub fn finish(&self, message: &str) {
        self.progress.finish(message);
    }
}

/// Sink that discards all progress, for tests and quiet mode
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _stage: ProgressStage, _current: u64, _total: u64, _message: &str) {}

    fn finish(&self, _message: &str) {}
}

/// Console sink rendering the three counters as percentage bars
pub struct ConsoleProgress {
    _multi: MultiProgress,
    directories: ProgressBar,
    files: ProgressBar,
    lines: Option<ProgressBar>,
}

impl ConsoleProgress {
    /// Create the bar set; the lines bar only exists for table-sink runs
    pub fn new(with_lines: bool) -> Self {
        let multi = MultiProgress::new();
        let directories = multi.add(Self::styled_bar("directories"));
        let files = multi.add(Self::styled_bar("files"));
        let lines = if with_lines {
            Some(multi.add(Self::styled_bar("lines")))
        } else {
            None
        };

        Self {
            _multi: multi,
            directories,
            files,
            lines,
        }
    }

    fn styled_bar(unit: &str) -> ProgressBar {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(&format!(
                    "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {unit} ({{percent}}%) {{msg}}"
                ))
                .unwrap()
                .progress_chars("#>-"),
        );
        pb
    }

    fn bar_for(&self, stage: ProgressStage) -> Option<&ProgressBar> {
        match stage {
            ProgressStage::Directories => Some(&self.directories),
            ProgressStage::Files => Some(&self.files),
            ProgressStage::Lines => self.lines.as_ref(),
        }
    }
}

impl ProgressSink for ConsoleProgress {
    fn report(&self, stage: ProgressStage, current: u64, total: u64, message: &str) {
        if let Some(pb) = self.bar_for(stage) {
            pb.set_length(total);
            pb.set_position(current);
            pb.set_message(message.to_string());
        }
    }

    fn finish(&self, message: &str) {
        self.directories.finish_with_message(message.to_string());
        self.files.finish_and_clear();
        if let Some(lines) = &self.lines {
            lines.finish_and_clear();
        }
    }
}
