//! Per-file, per-record filtering.
//!
//! A file must pass three gates before its records are read: name
//! eligibility (selected family token, data extension, no excluded
//! suffix), instruction path matching (some row's path token is contained
//! in the file path), and the channel-observation check for direct-event
//! families. Records of an admitted file are then tested against the
//! time-window, quality-code and event-code predicate.
//!
//! Malformed data rows (wrong field count, unparseable MET) are skipped
//! and logged, never aborting the file.

use crate::app::models::Record;
use crate::app::progress::{ProgressStage, RunContext};
use crate::app::services::condition_sets::{ParticleEventSet, QualityConditionSet};
use crate::app::services::instruction_table::InstructionTable;
use crate::constants::{
    self, DATA_FILE_EXT, EXCLUDED_DATA_SUFFIXES, HIDE_TRAILING_SENTINEL, RECORD_FIELD_COUNT,
};
use crate::{Error, Result};
use regex::Regex;
use std::path::Path;
use tracing::{debug, warn};

/// Outcome of filtering one file
#[derive(Debug, Default)]
pub struct FileOutcome {
    /// Records passing every predicate, in file order
    pub records: Vec<Record>,
    /// Lines read from the file
    pub lines_scanned: usize,
    /// Malformed lines skipped
    pub lines_skipped: usize,
}

/// Record filter bound to one run's instruction table and condition sets
pub struct RecordFilter<'a> {
    table: &'a InstructionTable,
    quality_set: &'a QualityConditionSet,
    particle_set: &'a ParticleEventSet,
    filename_tokens: &'a [String],
    excluded_suffixes: Vec<String>,
    event_filtering: bool,
    channel_suffix: Regex,
}

impl<'a> RecordFilter<'a> {
    pub fn new(
        table: &'a InstructionTable,
        quality_set: &'a QualityConditionSet,
        particle_set: &'a ParticleEventSet,
        filename_tokens: &'a [String],
        primary_ext: &str,
        event_filtering: bool,
    ) -> Self {
        let mut excluded_suffixes = vec![primary_ext.to_string()];
        excluded_suffixes.extend(EXCLUDED_DATA_SUFFIXES.iter().map(|s| s.to_string()));

        Self {
            table,
            quality_set,
            particle_set,
            filename_tokens,
            excluded_suffixes,
            event_filtering,
            // Trailing channel number of direct-event file names
            channel_suffix: Regex::new(r"-(\d+)\.txt$").unwrap(),
        }
    }

    /// Name eligibility: selected family token present, data extension,
    /// no excluded suffix
    pub fn is_eligible(&self, file_name: &str) -> bool {
        if !file_name.ends_with(DATA_FILE_EXT) {
            return false;
        }
        if self
            .excluded_suffixes
            .iter()
            .any(|suffix| file_name.ends_with(suffix.as_str()))
        {
            return false;
        }
        self.filename_tokens
            .iter()
            .any(|token| file_name.contains(token.as_str()))
    }

    /// Whether some instruction row's path token is contained in the path
    pub fn matches_instruction_path(&self, path: &str) -> bool {
        self.table.matches_path(path)
    }

    /// Channel-observation gate for direct-event files: the trailing `-N`
    /// channel must be flagged observable in some path-matching row, and
    /// the `hide` family additionally requires that row's trailing digit
    /// to equal the fixed sentinel. Other families pass.
    pub fn passes_channel_observation(&self, path: &str, file_name: &str) -> bool {
        let family = match constants::file_family(file_name) {
            Some(family) => family,
            None => return true,
        };
        if !constants::is_direct_event_family(family) {
            return true;
        }

        let channel = match self
            .channel_suffix
            .captures(file_name)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok())
        {
            Some(channel) => channel,
            None => {
                debug!("No channel suffix in direct-event file name: {}", file_name);
                return false;
            }
        };

        self.table.rows_matching_path(path).any(|row| {
            row.channel_enabled(channel)
                && (family != "hide" || row.trailing_digit == Some(HIDE_TRAILING_SENTINEL))
        })
    }

    /// Full per-record predicate: MET inside some path-matching row's
    /// window, and code membership when event filtering is enabled
    pub fn record_passes(&self, record: &Record, path: &str) -> bool {
        let in_window = self
            .table
            .rows_matching_path(path)
            .any(|row| row.contains_met(record.met));
        if !in_window {
            return false;
        }
        if self.event_filtering {
            return self.quality_set.contains(record.ty())
                && self.particle_set.contains(record.ch());
        }
        true
    }

    /// Read and filter one admitted file. With `per_line` set, line
    /// progress is reported and cancellation polled per record (table-sink
    /// runs); otherwise both happen only at file boundaries.
    pub fn filter_file(&self, path: &Path, ctx: &RunContext, per_line: bool) -> Result<FileOutcome> {
        let path_str = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("Failed to read '{}'", path.display()), e))?;

        let lines: Vec<&str> = content.lines().collect();
        let total = lines.len();
        let mut outcome = FileOutcome::default();

        for (index, &line) in lines.iter().enumerate() {
            if per_line {
                ctx.check_interrupted()?;
                ctx.report(
                    ProgressStage::Lines,
                    (index + 1) as u64,
                    total as u64,
                    &format!("Filtering records: {}", path.display()),
                );
            }
            outcome.lines_scanned += 1;

            if line.trim().is_empty() {
                continue;
            }

            match parse_record(line) {
                Some(record) => {
                    if self.record_passes(&record, &path_str) {
                        outcome.records.push(record);
                    }
                }
                None => {
                    outcome.lines_skipped += 1;
                    warn!(
                        "Skipping malformed record at {}:{}",
                        path.display(),
                        index + 1
                    );
                }
            }
        }

        Ok(outcome)
    }
}

/// Parse one data line into a record: exactly 11 whitespace-delimited
/// fields with a float MET, or nothing
pub fn parse_record(line: &str) -> Option<Record> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != RECORD_FIELD_COUNT {
        return None;
    }
    let met: f64 = tokens[0].parse().ok()?;
    Some(Record::new(
        met,
        tokens.iter().map(|token| token.to_string()).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{InstructionRow, InstructionVariant};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn lo_row(path_token: &str, start: f64, end: f64, flags: [bool; 8]) -> InstructionRow {
        InstructionRow {
            path_token: path_token.to_string(),
            start_time: start,
            end_time: end,
            phase_start: 0,
            phase_end: 359,
            channel_flags: flags.to_vec(),
            trailing_digit: None,
        }
    }

    fn hi_row(
        path_token: &str,
        start: f64,
        end: f64,
        flags: [bool; 6],
        trailing: char,
    ) -> InstructionRow {
        InstructionRow {
            path_token: path_token.to_string(),
            start_time: start,
            end_time: end,
            phase_start: 0,
            phase_end: 359,
            channel_flags: flags.to_vec(),
            trailing_digit: Some(trailing),
        }
    }

    fn codes(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn lo_fixture() -> (InstructionTable, BTreeSet<String>, BTreeSet<String>, Vec<String>) {
        let table = InstructionTable::from_rows(
            InstructionVariant::Lo,
            vec![lo_row(
                "2010A",
                50.0,
                150.0,
                [true, false, true, false, false, false, false, false],
            )],
        );
        let quality = codes(&["40", "43"]);
        let particle = codes(&["21", "23"]);
        let tokens = vec!["lode".to_string()];
        (table, quality, particle, tokens)
    }

    #[test]
    fn test_file_name_eligibility() {
        let (table, quality, particle, tokens) = lo_fixture();
        let filter = RecordFilter::new(&table, &quality, &particle, &tokens, ".attdba", true);

        assert!(filter.is_eligible("ibex_lode-1.txt"));
        assert!(!filter.is_eligible("ibex_hide-1.txt"));
        assert!(!filter.is_eligible("ibex_lode-1.dat"));
        assert!(!filter.is_eligible("ibex_lode-hdr.txt"));
        assert!(!filter.is_eligible("ibex_lode-times.txt"));
        assert!(!filter.is_eligible("quaternion.attdba"));
    }

    #[test]
    fn test_channel_observation_lode() {
        let (table, quality, particle, tokens) = lo_fixture();
        let filter = RecordFilter::new(&table, &quality, &particle, &tokens, ".attdba", true);

        // Channels 1 and 3 are flagged in the fixture row
        assert!(filter.passes_channel_observation("/arc/2010A/ibex_lode-1.txt", "ibex_lode-1.txt"));
        assert!(filter.passes_channel_observation("/arc/2010A/ibex_lode-3.txt", "ibex_lode-3.txt"));
        assert!(!filter.passes_channel_observation("/arc/2010A/ibex_lode-2.txt", "ibex_lode-2.txt"));
        // No path-matching row at all
        assert!(!filter.passes_channel_observation("/arc/2011A/ibex_lode-1.txt", "ibex_lode-1.txt"));
    }

    #[test]
    fn test_channel_observation_hide_sentinel() {
        let quality = codes(&["0A"]);
        let particle = codes(&["11"]);
        let tokens = vec!["hide".to_string()];

        let with_sentinel = InstructionTable::from_rows(
            InstructionVariant::Hi,
            vec![hi_row("2009A", 0.0, 100.0, [true; 6], '1')],
        );
        let filter =
            RecordFilter::new(&with_sentinel, &quality, &particle, &tokens, ".attdba", true);
        assert!(filter.passes_channel_observation("/arc/2009A/ibex_hide-1.txt", "ibex_hide-1.txt"));

        let without_sentinel = InstructionTable::from_rows(
            InstructionVariant::Hi,
            vec![hi_row("2009A", 0.0, 100.0, [true; 6], '2')],
        );
        let filter = RecordFilter::new(
            &without_sentinel,
            &quality,
            &particle,
            &tokens,
            ".attdba",
            true,
        );
        assert!(!filter.passes_channel_observation("/arc/2009A/ibex_hide-1.txt", "ibex_hide-1.txt"));
    }

    #[test]
    fn test_histogram_families_skip_channel_check() {
        let (table, quality, particle, _) = lo_fixture();
        let tokens = vec!["lohb".to_string()];
        let filter = RecordFilter::new(&table, &quality, &particle, &tokens, ".attdba", true);

        assert!(filter.passes_channel_observation("/arc/2010A/ibex_lohb-9.txt", "ibex_lohb-9.txt"));
    }

    #[test]
    fn test_record_predicate_requires_window_and_codes() {
        let (table, quality, particle, tokens) = lo_fixture();
        let filter = RecordFilter::new(&table, &quality, &particle, &tokens, ".attdba", true);
        let path = "/arc/2010A/ibex_lode-1.txt";

        let record = parse_record("100.0 1.0 2.0 21 40 3 0 5 0.1 0.2 0.3").unwrap();
        assert!(filter.record_passes(&record, path));

        // Outside the window
        let record = parse_record("300.0 1.0 2.0 21 40 3 0 5 0.1 0.2 0.3").unwrap();
        assert!(!filter.record_passes(&record, path));

        // ty outside the quality set
        let record = parse_record("100.0 1.0 2.0 21 4E 3 0 5 0.1 0.2 0.3").unwrap();
        assert!(!filter.record_passes(&record, path));

        // ch outside the particle set
        let record = parse_record("100.0 1.0 2.0 45 40 3 0 5 0.1 0.2 0.3").unwrap();
        assert!(!filter.record_passes(&record, path));
    }

    #[test]
    fn test_time_window_only_mode_ignores_codes() {
        let (table, quality, particle, tokens) = lo_fixture();
        let filter = RecordFilter::new(&table, &quality, &particle, &tokens, ".attdba", false);
        let path = "/arc/2010A/ibex_lode-1.txt";

        let record = parse_record("100.0 1.0 2.0 99 FF 3 0 5 0.1 0.2 0.3").unwrap();
        assert!(filter.record_passes(&record, path));

        let record = parse_record("200.0 1.0 2.0 99 FF 3 0 5 0.1 0.2 0.3").unwrap();
        assert!(!filter.record_passes(&record, path));
    }

    #[test]
    fn test_filter_file_skips_malformed_rows() {
        let (table, quality, particle, tokens) = lo_fixture();
        let filter = RecordFilter::new(&table, &quality, &particle, &tokens, ".attdba", true);

        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("2010A");
        std::fs::create_dir(&sub).unwrap();
        let file = sub.join("ibex_lode-1.txt");
        std::fs::write(
            &file,
            "100.0 1.0 2.0 21 40 3 0 5 0.1 0.2 0.3\n\
             short line\n\
             notamet 1.0 2.0 21 40 3 0 5 0.1 0.2 0.3\n\
             120.0 1.0 2.0 23 43 3 0 5 0.1 0.2 0.3\n",
        )
        .unwrap();

        let ctx = RunContext::detached();
        let outcome = filter.filter_file(&file, &ctx, true).unwrap();
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.lines_scanned, 4);
        assert_eq!(outcome.lines_skipped, 2);
    }

    #[test]
    fn test_parse_record_shapes() {
        assert!(parse_record("100.0 1 2 21 40 3 0 5 1 2 3").is_some());
        assert!(parse_record("100.0 1 2 21 40 3 0 5 1 2").is_none());
        assert!(parse_record("x 1 2 21 40 3 0 5 1 2 3").is_none());
        assert!(parse_record("").is_none());
    }
}
