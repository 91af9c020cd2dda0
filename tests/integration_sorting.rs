//! Integration tests for the table-sink sorting pipeline
//!
//! These tests build small archive trees in temporary directories and run
//! the full qualification, filtering and sinking flow end to end.

use ena_sorter::app::models::{DoubleObservation, InstructionVariant};
use ena_sorter::app::progress::{NullProgress, RunContext};
use ena_sorter::config::SelectionConfig;
use ena_sorter::pipeline::{self, SortingPipeline};
use ena_sorter::Error;
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Build a Lo-variant archive: one instruction file and one qualifying
/// half-year directory with a direct-event data file
fn build_lo_archive(root: &Path) -> PathBuf {
    let instruction = root.join("LoGoodTimes.txt");
    fs::write(
        &instruction,
        "2009 50.0 150.0 0 359 1 0 1 0 0 0 0 0\n",
    )
    .unwrap();

    let orbit = root.join("archive").join("2009A").join("orbit1");
    fs::create_dir_all(&orbit).unwrap();
    fs::write(orbit.join("quaternion.attdba"), "q").unwrap();
    fs::write(
        orbit.join("ibex_lode-1.txt"),
        // In window with matching codes; out of window; wrong quality code
        "100.0 1.0 2.0 21 40 5 7 120 0.1 0.2 0.3\n\
         300.0 1.0 2.0 21 40 5 7 120 0.1 0.2 0.3\n\
         110.0 1.0 2.0 21 ZZ 5 7 120 0.1 0.2 0.3\n",
    )
    .unwrap();

    instruction
}

fn lo_config(instruction: PathBuf) -> SelectionConfig {
    SelectionConfig {
        variant: InstructionVariant::Lo,
        instruction_file: instruction,
        quaternion_ext: ".attdba".to_string(),
        qualifiers: BTreeSet::new(),
        channels: vec!["All".to_string()],
        species: ["Hydrogen".to_string()].into_iter().collect(),
        file_tokens: vec!["lode".to_string()],
        event_filtering: true,
    }
}

fn row_count(database: &Path) -> usize {
    let conn = Connection::open(database).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM data", [], |row| row.get(0))
        .unwrap();
    count as usize
}

/// Full sort run over a qualifying directory
///
/// Purpose: validate the end-to-end predicate chain against a real tree
/// Benefit: catches wiring mistakes between walker, filter and sink
#[test]
fn test_sort_run_inserts_matching_records() {
    let temp = TempDir::new().unwrap();
    let instruction = build_lo_archive(temp.path());
    let database = temp.path().join("out.db");

    let sorter = SortingPipeline::new(lo_config(instruction)).unwrap();
    let ctx = RunContext::detached();
    let stats = sorter
        .run_table(&temp.path().join("archive"), &database, &ctx)
        .unwrap();

    // Only the in-window record with codes in both condition sets survives
    assert_eq!(stats.records_inserted, 1);
    assert_eq!(stats.files_processed, 1);
    assert_eq!(stats.directories_processed, 1);
    assert_eq!(stats.insert_failures, 0);
    assert_eq!(row_count(&database), 1);

    let conn = Connection::open(&database).unwrap();
    let (met, ch, ty): (String, String, String) = conn
        .query_row("SELECT met, ch, ty FROM data", [], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .unwrap();
    assert_eq!(met, "100.0");
    assert_eq!(ch, "21");
    assert_eq!(ty, "40");
}

/// A complementary quaternion marker disqualifies the directory
#[test]
fn test_complement_marker_yields_no_records() {
    let temp = TempDir::new().unwrap();
    let instruction = build_lo_archive(temp.path());
    fs::write(
        temp.path()
            .join("archive")
            .join("2009A")
            .join("orbit1")
            .join("other.attd2a"),
        "q",
    )
    .unwrap();
    let database = temp.path().join("out.db");

    let sorter = SortingPipeline::new(lo_config(instruction)).unwrap();
    let ctx = RunContext::detached();
    let stats = sorter
        .run_table(&temp.path().join("archive"), &database, &ctx)
        .unwrap();

    assert_eq!(stats.directories_processed, 0);
    assert_eq!(stats.records_inserted, 0);
    assert_eq!(row_count(&database), 0);
}

/// Channel flags gate direct-event files by their trailing channel number
#[test]
fn test_disabled_channel_file_is_skipped() {
    let temp = TempDir::new().unwrap();
    let instruction = build_lo_archive(temp.path());
    let orbit = temp.path().join("archive").join("2009A").join("orbit1");
    // Channel 2 is not flagged in the instruction row
    fs::write(
        orbit.join("ibex_lode-2.txt"),
        "100.0 1.0 2.0 22 40 5 7 120 0.1 0.2 0.3\n",
    )
    .unwrap();
    let database = temp.path().join("out.db");

    let sorter = SortingPipeline::new(lo_config(instruction)).unwrap();
    let ctx = RunContext::detached();
    let stats = sorter
        .run_table(&temp.path().join("archive"), &database, &ctx)
        .unwrap();

    // Only the channel-1 file contributes
    assert_eq!(stats.files_processed, 1);
    assert_eq!(stats.records_inserted, 1);
}

/// Malformed data rows are skipped without aborting the file
#[test]
fn test_malformed_rows_are_skipped_not_fatal() {
    let temp = TempDir::new().unwrap();
    let instruction = build_lo_archive(temp.path());
    let orbit = temp.path().join("archive").join("2009A").join("orbit1");
    fs::write(
        orbit.join("ibex_lode-1.txt"),
        "not a record\n\
         100.0 1.0 2.0 21 40 5 7 120 0.1 0.2 0.3\n\
         nan-met 1.0 2.0 21 40 5 7 120 0.1 0.2 0.3\n",
    )
    .unwrap();
    let database = temp.path().join("out.db");

    let sorter = SortingPipeline::new(lo_config(instruction)).unwrap();
    let ctx = RunContext::detached();
    let stats = sorter
        .run_table(&temp.path().join("archive"), &database, &ctx)
        .unwrap();

    assert_eq!(stats.records_inserted, 1);
    assert_eq!(stats.lines_skipped, 2);
    assert_eq!(stats.files_failed, 0);
}

/// Insert failures are logged and the run continues with the next file
#[test]
fn test_failing_insert_does_not_abort_the_run() {
    let temp = TempDir::new().unwrap();
    let instruction = build_lo_archive(temp.path());
    let database = temp.path().join("out.db");

    // A pre-existing `data` table with an incompatible shape makes every
    // insert fail while the schema setup still succeeds
    let conn = Connection::open(&database).unwrap();
    conn.execute("CREATE TABLE data (met TEXT)", []).unwrap();
    drop(conn);

    let sorter = SortingPipeline::new(lo_config(instruction)).unwrap();
    let ctx = RunContext::detached();
    let stats = sorter
        .run_table(&temp.path().join("archive"), &database, &ctx)
        .unwrap();

    assert_eq!(stats.files_processed, 1);
    assert_eq!(stats.insert_failures, 1);
    assert_eq!(stats.records_inserted, 0);
    assert_eq!(stats.directories_processed, 1);
}

/// A missing instruction file aborts the run before any traversal
#[test]
fn test_missing_instruction_file_is_fatal() {
    let temp = TempDir::new().unwrap();
    build_lo_archive(temp.path());

    let mut config = lo_config(temp.path().join("absent.txt"));
    config.instruction_file = temp.path().join("absent.txt");

    let result = SortingPipeline::new(config);
    assert!(matches!(result, Err(Error::InstructionNotFound { .. })));
}

/// Cancellation halts at the next boundary; committed writes are retained
#[test]
fn test_cancelled_run_is_interrupted() {
    let temp = TempDir::new().unwrap();
    let instruction = build_lo_archive(temp.path());
    let database = temp.path().join("out.db");

    let token = CancellationToken::new();
    token.cancel();
    let ctx = RunContext::new(token, Arc::new(NullProgress));

    let sorter = SortingPipeline::new(lo_config(instruction)).unwrap();
    let result = sorter.run_table(&temp.path().join("archive"), &database, &ctx);

    assert!(matches!(result, Err(Error::Interrupted { .. })));
}

/// Scan reports qualification and double observation per directory
#[test]
fn test_scan_reports_qualifying_directories() {
    let temp = TempDir::new().unwrap();
    build_lo_archive(temp.path());
    let orbit = temp.path().join("archive").join("2009A").join("orbit1");
    // Companion histogram pair deep enough to exercise the subtree search
    let deep = orbit.join("histograms");
    fs::create_dir_all(&deep).unwrap();
    fs::write(deep.join("ibex_hihb-2.txt"), vec![b'x'; 1000]).unwrap();
    fs::write(deep.join("ibex_hihb-3.txt"), vec![b'x'; 1900]).unwrap();

    let ctx = RunContext::detached();
    let stats = pipeline::scan_archive(&temp.path().join("archive"), ".attdba", &ctx).unwrap();

    assert_eq!(stats.qualifying.len(), 1);
    assert_eq!(
        stats.qualifying[0].double_observation,
        DoubleObservation::Yes
    );

    let report = temp.path().join("paths.txt");
    SortingPipeline::save_paths_report(&report, &stats.qualifying).unwrap();
    let content = fs::read_to_string(&report).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("0: "));
    assert!(lines[0].contains("orbit1"));
    assert!(lines[0].ends_with("(double observation: Yes)"));
}

/// Time-window-only mode admits records regardless of their codes
#[test]
fn test_time_window_only_mode() {
    let temp = TempDir::new().unwrap();
    let instruction = build_lo_archive(temp.path());
    let database = temp.path().join("out.db");

    let mut config = lo_config(instruction);
    config.event_filtering = false;

    let sorter = SortingPipeline::new(config).unwrap();
    let ctx = RunContext::detached();
    let stats = sorter
        .run_table(&temp.path().join("archive"), &database, &ctx)
        .unwrap();

    // Both in-window records pass, including the one with the unknown
    // quality code; the out-of-window record still fails
    assert_eq!(stats.records_inserted, 2);
}
