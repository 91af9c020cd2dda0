//! Sorting pipeline orchestration.
//!
//! Drives the outer loop over archive directories and the inner loop over
//! their files, feeding filtered records into the table sink (one insert
//! per file batch) or the batch accumulator and tensor sink (byte-bounded
//! flushes per grouping unit). The pipeline is one logical worker: no
//! internal parallelism, blocking I/O, and the cancellation token as the
//! only cross-thread state.

use crate::app::models::ArchiveDirectory;
use crate::app::progress::{ProgressStage, RunContext};
use crate::app::services::archive_walker;
use crate::app::services::batch_accumulator::BatchAccumulator;
use crate::app::services::condition_sets::{
    self, ParticleEventSet, QualityConditionSet,
};
use crate::app::services::instruction_table::InstructionTable;
use crate::app::services::record_filter::RecordFilter;
use crate::app::services::table_sink::TableSink;
use crate::app::services::tensor_sink::{self, TensorSink};
use crate::app::services::timing_log::TimingLog;
use crate::config::{GroupingPolicy, HexPolicy, SelectionConfig};
use crate::constants::{
    all_data_tensor_filename, half_year_tensor_filename, year_tensor_filename,
    BATCH_SIZE_LIMIT_BYTES, TIMING_LOG_FILENAME,
};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Terminal status strings surfaced through the progress boundary
pub const FINISHED_MESSAGE: &str = "Data processing finished!";
pub const STOPPED_MESSAGE: &str = "Data processing stopped!";

/// Statistics of a qualification-only scan
#[derive(Debug, Default)]
pub struct ScanStats {
    pub directories_scanned: usize,
    pub qualifying: Vec<ArchiveDirectory>,
}

/// Statistics of a table-sink run
#[derive(Debug, Default)]
pub struct SortStats {
    pub directories_processed: usize,
    pub files_processed: usize,
    pub records_inserted: usize,
    pub lines_skipped: usize,
    pub insert_failures: usize,
    pub files_failed: usize,
    /// The qualifying directories, for the paths report
    pub qualifying: Vec<ArchiveDirectory>,
}

/// Options of a tensor-sink run
#[derive(Debug, Clone)]
pub struct TensorOptions {
    pub output_dir: PathBuf,
    pub prefix: String,
    pub grouping: GroupingPolicy,
    pub hex_policy: HexPolicy,
    /// Accumulator flush threshold; the standard 2 GiB unless overridden
    pub batch_limit_bytes: u64,
}

impl TensorOptions {
    pub fn new(output_dir: PathBuf, prefix: String, grouping: GroupingPolicy, hex_policy: HexPolicy) -> Self {
        Self {
            output_dir,
            prefix,
            grouping,
            hex_policy,
            batch_limit_bytes: BATCH_SIZE_LIMIT_BYTES,
        }
    }
}

/// Statistics of a tensor-sink run
#[derive(Debug, Default)]
pub struct TensorStats {
    pub units_processed: usize,
    pub files_loaded: usize,
    pub rows_accumulated: usize,
    pub rows_skipped: usize,
    pub flushes: usize,
    pub files_failed: usize,
    /// Final row count per output file name
    pub outputs: BTreeMap<String, usize>,
}

/// One run's sorting pipeline: immutable instruction table and condition
/// sets built once from the selection
pub struct SortingPipeline {
    config: SelectionConfig,
    table: InstructionTable,
    quality_set: QualityConditionSet,
    particle_set: ParticleEventSet,
}

impl SortingPipeline {
    /// Build the pipeline: validates the selection and loads the
    /// instruction table. A missing instruction file fails here, before
    /// any traversal.
    pub fn new(config: SelectionConfig) -> Result<Self> {
        config.validate()?;

        let table = InstructionTable::load(&config.instruction_file, config.variant)?;
        let quality_set = condition_sets::build_quality_set(config.variant, &config.qualifiers);
        let channels = condition_sets::resolve_channels(config.variant, &config.channels);
        let particle_set =
            condition_sets::build_particle_event_set(config.variant, &channels, &config.species);

        info!(
            "Pipeline ready: {} instruction rows, {} quality codes, {} event codes",
            table.rows().len(),
            quality_set.len(),
            particle_set.len()
        );

        Ok(Self {
            config,
            table,
            quality_set,
            particle_set,
        })
    }

    fn filter(&self) -> RecordFilter<'_> {
        RecordFilter::new(
            &self.table,
            &self.quality_set,
            &self.particle_set,
            &self.config.file_tokens,
            &self.config.quaternion_ext,
            self.config.event_filtering,
        )
    }

    /// Table-sink run: filtered records of each file are inserted as one
    /// transaction; insert failures are logged and the run continues.
    pub fn run_table(&self, root: &Path, database: &Path, ctx: &RunContext) -> Result<SortStats> {
        let directories = archive_walker::scan(
            root,
            &self.config.quaternion_ext,
            self.config.complement_ext(),
            ctx,
        )?;
        let qualifying: Vec<_> = directories
            .into_iter()
            .filter(|dir| dir.has_primary_companion)
            .collect();

        let mut sink = TableSink::open(database)?;
        let filter = self.filter();
        let mut stats = SortStats::default();

        let total_dirs = qualifying.len() as u64;
        for (dir_index, dir) in qualifying.iter().enumerate() {
            ctx.check_interrupted()?;
            ctx.report(
                ProgressStage::Directories,
                (dir_index + 1) as u64,
                total_dirs,
                &format!("Processing directory: {}", dir.path.display()),
            );

            let files = list_files(&dir.path)?;
            let total_files = files.len() as u64;
            for (file_index, file_path) in files.iter().enumerate() {
                ctx.check_interrupted()?;
                ctx.report(
                    ProgressStage::Files,
                    (file_index + 1) as u64,
                    total_files,
                    &format!("Loading file: {}", file_path.display()),
                );

                if !self.file_admitted(&filter, file_path) {
                    continue;
                }

                let outcome = match filter.filter_file(file_path, ctx, true) {
                    Ok(outcome) => outcome,
                    Err(Error::Interrupted { reason }) => {
                        return Err(Error::Interrupted { reason })
                    }
                    Err(error) => {
                        warn!("Failed to read '{}': {}", file_path.display(), error);
                        stats.files_failed += 1;
                        continue;
                    }
                };

                stats.files_processed += 1;
                stats.lines_skipped += outcome.lines_skipped;
                match sink.append(&outcome.records) {
                    Ok(inserted) => stats.records_inserted += inserted,
                    Err(error) => {
                        warn!(
                            "Insert failed for '{}', dropping the file's batch: {}",
                            file_path.display(),
                            error
                        );
                        stats.insert_failures += 1;
                    }
                }
            }
            stats.directories_processed += 1;
        }
        stats.qualifying = qualifying;

        ctx.finish(FINISHED_MESSAGE);
        Ok(stats)
    }

    /// Tensor-sink run: filtered records are packed into numeric rows and
    /// accumulated per grouping unit, flushing at the byte threshold and at
    /// the end of each unit.
    pub fn run_tensor(
        &self,
        root: &Path,
        options: &TensorOptions,
        ctx: &RunContext,
    ) -> Result<TensorStats> {
        std::fs::create_dir_all(&options.output_dir).map_err(|e| {
            Error::io(
                format!("Failed to create '{}'", options.output_dir.display()),
                e,
            )
        })?;

        let sink = TensorSink::new(&options.output_dir);
        let mut timing = TimingLog::new();
        let mut stats = TensorStats::default();

        let units = self.grouping_units(root, options)?;
        let total_units = units.len() as u64;

        for (unit_index, unit) in units.iter().enumerate() {
            ctx.check_interrupted()?;
            ctx.report(
                ProgressStage::Directories,
                (unit_index + 1) as u64,
                total_units,
                &format!("Processing {}", unit.label),
            );

            self.process_unit(unit, options, &sink, ctx, &mut timing, &mut stats)?;
            stats.units_processed += 1;
        }

        timing.save(&options.output_dir.join(TIMING_LOG_FILENAME))?;
        ctx.finish(FINISHED_MESSAGE);
        Ok(stats)
    }

    /// Process one grouping unit's directories into its output file
    fn process_unit(
        &self,
        unit: &GroupingUnit,
        options: &TensorOptions,
        sink: &TensorSink,
        ctx: &RunContext,
        timing: &mut TimingLog,
        stats: &mut TensorStats,
    ) -> Result<()> {
        let filter = self.filter();
        let mut accumulator = BatchAccumulator::with_limit(options.batch_limit_bytes);

        for dir_root in &unit.roots {
            let qualifying = archive_walker::qualifying(
                dir_root,
                &self.config.quaternion_ext,
                self.config.complement_ext(),
                ctx,
            )?;

            for dir in &qualifying {
                let files = list_files(&dir.path)?;
                let total_files = files.len() as u64;
                for (file_index, file_path) in files.iter().enumerate() {
                    ctx.check_interrupted()?;
                    ctx.report(
                        ProgressStage::Files,
                        (file_index + 1) as u64,
                        total_files,
                        &format!("Loading file: {}", file_path.display()),
                    );

                    if !self.file_admitted(&filter, file_path) {
                        continue;
                    }

                    let started = Instant::now();
                    let outcome = match filter.filter_file(file_path, ctx, false) {
                        Ok(outcome) => outcome,
                        Err(Error::Interrupted { reason }) => {
                            return Err(Error::Interrupted { reason })
                        }
                        Err(error) => {
                            warn!("Failed to read '{}': {}", file_path.display(), error);
                            stats.files_failed += 1;
                            continue;
                        }
                    };

                    let mut pushed = 0usize;
                    for record in &outcome.records {
                        match tensor_sink::to_numeric_row(record, options.hex_policy) {
                            Some(row) => {
                                accumulator.push(row);
                                pushed += 1;
                            }
                            None => {
                                stats.rows_skipped += 1;
                                warn!(
                                    "Skipping non-numeric record in '{}'",
                                    file_path.display()
                                );
                            }
                        }
                    }

                    timing.record(file_path, started.elapsed(), pushed);
                    stats.files_loaded += 1;
                    stats.rows_accumulated += pushed;

                    if accumulator.is_full() {
                        let total = sink.flush(&unit.output_name, &accumulator.take())?;
                        stats.flushes += 1;
                        stats.outputs.insert(unit.output_name.clone(), total);
                    }
                }
            }
        }

        // Residual rows below the threshold are flushed at the unit
        // boundary, never dropped
        if !accumulator.is_empty() {
            let total = sink.flush(&unit.output_name, &accumulator.take())?;
            stats.flushes += 1;
            stats.outputs.insert(unit.output_name.clone(), total);
        }

        Ok(())
    }

    /// Shared per-file gate: name eligibility, instruction path match,
    /// channel observation
    fn file_admitted(&self, filter: &RecordFilter<'_>, file_path: &Path) -> bool {
        let Some(name) = file_path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            return false;
        };
        if !filter.is_eligible(&name) {
            return false;
        }
        let path_str = file_path.to_string_lossy();
        if !filter.matches_instruction_path(&path_str) {
            debug!("No instruction path token matches '{}'", path_str);
            return false;
        }
        if !filter.passes_channel_observation(&path_str, &name) {
            debug!("Channel observation check failed for '{}'", path_str);
            return false;
        }
        true
    }

    /// Resolve the grouping policy into ordered units of subtree roots and
    /// their output names
    fn grouping_units(&self, root: &Path, options: &TensorOptions) -> Result<Vec<GroupingUnit>> {
        let units = match options.grouping {
            GroupingPolicy::HalfYear => top_level_directories(root)?
                .into_iter()
                .map(|dir| {
                    let label = dir_name(&dir);
                    GroupingUnit {
                        label: format!("half year directory: {}", dir.display()),
                        output_name: half_year_tensor_filename(&options.prefix, &label),
                        roots: vec![dir],
                    }
                })
                .collect(),
            GroupingPolicy::Year => {
                let mut years: Vec<String> = top_level_directories(root)?
                    .iter()
                    .map(|dir| year_label(&dir_name(dir)))
                    .collect();
                years.sort();
                years.dedup();

                years
                    .into_iter()
                    .map(|year| {
                        // Both half-period suffixes are probed explicitly
                        let roots: Vec<PathBuf> = ["A", "B"]
                            .iter()
                            .map(|half| root.join(format!("{}{}", year, half)))
                            .filter(|path| path.is_dir())
                            .collect();
                        GroupingUnit {
                            label: format!("year directory: {}", year),
                            output_name: year_tensor_filename(&options.prefix, &year),
                            roots,
                        }
                    })
                    .collect()
            }
            GroupingPolicy::All => vec![GroupingUnit {
                label: "all data".to_string(),
                output_name: all_data_tensor_filename(&options.prefix),
                roots: vec![root.to_path_buf()],
            }],
        };
        Ok(units)
    }

    /// Write the qualifying-paths report: one indexed line per directory
    /// with its double-observation flag
    pub fn save_paths_report(path: &Path, directories: &[ArchiveDirectory]) -> Result<()> {
        let mut file = std::fs::File::create(path)
            .map_err(|e| Error::io(format!("Failed to create '{}'", path.display()), e))?;
        for (index, dir) in directories.iter().enumerate() {
            writeln!(
                file,
                "{}: {} (double observation: {})",
                index,
                dir.path.display(),
                dir.double_observation
            )?;
        }
        info!(
            "Saved {} qualifying paths to {}",
            directories.len(),
            path.display()
        );
        Ok(())
    }
}

/// Qualification-only pass over the archive tree, reporting per-directory
/// progress; needs no instruction table
pub fn scan_archive(root: &Path, primary_ext: &str, ctx: &RunContext) -> Result<ScanStats> {
    let directories =
        archive_walker::scan(root, primary_ext, crate::constants::complement_extension(primary_ext), ctx)?;

    let stats = ScanStats {
        directories_scanned: directories.len(),
        qualifying: directories
            .into_iter()
            .filter(|dir| dir.has_primary_companion)
            .collect(),
    };

    ctx.finish(FINISHED_MESSAGE);
    Ok(stats)
}

/// One tensor grouping unit: the subtree roots feeding one output file
#[derive(Debug)]
struct GroupingUnit {
    label: String,
    output_name: String,
    roots: Vec<PathBuf>,
}

/// Files of one directory, in directory-listing order
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    Ok(files)
}

/// Immediate subdirectories of the archive root, sorted for determinism
fn top_level_directories(root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Year label of a half-year directory name: its 4-character prefix
fn year_label(name: &str) -> String {
    name.chars().take(4).collect()
}
