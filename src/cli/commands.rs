//! Command implementations for the ENA archive sorter CLI
//!
//! This module contains the command execution logic: logging setup,
//! pipeline construction, progress wiring, summary reporting, and the
//! mapping of cooperative cancellation onto the terminal status message.

use crate::app::progress::{ConsoleProgress, NullProgress, ProgressSink, RunContext};
use crate::cli::args::{Args, Commands, ScanArgs, SortArgs, TensorArgs};
use crate::pipeline::{
    self, SortingPipeline, TensorOptions, FINISHED_MESSAGE, STOPPED_MESSAGE,
};
use crate::{Error, Result};
use colored::*;
use indicatif::HumanDuration;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Main command dispatcher
pub async fn run(args: Args, token: CancellationToken) -> Result<()> {
    match args.command {
        Some(Commands::Sort(args)) => run_sort(args, token).await,
        Some(Commands::Tensor(args)) => run_tensor(args, token).await,
        Some(Commands::Scan(args)) => run_scan(args, token).await,
        None => Err(Error::configuration("No command specified".to_string())),
    }
}

/// Set up structured logging from the verbosity flags
fn setup_logging(log_level: &str, quiet: bool) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ena_sorter={}", log_level)));

    if quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

fn progress_sink(show_progress: bool, with_lines: bool) -> Arc<dyn ProgressSink> {
    if show_progress {
        Arc::new(ConsoleProgress::new(with_lines))
    } else {
        Arc::new(NullProgress)
    }
}

/// Run the sort command: filter records into a SQLite table
async fn run_sort(args: SortArgs, token: CancellationToken) -> Result<()> {
    let start_time = Instant::now();
    setup_logging(args.logging.get_log_level(), args.logging.quiet)?;
    args.validate()?;

    let config = args.selection.resolve()?;
    info!("Starting table-sink sorting run");

    println!("{}", "Starting archive sorting".bright_green().bold());
    println!(
        "  {} {}",
        "Archive:".bright_cyan(),
        args.input_path.display()
    );
    println!(
        "  {} {}",
        "Database:".bright_cyan(),
        args.database.display()
    );
    println!(
        "  {} {} ({})",
        "Instruction:".bright_cyan(),
        config.instruction_file.display(),
        config.variant
    );

    // A missing instruction file fails here, before any traversal
    let sorter = SortingPipeline::new(config)?;
    let ctx = RunContext::new(token, progress_sink(args.logging.show_progress(), true));

    let root = args.input_path.clone();
    let database = args.database.clone();
    let worker_ctx = ctx.clone();
    let result = tokio::task::spawn_blocking(move || {
        sorter.run_table(&root, &database, &worker_ctx)
    })
    .await
    .map_err(|e| Error::configuration(format!("Worker task failed: {}", e)))?;

    let stats = match result {
        Ok(stats) => stats,
        Err(Error::Interrupted { .. }) => {
            ctx.finish(STOPPED_MESSAGE);
            println!("\n{}", STOPPED_MESSAGE.bright_yellow().bold());
            return Ok(());
        }
        Err(error) => return Err(error),
    };

    if let Some(report_path) = &args.paths_report {
        SortingPipeline::save_paths_report(report_path, &stats.qualifying)?;
    }

    println!("\n{}", "Sorting Summary".bright_green().bold());
    println!(
        "  {} {}",
        "Time elapsed:".bright_cyan(),
        HumanDuration(start_time.elapsed())
    );
    println!(
        "  {} {}",
        "Directories processed:".bright_cyan(),
        stats.directories_processed.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Files processed:".bright_cyan(),
        stats.files_processed.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Records inserted:".bright_cyan(),
        stats.records_inserted.to_string().bright_white().bold()
    );
    if stats.lines_skipped > 0 {
        println!(
            "  {} {}",
            "Malformed lines skipped:".bright_yellow(),
            stats.lines_skipped.to_string().bright_yellow()
        );
    }
    if stats.insert_failures > 0 || stats.files_failed > 0 {
        println!(
            "  {} {} inserts, {} files",
            "Failures:".bright_red(),
            stats.insert_failures.to_string().bright_red().bold(),
            stats.files_failed.to_string().bright_red().bold()
        );
    }
    println!("\n{}", FINISHED_MESSAGE.bright_green());

    Ok(())
}

/// Run the tensor command: accumulate filtered records into batched
/// Parquet tensor files
async fn run_tensor(args: TensorArgs, token: CancellationToken) -> Result<()> {
    let start_time = Instant::now();
    setup_logging(args.logging.get_log_level(), args.logging.quiet)?;
    args.validate()?;

    let config = args.selection.resolve()?;
    info!("Starting tensor-sink sorting run");

    println!("{}", "Starting tensor creation".bright_green().bold());
    println!(
        "  {} {}",
        "Archive:".bright_cyan(),
        args.input_path.display()
    );
    println!(
        "  {} {}",
        "Output:".bright_cyan(),
        args.output_dir.display()
    );
    println!(
        "  {} {:?} / {:?}",
        "Grouping / hex:".bright_cyan(),
        args.grouping,
        args.hex_policy
    );

    let mut options = TensorOptions::new(
        args.output_dir.clone(),
        args.prefix.clone(),
        args.grouping,
        args.hex_policy,
    );
    options.batch_limit_bytes = args.batch_limit_bytes();

    let sorter = SortingPipeline::new(config)?;
    let ctx = RunContext::new(token, progress_sink(args.logging.show_progress(), false));

    let root = args.input_path.clone();
    let worker_ctx = ctx.clone();
    let result = tokio::task::spawn_blocking(move || {
        sorter.run_tensor(&root, &options, &worker_ctx)
    })
    .await
    .map_err(|e| Error::configuration(format!("Worker task failed: {}", e)))?;

    let stats = match result {
        Ok(stats) => stats,
        Err(Error::Interrupted { .. }) => {
            ctx.finish(STOPPED_MESSAGE);
            println!("\n{}", STOPPED_MESSAGE.bright_yellow().bold());
            return Ok(());
        }
        Err(error) => return Err(error),
    };

    println!("\n{}", "Tensor Summary".bright_green().bold());
    println!(
        "  {} {}",
        "Time elapsed:".bright_cyan(),
        HumanDuration(start_time.elapsed())
    );
    println!(
        "  {} {}",
        "Units processed:".bright_cyan(),
        stats.units_processed.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Files loaded:".bright_cyan(),
        stats.files_loaded.to_string().bright_white()
    );
    println!(
        "  {} {} rows in {} flushes",
        "Accumulated:".bright_cyan(),
        stats.rows_accumulated.to_string().bright_white().bold(),
        stats.flushes.to_string().bright_white()
    );
    if stats.rows_skipped > 0 {
        println!(
            "  {} {}",
            "Non-numeric rows skipped:".bright_yellow(),
            stats.rows_skipped.to_string().bright_yellow()
        );
    }
    for (name, rows) in &stats.outputs {
        println!(
            "  {} {} ({} rows)",
            "Output:".bright_cyan(),
            name.bright_white(),
            rows
        );
    }
    println!("\n{}", FINISHED_MESSAGE.bright_green());

    Ok(())
}

/// Run the scan command: report qualifying directories and their
/// double-observation flags
async fn run_scan(args: ScanArgs, token: CancellationToken) -> Result<()> {
    let start_time = Instant::now();
    setup_logging(args.logging.get_log_level(), args.logging.quiet)?;
    args.validate()?;

    println!("{}", "Scanning archive".bright_green().bold());
    println!(
        "  {} {}",
        "Archive:".bright_cyan(),
        args.input_path.display()
    );

    let ctx = RunContext::new(token, progress_sink(args.logging.show_progress(), false));
    let root = args.input_path.clone();
    let quaternion_ext = args.quaternion_ext.clone();
    let worker_ctx = ctx.clone();
    let result = tokio::task::spawn_blocking(move || {
        pipeline::scan_archive(&root, &quaternion_ext, &worker_ctx)
    })
    .await
    .map_err(|e| Error::configuration(format!("Worker task failed: {}", e)))?;

    let stats = match result {
        Ok(stats) => stats,
        Err(Error::Interrupted { .. }) => {
            ctx.finish(STOPPED_MESSAGE);
            println!("\n{}", STOPPED_MESSAGE.bright_yellow().bold());
            return Ok(());
        }
        Err(error) => return Err(error),
    };

    if let Some(report_path) = &args.paths_report {
        SortingPipeline::save_paths_report(report_path, &stats.qualifying)?;
    }

    println!("\n{}", "Scan Summary".bright_green().bold());
    println!(
        "  {} {}",
        "Time elapsed:".bright_cyan(),
        HumanDuration(start_time.elapsed())
    );
    println!(
        "  {} {}",
        "Directories scanned:".bright_cyan(),
        stats.directories_scanned.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Qualifying:".bright_cyan(),
        stats.qualifying.len().to_string().bright_white().bold()
    );
    for dir in &stats.qualifying {
        println!(
            "    {} (double observation: {})",
            dir.path.display(),
            dir.double_observation
        );
    }
    println!("\n{}", FINISHED_MESSAGE.bright_green());

    Ok(())
}
