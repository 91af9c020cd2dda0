use clap::Parser;
use ena_sorter::cli::{args::Args, commands};
use std::process;
use tokio_util::sync::CancellationToken;

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // If no subcommand was provided, show help and available commands
    if args.command.is_none() {
        show_help_and_commands();
        process::exit(0);
    }

    // Create async runtime and run the main command logic with signal handling
    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        // Cancellation token shared between the Ctrl+C watcher and the
        // sorting worker; cancellation is cooperative, so the worker stops
        // at its next directory/file boundary
        let cancellation_token = CancellationToken::new();

        let watcher_token = cancellation_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nReceived CTRL+C, stopping at the next boundary...");
                watcher_token.cancel();
            }
        });

        commands::run(args, cancellation_token).await
    });

    match result {
        Ok(()) => {
            // Success - stats have already been reported by the command
            process::exit(0);
        }
        Err(error) => {
            // Error occurred - print to stderr and exit with error code
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("ENA Sorter - Instrument Telemetry Archive Filter");
    println!("================================================");
    println!();
    println!("Filter ENA instrument telemetry archives against good-times instructions");
    println!("and sink matching records into a SQLite table or numeric tensor files.");
    println!();
    println!("USAGE:");
    println!("    ena-sorter <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    sort        Filter records into a SQLite table (main command)");
    println!("    tensor      Accumulate filtered records into batched tensor files");
    println!("    scan        Report qualifying directories without sinking records");
    println!("    help        Show this help message or help for specific commands");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Show help information");
    println!("    -V, --version    Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    # Sort an archive into a database with the Hi instruction file:");
    println!("    ena-sorter sort --input /data/archive --database ena.db \\");
    println!("                    --variant hi --qualifiers Q-ABC --channels All");
    println!();
    println!("    # Build per-year tensor files from Lo direct events:");
    println!("    ena-sorter tensor --input /data/archive --output ./tensors \\");
    println!("                      --variant lo --file-types lode --grouping year");
    println!();
    println!("    # List qualifying directories and their double-observation flags:");
    println!("    ena-sorter scan --input /data/archive --paths-report paths.txt");
    println!();
    println!("For detailed help on any command, use:");
    println!("    ena-sorter <COMMAND> --help");
}
