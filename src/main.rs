/// Main entry point for the habit-sync command line
///
/// This file sets up logging, parses command line arguments, opens a
/// tracker session (rolling over if a new day started), runs one command
/// and flushes the result to storage before exiting.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use habit_sync::commands::{self, Command};
use habit_sync::config::{default_data_dir, BackendKind, TrackerConfig};
use habit_sync::HabitTracker;

/// Command line arguments for habit-sync
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the habit list and the rollover marker
    /// If not provided, uses a default location in the user's home directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Storage backend for the habit list
    #[arg(long, value_enum, default_value_t = BackendKind::Json)]
    backend: BackendKind,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output (implies debug)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Set up logging based on command line flags
    let log_level = if args.verbose {
        "debug"
    } else if args.debug {
        "info"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("habit_sync={}", log_level))
        .with_writer(std::io::stderr) // Send logs to stderr, not stdout
        .init();

    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    let config = TrackerConfig::new(data_dir, args.backend);
    info!("Using data directory: {}", config.data_dir.display());

    let tracker = HabitTracker::open(&config).await?;
    let command = args.command.unwrap_or(Command::List);
    let result = commands::execute(tracker.store(), &command);

    // Make sure the mutation reaches storage before the process exits
    let status = tracker.store().flush().await?;
    tracker.shutdown().await;

    if let Some(err) = status.last_error {
        eprintln!("warning: changes may not have been saved: {}", err);
    }

    println!("{}", result?);
    Ok(())
}
