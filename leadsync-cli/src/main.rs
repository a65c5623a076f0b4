//! leadsync — push new checkout leads from Metabase into HubSpot.
//!
//! # Usage
//!
//! ```text
//! leadsync run [--dry-run] [--pretty] [--json-logs] [--data-dir <dir>]
//! leadsync snapshot show [--json] [--data-dir <dir>]
//! leadsync snapshot clear [--data-dir <dir>]
//! ```
//!
//! Credentials and endpoints come from the environment (`METABASE_URL`,
//! `USERNAME`, `PASSWORD`, `HUBSPOT_API_KEY`, ...).

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{run::RunArgs, snapshot::SnapshotCommand};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "leadsync",
    version,
    about = "Sync new checkout leads from Metabase into HubSpot contacts",
    long_about = None,
)]
struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the sync job once and print its response object.
    Run(RunArgs),

    /// Inspect or reset the stored snapshot of already-synced rows.
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Snapshot { command } => commands::snapshot::run(command),
    }
}

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
