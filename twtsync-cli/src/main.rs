//! twtsync: mirror ticketing API performances into the content store.
//!
//! # Usage
//!
//! ```text
//! twtsync init [--mode test|prod]
//! twtsync check
//! twtsync sync one <id>
//! twtsync sync list [--from D] [--until D] [--create-missing]
//! twtsync sync availability [--from D] [--until D]
//! twtsync unpublish <id>
//! twtsync delete <id>
//! twtsync status [--json]
//! twtsync diff <id>
//! twtsync daemon [--json-logs]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    check::CheckArgs,
    daemon::DaemonArgs,
    diff::DiffArgs,
    init::InitArgs,
    lifecycle::{DeleteArgs, UnpublishArgs},
    status::StatusArgs,
    sync::SyncCommand,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "twtsync",
    version,
    about = "Sync ticketing API performances into the website content store",
    long_about = None,
)]
struct Cli {
    /// Log more detail (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scaffold ~/.twtsync/settings.yaml.
    Init(InitArgs),

    /// Validate settings, mapping and templates without calling the API.
    Check(CheckArgs),

    /// Sync one performance, the performance list, or availability.
    Sync {
        #[command(subcommand)]
        command: SyncCommand,
    },

    /// Make one performance private.
    Unpublish(UnpublishArgs),

    /// Remove one performance from the content store.
    Delete(DeleteArgs),

    /// Show synced performances and the last daemon runs.
    Status(StatusArgs),

    /// Show a unified diff of what syncing one performance would change.
    Diff(DiffArgs),

    /// Run periodic list and availability syncs in the foreground.
    Daemon(DaemonArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_target(false)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    // The daemon installs its own tracing subscriber.
    if !matches!(cli.command, Commands::Daemon(_)) {
        init_logging(cli.verbose);
    }
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Check(args) => args.run(),
        Commands::Sync { command } => commands::sync::run(command),
        Commands::Unpublish(args) => args.run(),
        Commands::Delete(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Daemon(args) => args.run(),
    }
}
