//! rollbook - membership and account administration
//!
//! Admin front door to the membership suite:
//! - register and renew members against the college registries
//! - reconcile OS accounts with the database after a registration season
//! - manage the UID counter and the presync snapshot

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod error;
mod output;

use config::AppConfig;
use error::CliResult;

/// Membership and account administration.
#[derive(Parser)]
#[command(name = "rollbook", version, about, propagate_version = true)]
struct Cli {
    /// Configuration file.
    #[arg(
        long,
        global = true,
        env = "ROLLBOOK_CONFIG",
        default_value = "/etc/rollbook/config.json"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a member and create their account
    Add(commands::add::AddArgs),

    /// Renew an existing membership
    Renew(commands::renew::RenewArgs),

    /// Look an ID number up in the college registries
    Resolve(commands::resolve::ResolveArgs),

    /// Reconcile OS accounts with the membership database
    Sync(commands::sync::SyncArgs),

    /// Snapshot the directory before a new registration season opens
    Presync(commands::presync::PresyncArgs),

    /// Manage the UID counter
    Counter(commands::counter::CounterArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        err.print();
        std::process::exit(err.exit_code());
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config = AppConfig::load(&cli.config)?;
    match cli.command {
        Commands::Add(args) => commands::add::execute(&config, args),
        Commands::Renew(args) => commands::renew::execute(&config, args),
        Commands::Resolve(args) => commands::resolve::execute(&config, args),
        Commands::Sync(args) => commands::sync::execute(&config, args),
        Commands::Presync(args) => commands::presync::execute(&config, args),
        Commands::Counter(args) => commands::counter::execute(&config, args),
    }
}
