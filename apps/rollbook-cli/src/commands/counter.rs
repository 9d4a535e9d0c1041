//! Counter command - manage the shared UID counter file

use clap::{Args, Subcommand};

use rollbook_directory::{LdapDirectory, MemberStore};
use rollbook_engine::UidCounter;

use crate::config::AppConfig;
use crate::error::{CliError, CliResult};
use crate::output::{print_key_value, print_success};

#[derive(Args)]
pub struct CounterArgs {
    #[command(subcommand)]
    pub command: CounterCommand,
}

#[derive(Subcommand)]
pub enum CounterCommand {
    /// Create the counter file, seeded past every allocated UID
    Init {
        /// Replace an existing counter file
        #[arg(long)]
        force: bool,
    },

    /// Show the next UID the counter will hand out
    Show,
}

pub fn execute(config: &AppConfig, args: CounterArgs) -> CliResult<()> {
    let counter = UidCounter::new(&config.paths.counter_file);
    match args.command {
        CounterCommand::Init { force } => {
            let client = LdapDirectory::connect(config.directory.clone())?;
            let store = MemberStore::new(client);
            let next = store
                .max_uid_number()?
                .map_or(config.accounts.first_uid, |max| {
                    max.saturating_add(1).max(config.accounts.first_uid)
                });

            if force && counter.path().exists() {
                std::fs::remove_file(counter.path())
                    .map_err(|e| CliError::Io(format!("{}: {e}", counter.path().display())))?;
            }
            counter.initialize(next)?;
            print_success(&format!("counter created at {}", counter.path().display()));
            print_key_value("next uid", &next.to_string());
        }
        CounterCommand::Show => {
            let next = counter.peek()?;
            print_key_value("next uid", &next.to_string());
        }
    }
    Ok(())
}
