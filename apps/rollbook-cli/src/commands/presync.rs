//! Presync command - snapshot the directory before registration opens

use clap::Args;
use dialoguer::Confirm;

use rollbook_directory::{LdapDirectory, MemberStore};
use rollbook_engine::{capture_presync, RenewalMarkers};

use crate::config::AppConfig;
use crate::error::{CliError, CliResult};
use crate::output::print_success;

#[derive(Args)]
pub struct PresyncArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

pub fn execute(config: &AppConfig, args: PresyncArgs) -> CliResult<()> {
    if !args.yes {
        let proceed = Confirm::new()
            .with_prompt(
                "Overwrite the presync snapshot and clear this season's renewal markers?",
            )
            .default(false)
            .interact()
            .map_err(|e| CliError::Input(e.to_string()))?;
        if !proceed {
            return Err(CliError::Aborted);
        }
    }

    let client = LdapDirectory::connect(config.directory.clone())?;
    let store = MemberStore::new(client);
    let markers = RenewalMarkers::new(&config.paths.markers_dir);

    let snapshot = capture_presync(&store, &config.paths.snapshot, &markers)?;
    print_success(&format!(
        "{} member(s) snapshotted to {}",
        snapshot.len(),
        config.paths.snapshot.display()
    ));
    Ok(())
}
