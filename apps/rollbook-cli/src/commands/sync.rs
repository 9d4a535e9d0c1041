//! Sync command - reconcile OS accounts with the membership database

use clap::Args;
use dialoguer::Confirm;

use rollbook_directory::{LdapDirectory, MemberStore};
use rollbook_engine::{
    BackupShells, LoggingNotifier, MailNotifier, Notifier, Outcome, PosixProvisioner,
    RenewalMarkers, SyncOptions, SyncPipeline, SyncReport, ValidShells,
};

use crate::config::AppConfig;
use crate::error::{CliError, CliResult};
use crate::output::{print_info, print_success, print_warning};

#[derive(Args)]
pub struct SyncArgs {
    /// Report what would change without touching anything
    #[arg(long)]
    pub dry_run: bool,

    /// Remove accounts that are on disk but no longer in the database
    #[arg(long)]
    pub delete_missing: bool,

    /// Delete without prompting per account
    #[arg(long, requires = "delete_missing")]
    pub yes: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(config: &AppConfig, args: SyncArgs) -> CliResult<()> {
    let client = LdapDirectory::connect(config.directory.clone())?;
    let store = MemberStore::new(client);

    // Dry runs log notifications instead of mailing.
    let report = if args.dry_run {
        run_pipeline(config, &args, &store, &LoggingNotifier)?
    } else {
        let notifier = MailNotifier::new(&config.paths.sendmail, config.notify.clone());
        run_pipeline(config, &args, &store, &notifier)?
    };

    // Per-member failures are part of the narrative, not the exit code;
    // only a run that could not start at all exits nonzero.
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).map_err(|e| CliError::Io(e.to_string()))?
        );
    } else {
        print_report(&report);
    }
    Ok(())
}

fn run_pipeline<N: Notifier>(
    config: &AppConfig,
    args: &SyncArgs,
    store: &MemberStore<LdapDirectory>,
    notifier: &N,
) -> CliResult<SyncReport> {
    let provisioner = PosixProvisioner::new(&config.paths.home_base, &config.paths.skel_dir);
    let shells = ValidShells::load(&config.paths.shells_file, &config.accounts.expired_shell)?;
    // A missing passwd dump only costs the shell restore, not the run.
    let backup_shells = match BackupShells::load(
        &config.paths.backup_passwd,
        &config.accounts.default_shell,
    ) {
        Ok(backup) => backup,
        Err(err) => {
            print_warning(&format!("{err}; expired members get the default shell"));
            BackupShells::empty(&config.accounts.default_shell)
        }
    };
    let markers = RenewalMarkers::new(&config.paths.markers_dir);

    let options = SyncOptions {
        dry_run: args.dry_run,
        delete_missing: args.delete_missing,
    };
    let pipeline = SyncPipeline::new(
        store,
        &provisioner,
        notifier,
        &shells,
        &backup_shells,
        &markers,
        options,
    );

    let assume_yes = args.yes;
    let mut confirm_delete = |handle: &str| {
        if assume_yes {
            return true;
        }
        Confirm::new()
            .with_prompt(format!("Delete all trace of '{handle}'?"))
            .default(false)
            .interact()
            .unwrap_or(false)
    };

    Ok(pipeline.run(
        &config.paths.changelog,
        &config.paths.snapshot,
        &mut confirm_delete,
    )?)
}

fn print_report(report: &SyncReport) {
    for pass in &report.passes {
        print_info(&format!(
            "{} pass: {} applied, {} skipped, {} failed",
            pass.pass, pass.applied, pass.skipped, pass.failed
        ));
        for outcome in &pass.outcomes {
            let sigil = match outcome.outcome {
                Outcome::Applied => '+',
                Outcome::Skipped => '-',
                Outcome::Failed => '!',
            };
            println!("  {sigil} {}: {}", outcome.handle, outcome.detail);
        }
    }
    let (applied, skipped, failed) = report.totals();
    let verdict = format!(
        "{}{applied} applied, {skipped} skipped, {failed} failed",
        if report.dry_run { "dry run: " } else { "" }
    );
    if failed == 0 {
        print_success(&verdict);
    } else {
        print_warning(&verdict);
    }
}
