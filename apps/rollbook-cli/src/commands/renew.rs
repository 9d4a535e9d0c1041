//! Renew command - refresh a membership for the new season

use std::path::Path;

use clap::Args;
use dialoguer::Confirm;
use serde::Serialize;

use rollbook_core::category::Category;
use rollbook_core::password::generate_password;
use rollbook_core::policy::OverridePolicy;
use rollbook_core::validate::{check_conversion, check_years_paid};
use rollbook_directory::{LdapDirectory, MemberStore};
use rollbook_engine::{
    resolve_for_renewal, AccountProvisioner, MailNotifier, Notifier, PosixProvisioner, ValidShells,
};

use crate::commands::{gate, parse_category};
use crate::config::{operator, AppConfig};
use crate::error::{CliError, CliResult};
use crate::output::{print_key_value, print_success, print_warning};

#[derive(Args)]
pub struct RenewArgs {
    /// Handle of the member to renew
    pub handle: String,

    /// Move the member to a different paying category
    #[arg(long)]
    pub category: Option<String>,

    /// Set the years-paid balance to this value instead of the renewal
    /// default
    #[arg(long)]
    pub years: Option<i32>,

    /// Generate a fresh password as part of the renewal
    #[arg(long)]
    pub reset_password: bool,

    /// Proceed past warnings without prompting
    #[arg(long, short = 'f')]
    pub force: bool,

    /// Skip the renewal mail
    #[arg(long)]
    pub no_mail: bool,

    /// Print the renewed record as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct RenewOutput {
    handle: String,
    category: Category,
    years_paid: Option<i32>,
    converted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    home_directory: Option<String>,
    shell_reset: bool,
    password_reset: bool,
    mailed: bool,
}

pub fn execute(config: &AppConfig, args: RenewArgs) -> CliResult<()> {
    let policy = OverridePolicy::interactive(args.force);
    let hint: Option<Category> = args.category.as_deref().map(parse_category).transpose()?;
    if let Some(years) = args.years {
        check_years_paid(years)?;
    }

    let client = LdapDirectory::connect(config.directory.clone())?;
    let store = MemberStore::new(client);

    let current = store.get_member(&args.handle)?;
    if let Some(category) = hint {
        check_conversion(current.category, category)?;
    }
    if current.years_paid.is_some_and(|y| y >= 1) && !args.force {
        print_warning(&format!(
            "'{}' is already paid up ({} year(s))",
            current.handle,
            current.years_paid.unwrap_or_default()
        ));
        let proceed = Confirm::new()
            .with_prompt("Renew anyway?")
            .default(false)
            .interact()
            .map_err(|e| CliError::Input(e.to_string()))?;
        if !proceed {
            return Err(CliError::Aborted);
        }
    }

    let mut record = match resolve_for_renewal(&store, &args.handle, hint, args.force) {
        Ok(record) => record,
        // A registry miss is a warning; overriding it renews on the
        // directory's data alone.
        Err(err) if err.severity().is_warning() => {
            gate(Err(err), policy)?;
            resolve_for_renewal(&store, &args.handle, hint, true)?
        }
        Err(err) => return Err(err.into()),
    };
    record.newbie = false;
    if let Some(years) = args.years {
        record.years_paid = Some(years);
    }
    record.updated_by = Some(operator());
    record.updated_at = Some(chrono::Utc::now());

    store.renew_member(&record)?;

    let password = if args.reset_password {
        let password = generate_password();
        store.set_password(&record.handle, &password)?;
        Some(password)
    } else {
        None
    };

    // A category change is a conversion on top of the renewal: the
    // database entry is rewritten for the new category and the home
    // tree moved and re-grouped to match.
    let converting = record.category != current.category;
    if converting {
        let provisioner =
            PosixProvisioner::new(&config.paths.home_base, &config.paths.skel_dir);
        let old_home = current
            .home_directory
            .as_deref()
            .ok_or_else(|| CliError::Missing(args.handle.clone(), "homeDirectory"))?;
        let new_home = provisioner.home_path(record.category, &record.handle);
        record.home_directory = Some(new_home.display().to_string());

        let gid = store.convert_member(&record)?;
        provisioner.rename_home(Path::new(old_home), &new_home)?;
        provisioner.chgrp_home(&new_home, gid)?;
    }

    // A lapsed member's shell was parked on the expired pseudo-shell;
    // renewing puts a working one back.
    let shells = ValidShells::load(&config.paths.shells_file, &config.accounts.expired_shell)?;
    let shell_reset = !record.login_shell.as_deref().is_some_and(|s| shells.is_valid(s));
    if shell_reset {
        store.set_shell(&record.handle, &config.accounts.default_shell)?;
        record.login_shell = Some(config.accounts.default_shell.clone());
    }

    let mailed = !args.no_mail && record.alternate_email.is_some();
    if mailed {
        let notifier = MailNotifier::new(&config.paths.sendmail, config.notify.clone());
        notifier.account_details(&record, password.as_deref())?;
    }

    if args.json {
        let out = RenewOutput {
            handle: record.handle.clone(),
            category: record.category,
            years_paid: record.years_paid,
            converted: converting,
            home_directory: converting.then(|| record.home_directory.clone()).flatten(),
            shell_reset,
            password_reset: password.is_some(),
            mailed,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&out).map_err(|e| CliError::Io(e.to_string()))?
        );
        return Ok(());
    }

    print_success(&format!(
        "{} membership for '{}' renewed",
        record.category, record.handle
    ));
    if converting {
        print_key_value(
            "converted",
            &format!("{} -> {}", current.category, record.category),
        );
        if let Some(home) = &record.home_directory {
            print_key_value("home", home);
        }
    }
    if let Some(years) = record.years_paid {
        print_key_value("years paid", &years.to_string());
    }
    if shell_reset {
        print_key_value("shell", &format!("reset to {}", config.accounts.default_shell));
    }
    if let Some(password) = &password {
        if mailed {
            print_key_value("password", "reset and mailed");
        } else {
            print_key_value("password", password);
        }
    }
    if !mailed && record.alternate_email.is_none() {
        print_warning("no alternate email on record; details were not mailed");
    }
    Ok(())
}
