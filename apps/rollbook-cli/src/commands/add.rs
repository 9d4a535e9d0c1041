//! Add command - register a member and create their account

use clap::Args;
use serde::Serialize;

use rollbook_core::category::Category;
use rollbook_core::member::MemberRecord;
use rollbook_core::password::generate_password;
use rollbook_core::policy::OverridePolicy;
use rollbook_core::validate::{check_external_id, check_handle, check_required_external_id};
use rollbook_directory::{LdapDirectory, MemberStore};
use rollbook_engine::{
    resolve, AccountProvisioner, MailNotifier, Notifier, PosixProvisioner, Resolution, UidCounter,
};

use crate::commands::{gate, parse_category};
use crate::config::{operator, AppConfig};
use crate::error::{CliError, CliResult};
use crate::output::{print_info, print_key_value, print_success, print_warning};

#[derive(Args)]
pub struct AddArgs {
    /// Handle for the new account
    pub handle: String,

    /// College ID number (required for member, associate, staff and
    /// committee accounts)
    #[arg(long)]
    pub id: Option<String>,

    /// Membership category; defaults to what the registries suggest, or
    /// plain membership
    #[arg(long)]
    pub category: Option<String>,

    /// Proceed past warnings without prompting
    #[arg(long, short = 'f')]
    pub force: bool,

    /// Skip the welcome mail and print the password instead
    #[arg(long)]
    pub no_mail: bool,

    /// Print the created record as JSON (includes the password)
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct AddOutput {
    handle: String,
    category: Category,
    uid_number: u32,
    home_directory: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    legal_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alternate_email: Option<String>,
    password: String,
    mailed: bool,
}

pub fn execute(config: &AppConfig, args: AddArgs) -> CliResult<()> {
    let policy = OverridePolicy::interactive(args.force);
    check_handle(&args.handle)?;
    let hint: Option<Category> = args.category.as_deref().map(parse_category).transpose()?;
    let external_id = args.id.as_deref().map(check_external_id).transpose()?;

    let client = LdapDirectory::connect(config.directory.clone())?;
    let store = MemberStore::new(client);
    gate(store.check_handle_free(&args.handle), policy)?;

    let resolution = match external_id {
        Some(id) => {
            store.check_external_id_free(id, None)?;
            match resolve(store.client(), id, hint) {
                Ok(resolution) => resolution,
                // A registry miss is a warning; overriding it registers
                // the person on the operator's say-so.
                Err(err) => {
                    gate(Err(err), policy)?;
                    Resolution::default()
                }
            }
        }
        None => Resolution::default(),
    };

    let category = resolution.category_for(hint, false);
    if let (Some(found), Some(hinted)) = (resolution.suggested_category(), hint) {
        if found != hinted {
            print_warning(&format!(
                "registries list this person as {found}, registering as {hinted}"
            ));
        }
    }
    check_required_external_id(category, external_id)?;
    if external_id.is_some() && !resolution.matched() {
        print_info("no registry match; using operator-supplied details only");
    }

    let mut record = MemberRecord::new(&args.handle, category);
    record.external_id = external_id;
    record.created_by = Some(operator());
    record.created_at = Some(chrono::Utc::now());
    resolution.merge_into(&mut record, false);
    record.apply_new_defaults();

    let counter = UidCounter::new(&config.paths.counter_file);
    let lease = counter.acquire()?;
    let uid = lease.value();
    record.uid_number = Some(uid);

    let provisioner = PosixProvisioner::new(&config.paths.home_base, &config.paths.skel_dir);
    let home = provisioner.home_path(category, &args.handle);
    record.home_directory = Some(home.display().to_string());
    record.login_shell = Some(config.accounts.default_shell.clone());

    let password = generate_password();
    store.add_member(&record, &password)?;
    lease.commit()?;

    // The store resolved the primary GID from the category's group entry;
    // read the record back to get it.
    let stored = store.get_member(&args.handle)?;
    let gid = stored
        .gid_number
        .ok_or_else(|| CliError::Missing(args.handle.clone(), "gidNumber"))?;
    provisioner.create_home(&home, uid, gid)?;

    let mailed = !args.no_mail && stored.alternate_email.is_some();
    if mailed {
        let notifier = MailNotifier::new(&config.paths.sendmail, config.notify.clone());
        notifier.account_details(&stored, Some(&password))?;
    }

    if args.json {
        let out = AddOutput {
            handle: stored.handle.clone(),
            category,
            uid_number: uid,
            home_directory: home.display().to_string(),
            legal_name: stored.legal_name.clone(),
            alternate_email: stored.alternate_email.clone(),
            password,
            mailed,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&out).map_err(|e| CliError::Io(e.to_string()))?
        );
        return Ok(());
    }

    print_success(&format!("{category} account '{}' created", stored.handle));
    print_key_value("uid", &uid.to_string());
    print_key_value("home", &home.display().to_string());
    if let Some(name) = &stored.legal_name {
        print_key_value("name", name);
    }
    if mailed {
        print_key_value(
            "mailed to",
            stored.alternate_email.as_deref().unwrap_or_default(),
        );
    } else {
        print_key_value("password", &password);
        if stored.alternate_email.is_none() {
            print_warning("no alternate email on record; details were not mailed");
        }
    }
    Ok(())
}
