//! Resolve command - look an ID number up in the college registries

use clap::Args;
use serde::Serialize;

use rollbook_core::category::Category;
use rollbook_core::validate::check_external_id;
use rollbook_directory::{LdapDirectory, MemberStore};
use rollbook_engine::{resolve, Resolution};

use crate::commands::parse_category;
use crate::config::AppConfig;
use crate::error::{CliError, CliResult};
use crate::output::{print_info, print_key_value, print_success, print_warning};

#[derive(Args)]
pub struct ResolveArgs {
    /// 8-digit college ID number
    pub id: String,

    /// Category hint; associate and staff hints tolerate a registry miss
    #[arg(long)]
    pub category: Option<String>,

    /// Print the resolution as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ResolveOutput {
    id: String,
    matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    legal_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alternate_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    course: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    registered_to: Option<String>,
}

pub fn execute(config: &AppConfig, args: ResolveArgs) -> CliResult<()> {
    let id = check_external_id(&args.id)?;
    let hint: Option<Category> = args.category.as_deref().map(parse_category).transpose()?;

    let client = LdapDirectory::connect(config.directory.clone())?;
    let store = MemberStore::new(client);

    // A total miss is the answer "nobody", not a failure of the lookup.
    let resolution = match resolve(store.client(), id, hint) {
        Ok(resolution) => resolution,
        Err(err) if err.severity().is_warning() => Resolution::default(),
        Err(err) => return Err(err.into()),
    };
    let registered_to = store.find_by_external_id(id)?.map(|m| m.handle);

    if args.json {
        let out = ResolveOutput {
            id: id.to_string(),
            matched: resolution.matched(),
            source: resolution.source.map(|s| s.to_string()),
            category: resolution.suggested_category(),
            legal_name: resolution.legal_name,
            alternate_email: resolution.alternate_email,
            course: resolution.course,
            year: resolution.year,
            registered_to,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&out).map_err(|e| CliError::Io(e.to_string()))?
        );
        return Ok(());
    }

    match resolution.source {
        Some(source) => {
            print_success(&format!("{id} found in the {source} registry"));
            if let Some(category) = resolution.suggested_category() {
                print_key_value("category", category.as_str());
            }
            if let Some(name) = &resolution.legal_name {
                print_key_value("name", name);
            }
            if let Some(mail) = &resolution.alternate_email {
                print_key_value("email", mail);
            }
            if let Some(course) = &resolution.course {
                print_key_value("course", course);
            }
            if let Some(year) = &resolution.year {
                print_key_value("year", year);
            }
        }
        None => print_info(&format!("{id}: no registry entry")),
    }
    if let Some(handle) = &registered_to {
        print_warning(&format!("already registered to '{handle}'"));
    }
    Ok(())
}
