//! Subcommand implementations

pub mod add;
pub mod counter;
pub mod presync;
pub mod renew;
pub mod resolve;
pub mod sync;

use dialoguer::Confirm;

use rollbook_core::category::Category;
use rollbook_core::policy::{disposition, Disposition, OverridePolicy, Severity};

use crate::error::{CliError, CliResult};
use crate::output::print_warning;

/// Parse a category argument, mapping the failure to an input error.
pub(crate) fn parse_category(raw: &str) -> CliResult<Category> {
    raw.parse().map_err(CliError::Input)
}

/// Apply the override policy to a failed check. Warnings print and then
/// proceed, prompt, or block per the policy; fatal failures propagate.
pub(crate) fn gate<E>(result: Result<(), E>, policy: OverridePolicy) -> CliResult<()>
where
    E: std::error::Error + Into<CliError> + Severe,
{
    let Err(err) = result else {
        return Ok(());
    };
    match disposition(err.severity(), policy) {
        Disposition::Proceed { .. } => {
            print_warning(&format!("{err} (overridden)"));
            Ok(())
        }
        Disposition::Confirm => {
            print_warning(&err.to_string());
            let proceed = Confirm::new()
                .with_prompt("Proceed anyway?")
                .default(false)
                .interact()
                .map_err(|e| CliError::Input(e.to_string()))?;
            if proceed {
                Ok(())
            } else {
                Err(CliError::Aborted)
            }
        }
        Disposition::Block => Err(err.into()),
    }
}

/// Errors that carry a severity.
pub(crate) trait Severe {
    fn severity(&self) -> Severity;
}

impl Severe for rollbook_directory::DirectoryError {
    fn severity(&self) -> Severity {
        self.severity()
    }
}

impl Severe for rollbook_engine::EngineError {
    fn severity(&self) -> Severity {
        self.severity()
    }
}
