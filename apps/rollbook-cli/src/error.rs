//! CLI error type and exit codes
//!
//! Exit codes:
//! - 0: the command ran (including an operator choosing to abort; sync
//!   reports per-member failures in its narrative, not the exit code)
//! - 1: the command could not run or a check blocked it (config,
//!   connection, conflicts, I/O)
//! - 2: invalid input (bad arguments or a validation failure)

use thiserror::Error;

use rollbook_core::validate::ValidationError;
use rollbook_directory::DirectoryError;
use rollbook_engine::allocator::CounterError;
use rollbook_engine::error::EngineError;
use rollbook_engine::notify::NotifyError;
use rollbook_engine::provision::ProvisionError;
use rollbook_engine::shells::ShellsError;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    Input(String),

    #[error("aborted")]
    Aborted,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Counter(#[from] CounterError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    Shells(#[from] ShellsError),

    /// A directory entry is missing a field this command needs.
    #[error("member '{0}' has no {1} in the directory")]
    Missing(String, &'static str),

    #[error("I/O error: {0}")]
    Io(String),
}

impl CliError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Aborted => 0,
            CliError::Input(_) | CliError::Validation(_) => 2,
            CliError::Config(_)
            | CliError::Directory(_)
            | CliError::Engine(_)
            | CliError::Counter(_)
            | CliError::Provision(_)
            | CliError::Notify(_)
            | CliError::Shells(_)
            | CliError::Missing(..)
            | CliError::Io(_) => 1,
        }
    }

    /// Print to stderr, colored unless `NO_COLOR` is set.
    pub fn print(&self) {
        if matches!(self, CliError::Aborted) {
            eprintln!("Aborted.");
            return;
        }
        if std::env::var("NO_COLOR").is_err() {
            eprintln!("\x1b[31mError:\x1b[0m {self}");
        } else {
            eprintln!("Error: {self}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Aborted.exit_code(), 0);
        assert_eq!(CliError::Config("x".into()).exit_code(), 1);
        assert_eq!(CliError::Input("x".into()).exit_code(), 2);
        assert_eq!(
            CliError::Validation(ValidationError::HandleTooLong("ninechars".into())).exit_code(),
            2
        );
    }
}
