//! Engine error type
//!
//! One umbrella error for everything a pipeline run or a resolution can
//! fail with. The per-concern errors (counter, change log, snapshot,
//! provisioning, notification) live next to their modules and convert in
//! via `From`.

use rollbook_core::policy::Severity;
use rollbook_core::validate::ValidationError;
use rollbook_directory::DirectoryError;

use crate::allocator::CounterError;
use crate::changelog::ChangeLogError;
use crate::notify::NotifyError;
use crate::provision::ProvisionError;
use crate::shells::ShellsError;
use crate::snapshot::SnapshotError;

/// Anything that can go wrong inside the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Counter(#[from] CounterError),

    #[error(transparent)]
    ChangeLog(#[from] ChangeLogError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    Shells(#[from] ShellsError),

    /// A record is missing a field the current operation needs.
    #[error("member '{handle}' is missing {field}")]
    MissingField {
        handle: String,
        field: &'static str,
    },
}

impl EngineError {
    /// Whether the failure is recoverable under an override.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::Directory(err) => err.severity(),
            Self::Validation(err) => err.severity(),
            Self::Counter(_)
            | Self::ChangeLog(_)
            | Self::Snapshot(_)
            | Self::Provision(_)
            | Self::Notify(_)
            | Self::Shells(_)
            | Self::MissingField { .. } => Severity::Fatal,
        }
    }

    /// Stable machine-readable code for logs and operator tooling.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Directory(err) => err.error_code(),
            Self::Validation(err) => err.error_code(),
            Self::Counter(err) => err.error_code(),
            Self::ChangeLog(_) => "ENGINE_CHANGELOG",
            Self::Snapshot(_) => "ENGINE_SNAPSHOT",
            Self::Provision(_) => "ENGINE_PROVISION",
            Self::Notify(_) => "ENGINE_NOTIFY",
            Self::Shells(_) => "ENGINE_SHELLS",
            Self::MissingField { .. } => "ENGINE_MISSING_FIELD",
        }
    }
}

/// Convenience alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rollbook_directory::Subtree;

    #[test]
    fn test_severity_delegates_to_directory() {
        let err = EngineError::from(DirectoryError::not_found(Subtree::Student, "12345678"));
        assert_eq!(err.severity(), Severity::Warning);

        let err = EngineError::MissingField {
            handle: "fred".into(),
            field: "home directory",
        };
        assert_eq!(err.severity(), Severity::Fatal);
    }

    #[test]
    fn test_error_codes_are_stable() {
        let err = EngineError::from(DirectoryError::HandleTaken("fred".into()));
        assert_eq!(err.error_code(), "DIR_HANDLE_TAKEN");
    }
}
