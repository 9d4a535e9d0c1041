//! Directory error types
//!
//! Error definitions with fatal/warning classification for the override
//! policy. A lookup that finds nothing is `Ok(None)` at the client layer;
//! [`DirectoryError::NotFound`] is raised by the layers above when the
//! caller required the entry to exist.

use thiserror::Error;

use rollbook_core::policy::Severity;

use crate::subtree::Subtree;

/// Error that can occur during directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Failed to establish a connection to a directory server.
    #[error("directory connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The bind step was refused.
    #[error("directory bind failed: {message}")]
    BindFailed { message: String },

    /// Protocol-level failure from the directory server.
    #[error("directory operation failed: {message}")]
    Protocol {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A required entry does not exist.
    #[error("no entry for '{key}' in {subtree} tree")]
    NotFound { subtree: Subtree, key: String },

    /// An entry that was being created already exists.
    #[error("entry '{key}' already exists in {subtree} tree")]
    AlreadyExists { subtree: Subtree, key: String },

    /// The handle is taken by an existing account.
    #[error("handle '{0}' is already taken by an account")]
    HandleTaken(String),

    /// The handle collides with a Unix group name.
    #[error("handle '{0}' is in use as a group name")]
    HandleIsGroup(String),

    /// The handle appears in the reserved-names tree.
    #[error("handle '{0}' is reserved: {1}")]
    HandleReserved(String, String),

    /// The ID number already belongs to another account.
    #[error("ID number {id} already registered to account '{handle}'")]
    ExternalIdTaken { id: String, handle: String },

    /// The Unix group backing a category is missing from the directory.
    #[error("no group entry for category '{0}'")]
    GroupMissing(String),

    /// An entry could not be interpreted as a member record.
    #[error("malformed entry '{key}': {message}")]
    InvalidEntry { key: String, message: String },
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

impl DirectoryError {
    /// Classify for the override policy.
    ///
    /// Registry misses and reserved-name hits are warnings the caller may
    /// override; everything else blocks.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            DirectoryError::NotFound { .. } | DirectoryError::HandleReserved(..) => {
                Severity::Warning
            }
            _ => Severity::Fatal,
        }
    }

    /// Get an error code for classification.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            DirectoryError::ConnectionFailed { .. } => "DIR_CONNECTION_FAILED",
            DirectoryError::BindFailed { .. } => "DIR_BIND_FAILED",
            DirectoryError::Protocol { .. } => "DIR_PROTOCOL",
            DirectoryError::NotFound { .. } => "DIR_NOT_FOUND",
            DirectoryError::AlreadyExists { .. } => "DIR_ALREADY_EXISTS",
            DirectoryError::HandleTaken(_) => "DIR_HANDLE_TAKEN",
            DirectoryError::HandleIsGroup(_) => "DIR_HANDLE_IS_GROUP",
            DirectoryError::HandleReserved(..) => "DIR_HANDLE_RESERVED",
            DirectoryError::ExternalIdTaken { .. } => "DIR_EXTERNAL_ID_TAKEN",
            DirectoryError::GroupMissing(_) => "DIR_GROUP_MISSING",
            DirectoryError::InvalidEntry { .. } => "DIR_INVALID_ENTRY",
        }
    }

    // Convenience constructors

    /// Create a connection-failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection-failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        DirectoryError::Protocol {
            message: message.into(),
            source: None,
        }
    }

    /// Create a protocol error with source.
    pub fn protocol_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::Protocol {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(subtree: Subtree, key: impl Into<String>) -> Self {
        DirectoryError::NotFound {
            subtree,
            key: key.into(),
        }
    }

    /// Create a malformed-entry error.
    pub fn invalid_entry(key: impl Into<String>, message: impl Into<String>) -> Self {
        DirectoryError::InvalidEntry {
            key: key.into(),
            message: message.into(),
        }
    }
}
