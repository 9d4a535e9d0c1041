//! Directory client trait
//!
//! The seam between the engine and whatever serves the directory trees.
//! Implementations route each [`Subtree`] to the right server; callers
//! never see connection details. "Not present" is `Ok(None)` or an empty
//! list, never an error; the layers above decide whether absence is a
//! problem.

use rollbook_core::member::ExternalId;

use crate::entry::DirEntry;
use crate::error::DirectoryResult;
use crate::subtree::Subtree;

/// Access to the club and registry directory trees.
pub trait DirectoryClient {
    /// Look up one entry by college ID number.
    ///
    /// Each tree matches the ID against its own schema (see
    /// [`Subtree::id_attribute`]); the staff tree additionally matches IDs
    /// embedded at the end of `gecos`.
    ///
    /// # Arguments
    ///
    /// * `subtree` - Tree to search
    /// * `id` - 8-digit ID number
    ///
    /// # Returns
    ///
    /// The first matching entry, or `None` when nothing matches.
    fn lookup_by_external_id(
        &self,
        subtree: Subtree,
        id: ExternalId,
    ) -> DirectoryResult<Option<DirEntry>>;

    /// Look up one entry by its naming attribute (handle for account
    /// trees, group/reserved name otherwise).
    fn lookup_by_handle(&self, subtree: Subtree, handle: &str)
        -> DirectoryResult<Option<DirEntry>>;

    /// List every entry in a tree.
    fn list(&self, subtree: Subtree) -> DirectoryResult<Vec<DirEntry>>;

    /// Create an entry keyed by `key` (the value of the tree's naming
    /// attribute).
    ///
    /// # Errors
    ///
    /// [`DirectoryError::AlreadyExists`](crate::DirectoryError::AlreadyExists)
    /// when the key is taken.
    fn add(&self, subtree: Subtree, key: &str, entry: DirEntry) -> DirectoryResult<()>;

    /// Replace attribute values on an existing entry.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::NotFound`](crate::DirectoryError::NotFound) when
    /// no entry has that key.
    fn modify_replace(
        &self,
        subtree: Subtree,
        key: &str,
        replacements: Vec<(String, Vec<String>)>,
    ) -> DirectoryResult<()>;
}

impl<T: DirectoryClient + ?Sized> DirectoryClient for &T {
    fn lookup_by_external_id(
        &self,
        subtree: Subtree,
        id: ExternalId,
    ) -> DirectoryResult<Option<DirEntry>> {
        (**self).lookup_by_external_id(subtree, id)
    }

    fn lookup_by_handle(
        &self,
        subtree: Subtree,
        handle: &str,
    ) -> DirectoryResult<Option<DirEntry>> {
        (**self).lookup_by_handle(subtree, handle)
    }

    fn list(&self, subtree: Subtree) -> DirectoryResult<Vec<DirEntry>> {
        (**self).list(subtree)
    }

    fn add(&self, subtree: Subtree, key: &str, entry: DirEntry) -> DirectoryResult<()> {
        (**self).add(subtree, key, entry)
    }

    fn modify_replace(
        &self,
        subtree: Subtree,
        key: &str,
        replacements: Vec<(String, Vec<String>)>,
    ) -> DirectoryResult<()> {
        (**self).modify_replace(subtree, key, replacements)
    }
}
