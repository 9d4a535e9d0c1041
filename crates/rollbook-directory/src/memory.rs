//! In-process directory
//!
//! A [`DirectoryClient`] over plain maps. Used by the test suites and by
//! rehearsal runs that want real engine behavior without a live server.
//! Matching rules mirror the LDAP implementation, including the staff
//! tree's gecos fallback.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use rollbook_core::member::ExternalId;

use crate::client::DirectoryClient;
use crate::entry::DirEntry;
use crate::error::{DirectoryError, DirectoryResult};
use crate::subtree::Subtree;

type Tree = BTreeMap<String, DirEntry>;

/// Directory held in memory, keyed by each tree's naming attribute.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    trees: Mutex<HashMap<Subtree, Tree>>,
}

impl MemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry, replacing any existing one with the same key.
    pub fn insert(&self, subtree: Subtree, key: impl Into<String>, mut entry: DirEntry) {
        let key = key.into();
        if entry.dn.is_empty() {
            entry.dn = format!("{}={},ou={}", subtree.rdn_attribute(), key, subtree);
        }
        self.with_trees(|trees| {
            trees.entry(subtree).or_default().insert(key, entry);
        });
    }

    /// Remove an entry; returns whether it existed.
    pub fn remove(&self, subtree: Subtree, key: &str) -> bool {
        self.with_trees(|trees| {
            trees
                .entry(subtree)
                .or_default()
                .remove(key)
                .is_some()
        })
    }

    fn with_trees<R>(&self, f: impl FnOnce(&mut HashMap<Subtree, Tree>) -> R) -> R {
        // Single-threaded callers; poisoning only follows a test panic.
        let mut guard = match self.trees.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

fn id_matches(subtree: Subtree, entry: &DirEntry, id: &str) -> bool {
    if entry.all(subtree.id_attribute()).iter().any(|v| v == id) {
        return true;
    }
    // Staff IDs are sometimes only present at the end of gecos, after a
    // comma-separated prefix.
    subtree == Subtree::Staff
        && entry.all("gecos").iter().any(|gecos| {
            gecos.ends_with(id) && gecos[..gecos.len() - id.len()].contains(',')
        })
}

impl DirectoryClient for MemoryDirectory {
    fn lookup_by_external_id(
        &self,
        subtree: Subtree,
        id: ExternalId,
    ) -> DirectoryResult<Option<DirEntry>> {
        let id = id.to_string();
        Ok(self.with_trees(|trees| {
            trees
                .entry(subtree)
                .or_default()
                .values()
                .find(|entry| id_matches(subtree, entry, &id))
                .cloned()
        }))
    }

    fn lookup_by_handle(
        &self,
        subtree: Subtree,
        handle: &str,
    ) -> DirectoryResult<Option<DirEntry>> {
        Ok(self.with_trees(|trees| trees.entry(subtree).or_default().get(handle).cloned()))
    }

    fn list(&self, subtree: Subtree) -> DirectoryResult<Vec<DirEntry>> {
        Ok(self.with_trees(|trees| trees.entry(subtree).or_default().values().cloned().collect()))
    }

    fn add(&self, subtree: Subtree, key: &str, mut entry: DirEntry) -> DirectoryResult<()> {
        if entry.dn.is_empty() {
            entry.dn = format!("{}={},ou={}", subtree.rdn_attribute(), key, subtree);
        }
        self.with_trees(|trees| {
            let tree = trees.entry(subtree).or_default();
            if tree.contains_key(key) {
                return Err(DirectoryError::AlreadyExists {
                    subtree,
                    key: key.to_string(),
                });
            }
            tree.insert(key.to_string(), entry);
            Ok(())
        })
    }

    fn modify_replace(
        &self,
        subtree: Subtree,
        key: &str,
        replacements: Vec<(String, Vec<String>)>,
    ) -> DirectoryResult<()> {
        self.with_trees(|trees| {
            let tree = trees.entry(subtree).or_default();
            let entry = tree
                .get_mut(key)
                .ok_or_else(|| DirectoryError::not_found(subtree, key))?;
            for (name, values) in replacements {
                entry.set(name, values);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn id(raw: &str) -> ExternalId {
        ExternalId::from_str(raw).unwrap()
    }

    #[test]
    fn test_handle_lookup() {
        let dir = MemoryDirectory::new();
        dir.insert(
            Subtree::Accounts,
            "fred",
            DirEntry::new("").with_attr("uid", "fred"),
        );

        assert!(dir
            .lookup_by_handle(Subtree::Accounts, "fred")
            .unwrap()
            .is_some());
        assert!(dir
            .lookup_by_handle(Subtree::Accounts, "wilma")
            .unwrap()
            .is_none());
        // Other trees are independent.
        assert!(dir
            .lookup_by_handle(Subtree::Groups, "fred")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_id_lookup_per_tree_schema() {
        let dir = MemoryDirectory::new();
        dir.insert(
            Subtree::Student,
            "stu1",
            DirEntry::new("").with_attr("employeeNumber", "12345678"),
        );
        dir.insert(
            Subtree::Alumni,
            "al1",
            DirEntry::new("").with_attr("cn", "87654321"),
        );

        assert!(dir
            .lookup_by_external_id(Subtree::Student, id("12345678"))
            .unwrap()
            .is_some());
        assert!(dir
            .lookup_by_external_id(Subtree::Alumni, id("87654321"))
            .unwrap()
            .is_some());
        // A student number does not match in the alumni tree.
        assert!(dir
            .lookup_by_external_id(Subtree::Alumni, id("12345678"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_staff_gecos_fallback() {
        let dir = MemoryDirectory::new();
        dir.insert(
            Subtree::Staff,
            "prof",
            DirEntry::new("").with_attr("gecos", "Grace Hopper,Computing,15358462"),
        );

        assert!(dir
            .lookup_by_external_id(Subtree::Staff, id("15358462"))
            .unwrap()
            .is_some());
        // Without a comma before the number the gecos form does not count.
        dir.insert(
            Subtree::Staff,
            "odd",
            DirEntry::new("").with_attr("gecos", "99887766"),
        );
        assert!(dir
            .lookup_by_external_id(Subtree::Staff, id("99887766"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_add_conflict() {
        let dir = MemoryDirectory::new();
        dir.add(Subtree::Accounts, "fred", DirEntry::new(""))
            .unwrap();
        let err = dir
            .add(Subtree::Accounts, "fred", DirEntry::new(""))
            .unwrap_err();
        assert!(matches!(err, DirectoryError::AlreadyExists { .. }));
    }

    #[test]
    fn test_modify_replace() {
        let dir = MemoryDirectory::new();
        dir.insert(
            Subtree::Accounts,
            "fred",
            DirEntry::new("").with_attr("loginShell", "/bin/sh"),
        );
        dir.modify_replace(
            Subtree::Accounts,
            "fred",
            vec![("loginShell".into(), vec!["/bin/zsh".into()])],
        )
        .unwrap();

        let entry = dir
            .lookup_by_handle(Subtree::Accounts, "fred")
            .unwrap()
            .unwrap();
        assert_eq!(entry.first("loginShell"), Some("/bin/zsh"));

        let err = dir
            .modify_replace(Subtree::Accounts, "ghost", vec![])
            .unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound { .. }));
    }
}
