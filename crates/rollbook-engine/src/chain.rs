//! Derived change maps
//!
//! One fold over the change log produces everything the pipeline needs to
//! know about handles: the rename chain (collapsed old→new and new→old
//! maps), the set of handles flagged for a category conversion, and the
//! password-reset decisions from renewals.
//!
//! Renames re-key the conversion and reset maps as they are folded in, so
//! every map ends up keyed by the handle's *final* name. A chain that
//! returns to its starting name (A→B, B→A) collapses to no entry at all.

use std::collections::{BTreeMap, BTreeSet};

use crate::changelog::{ChangeLogEntry, LogAction};

/// Handle-level facts derived from one reading of the change log.
#[derive(Debug, Default, Clone)]
pub struct DerivedChanges {
    /// current handle → handle at the time the snapshot was taken.
    reverse: BTreeMap<String, String>,
    /// Handles (final names) whose category changed during the cycle.
    converted: BTreeSet<String>,
    /// Final handle → whether the last renewal asked for a new password.
    reset_password: BTreeMap<String, bool>,
}

impl DerivedChanges {
    /// Fold the log in order. Only `rename-existing`, `convert` and
    /// `renew` matter here; adds, updates and renames of accounts created
    /// within the same cycle are fully captured by the database's final
    /// state.
    #[must_use]
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a ChangeLogEntry>) -> Self {
        let mut changes = Self::default();
        for entry in entries {
            match entry.action {
                LogAction::RenameExisting => {
                    changes.fold_rename(&entry.args[0], &entry.args[1]);
                }
                LogAction::Convert => {
                    changes.converted.insert(entry.args[0].clone());
                }
                LogAction::Renew => {
                    // Last renewal in the log wins.
                    changes
                        .reset_password
                        .insert(entry.args[0].clone(), entry.wants_password_reset());
                }
                LogAction::Add
                | LogAction::Delete
                | LogAction::Update
                | LogAction::RenameNew => {}
            }
        }
        changes
    }

    fn fold_rename(&mut self, old: &str, new: &str) {
        // Collapse through any earlier rename of `old`, dropping the
        // entry entirely if the chain has looped back to its origin.
        let origin = self
            .reverse
            .remove(old)
            .unwrap_or_else(|| old.to_string());
        if origin == new {
            self.reverse.remove(new);
        } else {
            self.reverse.insert(new.to_string(), origin);
        }

        if self.converted.remove(old) {
            self.converted.insert(new.to_string());
        }
        if let Some(flag) = self.reset_password.remove(old) {
            self.reset_password.insert(new.to_string(), flag);
        }
    }

    /// Original handle → current handle, for the rename pass.
    #[must_use]
    pub fn forward(&self) -> BTreeMap<String, String> {
        self.reverse
            .iter()
            .map(|(new, old)| (old.clone(), new.clone()))
            .collect()
    }

    /// The handle an account had when the snapshot was taken. Identity
    /// for handles that were never renamed.
    #[must_use]
    pub fn original_handle<'a>(&'a self, current: &'a str) -> &'a str {
        self.reverse.get(current).map_or(current, String::as_str)
    }

    /// Final handles flagged for conversion, in sorted order.
    pub fn converted(&self) -> impl Iterator<Item = &str> {
        self.converted.iter().map(String::as_str)
    }

    /// Whether this handle renewed at all this cycle (with or without a
    /// password reset).
    #[must_use]
    pub fn renewed(&self, handle: &str) -> bool {
        self.reset_password.contains_key(handle)
    }

    /// Whether the member's last renewal asked for a fresh password.
    #[must_use]
    pub fn wants_password_reset(&self, handle: &str) -> bool {
        self.reset_password.get(handle).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn rename_count(&self) -> usize {
        self.reverse.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(action: LogAction, args: &[&str]) -> ChangeLogEntry {
        ChangeLogEntry {
            timestamp: NaiveDate::from_ymd_opt(2025, 9, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            actor: "regadmin".into(),
            action,
            args: args.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_chain_collapses_to_origin() {
        let log = vec![
            entry(LogAction::RenameExisting, &["alice", "bob"]),
            entry(LogAction::RenameExisting, &["bob", "carol"]),
        ];
        let changes = DerivedChanges::from_entries(&log);

        assert_eq!(changes.original_handle("carol"), "alice");
        let forward = changes.forward();
        assert_eq!(forward.get("alice").map(String::as_str), Some("carol"));
        // The intermediate name appears in neither direction.
        assert!(!forward.contains_key("bob"));
        assert_eq!(changes.original_handle("bob"), "bob");
    }

    #[test]
    fn test_rename_back_collapses_away() {
        let log = vec![
            entry(LogAction::RenameExisting, &["alice", "bob"]),
            entry(LogAction::RenameExisting, &["bob", "alice"]),
        ];
        let changes = DerivedChanges::from_entries(&log);
        assert_eq!(changes.rename_count(), 0);
        assert!(changes.forward().is_empty());
    }

    #[test]
    fn test_self_rename_ignored() {
        let log = vec![entry(LogAction::RenameExisting, &["alice", "alice"])];
        let changes = DerivedChanges::from_entries(&log);
        assert_eq!(changes.rename_count(), 0);
    }

    #[test]
    fn test_convert_rekeyed_by_later_rename() {
        let log = vec![
            entry(LogAction::Convert, &["alice", "staff"]),
            entry(LogAction::RenameExisting, &["alice", "alicia"]),
        ];
        let changes = DerivedChanges::from_entries(&log);
        let converted: Vec<_> = changes.converted().collect();
        assert_eq!(converted, vec!["alicia"]);
    }

    #[test]
    fn test_reset_flag_last_wins_and_rekeys() {
        let log = vec![
            entry(LogAction::Renew, &["fred", "", "1"]),
            entry(LogAction::Renew, &["fred", "", "0"]),
            entry(LogAction::RenameExisting, &["fred", "freddy"]),
        ];
        let changes = DerivedChanges::from_entries(&log);

        assert!(changes.renewed("freddy"));
        assert!(!changes.wants_password_reset("freddy"));
        assert!(!changes.renewed("fred"));
    }

    #[test]
    fn test_rename_after_convert_and_renew_tracks_both() {
        let log = vec![
            entry(LogAction::Renew, &["dawn", "", "1"]),
            entry(LogAction::Convert, &["dawn", "committe"]),
            entry(LogAction::RenameExisting, &["dawn", "dusk"]),
            entry(LogAction::RenameExisting, &["dusk", "night"]),
        ];
        let changes = DerivedChanges::from_entries(&log);

        assert_eq!(changes.original_handle("night"), "dawn");
        assert!(changes.wants_password_reset("night"));
        assert_eq!(changes.converted().collect::<Vec<_>>(), vec!["night"]);
    }
}
