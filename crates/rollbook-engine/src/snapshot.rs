//! Pre-cycle directory snapshot
//!
//! Before a registration cycle opens, the operator captures the handle →
//! {home directory, category} mapping of every live account. The
//! reconciliation run later uses it to recover the pre-rename state of
//! the filesystem: the database only holds final names and paths by then.
//!
//! Written once, read once, never updated in place.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rollbook_core::category::Category;
use rollbook_core::member::MemberRecord;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("could not read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not parse snapshot {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What the pipeline needs to remember about one pre-cycle account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_directory: Option<String>,
}

/// Point-in-time capture of the accounts tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub taken_at: DateTime<Utc>,
    pub entries: BTreeMap<String, SnapshotEntry>,
}

impl SyncSnapshot {
    /// Build a snapshot from the current member records.
    #[must_use]
    pub fn capture<'a>(members: impl IntoIterator<Item = &'a MemberRecord>) -> Self {
        let entries = members
            .into_iter()
            .map(|m| {
                (
                    m.handle.clone(),
                    SnapshotEntry {
                        category: m.category,
                        home_directory: m.home_directory.clone(),
                    },
                )
            })
            .collect();
        Self {
            taken_at: Utc::now(),
            entries,
        }
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SnapshotError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SnapshotError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let raw = serde_json::to_string_pretty(self).map_err(|source| SnapshotError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, raw).map_err(|source| SnapshotError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn get(&self, handle: &str) -> Option<&SnapshotEntry> {
        self.entries.get(handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(handle: &str, category: Category, home: &str) -> MemberRecord {
        let mut record = MemberRecord::new(handle, category);
        record.home_directory = Some(home.to_string());
        record
    }

    #[test]
    fn test_capture_and_lookup() {
        let members = vec![
            member("fred", Category::Member, "/home/member/f/fred"),
            member("chess", Category::Society, "/home/society/chess"),
        ];
        let snapshot = SyncSnapshot::capture(&members);

        assert_eq!(snapshot.len(), 2);
        let entry = snapshot.get("fred").unwrap();
        assert_eq!(entry.category, Category::Member);
        assert_eq!(entry.home_directory.as_deref(), Some("/home/member/f/fred"));
        assert!(snapshot.get("wilma").is_none());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presync.json");

        let members = vec![member("fred", Category::Member, "/home/member/f/fred")];
        let snapshot = SyncSnapshot::capture(&members);
        snapshot.save(&path).unwrap();

        let loaded = SyncSnapshot::load(&path).unwrap();
        assert_eq!(loaded.entries, snapshot.entries);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(
            SyncSnapshot::load(&missing),
            Err(SnapshotError::Read { .. })
        ));

        let garbled = dir.path().join("garbled.json");
        std::fs::write(&garbled, "{{{").unwrap();
        assert!(matches!(
            SyncSnapshot::load(&garbled),
            Err(SnapshotError::Parse { .. })
        ));
    }
}
