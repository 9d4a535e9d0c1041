//! Registration change log
//!
//! The registration front-end appends one colon-delimited line per
//! operation. The pipeline only ever reads the file; nothing here writes
//! it. Line shape:
//!
//! ```text
//! 2025-09-01 18:04:11:regadmin:rename-existing:fred:freddy
//! ```
//!
//! The timestamp itself contains two colons, so after splitting on `:`
//! the actor sits at index 3 and the action keyword at index 4. Trailing
//! fields are action-specific and positional; only the leading ones are
//! interpreted here, the rest stay as raw strings.

use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDateTime;

const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Operations the registration front-end records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogAction {
    Add,
    Delete,
    Renew,
    Update,
    Convert,
    /// Rename of an account that already existed before this
    /// registration cycle.
    RenameExisting,
    /// Rename of an account created within this cycle; the database's
    /// final state is all the pipeline needs for these.
    RenameNew,
}

impl LogAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::Add => "add",
            LogAction::Delete => "delete",
            LogAction::Renew => "renew",
            LogAction::Update => "update",
            LogAction::Convert => "convert",
            LogAction::RenameExisting => "rename-existing",
            LogAction::RenameNew => "rename-new",
        }
    }

    /// Fields an entry of this action must carry after the keyword.
    fn min_args(self) -> usize {
        match self {
            LogAction::Add | LogAction::Delete | LogAction::Update => 1,
            LogAction::Convert => 2,
            LogAction::RenameExisting | LogAction::RenameNew => 2,
            LogAction::Renew => 3,
        }
    }
}

impl std::fmt::Display for LogAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(LogAction::Add),
            "delete" => Ok(LogAction::Delete),
            "renew" => Ok(LogAction::Renew),
            "update" => Ok(LogAction::Update),
            "convert" => Ok(LogAction::Convert),
            "rename-existing" => Ok(LogAction::RenameExisting),
            "rename-new" => Ok(LogAction::RenameNew),
            _ => Err(format!("Unknown change log action: {s}")),
        }
    }
}

/// One parsed change log line.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeLogEntry {
    pub timestamp: NaiveDateTime,
    pub actor: String,
    pub action: LogAction,
    /// Positional fields after the action keyword. For `renew`,
    /// `args[2]` is the password-reset flag, already checked to be an
    /// integer.
    pub args: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ChangeLogError {
    #[error("could not read change log {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("change log {path} line {line_no}: {message}")]
    Malformed {
        path: PathBuf,
        line_no: usize,
        message: String,
    },
}

/// Read and parse the whole change log.
///
/// The action set is closed: a keyword outside it is a parse error, like
/// any other structural damage. The file is machine-written, so a line
/// this code cannot read means the log and the pipeline disagree about
/// the format, and silently dropping it could lose a rename.
pub fn read_changelog(path: &Path) -> Result<Vec<ChangeLogEntry>, ChangeLogError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ChangeLogError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Ok(entry) => entries.push(entry),
            Err(message) => {
                return Err(ChangeLogError::Malformed {
                    path: path.to_path_buf(),
                    line_no: idx + 1,
                    message,
                })
            }
        }
    }
    Ok(entries)
}

fn parse_line(line: &str) -> Result<ChangeLogEntry, String> {
    let fields: Vec<&str> = line.trim_end().split(':').collect();
    if fields.len() < 5 {
        return Err(format!("expected at least 5 fields, found {}", fields.len()));
    }

    // Rejoin the timestamp split apart by its own colons.
    let stamp = format!("{}:{}:{}", fields[0], fields[1], fields[2]);
    let timestamp = NaiveDateTime::parse_from_str(&stamp, STAMP_FORMAT)
        .map_err(|e| format!("bad timestamp '{stamp}': {e}"))?;
    let actor = fields[3].to_string();
    let action = fields[4].parse::<LogAction>()?;

    let args: Vec<String> = fields[5..].iter().map(ToString::to_string).collect();
    if args.len() < action.min_args() {
        return Err(format!(
            "{action} entry needs {} fields, found {}",
            action.min_args(),
            args.len()
        ));
    }
    if action == LogAction::Renew && args[2].trim().parse::<i32>().is_err() {
        return Err(format!("renew password flag '{}' is not an integer", args[2]));
    }

    Ok(ChangeLogEntry {
        timestamp,
        actor,
        action,
        args,
    })
}

impl ChangeLogEntry {
    /// For `renew` entries: whether the member asked for a new password.
    /// The flag is the third positional field, `0` or `1`.
    #[must_use]
    pub fn wants_password_reset(&self) -> bool {
        self.action == LogAction::Renew
            && self
                .args
                .get(2)
                .and_then(|v| v.trim().parse::<i32>().ok())
                .is_some_and(|v| v != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rename_line() {
        let entry = parse_line("2025-09-01 18:04:11:regadmin:rename-existing:fred:freddy").unwrap();
        assert_eq!(entry.action, LogAction::RenameExisting);
        assert_eq!(entry.actor, "regadmin");
        assert_eq!(entry.args, vec!["fred", "freddy"]);
        assert_eq!(
            entry.timestamp.format(STAMP_FORMAT).to_string(),
            "2025-09-01 18:04:11"
        );
    }

    #[test]
    fn test_parse_renew_line_with_flag() {
        let line = "2025-09-02 09:00:00:regadmin:renew:wilma::1:member:15358462:Wilma F:CASE:2:w@example.com::1";
        let entry = parse_line(line).unwrap();
        assert_eq!(entry.action, LogAction::Renew);
        assert!(entry.wants_password_reset());

        let line = "2025-09-02 09:00:00:regadmin:renew:wilma::0:member:15358462:Wilma F:CASE:2:w@example.com::1";
        assert!(!parse_line(line).unwrap().wants_password_reset());
    }

    #[test]
    fn test_unknown_action_rejected() {
        let err = parse_line("2025-09-01 18:04:11:regadmin:disuser:fred").unwrap_err();
        assert!(err.contains("disuser"));
    }

    #[test]
    fn test_malformed_lines_rejected() {
        // Too few fields.
        assert!(parse_line("2025-09-01 18:04:11:regadmin").is_err());
        // Bad timestamp.
        assert!(parse_line("yesterday sometime:x:y:regadmin:add:fred").is_err());
        // Rename without the new handle.
        assert!(parse_line("2025-09-01 18:04:11:regadmin:rename-existing:fred").is_err());
        // Renew with a non-numeric flag.
        assert!(parse_line("2025-09-01 18:04:11:regadmin:renew:fred::maybe").is_err());
    }

    #[test]
    fn test_read_changelog_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("changes.log");
        std::fs::write(
            &path,
            "2025-09-01 18:04:11:regadmin:add:fred:member:15358462\n\
             \n\
             2025-09-01 18:05:00:regadmin:convert:fred:committe\n",
        )
        .unwrap();

        let entries = read_changelog(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].action, LogAction::Convert);
    }

    #[test]
    fn test_read_changelog_missing_file() {
        let err = read_changelog(Path::new("/nonexistent/changes.log")).unwrap_err();
        assert!(matches!(err, ChangeLogError::Read { .. }));
    }
}
