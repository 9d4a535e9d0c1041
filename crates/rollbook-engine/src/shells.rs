//! Login-shell tables
//!
//! Two host files feed the renewal pass: the system shells file (which
//! login shells are allowed) and last year's passwd dump (what shell a
//! member had before their account was expired). Members whose shell is
//! no longer valid, typically because expiry parked it on the expired
//! pseudo-shell, get their old shell back, or the default.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

/// A shell table file could not be read or made sense of.
#[derive(Debug, thiserror::Error)]
pub enum ShellsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ShellsError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            ShellsError::Read { .. } => "SHELLS_READ",
        }
    }
}

/// The set of shells a live account may use.
///
/// The expired pseudo-shell is excluded even when listed, so an expired
/// account always fails [`is_valid`](Self::is_valid) and gets restored.
#[derive(Debug, Clone)]
pub struct ValidShells {
    shells: Vec<String>,
    expired_shell: String,
}

impl ValidShells {
    /// Parse a shells file. One shell per line, first whitespace-free
    /// token counts, `#` starts a comment.
    pub fn load(path: &Path, expired_shell: impl Into<String>) -> Result<Self, ShellsError> {
        let text = fs::read_to_string(path).map_err(|source| ShellsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let expired_shell = expired_shell.into();
        let shells = text
            .lines()
            .filter_map(first_token)
            .filter(|token| *token != expired_shell)
            .map(ToString::to_string)
            .collect();
        Ok(Self {
            shells,
            expired_shell,
        })
    }

    /// Build a table directly, for tests and non-Unix setups.
    #[must_use]
    pub fn from_shells(
        shells: impl IntoIterator<Item = impl Into<String>>,
        expired_shell: impl Into<String>,
    ) -> Self {
        let expired_shell = expired_shell.into();
        Self {
            shells: shells
                .into_iter()
                .map(Into::into)
                .filter(|s| *s != expired_shell)
                .collect(),
            expired_shell,
        }
    }

    #[must_use]
    pub fn is_valid(&self, shell: &str) -> bool {
        !shell.is_empty() && self.shells.iter().any(|s| s == shell)
    }

    /// The pseudo-shell expired accounts are parked on.
    #[must_use]
    pub fn expired_shell(&self) -> &str {
        &self.expired_shell
    }
}

fn first_token(line: &str) -> Option<&str> {
    let token = line.split_whitespace().next()?;
    if token.starts_with('#') {
        return None;
    }
    token.split('#').next()
}

/// Shells members had before expiry, keyed by handle.
///
/// Sourced from the passwd dump taken before the yearly expiry run; a
/// handle the dump does not know falls back to the default shell.
#[derive(Debug, Clone)]
pub struct BackupShells {
    shells: HashMap<String, String>,
    default_shell: String,
}

impl BackupShells {
    /// Parse a passwd-format dump (`handle:x:uid:gid:gecos:home:shell`).
    /// Short lines are logged and skipped.
    pub fn load(path: &Path, default_shell: impl Into<String>) -> Result<Self, ShellsError> {
        let text = fs::read_to_string(path).map_err(|source| ShellsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut shells = HashMap::new();
        for (line_no, line) in text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 7 {
                warn!(path = %path.display(), line_no = line_no + 1, "short passwd line skipped");
                continue;
            }
            shells.insert(fields[0].to_string(), fields[6].trim_end().to_string());
        }
        Ok(Self {
            shells,
            default_shell: default_shell.into(),
        })
    }

    /// An empty table; every lookup yields the default shell.
    #[must_use]
    pub fn empty(default_shell: impl Into<String>) -> Self {
        Self {
            shells: HashMap::new(),
            default_shell: default_shell.into(),
        }
    }

    #[must_use]
    pub fn shell_for(&self, handle: &str) -> &str {
        self.shells
            .get(handle)
            .map_or(&self.default_shell, String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EXPIRED: &str = "/usr/local/shells/expired";

    #[test]
    fn test_valid_shells_skips_expired_and_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# system shells").unwrap();
        writeln!(file, "/bin/bash").unwrap();
        writeln!(file, "/usr/local/shells/zsh  # preferred").unwrap();
        writeln!(file, "{EXPIRED}").unwrap();
        writeln!(file).unwrap();

        let shells = ValidShells::load(file.path(), EXPIRED).unwrap();
        assert!(shells.is_valid("/bin/bash"));
        assert!(shells.is_valid("/usr/local/shells/zsh"));
        assert!(!shells.is_valid(EXPIRED));
        assert!(!shells.is_valid(""));
        assert!(!shells.is_valid("/bin/fish"));
    }

    #[test]
    fn test_backup_shells_lookup_and_fallback() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "fred:x:10501:103:Fred:/home/member/f/fred:/bin/bash").unwrap();
        writeln!(file, "broken line without colons").unwrap();
        writeln!(
            file,
            "zoe:x:10502:105:Zoe:/home/associat/z/zoe:/usr/local/shells/zsh"
        )
        .unwrap();

        let backup = BackupShells::load(file.path(), "/usr/local/shells/bash").unwrap();
        assert_eq!(backup.shell_for("fred"), "/bin/bash");
        assert_eq!(backup.shell_for("zoe"), "/usr/local/shells/zsh");
        assert_eq!(backup.shell_for("unknown"), "/usr/local/shells/bash");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = ValidShells::load(Path::new("/nonexistent/SHELLS"), EXPIRED).unwrap_err();
        assert_eq!(err.error_code(), "SHELLS_READ");
    }
}
