//! Runtime configuration
//!
//! One JSON file, by default `/etc/rollbook/config.json`, overridable
//! with `--config` or `ROLLBOOK_CONFIG`. Directory and mail sections are
//! required; file locations and account defaults all fall back to the
//! production layout.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use rollbook_directory::DirectoryConfig;
use rollbook_engine::notify::NotifyConfig;

use crate::error::{CliError, CliResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory servers and tree layout.
    pub directory: DirectoryConfig,

    /// Mail headers for account detail messages.
    pub notify: NotifyConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub accounts: AccountDefaults,
}

/// Everything the suite reads from or writes to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_home_base")]
    pub home_base: PathBuf,

    #[serde(default = "default_skel_dir")]
    pub skel_dir: PathBuf,

    /// The system's allowed-shells list.
    #[serde(default = "default_shells_file")]
    pub shells_file: PathBuf,

    /// passwd dump taken before the yearly expiry, for shell restores.
    #[serde(default = "default_backup_passwd")]
    pub backup_passwd: PathBuf,

    #[serde(default = "default_counter_file")]
    pub counter_file: PathBuf,

    /// The registration front-end's append-only change log.
    #[serde(default = "default_changelog")]
    pub changelog: PathBuf,

    #[serde(default = "default_snapshot")]
    pub snapshot: PathBuf,

    /// Per-season renewal notification markers.
    #[serde(default = "default_markers_dir")]
    pub markers_dir: PathBuf,

    #[serde(default = "default_sendmail")]
    pub sendmail: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            home_base: default_home_base(),
            skel_dir: default_skel_dir(),
            shells_file: default_shells_file(),
            backup_passwd: default_backup_passwd(),
            counter_file: default_counter_file(),
            changelog: default_changelog(),
            snapshot: default_snapshot(),
            markers_dir: default_markers_dir(),
            sendmail: default_sendmail(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDefaults {
    #[serde(default = "default_shell")]
    pub default_shell: String,

    /// Pseudo-shell expired accounts are parked on.
    #[serde(default = "default_expired_shell")]
    pub expired_shell: String,

    /// Lowest UID the counter may hand out when it is first created.
    #[serde(default = "default_first_uid")]
    pub first_uid: u32,
}

impl Default for AccountDefaults {
    fn default() -> Self {
        Self {
            default_shell: default_shell(),
            expired_shell: default_expired_shell(),
            first_uid: default_first_uid(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> CliResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            CliError::Config(format!("could not read {}: {err}", path.display()))
        })?;
        serde_json::from_str(&raw)
            .map_err(|err| CliError::Config(format!("{}: {err}", path.display())))
    }
}

/// The admin running this command, for audit stamps. `sudo` preserves
/// the invoking account in `SUDO_USER`.
#[must_use]
pub fn operator() -> String {
    std::env::var("SUDO_USER")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_else(|_| "root".to_string())
}

fn default_home_base() -> PathBuf {
    PathBuf::from("/home")
}

fn default_skel_dir() -> PathBuf {
    PathBuf::from("/etc/skel")
}

fn default_shells_file() -> PathBuf {
    PathBuf::from("/etc/shells")
}

fn default_backup_passwd() -> PathBuf {
    PathBuf::from("/var/lib/rollbook/passwd.backup")
}

fn default_counter_file() -> PathBuf {
    PathBuf::from("/var/lib/rollbook/uid.counter")
}

fn default_changelog() -> PathBuf {
    PathBuf::from("/var/lib/rollbook/changes.log")
}

fn default_snapshot() -> PathBuf {
    PathBuf::from("/var/lib/rollbook/presync.json")
}

fn default_markers_dir() -> PathBuf {
    PathBuf::from("/var/lib/rollbook/renewed")
}

fn default_sendmail() -> PathBuf {
    PathBuf::from("/usr/sbin/sendmail")
}

fn default_shell() -> String {
    "/usr/local/shells/bash".to_string()
}

fn default_expired_shell() -> String {
    "/usr/local/shells/expired".to_string()
}

fn default_first_uid() -> u32 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let raw = r#"{
            "directory": {
                "local": { "host": "ldap.club.example" },
                "registry": { "host": "ldap.college.example" }
            },
            "notify": {
                "club_name": "Computer Club",
                "from_address": "admins@club.example",
                "reply_to": "admins@club.example",
                "mail_domain": "club.example"
            }
        }"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(raw.as_bytes()).unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.paths.home_base, PathBuf::from("/home"));
        assert_eq!(config.paths.sendmail, PathBuf::from("/usr/sbin/sendmail"));
        assert_eq!(config.accounts.first_uid, 10_000);
        assert_eq!(config.notify.club_name, "Computer Club");
        assert_eq!(config.directory.local.port, 389);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = AppConfig::load(Path::new("/nonexistent/rollbook.json")).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
        assert_eq!(err.exit_code(), 1);
    }
}
