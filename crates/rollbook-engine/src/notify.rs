//! Member notifications
//!
//! New and renewed members get their account details mailed to the
//! contact address on record. Delivery goes through the local sendmail
//! binary; the [`Notifier`] trait keeps the pipeline testable and lets
//! dry runs swap in a logger.
//!
//! [`RenewalMarkers`] remembers who has already been mailed this season,
//! so re-running a sync never spams members (or worse, re-randomizes a
//! password they already received).

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::info;

use rollbook_core::member::MemberRecord;

/// A notification could not be composed or delivered.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The member has no contact address on record.
    #[error("member '{0}' has no alternate email address")]
    MissingAddress(String),

    /// Failed to spawn or feed the mailer.
    #[error("failed to run {program}: {source}")]
    Sendmail {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The mailer ran but reported failure.
    #[error("{program} exited with {status}")]
    Delivery { program: String, status: String },

    /// Marker bookkeeping failed.
    #[error("failed to write renewal marker {path}: {source}")]
    Marker {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl NotifyError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            NotifyError::MissingAddress(_) => "NOTIFY_MISSING_ADDRESS",
            NotifyError::Sendmail { .. } => "NOTIFY_SENDMAIL",
            NotifyError::Delivery { .. } => "NOTIFY_DELIVERY",
            NotifyError::Marker { .. } => "NOTIFY_MARKER",
        }
    }
}

/// Identity and addressing used in outgoing mail.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NotifyConfig {
    /// Club name used in greetings and the From line.
    pub club_name: String,

    /// Sender address.
    pub from_address: String,

    /// Where replies and password problems should go.
    pub reply_to: String,

    /// Domain of member mailboxes, for the details footer.
    pub mail_domain: String,
}

/// Sends account details after an add or a renewal.
pub trait Notifier {
    /// Mail a member their details. `password` is included when one was
    /// just generated; the greeting follows the record's newbie flag.
    fn account_details(
        &self,
        record: &MemberRecord,
        password: Option<&str>,
    ) -> Result<(), NotifyError>;
}

/// Delivers through the local sendmail binary (`sendmail -t -i`, so the
/// recipient comes from the composed headers).
#[derive(Debug)]
pub struct MailNotifier {
    sendmail: PathBuf,
    config: NotifyConfig,
}

impl MailNotifier {
    #[must_use]
    pub fn new(sendmail: impl Into<PathBuf>, config: NotifyConfig) -> Self {
        Self {
            sendmail: sendmail.into(),
            config,
        }
    }
}

impl Notifier for MailNotifier {
    fn account_details(
        &self,
        record: &MemberRecord,
        password: Option<&str>,
    ) -> Result<(), NotifyError> {
        let message = compose_account_details(&self.config, record, password)?;
        let program = self.sendmail.display().to_string();

        let mut child = Command::new(&self.sendmail)
            .args(["-t", "-i"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|source| NotifyError::Sendmail {
                program: program.clone(),
                source,
            })?;
        if let Some(stdin) = child.stdin.take() {
            let mut stdin = stdin;
            stdin
                .write_all(message.as_bytes())
                .map_err(|source| NotifyError::Sendmail {
                    program: program.clone(),
                    source,
                })?;
        }
        let status = child.wait().map_err(|source| NotifyError::Sendmail {
            program: program.clone(),
            source,
        })?;
        if !status.success() {
            return Err(NotifyError::Delivery {
                program,
                status: status.to_string(),
            });
        }
        info!(handle = %record.handle, "account details mailed");
        Ok(())
    }
}

/// Logs instead of mailing. Used for dry runs; the password is never
/// written to the log.
#[derive(Debug, Default)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn account_details(
        &self,
        record: &MemberRecord,
        password: Option<&str>,
    ) -> Result<(), NotifyError> {
        info!(
            handle = %record.handle,
            to = record.alternate_email.as_deref().unwrap_or("<no address>"),
            newbie = record.newbie,
            with_password = password.is_some(),
            "account details mail suppressed"
        );
        Ok(())
    }
}

fn compose_account_details(
    config: &NotifyConfig,
    record: &MemberRecord,
    password: Option<&str>,
) -> Result<String, NotifyError> {
    let to = record
        .alternate_email
        .as_deref()
        .ok_or_else(|| NotifyError::MissingAddress(record.handle.clone()))?;

    let club = &config.club_name;
    let mut message = format!(
        "From: {club} Admin Team <{from}>\n\
         Subject: Welcome to {club}! - Your Account Details\n\
         To: {to}\n\
         Reply-To: {reply}\n\n",
        from = config.from_address,
        reply = config.reply_to,
    );
    if record.newbie {
        message.push_str(&format!("Welcome to {club}! Thank you for joining.\n"));
    } else {
        message.push_str(&format!("Welcome back to {club}! Thank you for renewing.\n"));
    }
    message.push_str(&format!("\nYour {club} account details are:\n\n"));

    let mut field = |name: &str, value: &str| {
        message.push_str(&format!("{name:>21}: {value}\n"));
    };
    field("username", &record.handle);
    if let Some(password) = password {
        field("password", password);
    }
    field("account type", record.category.as_str());
    if let Some(name) = &record.legal_name {
        field("name", name);
    }
    if let Some(id) = record.external_id {
        field("id number", &id.to_string());
    }
    if let Some(course) = &record.course {
        field("course", course);
    }
    if let Some(year) = &record.year {
        field("year", year);
    }

    message.push_str(&format!(
        "\nYour {club} email address: {handle}@{domain}\n",
        handle = record.handle,
        domain = config.mail_domain,
    ));
    if password.is_some() {
        message.push_str("\nWe recommend that you change your password as soon as you log in.\n");
    }
    message.push_str(&format!(
        "\nProblems with your password or wish to change your username? Contact:\n{}\n",
        config.reply_to,
    ));
    Ok(message)
}

/// Per-season record of who has been mailed about their renewal.
///
/// One empty file per handle under the marker directory. Sync consults
/// it before resetting passwords or mailing, and writes it after, so a
/// rerun skips members already handled.
#[derive(Debug, Clone)]
pub struct RenewalMarkers {
    dir: PathBuf,
}

impl RenewalMarkers {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn is_marked(&self, handle: &str) -> bool {
        self.dir.join(handle).exists()
    }

    pub fn mark(&self, handle: &str) -> Result<(), NotifyError> {
        fs::create_dir_all(&self.dir).map_err(|source| NotifyError::Marker {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.dir.join(handle);
        fs::File::create(&path)
            .map(drop)
            .map_err(|source| NotifyError::Marker { path, source })
    }

    /// Remove every marker. Run at the start of a new registration
    /// season, when last year's notifications no longer count.
    pub fn clear_all(&self) -> Result<usize, NotifyError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(NotifyError::Marker {
                    path: self.dir.clone(),
                    source,
                })
            }
        };
        let mut cleared = 0;
        for entry in entries {
            let path = entry
                .map_err(|source| NotifyError::Marker {
                    path: self.dir.clone(),
                    source,
                })?
                .path();
            if path.is_file() {
                fs::remove_file(&path).map_err(|source| NotifyError::Marker { path, source })?;
                cleared += 1;
            }
        }
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollbook_core::category::Category;
    use rollbook_core::member::ExternalId;

    fn test_config() -> NotifyConfig {
        NotifyConfig {
            club_name: "Netsoc".into(),
            from_address: "admins@netsoc.example".into(),
            reply_to: "admin-request@netsoc.example".into(),
            mail_domain: "netsoc.example".into(),
        }
    }

    #[test]
    fn test_compose_new_account() {
        let mut record = MemberRecord::new("fred", Category::Member);
        record.newbie = true;
        record.alternate_email = Some("fred@example.com".into());
        record.legal_name = Some("Fred Flintstone".into());
        record.external_id = ExternalId::new(15_358_462);
        record.course = Some("CASE".into());

        let message = compose_account_details(&test_config(), &record, Some("zigo42")).unwrap();
        assert!(message.starts_with("From: Netsoc Admin Team <admins@netsoc.example>\n"));
        assert!(message.contains("To: fred@example.com\n"));
        assert!(message.contains("Thank you for joining"));
        assert!(message.contains("             password: zigo42\n"));
        assert!(message.contains("             username: fred\n"));
        assert!(message.contains("fred@netsoc.example"));
    }

    #[test]
    fn test_compose_renewal_without_reset() {
        let mut record = MemberRecord::new("wilma", Category::Associate);
        record.newbie = false;
        record.alternate_email = Some("wilma@example.com".into());

        let message = compose_account_details(&test_config(), &record, None).unwrap();
        assert!(message.contains("Thank you for renewing"));
        assert!(!message.contains("             password:"));
        assert!(!message.contains("change your password as soon"));
    }

    #[test]
    fn test_compose_requires_address() {
        let record = MemberRecord::new("ghost", Category::Member);
        let err = compose_account_details(&test_config(), &record, None).unwrap_err();
        assert_eq!(err.error_code(), "NOTIFY_MISSING_ADDRESS");
    }

    #[test]
    fn test_markers() {
        let dir = tempfile::tempdir().unwrap();
        let markers = RenewalMarkers::new(dir.path().join("renewal_mailed"));

        assert!(!markers.is_marked("fred"));
        markers.mark("fred").unwrap();
        assert!(markers.is_marked("fred"));
        assert!(!markers.is_marked("wilma"));
        // Marking twice is fine.
        markers.mark("fred").unwrap();

        markers.mark("wilma").unwrap();
        assert_eq!(markers.clear_all().unwrap(), 2);
        assert!(!markers.is_marked("fred"));
        // Clearing a directory that never existed is a no-op.
        let fresh = RenewalMarkers::new(dir.path().join("never_made"));
        assert_eq!(fresh.clear_all().unwrap(), 0);
    }
}
