//! Canonical member store
//!
//! Typed operations on the accounts tree. The store translates between
//! [`MemberRecord`] and the historical attribute schema (category as the
//! leading `objectClass`, `altmail`, `yearsPaid`, ...) and owns the
//! uniqueness checks a new handle must pass.
//!
//! Passwords are written in the clear on the wire; the directory server
//! hashes on write (password-policy overlay), so no digest format is
//! fixed here.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;

use rollbook_core::category::Category;
use rollbook_core::member::{ExternalId, MemberRecord};

use crate::client::DirectoryClient;
use crate::entry::DirEntry;
use crate::error::{DirectoryError, DirectoryResult};
use crate::subtree::Subtree;

// The membership category rides as the leading objectClass value; these
// are appended after it.
const DEFAULT_OBJECT_CLASSES: [&str; 3] = ["posixAccount", "top", "shadowAccount"];
const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Typed access to the canonical accounts tree.
#[derive(Debug)]
pub struct MemberStore<C> {
    client: C,
}

impl<C: DirectoryClient> MemberStore<C> {
    #[must_use]
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Borrow the underlying client (registry lookups share the
    /// connection).
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetch a member record; absence is an error here.
    pub fn get_member(&self, handle: &str) -> DirectoryResult<MemberRecord> {
        self.try_get_member(handle)?
            .ok_or_else(|| DirectoryError::not_found(Subtree::Accounts, handle))
    }

    /// Fetch a member record if one exists.
    pub fn try_get_member(&self, handle: &str) -> DirectoryResult<Option<MemberRecord>> {
        self.client
            .lookup_by_handle(Subtree::Accounts, handle)?
            .map(|entry| entry_to_record(&entry))
            .transpose()
    }

    pub fn member_exists(&self, handle: &str) -> DirectoryResult<bool> {
        Ok(self
            .client
            .lookup_by_handle(Subtree::Accounts, handle)?
            .is_some())
    }

    /// Find the member owning an ID number, if any.
    pub fn find_by_external_id(&self, id: ExternalId) -> DirectoryResult<Option<MemberRecord>> {
        self.client
            .lookup_by_external_id(Subtree::Accounts, id)?
            .map(|entry| entry_to_record(&entry))
            .transpose()
    }

    /// A new handle must be free of accounts, groups and reserved names
    /// at once. The first two are hard conflicts; a reserved name is a
    /// warning the caller may override.
    pub fn check_handle_free(&self, handle: &str) -> DirectoryResult<()> {
        if self
            .client
            .lookup_by_handle(Subtree::Accounts, handle)?
            .is_some()
        {
            return Err(DirectoryError::HandleTaken(handle.to_string()));
        }
        if self
            .client
            .lookup_by_handle(Subtree::Groups, handle)?
            .is_some()
        {
            return Err(DirectoryError::HandleIsGroup(handle.to_string()));
        }
        if let Some(entry) = self.client.lookup_by_handle(Subtree::Reserved, handle)? {
            let reason = entry
                .first("description")
                .unwrap_or("reserved entry")
                .to_string();
            return Err(DirectoryError::HandleReserved(handle.to_string(), reason));
        }
        Ok(())
    }

    /// An ID number may belong to at most one account.
    pub fn check_external_id_free(
        &self,
        id: ExternalId,
        exclude_handle: Option<&str>,
    ) -> DirectoryResult<()> {
        if let Some(entry) = self.client.lookup_by_external_id(Subtree::Accounts, id)? {
            let owner = entry.first("uid").unwrap_or_default();
            if Some(owner) != exclude_handle {
                return Err(DirectoryError::ExternalIdTaken {
                    id: id.to_string(),
                    handle: owner.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Create the directory entry for a new member.
    ///
    /// The record must already carry an allocated UID number and a home
    /// directory; the primary GID is read from the category's group
    /// entry.
    pub fn add_member(&self, record: &MemberRecord, password: &str) -> DirectoryResult<()> {
        let uid_number = record.uid_number.ok_or_else(|| {
            DirectoryError::invalid_entry(&record.handle, "no UID number allocated")
        })?;
        let home_directory = record.home_directory.as_deref().ok_or_else(|| {
            DirectoryError::invalid_entry(&record.handle, "no home directory set")
        })?;
        let login_shell = record.login_shell.as_deref().ok_or_else(|| {
            DirectoryError::invalid_entry(&record.handle, "no login shell set")
        })?;
        let gid_number = self.gid_for_category(record.category)?;

        let mut entry = DirEntry::new("");
        entry.push("uid", &record.handle);
        entry.set(
            "objectClass",
            std::iter::once(record.category.as_str())
                .chain(DEFAULT_OBJECT_CLASSES)
                .map(ToString::to_string)
                .collect(),
        );
        entry.push("newbie", if record.newbie { "TRUE" } else { "FALSE" });
        if let Some(id) = record.external_id {
            entry.push("id", id.to_string());
        }
        if let Some(name) = &record.legal_name {
            entry.push("cn", name);
            entry.push("gecos", name);
        } else {
            entry.push("cn", &record.handle);
            entry.push("gecos", &record.handle);
        }
        if let Some(mail) = &record.alternate_email {
            entry.push("altmail", mail);
        }
        if let Some(course) = &record.course {
            entry.push("course", course);
        }
        if let Some(year) = &record.year {
            entry.push("year", year);
        }
        if let Some(years) = record.years_paid {
            entry.push("yearsPaid", years.to_string());
        }
        if let Some(birthday) = record.birthday {
            entry.push("birthday", birthday.format(DATE_FORMAT).to_string());
        }
        if let Some(by) = &record.created_by {
            entry.push("createdby", by);
        }
        if let Some(at) = record.created_at {
            entry.push("created", at.format(STAMP_FORMAT).to_string());
        }
        if let Some(by) = &record.updated_by {
            entry.push("updatedby", by);
        }
        if let Some(at) = record.updated_at {
            entry.push("updated", at.format(STAMP_FORMAT).to_string());
        }
        entry.push("uidNumber", uid_number.to_string());
        entry.push("gidNumber", gid_number.to_string());
        entry.push("homeDirectory", home_directory);
        entry.push("loginShell", login_shell);
        entry.push("userPassword", password);

        self.client.add(Subtree::Accounts, &record.handle, entry)
    }

    /// Write the renewal attribute set for an existing member.
    ///
    /// Replaces the newbie flag, display name, contact and course data
    /// plus the audit stamp; identity attributes (uid, uidNumber, home)
    /// are never touched by a renewal.
    pub fn renew_member(&self, record: &MemberRecord) -> DirectoryResult<()> {
        let updated_by = record.updated_by.as_deref().ok_or_else(|| {
            DirectoryError::invalid_entry(&record.handle, "renewal without updatedby")
        })?;
        let updated_at = record.updated_at.ok_or_else(|| {
            DirectoryError::invalid_entry(&record.handle, "renewal without updated stamp")
        })?;

        let mut replacements: Vec<(String, Vec<String>)> = vec![
            (
                "newbie".into(),
                vec![if record.newbie { "TRUE" } else { "FALSE" }.into()],
            ),
            ("updatedby".into(), vec![updated_by.into()]),
            (
                "updated".into(),
                vec![updated_at.format(STAMP_FORMAT).to_string()],
            ),
        ];
        if let Some(name) = &record.legal_name {
            replacements.push(("cn".into(), vec![name.clone()]));
        }
        if let Some(mail) = &record.alternate_email {
            replacements.push(("altmail".into(), vec![mail.clone()]));
        }
        if let Some(id) = record.external_id {
            replacements.push(("id".into(), vec![id.to_string()]));
        }
        if let Some(course) = &record.course {
            replacements.push(("course".into(), vec![course.clone()]));
        }
        if let Some(year) = &record.year {
            replacements.push(("year".into(), vec![year.clone()]));
        }
        if let Some(years) = record.years_paid {
            replacements.push(("yearsPaid".into(), vec![years.to_string()]));
        }
        if let Some(birthday) = record.birthday {
            replacements.push((
                "birthday".into(),
                vec![birthday.format(DATE_FORMAT).to_string()],
            ));
        }
        self.client
            .modify_replace(Subtree::Accounts, &record.handle, replacements)
    }

    /// Rewrite the category-bearing attributes for a category change.
    ///
    /// Replaces the leading `objectClass`, the primary GID (fresh lookup
    /// against the new category's group entry), the home directory the
    /// record now claims, and the audit stamp. Returns the new GID so
    /// the caller can re-own the home tree on disk.
    pub fn convert_member(&self, record: &MemberRecord) -> DirectoryResult<u32> {
        let home_directory = record.home_directory.as_deref().ok_or_else(|| {
            DirectoryError::invalid_entry(&record.handle, "conversion without a home directory")
        })?;
        let updated_by = record.updated_by.as_deref().ok_or_else(|| {
            DirectoryError::invalid_entry(&record.handle, "conversion without updatedby")
        })?;
        let updated_at = record.updated_at.ok_or_else(|| {
            DirectoryError::invalid_entry(&record.handle, "conversion without updated stamp")
        })?;
        let gid_number = self.gid_for_category(record.category)?;

        self.client.modify_replace(
            Subtree::Accounts,
            &record.handle,
            vec![
                (
                    "objectClass".into(),
                    std::iter::once(record.category.as_str())
                        .chain(DEFAULT_OBJECT_CLASSES)
                        .map(ToString::to_string)
                        .collect(),
                ),
                ("gidNumber".into(), vec![gid_number.to_string()]),
                ("homeDirectory".into(), vec![home_directory.into()]),
                ("updatedby".into(), vec![updated_by.into()]),
                (
                    "updated".into(),
                    vec![updated_at.format(STAMP_FORMAT).to_string()],
                ),
            ],
        )?;
        Ok(gid_number)
    }

    pub fn set_password(&self, handle: &str, password: &str) -> DirectoryResult<()> {
        self.client.modify_replace(
            Subtree::Accounts,
            handle,
            vec![("userPassword".into(), vec![password.into()])],
        )
    }

    pub fn set_shell(&self, handle: &str, shell: &str) -> DirectoryResult<()> {
        self.client.modify_replace(
            Subtree::Accounts,
            handle,
            vec![("loginShell".into(), vec![shell.into()])],
        )
    }

    /// All member records. Malformed entries are logged and skipped so a
    /// single bad record cannot take down a batch run.
    pub fn list_members(&self) -> DirectoryResult<Vec<MemberRecord>> {
        let mut members = Vec::new();
        for entry in self.client.list(Subtree::Accounts)? {
            match entry_to_record(&entry) {
                Ok(record) => members.push(record),
                Err(err) => {
                    warn!(dn = %entry.dn, error = %err, "skipping malformed account entry");
                }
            }
        }
        Ok(members)
    }

    /// Members registered for the first time this year.
    pub fn list_newbies(&self) -> DirectoryResult<Vec<MemberRecord>> {
        Ok(self
            .list_members()?
            .into_iter()
            .filter(|m| m.newbie)
            .collect())
    }

    /// Paid-up renewals: at least one year paid and not a newbie.
    pub fn list_paid_non_newbies(&self) -> DirectoryResult<Vec<MemberRecord>> {
        Ok(self
            .list_members()?
            .into_iter()
            .filter(|m| !m.newbie && m.years_paid.is_some_and(|y| y >= 1))
            .collect())
    }

    /// Highest UID number currently allocated, if any account has one.
    pub fn max_uid_number(&self) -> DirectoryResult<Option<u32>> {
        Ok(self
            .list_members()?
            .iter()
            .filter_map(|m| m.uid_number)
            .max())
    }

    fn gid_for_category(&self, category: Category) -> DirectoryResult<u32> {
        let entry = self
            .client
            .lookup_by_handle(Subtree::Groups, category.as_str())?
            .ok_or_else(|| DirectoryError::GroupMissing(category.to_string()))?;
        entry
            .first("gidNumber")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| {
                DirectoryError::invalid_entry(category.as_str(), "group entry has no gidNumber")
            })
    }
}

fn entry_to_record(entry: &DirEntry) -> DirectoryResult<MemberRecord> {
    let handle = entry
        .first("uid")
        .ok_or_else(|| DirectoryError::invalid_entry(&entry.dn, "missing uid attribute"))?
        .to_string();
    // The category is whichever objectClass value names a known
    // membership category.
    let category: Category = entry
        .all("objectClass")
        .iter()
        .find_map(|v| v.parse().ok())
        .ok_or_else(|| {
            DirectoryError::invalid_entry(&handle, "no membership category in objectClass")
        })?;

    let mut record = MemberRecord::new(handle.clone(), category);
    record.newbie = entry
        .first("newbie")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    record.external_id = parse_attr(entry, "id", &handle, |v| v.parse::<ExternalId>().ok())?;
    record.legal_name = entry.first("cn").map(ToString::to_string);
    record.alternate_email = entry.first("altmail").map(ToString::to_string);
    record.course = entry.first("course").map(ToString::to_string);
    record.year = entry.first("year").map(ToString::to_string);
    record.years_paid = parse_attr(entry, "yearsPaid", &handle, |v| v.parse::<i32>().ok())?;
    record.birthday = parse_attr(entry, "birthday", &handle, |v| {
        NaiveDate::parse_from_str(v, DATE_FORMAT).ok()
    })?;
    record.created_by = entry.first("createdby").map(ToString::to_string);
    record.created_at = parse_attr(entry, "created", &handle, parse_stamp)?;
    record.updated_by = entry.first("updatedby").map(ToString::to_string);
    record.updated_at = parse_attr(entry, "updated", &handle, parse_stamp)?;
    record.uid_number = parse_attr(entry, "uidNumber", &handle, |v| v.parse::<u32>().ok())?;
    record.gid_number = parse_attr(entry, "gidNumber", &handle, |v| v.parse::<u32>().ok())?;
    record.home_directory = entry.first("homeDirectory").map(ToString::to_string);
    record.login_shell = entry.first("loginShell").map(ToString::to_string);
    Ok(record)
}

fn parse_stamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, STAMP_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}

/// Parse an optional attribute, failing loudly when a present value is
/// garbage (a silently dropped value would look like "unset" to the
/// business rules).
fn parse_attr<T>(
    entry: &DirEntry,
    name: &str,
    handle: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> DirectoryResult<Option<T>> {
    match entry.first(name) {
        None => Ok(None),
        Some(raw) => parse(raw)
            .map(Some)
            .ok_or_else(|| {
                DirectoryError::invalid_entry(handle, format!("bad {name} value '{raw}'"))
            }),
    }
}
