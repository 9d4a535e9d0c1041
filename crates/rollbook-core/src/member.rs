//! Member Records
//!
//! [`MemberRecord`] is the in-memory form of one canonical-directory
//! account entry. Every optional attribute is an `Option`: "unset" and
//! "empty value" are different things here, and several business rules
//! (merge, renewal defaults) depend on the distinction.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::category::Category;

/// An 8-digit college ID number.
///
/// Stored numerically; leading zeros are preserved by the display
/// formatting, so `ExternalId` round-trips through its text form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(u32);

impl ExternalId {
    /// Largest value an 8-digit ID can hold.
    pub const MAX: u32 = 99_999_999;

    /// Create from a raw number, if it fits in 8 digits.
    #[must_use]
    pub fn new(value: u32) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    #[must_use]
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08}", self.0)
    }
}

impl std::str::FromStr for ExternalId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("ID number must be exactly 8 digits, got '{s}'"));
        }
        // 8 ASCII digits always fit in u32.
        let value: u32 = s.parse().map_err(|e| format!("invalid ID number: {e}"))?;
        Ok(Self(value))
    }
}

/// One member account as held in the canonical directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Unique short account name.
    pub handle: String,

    /// Membership category.
    pub category: Category,

    /// College ID number; required for affiliated categories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<ExternalId>,

    /// Full legal name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_name: Option<String>,

    /// Contact address outside the club's own mail system.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternate_email: Option<String>,

    /// Course code (or department for staff).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,

    /// Course year code, or graduation year for associates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,

    /// Paid-up years balance; -1 means in arrears past the grace period.
    /// Only meaningful for paying categories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years_paid: Option<i32>,

    /// First-time member this registration year.
    pub newbie: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<NaiveDate>,

    /// Allocated Unix UID, once the account has been provisioned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid_number: Option<u32>,

    /// Primary GID, always the category's group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid_number: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_directory: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_shell: Option<String>,
}

impl MemberRecord {
    /// Create a bare record with only the identity fields set.
    #[must_use]
    pub fn new(handle: impl Into<String>, category: Category) -> Self {
        Self {
            handle: handle.into(),
            category,
            external_id: None,
            legal_name: None,
            alternate_email: None,
            course: None,
            year: None,
            years_paid: None,
            newbie: false,
            created_by: None,
            created_at: None,
            updated_by: None,
            updated_at: None,
            birthday: None,
            uid_number: None,
            gid_number: None,
            home_directory: None,
            login_shell: None,
        }
    }

    /// Fill fields from another record.
    ///
    /// Without `override_existing`, a field is taken from `other` only if
    /// it is set there and unset here. With it, `other`'s set fields always
    /// win. `updated_by` is never merged; it records who is making the
    /// current change and must come from the caller.
    pub fn merge_from(&mut self, other: &MemberRecord, override_existing: bool) {
        merge_opt(&mut self.external_id, &other.external_id, override_existing);
        merge_opt(&mut self.legal_name, &other.legal_name, override_existing);
        merge_opt(
            &mut self.alternate_email,
            &other.alternate_email,
            override_existing,
        );
        merge_opt(&mut self.course, &other.course, override_existing);
        merge_opt(&mut self.year, &other.year, override_existing);
        merge_opt(&mut self.years_paid, &other.years_paid, override_existing);
        merge_opt(&mut self.created_by, &other.created_by, override_existing);
        merge_opt(&mut self.created_at, &other.created_at, override_existing);
        merge_opt(&mut self.updated_at, &other.updated_at, override_existing);
        merge_opt(&mut self.birthday, &other.birthday, override_existing);
        merge_opt(&mut self.uid_number, &other.uid_number, override_existing);
        merge_opt(&mut self.gid_number, &other.gid_number, override_existing);
        merge_opt(
            &mut self.home_directory,
            &other.home_directory,
            override_existing,
        );
        merge_opt(&mut self.login_shell, &other.login_shell, override_existing);
    }

    /// Defaults for a newly created record: newbies by definition, and
    /// paying categories start with one paid year. Committee and guest
    /// accounts pay by arrangement, so no assumption is made for them.
    pub fn apply_new_defaults(&mut self) {
        self.newbie = true;
        if self.years_paid.is_none()
            && self.category.is_paying()
            && !matches!(self.category, Category::Committee | Category::Guest)
        {
            self.years_paid = Some(1);
        }
    }

    /// Defaults for a renewal: a paying member renewing is paid up for at
    /// least one year.
    pub fn apply_renewal_defaults(&mut self) {
        if self.category.is_paying() && self.years_paid.map_or(true, |y| y < 1) {
            self.years_paid = Some(1);
        }
    }
}

fn merge_opt<T: Clone>(dst: &mut Option<T>, src: &Option<T>, override_existing: bool) {
    if src.is_some() && (override_existing || dst.is_none()) {
        dst.clone_from(src);
    }
}
