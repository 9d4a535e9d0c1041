//! Identity resolution against the college registries
//!
//! Given an 8-digit ID number, the resolver queries the three read-only
//! registry trees in a fixed priority order (staff, then alumni, then
//! students) and harvests name, contact and course data from the first
//! tree that knows the number. Staff or alumni standing outranks a
//! concurrent student registration, so the order is load-bearing.
//!
//! A total miss is fatal only when the caller expects the registries to
//! know the person: associate and staff hints get best-effort matching,
//! everyone else escalates.

use tracing::debug;

use rollbook_core::category::Category;
use rollbook_core::member::{ExternalId, MemberRecord};
use rollbook_directory::entry::DirEntry;
use rollbook_directory::{DirectoryClient, DirectoryError, MemberStore, Subtree};

use crate::error::{EngineError, EngineResult};

/// Which registry answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrySource {
    Staff,
    Alumni,
    Student,
}

impl RegistrySource {
    /// The membership category implied by a hit in this registry.
    #[must_use]
    pub fn category(self) -> Category {
        match self {
            RegistrySource::Staff => Category::Staff,
            RegistrySource::Alumni => Category::Associate,
            RegistrySource::Student => Category::Member,
        }
    }

    fn subtree(self) -> Subtree {
        match self {
            RegistrySource::Staff => Subtree::Staff,
            RegistrySource::Alumni => Subtree::Alumni,
            RegistrySource::Student => Subtree::Student,
        }
    }
}

impl std::fmt::Display for RegistrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RegistrySource::Staff => "staff",
            RegistrySource::Alumni => "alumni",
            RegistrySource::Student => "student",
        };
        f.write_str(name)
    }
}

/// Lookup order. First hit wins and no later tree is consulted.
const SEARCH_ORDER: [RegistrySource; 3] = [
    RegistrySource::Staff,
    RegistrySource::Alumni,
    RegistrySource::Student,
];

/// Fields harvested from a registry entry, plus where they came from.
/// An empty resolution (no source) means the lookup missed but the miss
/// was tolerable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub source: Option<RegistrySource>,
    pub legal_name: Option<String>,
    pub alternate_email: Option<String>,
    pub course: Option<String>,
    pub year: Option<String>,
}

impl Resolution {
    #[must_use]
    pub fn matched(&self) -> bool {
        self.source.is_some()
    }

    /// Category the registries vouch for, if any tree matched.
    #[must_use]
    pub fn suggested_category(&self) -> Option<Category> {
        self.source.map(RegistrySource::category)
    }

    /// Pick the category for a record being created: a registry match
    /// beats the hint only when no hint was given or override is in
    /// force; with neither, new records default to ordinary members.
    #[must_use]
    pub fn category_for(&self, hint: Option<Category>, override_existing: bool) -> Category {
        match (self.suggested_category(), hint) {
            (Some(found), None) => found,
            (Some(found), Some(_)) if override_existing => found,
            (_, Some(hinted)) => hinted,
            (None, None) => Category::Member,
        }
    }

    /// Copy harvested fields into a record.
    ///
    /// Without `override_existing` only unset fields are filled. With it
    /// the registry wins, except the alternate email of an associate,
    /// which is never auto-overwritten: graduates often replace their
    /// stale college address, and a later registry sync must not undo
    /// that.
    pub fn merge_into(&self, record: &mut MemberRecord, override_existing: bool) {
        merge_field(&mut record.legal_name, &self.legal_name, override_existing);
        merge_field(&mut record.course, &self.course, override_existing);
        merge_field(&mut record.year, &self.year, override_existing);

        let email_locked = record.category == Category::Associate && record.alternate_email.is_some();
        merge_field(
            &mut record.alternate_email,
            &self.alternate_email,
            override_existing && !email_locked,
        );
    }
}

fn merge_field(dst: &mut Option<String>, src: &Option<String>, override_existing: bool) {
    if src.is_some() && (override_existing || dst.is_none()) {
        dst.clone_from(src);
    }
}

/// Look an ID number up across the registries.
///
/// # Errors
///
/// A miss in every tree returns the registry's not-found error (severity
/// warning) unless the hinted category has elastic matching, in which
/// case an empty [`Resolution`] is returned instead.
pub fn resolve<C: DirectoryClient>(
    client: &C,
    id: ExternalId,
    hint: Option<Category>,
) -> EngineResult<Resolution> {
    for source in SEARCH_ORDER {
        if let Some(entry) = client.lookup_by_external_id(source.subtree(), id)? {
            debug!(%id, registry = %source, "registry match");
            return Ok(resolution_from(source, &entry));
        }
    }

    if hint.is_some_and(|h| h.elastic_resolution()) {
        debug!(%id, ?hint, "no registry match, tolerated for elastic category");
        return Ok(Resolution::default());
    }
    Err(EngineError::from(DirectoryError::not_found(
        Subtree::Student,
        id.to_string(),
    )))
}

fn resolution_from(source: RegistrySource, entry: &DirEntry) -> Resolution {
    let mut resolution = Resolution {
        source: Some(source),
        legal_name: derive_name(entry),
        alternate_email: entry.first("mail").map(ToString::to_string),
        course: None,
        year: None,
    };
    if let Some(location) = entry.first("l") {
        let (course, year) = match source {
            RegistrySource::Student => split_student_location(location),
            RegistrySource::Staff => (Some(location.to_string()), None),
            RegistrySource::Alumni => split_alumni_location(location),
        };
        resolution.course = course;
        resolution.year = year;
    }
    resolution
}

/// Full name from the structured given-name/surname pair, falling back to
/// the free-text gecos up to its first comma.
fn derive_name(entry: &DirEntry) -> Option<String> {
    match (entry.first("givenName"), entry.first("sn")) {
        (Some(given), Some(surname)) => Some(format!("{given} {surname}")),
        _ => entry
            .first("gecos")
            .map(|gecos| gecos.split(',').next().unwrap_or(gecos).to_string()),
    }
}

/// Student convention: last character of the location field is the year
/// code (digit or exchange letter), the rest is the course code.
fn split_student_location(location: &str) -> (Option<String>, Option<String>) {
    let mut chars = location.chars();
    let Some(year) = chars.next_back() else {
        return (None, None);
    };
    let course = chars.as_str();
    (
        Some(course.to_uppercase()),
        Some(year.to_uppercase().to_string()),
    )
}

/// Alumni convention: leading letters are the course code, trailing
/// digits the graduation year. Best-effort only; course codes containing
/// digits will split wrong, and a field with no digits at all becomes
/// just a course.
fn split_alumni_location(location: &str) -> (Option<String>, Option<String>) {
    match location.find(|c: char| c.is_ascii_digit()) {
        Some(idx) => (
            Some(location[..idx].to_uppercase()),
            Some(location[idx..].to_string()),
        ),
        None => (Some(location.to_uppercase()), None),
    }
}

/// Rebuild a member record for renewal: current directory data refreshed
/// from the registries.
///
/// The stored category is kept unless the caller hints a new one; either
/// way it must be a paying category. Registry data is merged with
/// override so stale course/year fields track the registry, subject to
/// the associate email rule. `tolerate_miss` downgrades a registry miss
/// to a logged warning, for operators renewing someone the college has
/// already purged.
pub fn resolve_for_renewal<C: DirectoryClient>(
    store: &MemberStore<C>,
    handle: &str,
    hint: Option<Category>,
    tolerate_miss: bool,
) -> EngineResult<MemberRecord> {
    let mut record = store.get_member(handle)?;
    if let Some(category) = hint {
        record.category = category;
    }
    rollbook_core::validate::check_renewal_category(record.category)?;

    if record.category.is_affiliated() {
        if let Some(id) = record.external_id {
            match resolve(store.client(), id, Some(record.category)) {
                Ok(mut resolution) => {
                    // Associates keep whatever address they gave us; their
                    // registry address goes stale once they leave.
                    if record.category == Category::Associate {
                        resolution.alternate_email = None;
                    }
                    resolution.merge_into(&mut record, true);
                }
                Err(err) if tolerate_miss && err.severity().is_warning() => {
                    tracing::warn!(handle, %id, error = %err, "registry miss tolerated for renewal");
                }
                Err(err) => return Err(err),
            }
        }
    }
    record.apply_renewal_defaults();
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollbook_directory::MemoryDirectory;
    use std::str::FromStr;

    fn id(raw: &str) -> ExternalId {
        ExternalId::from_str(raw).unwrap()
    }

    #[test]
    fn test_staff_outranks_student() {
        let dir = MemoryDirectory::new();
        dir.insert(
            Subtree::Staff,
            "prof",
            DirEntry::new("")
                .with_attr("cn", "15358462")
                .with_attr("givenName", "Grace")
                .with_attr("sn", "Hopper")
                .with_attr("mail", "grace@college.example")
                .with_attr("l", "Computing"),
        );
        dir.insert(
            Subtree::Student,
            "ghopper2",
            DirEntry::new("")
                .with_attr("employeeNumber", "15358462")
                .with_attr("l", "CASE4"),
        );

        let resolution = resolve(&dir, id("15358462"), None).unwrap();
        assert_eq!(resolution.source, Some(RegistrySource::Staff));
        assert_eq!(resolution.suggested_category(), Some(Category::Staff));
        assert_eq!(resolution.legal_name.as_deref(), Some("Grace Hopper"));
        // Department verbatim, no year, not the student course split.
        assert_eq!(resolution.course.as_deref(), Some("Computing"));
        assert_eq!(resolution.year, None);
    }

    #[test]
    fn test_student_location_split() {
        let dir = MemoryDirectory::new();
        dir.insert(
            Subtree::Student,
            "student1",
            DirEntry::new("")
                .with_attr("employeeNumber", "20240001")
                .with_attr("gecos", "Joe Bloggs,year 4")
                .with_attr("mail", "joe@college.example")
                .with_attr("l", "case4"),
        );

        let resolution = resolve(&dir, id("20240001"), None).unwrap();
        assert_eq!(resolution.suggested_category(), Some(Category::Member));
        assert_eq!(resolution.course.as_deref(), Some("CASE"));
        assert_eq!(resolution.year.as_deref(), Some("4"));
        // No structured name, so gecos up to the comma.
        assert_eq!(resolution.legal_name.as_deref(), Some("Joe Bloggs"));
    }

    #[test]
    fn test_alumni_location_split() {
        assert_eq!(
            split_alumni_location("bsc2019"),
            (Some("BSC".into()), Some("2019".into()))
        );
        assert_eq!(split_alumni_location("mint"), (Some("MINT".into()), None));
    }

    #[test]
    fn test_total_miss_elastic_vs_hard() {
        let dir = MemoryDirectory::new();

        let resolution = resolve(&dir, id("99999999"), Some(Category::Associate)).unwrap();
        assert!(!resolution.matched());

        let err = resolve(&dir, id("99999999"), Some(Category::Member)).unwrap_err();
        assert!(err.severity().is_warning());
        assert!(resolve(&dir, id("99999999"), None).is_err());
    }

    #[test]
    fn test_category_for() {
        let hit = Resolution {
            source: Some(RegistrySource::Alumni),
            ..Resolution::default()
        };
        assert_eq!(hit.category_for(None, false), Category::Associate);
        assert_eq!(hit.category_for(Some(Category::Guest), false), Category::Guest);
        assert_eq!(hit.category_for(Some(Category::Guest), true), Category::Associate);

        let miss = Resolution::default();
        assert_eq!(miss.category_for(None, false), Category::Member);
        assert_eq!(miss.category_for(Some(Category::Club), true), Category::Club);
    }

    #[test]
    fn test_merge_respects_set_fields() {
        let resolution = Resolution {
            source: Some(RegistrySource::Student),
            legal_name: Some("Registry Name".into()),
            alternate_email: Some("registry@college.example".into()),
            course: Some("EE".into()),
            year: Some("2".into()),
        };

        let mut record = MemberRecord::new("fred", Category::Member);
        record.legal_name = Some("Chosen Name".into());
        resolution.merge_into(&mut record, false);
        assert_eq!(record.legal_name.as_deref(), Some("Chosen Name"));
        assert_eq!(record.course.as_deref(), Some("EE"));

        resolution.merge_into(&mut record, true);
        assert_eq!(record.legal_name.as_deref(), Some("Registry Name"));
    }

    #[test]
    fn test_associate_email_never_clobbered() {
        let resolution = Resolution {
            source: Some(RegistrySource::Alumni),
            alternate_email: Some("old-college-address@college.example".into()),
            ..Resolution::default()
        };

        let mut record = MemberRecord::new("grad", Category::Associate);
        record.alternate_email = Some("personal@example.com".into());
        resolution.merge_into(&mut record, true);
        assert_eq!(
            record.alternate_email.as_deref(),
            Some("personal@example.com")
        );

        // Unset is still filled in.
        let mut fresh = MemberRecord::new("grad2", Category::Associate);
        resolution.merge_into(&mut fresh, false);
        assert_eq!(
            fresh.alternate_email.as_deref(),
            Some("old-college-address@college.example")
        );
    }
}
