//! Membership Categories
//!
//! Every account belongs to exactly one category. The category determines
//! the Unix primary group, the home-directory layout and which validation
//! rules apply (paying categories carry a years-paid balance, affiliated
//! categories require a college ID number).
//!
//! Wire names are the historical short forms stored in the directory:
//! note `associat` and `committe`, both truncated to fit the old 8-char
//! group name limit.

use serde::{Deserialize, Serialize};

/// Membership category of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Club founder.
    #[serde(rename = "founders")]
    Founders,

    /// Normal student member.
    #[serde(rename = "member")]
    Member,

    /// Graduate/associate member.
    #[serde(rename = "associat")]
    Associate,

    /// College staff member.
    #[serde(rename = "staff")]
    Staff,

    /// College society account.
    #[serde(rename = "society")]
    Society,

    /// College club account.
    #[serde(rename = "club")]
    Club,

    /// Project account.
    #[serde(rename = "projects")]
    Projects,

    /// Guest account.
    #[serde(rename = "guest")]
    Guest,

    /// Society from another college.
    #[serde(rename = "intersoc")]
    Intersoc,

    /// Committee member or position account.
    #[serde(rename = "committe")]
    Committee,

    /// Club-internal service account.
    #[serde(rename = "internal")]
    Internal,

    /// College-related account.
    #[serde(rename = "college")]
    College,
}

/// All categories in the order used for listings.
pub const ALL_CATEGORIES: [Category; 12] = [
    Category::Member,
    Category::Associate,
    Category::Staff,
    Category::Committee,
    Category::Society,
    Category::Club,
    Category::College,
    Category::Projects,
    Category::Internal,
    Category::Intersoc,
    Category::Guest,
    Category::Founders,
];

impl Category {
    /// Wire name as stored in the directory. Doubles as the Unix primary
    /// group name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Founders => "founders",
            Category::Member => "member",
            Category::Associate => "associat",
            Category::Staff => "staff",
            Category::Society => "society",
            Category::Club => "club",
            Category::Projects => "projects",
            Category::Guest => "guest",
            Category::Intersoc => "intersoc",
            Category::Committee => "committe",
            Category::Internal => "internal",
            Category::College => "college",
        }
    }

    /// Human-readable description for listings and prompts.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Category::Founders => "Club founder",
            Category::Member => "Normal member",
            Category::Associate => "Graduate/associate member",
            Category::Staff => "College staff member",
            Category::Society => "College society",
            Category::Club => "College club",
            Category::Projects => "Project account",
            Category::Guest => "Guest account",
            Category::Intersoc => "Society from another college",
            Category::Committee => "Committee member or position account",
            Category::Internal => "Club service account",
            Category::College => "College-related account",
        }
    }

    /// Whether accounts of this category carry a years-paid balance.
    #[must_use]
    pub fn is_paying(&self) -> bool {
        matches!(
            self,
            Category::Member
                | Category::Associate
                | Category::Staff
                | Category::Committee
                | Category::Guest
        )
    }

    /// Whether accounts of this category must carry an 8-digit college ID.
    #[must_use]
    pub fn is_affiliated(&self) -> bool {
        matches!(
            self,
            Category::Member | Category::Associate | Category::Staff | Category::Committee
        )
    }

    /// Whether the external registries are expected to know this ID.
    ///
    /// Committee accounts keep their ID after the holder graduates, so a
    /// registry miss is tolerated for them (and for guests, which have no
    /// registry presence at all).
    #[must_use]
    pub fn requires_registry_record(&self) -> bool {
        self.is_affiliated() && !matches!(self, Category::Committee)
    }

    /// Whether a registry miss during resolution is soft (best-effort
    /// matching) rather than an error to escalate.
    #[must_use]
    pub fn elastic_resolution(&self) -> bool {
        matches!(self, Category::Associate | Category::Staff)
    }

    /// Whether member home directories are sharded by first letter.
    #[must_use]
    pub fn hashed_home(&self) -> bool {
        matches!(self, Category::Member | Category::Associate)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "founders" => Ok(Category::Founders),
            "member" => Ok(Category::Member),
            "associat" => Ok(Category::Associate),
            "staff" => Ok(Category::Staff),
            "society" => Ok(Category::Society),
            "club" => Ok(Category::Club),
            "projects" => Ok(Category::Projects),
            "guest" => Ok(Category::Guest),
            "intersoc" => Ok(Category::Intersoc),
            "committe" => Ok(Category::Committee),
            "internal" => Ok(Category::Internal),
            "college" => Ok(Category::College),
            _ => Err(format!("Unknown category: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_as_str_round_trip() {
        for cat in ALL_CATEGORIES {
            assert_eq!(Category::from_str(cat.as_str()).unwrap(), cat);
        }
    }

    #[test]
    fn test_truncated_wire_names() {
        assert_eq!(Category::Associate.as_str(), "associat");
        assert_eq!(Category::Committee.as_str(), "committe");
        assert_eq!(Category::from_str("ASSOCIAT").unwrap(), Category::Associate);
    }

    #[test]
    fn test_unknown_category_rejected() {
        assert!(Category::from_str("alumnus").is_err());
        assert!(Category::from_str("").is_err());
    }

    #[test]
    fn test_paying_set() {
        let paying: Vec<_> = ALL_CATEGORIES.iter().filter(|c| c.is_paying()).collect();
        assert_eq!(paying.len(), 5);
        assert!(Category::Member.is_paying());
        assert!(Category::Guest.is_paying());
        assert!(!Category::Society.is_paying());
        assert!(!Category::Founders.is_paying());
    }

    #[test]
    fn test_affiliated_set() {
        assert!(Category::Member.is_affiliated());
        assert!(Category::Committee.is_affiliated());
        assert!(!Category::Guest.is_affiliated());
        assert!(!Category::Club.is_affiliated());
    }

    #[test]
    fn test_registry_expectations() {
        assert!(Category::Member.requires_registry_record());
        assert!(Category::Staff.requires_registry_record());
        assert!(!Category::Committee.requires_registry_record());
        assert!(!Category::Guest.requires_registry_record());
        assert!(Category::Associate.elastic_resolution());
        assert!(!Category::Member.elastic_resolution());
    }

    #[test]
    fn test_serde_wire_names() {
        let json = serde_json::to_string(&Category::Associate).unwrap();
        assert_eq!(json, "\"associat\"");
        let back: Category = serde_json::from_str("\"committe\"").unwrap();
        assert_eq!(back, Category::Committee);
    }

    #[test]
    fn test_hashed_home() {
        assert!(Category::Member.hashed_home());
        assert!(Category::Associate.hashed_home());
        assert!(!Category::Staff.hashed_home());
        assert!(!Category::Society.hashed_home());
    }
}
