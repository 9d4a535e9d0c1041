//! Directory Subtrees
//!
//! Named trees a directory operation can target. Three are local to the
//! club's own server (the canonical store), three live on the college's
//! read-only registry server. Which server a [`Subtree`] routes to is an
//! implementation concern of the client; callers only name the tree.

use serde::{Deserialize, Serialize};

/// A named directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subtree {
    /// Active member accounts (canonical store).
    Accounts,

    /// Unix groups.
    Groups,

    /// Reserved names: system aliases, old handles kept out of use.
    Reserved,

    /// College staff registry (read-only).
    Staff,

    /// College alumni registry (read-only).
    Alumni,

    /// College student registry (read-only).
    Student,
}

impl Subtree {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Subtree::Accounts => "accounts",
            Subtree::Groups => "groups",
            Subtree::Reserved => "reserved",
            Subtree::Staff => "staff",
            Subtree::Alumni => "alumni",
            Subtree::Student => "student",
        }
    }

    /// Whether this tree lives on the club's own server.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Subtree::Accounts | Subtree::Groups | Subtree::Reserved)
    }

    /// The attribute naming entries in this tree.
    #[must_use]
    pub fn rdn_attribute(&self) -> &'static str {
        match self {
            Subtree::Accounts | Subtree::Staff | Subtree::Alumni | Subtree::Student => "uid",
            Subtree::Groups | Subtree::Reserved => "cn",
        }
    }

    /// The attribute an ID-number lookup matches in this tree.
    ///
    /// Registry schemas differ: students key on `employeeNumber`, alumni
    /// reuse `cn`, and staff IDs are inconsistently stored in `cn` or at
    /// the end of `gecos` (handled specially by implementations).
    #[must_use]
    pub fn id_attribute(&self) -> &'static str {
        match self {
            Subtree::Student => "employeeNumber",
            Subtree::Alumni | Subtree::Staff => "cn",
            Subtree::Accounts | Subtree::Groups | Subtree::Reserved => "id",
        }
    }
}

impl std::fmt::Display for Subtree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locality() {
        assert!(Subtree::Accounts.is_local());
        assert!(Subtree::Reserved.is_local());
        assert!(!Subtree::Staff.is_local());
        assert!(!Subtree::Student.is_local());
    }

    #[test]
    fn test_rdn_attributes() {
        assert_eq!(Subtree::Accounts.rdn_attribute(), "uid");
        assert_eq!(Subtree::Groups.rdn_attribute(), "cn");
        assert_eq!(Subtree::Reserved.rdn_attribute(), "cn");
    }

    #[test]
    fn test_id_attributes() {
        assert_eq!(Subtree::Student.id_attribute(), "employeeNumber");
        assert_eq!(Subtree::Alumni.id_attribute(), "cn");
        assert_eq!(Subtree::Accounts.id_attribute(), "id");
    }
}
