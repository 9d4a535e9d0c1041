//! Home-Directory Layout
//!
//! Home directories live under a per-category directory. The two big
//! categories (member, associate) are sharded one level deeper by the
//! handle's first character to keep directory sizes manageable.

use std::path::{Path, PathBuf};

use crate::category::Category;

/// Compute the canonical home directory for an account.
#[must_use]
pub fn home_directory(home_base: &Path, handle: &str, category: Category) -> PathBuf {
    let dir = home_base.join(category.as_str());
    match handle.chars().next() {
        Some(first) if category.hashed_home() => dir.join(first.to_string()).join(handle),
        _ => dir.join(handle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_homes_are_sharded() {
        assert_eq!(
            home_directory(Path::new("/home"), "fred", Category::Member),
            PathBuf::from("/home/member/f/fred")
        );
        assert_eq!(
            home_directory(Path::new("/home"), "zoe", Category::Associate),
            PathBuf::from("/home/associat/z/zoe")
        );
    }

    #[test]
    fn test_other_homes_are_flat() {
        assert_eq!(
            home_directory(Path::new("/home"), "chess", Category::Society),
            PathBuf::from("/home/society/chess")
        );
        assert_eq!(
            home_directory(Path::new("/home"), "admin1", Category::Committee),
            PathBuf::from("/home/committe/admin1")
        );
        assert_eq!(
            home_directory(Path::new("/home"), "prof", Category::Staff),
            PathBuf::from("/home/staff/prof")
        );
    }
}
