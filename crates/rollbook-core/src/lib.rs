//! rollbook Core Library
//!
//! Shared domain types for the rollbook membership suite.
//!
//! # Modules
//!
//! - [`category`] - Membership categories and the derived paying/affiliated sets
//! - [`member`] - [`MemberRecord`], [`ExternalId`] and merge semantics
//! - [`validate`] - Field validation rules (handles, IDs, years paid)
//! - [`policy`] - Error severity and the warning-override disposition
//! - [`password`] - Pronounceable password generation
//! - [`paths`] - Home-directory layout

pub mod category;
pub mod member;
pub mod password;
pub mod paths;
pub mod policy;
pub mod validate;

pub use category::Category;
pub use member::{ExternalId, MemberRecord};
pub use policy::{disposition, Disposition, OverridePolicy, Severity};
pub use validate::ValidationError;
