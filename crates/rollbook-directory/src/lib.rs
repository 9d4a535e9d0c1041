//! rollbook Directory Access
//!
//! The directory seam for the rollbook suite. One [`DirectoryClient`]
//! interface fronts both the club's own directory (accounts, groups,
//! reserved names) and the college's read-only registries (staff, alumni,
//! students); [`Subtree`] names which tree an operation targets.
//!
//! - [`client`] - the `DirectoryClient` trait
//! - [`ldap`] - LDAP implementation over a blocking connection
//! - [`memory`] - in-process implementation for tests and rehearsals
//! - [`store`] - typed member-record operations on the canonical tree
//! - [`entry`] - raw attribute multimap returned by lookups

pub mod client;
pub mod config;
pub mod entry;
pub mod error;
pub mod ldap;
pub mod memory;
pub mod store;
pub mod subtree;

pub use client::DirectoryClient;
pub use config::{DirectoryConfig, ServerConfig, TreeConfig};
pub use entry::DirEntry;
pub use error::{DirectoryError, DirectoryResult};
pub use ldap::LdapDirectory;
pub use memory::MemoryDirectory;
pub use store::MemberStore;
pub use subtree::Subtree;
