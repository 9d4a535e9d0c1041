//! Directory connection configuration
//!
//! Two servers: the club's own directory (read-write, authenticated bind)
//! and the college registry (read-only, usually anonymous). Base DNs for
//! each subtree are configurable; the defaults mirror the production
//! layout.

use serde::{Deserialize, Serialize};

use crate::subtree::Subtree;

/// Connection settings for one directory server.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server hostname or IP address.
    pub host: String,

    /// Server port (389 for LDAP, 636 for LDAPS).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Use LDAPS.
    #[serde(default)]
    pub use_tls: bool,

    /// Bind DN; anonymous bind when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_dn: Option<String>,

    /// Bind password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,
}

impl ServerConfig {
    /// Anonymous connection to a host on the default port.
    #[must_use]
    pub fn anonymous(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            use_tls: false,
            bind_dn: None,
            bind_password: None,
        }
    }

    /// Connection URL for this server.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.use_tls { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_tls", &self.use_tls)
            .field("bind_dn", &self.bind_dn)
            .field(
                "bind_password",
                &self.bind_password.as_ref().map(|_| "***REDACTED***"),
            )
            .finish()
    }
}

/// Base DNs for every subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default = "default_accounts_base")]
    pub accounts: String,
    #[serde(default = "default_groups_base")]
    pub groups: String,
    #[serde(default = "default_reserved_base")]
    pub reserved: String,
    #[serde(default = "default_staff_base")]
    pub staff: String,
    #[serde(default = "default_alumni_base")]
    pub alumni: String,
    #[serde(default = "default_student_base")]
    pub student: String,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            accounts: default_accounts_base(),
            groups: default_groups_base(),
            reserved: default_reserved_base(),
            staff: default_staff_base(),
            alumni: default_alumni_base(),
            student: default_student_base(),
        }
    }
}

impl TreeConfig {
    /// Base DN for the given subtree.
    #[must_use]
    pub fn base_dn(&self, subtree: Subtree) -> &str {
        match subtree {
            Subtree::Accounts => &self.accounts,
            Subtree::Groups => &self.groups,
            Subtree::Reserved => &self.reserved,
            Subtree::Staff => &self.staff,
            Subtree::Alumni => &self.alumni,
            Subtree::Student => &self.student,
        }
    }
}

/// Full directory configuration: both servers plus the tree layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// The club's own directory server.
    pub local: ServerConfig,

    /// The college registry server.
    pub registry: ServerConfig,

    /// Base DNs.
    #[serde(default)]
    pub trees: TreeConfig,
}

fn default_port() -> u16 {
    389
}

fn default_accounts_base() -> String {
    "ou=accounts,o=club".to_string()
}

fn default_groups_base() -> String {
    "ou=groups,o=club".to_string()
}

fn default_reserved_base() -> String {
    "ou=reserved,o=club".to_string()
}

fn default_staff_base() -> String {
    "ou=staff,o=college".to_string()
}

fn default_alumni_base() -> String {
    "ou=alumni,o=college".to_string()
}

fn default_student_base() -> String {
    "ou=students,o=college".to_string()
}
