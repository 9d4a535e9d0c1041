//! LDAP directory client
//!
//! Blocking [`DirectoryClient`] implementation holding one connection per
//! server: the club directory gets an authenticated bind, the college
//! registry usually binds anonymously. All user-supplied values are
//! escaped before they reach a filter or DN.

use std::collections::HashSet;
use std::sync::Mutex;

use ldap3::{dn_escape, ldap_escape, LdapConn, LdapError, Mod, Scope, SearchEntry};
use tracing::debug;

use rollbook_core::member::ExternalId;

use crate::client::DirectoryClient;
use crate::config::{DirectoryConfig, ServerConfig};
use crate::entry::DirEntry;
use crate::error::{DirectoryError, DirectoryResult};
use crate::subtree::Subtree;

/// Client over live LDAP connections.
pub struct LdapDirectory {
    config: DirectoryConfig,
    local: Mutex<LdapConn>,
    registry: Mutex<LdapConn>,
}

impl LdapDirectory {
    /// Connect and bind to both servers.
    pub fn connect(config: DirectoryConfig) -> DirectoryResult<Self> {
        let local = open(&config.local)?;
        let registry = open(&config.registry)?;
        debug!(
            local = %config.local.url(),
            registry = %config.registry.url(),
            "directory connections established"
        );
        Ok(Self {
            config,
            local: Mutex::new(local),
            registry: Mutex::new(registry),
        })
    }

    fn with_conn<R>(
        &self,
        subtree: Subtree,
        f: impl FnOnce(&mut LdapConn) -> Result<R, LdapError>,
    ) -> Result<R, LdapError> {
        let mutex = if subtree.is_local() {
            &self.local
        } else {
            &self.registry
        };
        let mut guard = match mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn search(
        &self,
        subtree: Subtree,
        filter: &str,
    ) -> DirectoryResult<Vec<DirEntry>> {
        let base = self.config.trees.base_dn(subtree).to_string();
        // The registry trees nest one level deeper than ours.
        let scope = if subtree.is_local() {
            Scope::OneLevel
        } else {
            Scope::Subtree
        };
        let entries = self
            .with_conn(subtree, |conn| {
                let (rs, _res) = conn.search(&base, scope, filter, vec!["*"])?.success()?;
                Ok(rs)
            })
            .map_err(|e| {
                DirectoryError::protocol_with_source(
                    format!("search in {subtree} tree with filter {filter}"),
                    e,
                )
            })?;
        Ok(entries
            .into_iter()
            .map(|raw| {
                let se = SearchEntry::construct(raw);
                DirEntry::from_parts(se.dn, se.attrs)
            })
            .collect())
    }

    fn entry_dn(&self, subtree: Subtree, key: &str) -> String {
        format!(
            "{}={},{}",
            subtree.rdn_attribute(),
            dn_escape(key),
            self.config.trees.base_dn(subtree)
        )
    }
}

fn open(server: &ServerConfig) -> DirectoryResult<LdapConn> {
    let url = server.url();
    let mut conn = LdapConn::new(&url)
        .map_err(|e| DirectoryError::connection_failed_with_source(url.clone(), e))?;
    if let Some(bind_dn) = &server.bind_dn {
        let password = server.bind_password.as_deref().unwrap_or("");
        conn.simple_bind(bind_dn, password)
            .and_then(|res| res.success())
            .map_err(|e| DirectoryError::BindFailed {
                message: format!("{url} as {bind_dn}: {e}"),
            })?;
    }
    Ok(conn)
}

fn map_write_err(err: LdapError, subtree: Subtree, key: &str) -> DirectoryError {
    if let LdapError::LdapResult { result } = &err {
        // 32 = noSuchObject, 68 = entryAlreadyExists
        match result.rc {
            32 => return DirectoryError::not_found(subtree, key),
            68 => {
                return DirectoryError::AlreadyExists {
                    subtree,
                    key: key.to_string(),
                }
            }
            _ => {}
        }
    }
    DirectoryError::protocol_with_source(format!("write to '{key}' in {subtree} tree"), err)
}

impl DirectoryClient for LdapDirectory {
    fn lookup_by_external_id(
        &self,
        subtree: Subtree,
        id: ExternalId,
    ) -> DirectoryResult<Option<DirEntry>> {
        let escaped = ldap_escape(id.to_string()).into_owned();
        let filter = match subtree {
            // Staff IDs live in cn or at the end of a comma-separated gecos.
            Subtree::Staff => format!("(|(cn={escaped})(gecos=*,*{escaped}))"),
            _ => format!("({}={})", subtree.id_attribute(), escaped),
        };
        Ok(self.search(subtree, &filter)?.into_iter().next())
    }

    fn lookup_by_handle(
        &self,
        subtree: Subtree,
        handle: &str,
    ) -> DirectoryResult<Option<DirEntry>> {
        let filter = format!("({}={})", subtree.rdn_attribute(), ldap_escape(handle));
        Ok(self.search(subtree, &filter)?.into_iter().next())
    }

    fn list(&self, subtree: Subtree) -> DirectoryResult<Vec<DirEntry>> {
        self.search(subtree, "(objectClass=*)")
    }

    fn add(&self, subtree: Subtree, key: &str, entry: DirEntry) -> DirectoryResult<()> {
        let dn = self.entry_dn(subtree, key);
        let attrs: Vec<(String, HashSet<String>)> = entry
            .iter()
            .map(|(name, values)| (name.clone(), values.iter().cloned().collect()))
            .collect();
        debug!(%dn, "adding directory entry");
        self.with_conn(subtree, |conn| {
            conn.add(&dn, attrs).and_then(|res| res.success())?;
            Ok(())
        })
        .map_err(|e| map_write_err(e, subtree, key))
    }

    fn modify_replace(
        &self,
        subtree: Subtree,
        key: &str,
        replacements: Vec<(String, Vec<String>)>,
    ) -> DirectoryResult<()> {
        let dn = self.entry_dn(subtree, key);
        let mods: Vec<Mod<String>> = replacements
            .into_iter()
            .map(|(name, values)| Mod::Replace(name, values.into_iter().collect()))
            .collect();
        self.with_conn(subtree, |conn| {
            conn.modify(&dn, mods).and_then(|res| res.success())?;
            Ok(())
        })
        .map_err(|e| map_write_err(e, subtree, key))
    }
}

impl std::fmt::Debug for LdapDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapDirectory")
            .field("local", &self.config.local)
            .field("registry", &self.config.registry)
            .finish_non_exhaustive()
    }
}
