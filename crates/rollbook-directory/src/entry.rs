//! Raw directory entries
//!
//! [`DirEntry`] is the attribute multimap a lookup returns: every
//! attribute holds zero or more string values. Attribute names are
//! matched exactly as the schemas use consistent casing.

use std::collections::HashMap;

/// One directory entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirEntry {
    /// Distinguished name, when the backing store provides one.
    pub dn: String,
    attrs: HashMap<String, Vec<String>>,
}

impl DirEntry {
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attrs: HashMap::new(),
        }
    }

    /// Build from already-collected attributes.
    #[must_use]
    pub fn from_parts(dn: String, attrs: HashMap<String, Vec<String>>) -> Self {
        Self { dn, attrs }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    /// First value of an attribute.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.attrs.get(name)?.first().map(String::as_str)
    }

    /// All values of an attribute; empty when absent.
    #[must_use]
    pub fn all(&self, name: &str) -> &[String] {
        self.attrs.get(name).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.attrs.get(name).is_some_and(|v| !v.is_empty())
    }

    /// Replace all values of an attribute.
    pub fn set(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.attrs.insert(name.into(), values);
    }

    /// Append one value to an attribute.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.entry(name.into()).or_default().push(value.into());
    }

    /// Iterate over `(name, values)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.attrs.iter()
    }
}
