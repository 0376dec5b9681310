//! Connection identity.
//!
//! Every live socket gets a [`ConnId`] when the transport accepts it. The
//! chat core treats it as an opaque map key: it never parses one, and only
//! the transport creates them.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, transport-assigned identifier for one live connection.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnId(String);

impl ConnId {
    /// Create a fresh ID (`conn_` + UUID v7, time-ordered).
    #[must_use]
    pub fn new() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConnId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConnId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        let a = ConnId::new();
        let b = ConnId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn new_id_has_prefix() {
        let id = ConnId::new();
        assert!(id.as_str().starts_with("conn_"));
    }

    #[test]
    fn display_matches_inner() {
        let id = ConnId::from("conn_abc");
        assert_eq!(id.to_string(), "conn_abc");
    }

    #[test]
    fn serializes_transparently() {
        let id = ConnId::from("conn_1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""conn_1""#);
    }

    #[test]
    fn usable_as_hash_key() {
        let mut set = std::collections::HashSet::new();
        let _ = set.insert(ConnId::from("c1"));
        let _ = set.insert(ConnId::from("c1"));
        let _ = set.insert(ConnId::from("c2"));
        assert_eq!(set.len(), 2);
    }
}
