//! Record identity: server-assigned ids and client-generated local ids

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// A client-generated identifier for a record created while offline, using
/// UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalId(Uuid);

impl LocalId {
    /// Create a new unique local ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for LocalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identity of a stored record.
///
/// A record is keyed either by the id the server assigned to it or, until its
/// first successful sync, by the local id generated when it was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum RecordKey {
    /// Server-assigned integer id
    Server(i64),
    /// Client-generated id of a record never acknowledged by the server
    Local(LocalId),
}

impl RecordKey {
    /// Key for a freshly created offline record.
    #[must_use]
    pub fn new_local() -> Self {
        Self::Local(LocalId::new())
    }

    /// Server id, if the record has one.
    pub const fn server_id(&self) -> Option<i64> {
        match self {
            Self::Server(id) => Some(*id),
            Self::Local(_) => None,
        }
    }

    /// Local id, if the record was never synced.
    pub const fn local_id(&self) -> Option<LocalId> {
        match self {
            Self::Server(_) => None,
            Self::Local(id) => Some(*id),
        }
    }

    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl From<LocalId> for RecordKey {
    fn from(id: LocalId) -> Self {
        Self::Local(id)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{id}"),
            Self::Local(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for RecordKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if let Ok(id) = value.parse::<i64>() {
            return Ok(Self::Server(id));
        }
        value
            .parse::<LocalId>()
            .map(Self::Local)
            .map_err(|_| Error::InvalidInput(format!("Invalid record id: {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_id_unique() {
        assert_ne!(LocalId::new(), LocalId::new());
    }

    #[test]
    fn test_record_key_parse_server_id() {
        let key: RecordKey = "42".parse().unwrap();
        assert_eq!(key, RecordKey::Server(42));
        assert_eq!(key.server_id(), Some(42));
        assert!(!key.is_local());
    }

    #[test]
    fn test_record_key_parse_local_id() {
        let local = LocalId::new();
        let key: RecordKey = local.as_str().parse().unwrap();
        assert_eq!(key, RecordKey::Local(local));
        assert_eq!(key.to_string(), local.to_string());
    }

    #[test]
    fn test_record_key_rejects_garbage() {
        assert!("not-an-id".parse::<RecordKey>().is_err());
        assert!("".parse::<RecordKey>().is_err());
    }
}
