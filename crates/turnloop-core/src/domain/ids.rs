//! Task identifiers.
//!
//! A `TaskId` is the join key between the active queue and every registry
//! (results, errors, reports). Fresh ids are 8 random bytes rendered as hex;
//! callers may override them with any string.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a deferred task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Create an id from an explicit value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a random id (16 lowercase hex chars).
    pub fn random() -> Self {
        let bytes: [u8; 8] = rand::random();
        let hex = bytes.iter().map(|b| format!("{b:02x}")).collect();
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&String> for TaskId {
    fn from(value: &String) -> Self {
        Self(value.clone())
    }
}

impl From<&TaskId> for TaskId {
    fn from(value: &TaskId) -> Self {
        value.clone()
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for TaskId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TaskId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_are_hex_and_distinct() {
        let id1 = TaskId::random();
        let id2 = TaskId::random();

        assert_eq!(id1.as_str().len(), 16);
        assert!(id1.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id1, id2);
    }

    #[test]
    fn explicit_ids_compare_with_str() {
        let id = TaskId::from("test n°1");
        assert_eq!(id, "test n°1");
        assert_eq!(id.to_string(), "test n°1");
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = TaskId::new("first");
        let serialized = serde_json::to_string(&id).unwrap();
        assert_eq!(serialized, "\"first\"");
    }
}
