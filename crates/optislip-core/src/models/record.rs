//! Identifiers for authoritative resource records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Identifier of an expense, order or account record.
///
/// Kept as free-form text: clients may reference ids minted elsewhere, and an
/// unknown id must surface as "not found" rather than a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Mint a new time-sortable id (UUID v7)
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Record id referenced by a queued payload, read from `_id` or `id`.
pub fn payload_record_id(payload: &Map<String, Value>) -> Option<RecordId> {
    ["_id", "id"].iter().find_map(|key| match payload.get(*key) {
        Some(Value::String(value)) if !value.trim().is_empty() => {
            Some(RecordId::from(value.trim()))
        }
        Some(Value::Number(value)) => Some(RecordId(value.to_string())),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(RecordId::generate(), RecordId::generate());
    }

    #[test]
    fn payload_id_prefers_underscore_id() {
        let payload = json!({"_id": "abc", "id": "def"});
        let id = payload_record_id(payload.as_object().unwrap()).unwrap();
        assert_eq!(id.as_str(), "abc");
    }

    #[test]
    fn payload_id_falls_back_to_id_and_skips_blank() {
        let payload = json!({"_id": "  ", "id": 42});
        let id = payload_record_id(payload.as_object().unwrap()).unwrap();
        assert_eq!(id.as_str(), "42");

        let empty = json!({"amount": 5});
        assert!(payload_record_id(empty.as_object().unwrap()).is_none());
    }
}
