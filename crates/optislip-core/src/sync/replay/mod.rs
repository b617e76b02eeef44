//! Resource replayers.
//!
//! Each resource kind decodes its own payload and applies the mutation to its
//! collection, always scoped to the item's owner. Expected business outcomes
//! (bad payload, missing record, unsupported method) come back as
//! [`ReplayOutcome::Rejected`]; only storage faults surface as `Err`.

mod expenses;
mod orders;
mod profile;

use std::fmt::Display;

use libsql::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::{payload_record_id, RecordId, ResourceKind, SyncItem};

/// Payload fields an UPDATE can never overwrite.
const PROTECTED_FIELDS: [&str; 6] = ["id", "_id", "ownerId", "user", "createdAt", "updatedAt"];

/// Result of replaying one queued mutation
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayOutcome {
    /// The mutation was applied; carries the resulting record
    Applied(Value),
    /// The mutation was refused
    Rejected {
        error: String,
        /// Retrying can never succeed
        permanent: bool,
    },
}

impl ReplayOutcome {
    pub fn rejected(error: impl Into<String>) -> Self {
        Self::Rejected {
            error: error.into(),
            permanent: false,
        }
    }

    pub fn permanent(error: impl Into<String>) -> Self {
        Self::Rejected {
            error: error.into(),
            permanent: true,
        }
    }

    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Route a queued item to the replayer for its resource.
pub async fn replay_item(conn: &Connection, item: &SyncItem, now: i64) -> Result<ReplayOutcome> {
    let Some(kind) = ResourceKind::from_endpoint(&item.endpoint) else {
        return Ok(ReplayOutcome::permanent("Unknown endpoint"));
    };

    match kind {
        ResourceKind::Expenses => {
            expenses::replay(conn, item.method, &item.payload, &item.owner_id, now).await
        }
        ResourceKind::Orders => {
            orders::replay(conn, item.method, &item.payload, &item.owner_id, now).await
        }
        ResourceKind::Profile => {
            profile::replay(conn, item.method, &item.payload, &item.owner_id, now).await
        }
    }
}

/// Expected rejection short-circuiting a replay step.
type Step<T> = std::result::Result<T, ReplayOutcome>;

fn invalid_payload(kind: ResourceKind, detail: impl Display) -> ReplayOutcome {
    ReplayOutcome::rejected(format!(
        "Invalid {} payload: {detail}",
        kind.record_label().to_ascii_lowercase()
    ))
}

fn not_found(kind: ResourceKind) -> ReplayOutcome {
    ReplayOutcome::rejected(format!("{} not found", kind.record_label()))
}

fn invalid_method() -> ReplayOutcome {
    ReplayOutcome::permanent("Invalid method")
}

/// Message of a model validation error, without the error-kind prefix.
fn validation_detail(error: Error) -> String {
    match error {
        Error::InvalidInput(message) => message,
        other => other.to_string(),
    }
}

fn decode<T: DeserializeOwned>(kind: ResourceKind, payload: &Value) -> Step<T> {
    serde_json::from_value(payload.clone()).map_err(|error| invalid_payload(kind, error))
}

fn object(kind: ResourceKind, payload: &Value) -> Step<&Map<String, Value>> {
    payload
        .as_object()
        .ok_or_else(|| invalid_payload(kind, "expected an object"))
}

/// Object payload plus the record id it references.
fn target(kind: ResourceKind, payload: &Value) -> Step<(RecordId, &Map<String, Value>)> {
    let fields = object(kind, payload)?;
    let id = payload_record_id(fields).ok_or_else(|| invalid_payload(kind, "missing _id"))?;
    Ok((id, fields))
}

/// Overlay payload fields onto a stored record and decode the result.
fn merge_update<T>(kind: ResourceKind, current: &T, patch: &Map<String, Value>) -> Result<Step<T>>
where
    T: Serialize + DeserializeOwned,
{
    let mut merged = serde_json::to_value(current)?;
    if let Value::Object(fields) = &mut merged {
        for (key, value) in patch {
            if !PROTECTED_FIELDS.contains(&key.as_str()) {
                fields.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(serde_json::from_value(merged).map_err(|error| invalid_payload(kind, error)))
}
