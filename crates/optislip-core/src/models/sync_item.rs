//! Sync queue item model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

/// Replay attempts allowed when the submitter does not say otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Upper bound accepted for a per-item `maxAttempts`.
pub const MAX_ATTEMPTS_CEILING: u32 = 100;

/// A unique identifier for a sync item, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncItemId(Uuid);

impl SyncItemId {
    /// Create a new unique item ID using UUID v7
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

impl Default for SyncItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SyncItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SyncItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Mutation kind carried by a sync item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncMethod {
    Create,
    Update,
    Delete,
}

impl SyncMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for SyncMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMethod {
    type Err = Error;

    /// Accepts the canonical names and the HTTP verbs offline clients record.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE" | "POST" => Ok(Self::Create),
            "UPDATE" | "PUT" | "PATCH" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!("Unsupported method: {other}"))),
        }
    }
}

/// Lifecycle status of a sync item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Completed and failed items are never touched by the dispatcher again.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::Database(format!("Unknown sync status: {other}"))),
        }
    }
}

/// One queued client-originated mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncItem {
    /// Unique identifier
    pub id: SyncItemId,
    /// Root owner the mutation applies under
    pub owner_id: String,
    /// Target collection as submitted (e.g. `/api/expenses`)
    pub endpoint: String,
    pub method: SyncMethod,
    /// Resource fields, decoded by the matching replayer
    #[serde(rename = "data")]
    pub payload: Value,
    pub status: SyncStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    /// Response captured from the last successful replay
    pub last_result: Option<Value>,
    /// Submitting device, carried for later conflict handling
    #[serde(rename = "deviceId")]
    pub device_origin: Option<String>,
    /// Higher values replay first
    pub priority: i64,
    /// Not eligible before this time (Unix ms)
    pub next_retry_at: Option<i64>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last status change (Unix ms)
    pub updated_at: i64,
}

/// Per-status item counts for one owner's queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub total: u64,
}

impl QueueStats {
    /// Record `count` items in `status`.
    pub fn add(&mut self, status: SyncStatus, count: u64) {
        match status {
            SyncStatus::Pending => self.pending += count,
            SyncStatus::Processing => self.processing += count,
            SyncStatus::Completed => self.completed += count,
            SyncStatus::Failed => self.failed += count,
        }
        self.total += count;
    }
}

/// Validated input for a single queue insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncItem {
    pub endpoint: String,
    pub method: SyncMethod,
    pub payload: Value,
    pub device_origin: Option<String>,
    pub priority: i64,
    pub max_attempts: u32,
}

impl NewSyncItem {
    pub fn new(endpoint: impl Into<String>, method: SyncMethod, payload: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            payload: normalize_payload(Some(payload)),
            device_origin: None,
            priority: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_device_origin(mut self, device_origin: impl Into<String>) -> Self {
        self.device_origin = Some(device_origin.into());
        self
    }

    /// Check the fields the queue table requires.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::InvalidInput("Missing endpoint or method".into()));
        }
        if !(1..=MAX_ATTEMPTS_CEILING).contains(&self.max_attempts) {
            return Err(Error::InvalidInput(format!(
                "maxAttempts must be in [1, {MAX_ATTEMPTS_CEILING}]"
            )));
        }
        Ok(())
    }

    /// Materialize a pending item owned by `owner_id`.
    #[must_use]
    pub fn into_item(self, owner_id: &str, now: i64) -> SyncItem {
        SyncItem {
            id: SyncItemId::new(),
            owner_id: owner_id.to_string(),
            endpoint: self.endpoint,
            method: self.method,
            payload: self.payload,
            status: SyncStatus::Pending,
            attempts: 0,
            max_attempts: self.max_attempts,
            last_error: None,
            last_result: None,
            device_origin: self.device_origin,
            priority: self.priority,
            next_retry_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Unvalidated sync submission as clients send it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl SyncRequest {
    /// Validate into a [`NewSyncItem`], applying defaults.
    pub fn validate(self, default_max_attempts: u32) -> Result<NewSyncItem> {
        let (Some(endpoint), Some(method)) = (
            normalize_text_option(self.endpoint),
            normalize_text_option(self.method),
        ) else {
            return Err(Error::InvalidInput("Missing endpoint or method".into()));
        };

        let item = NewSyncItem {
            endpoint,
            method: method.parse()?,
            payload: normalize_payload(self.data),
            device_origin: normalize_text_option(self.device_id),
            priority: self.priority.unwrap_or(0),
            max_attempts: self.max_attempts.unwrap_or(default_max_attempts),
        };
        item.validate()?;
        Ok(item)
    }
}

fn normalize_payload(payload: Option<Value>) -> Value {
    match payload {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(value) => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_id_parse() {
        let id = SyncItemId::new();
        let parsed: SyncItemId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_method_accepts_http_verbs() {
        assert_eq!("POST".parse::<SyncMethod>().unwrap(), SyncMethod::Create);
        assert_eq!("put".parse::<SyncMethod>().unwrap(), SyncMethod::Update);
        assert_eq!("PATCH".parse::<SyncMethod>().unwrap(), SyncMethod::Update);
        assert_eq!("delete".parse::<SyncMethod>().unwrap(), SyncMethod::Delete);
        assert_eq!("UPDATE".parse::<SyncMethod>().unwrap(), SyncMethod::Update);
        assert!("GET".parse::<SyncMethod>().is_err());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!SyncStatus::Pending.is_terminal());
        assert!(!SyncStatus::Processing.is_terminal());
        assert!(SyncStatus::Completed.is_terminal());
        assert!(SyncStatus::Failed.is_terminal());
        assert_eq!("failed".parse::<SyncStatus>().unwrap(), SyncStatus::Failed);
        assert!("done".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn test_request_requires_endpoint_and_method() {
        let missing_method = SyncRequest {
            endpoint: Some("/api/expenses".into()),
            ..SyncRequest::default()
        };
        let err = missing_method.validate(DEFAULT_MAX_ATTEMPTS).unwrap_err();
        assert!(err.to_string().contains("Missing endpoint or method"));

        let blank_endpoint = SyncRequest {
            endpoint: Some("  ".into()),
            method: Some("POST".into()),
            ..SyncRequest::default()
        };
        assert!(blank_endpoint.validate(DEFAULT_MAX_ATTEMPTS).is_err());
    }

    #[test]
    fn test_request_defaults() {
        let request: SyncRequest = serde_json::from_value(json!({
            "endpoint": "/api/expenses",
            "method": "POST",
            "deviceId": "tablet-1"
        }))
        .unwrap();
        let item = request.validate(DEFAULT_MAX_ATTEMPTS).unwrap();
        assert_eq!(item.method, SyncMethod::Create);
        assert_eq!(item.payload, json!({}));
        assert_eq!(item.priority, 0);
        assert_eq!(item.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(item.device_origin.as_deref(), Some("tablet-1"));
    }

    #[test]
    fn test_request_rejects_out_of_range_max_attempts() {
        let request = SyncRequest {
            endpoint: Some("/api/orders".into()),
            method: Some("DELETE".into()),
            max_attempts: Some(0),
            ..SyncRequest::default()
        };
        assert!(request.validate(DEFAULT_MAX_ATTEMPTS).is_err());
    }

    #[test]
    fn test_request_keeps_non_object_payload() {
        let request = SyncRequest {
            endpoint: Some("/api/orders".into()),
            method: Some("POST".into()),
            data: Some(json!([1, 2, 3])),
            ..SyncRequest::default()
        };
        let item = request.validate(DEFAULT_MAX_ATTEMPTS).unwrap();
        assert_eq!(item.payload, json!([1, 2, 3]));
    }

    #[test]
    fn test_into_item_starts_pending() {
        let item = NewSyncItem::new("/api/expenses", SyncMethod::Create, json!({"amount": 5}))
            .with_priority(3)
            .into_item("owner-1", 1_000);
        assert_eq!(item.status, SyncStatus::Pending);
        assert_eq!(item.attempts, 0);
        assert_eq!(item.priority, 3);
        assert_eq!(item.next_retry_at, None);
    }

    #[test]
    fn test_item_serializes_wire_names() {
        let item = NewSyncItem::new("/api/expenses", SyncMethod::Create, json!({"amount": 5}))
            .with_device_origin("phone")
            .into_item("owner-1", 1_000);
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["ownerId"], "owner-1");
        assert_eq!(value["method"], "CREATE");
        assert_eq!(value["status"], "pending");
        assert_eq!(value["data"]["amount"], 5);
        assert_eq!(value["deviceId"], "phone");
    }
}
