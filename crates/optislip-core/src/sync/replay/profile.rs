use libsql::Connection;
use serde_json::Value;

use super::{invalid_method, not_found, object, ReplayOutcome};
use crate::db::{AccountRepository, LibSqlAccountRepository};
use crate::error::Result;
use crate::models::{ProfileUpdate, ResourceKind, SyncMethod};

const KIND: ResourceKind = ResourceKind::Profile;

/// The owner's profile is a singleton: only UPDATE applies, and only to the
/// allow-listed fields.
pub(super) async fn replay(
    conn: &Connection,
    method: SyncMethod,
    payload: &Value,
    owner_id: &str,
    now: i64,
) -> Result<ReplayOutcome> {
    if method != SyncMethod::Update {
        return Ok(invalid_method());
    }

    let fields = match object(KIND, payload) {
        Ok(fields) => fields,
        Err(outcome) => return Ok(outcome),
    };

    let repo = LibSqlAccountRepository::new(conn);
    let Some(mut user) = repo.get_user(owner_id).await? else {
        return Ok(not_found(KIND));
    };

    ProfileUpdate::from_payload(fields).apply(&mut user, now);
    if !repo.update_user(&user).await? {
        return Ok(not_found(KIND));
    }
    Ok(ReplayOutcome::Applied(serde_json::to_value(&user)?))
}
