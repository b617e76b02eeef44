use libsql::Connection;
use serde_json::{json, Value};

use super::{
    decode, invalid_payload, merge_update, not_found, object, target, validation_detail,
    ReplayOutcome,
};
use crate::db::{LibSqlOrderRepository, OrderRepository};
use crate::error::Result;
use crate::models::{payload_record_id, Order, OrderDraft, ResourceKind, SyncMethod};

const KIND: ResourceKind = ResourceKind::Orders;

pub(super) async fn replay(
    conn: &Connection,
    method: SyncMethod,
    payload: &Value,
    owner_id: &str,
    now: i64,
) -> Result<ReplayOutcome> {
    let repo = LibSqlOrderRepository::new(conn);

    match method {
        SyncMethod::Create => {
            let draft: OrderDraft = match decode(KIND, payload) {
                Ok(draft) => draft,
                Err(outcome) => return Ok(outcome),
            };
            let client_id = object(KIND, payload).ok().and_then(payload_record_id);
            if let Some(id) = client_id.as_ref() {
                // A replayed CREATE whose order is already stored counts as applied.
                if let Some(existing) = repo.get(id, owner_id).await? {
                    return Ok(ReplayOutcome::Applied(serde_json::to_value(&existing)?));
                }
                if repo.exists(id).await? {
                    return Ok(ReplayOutcome::permanent("Order id already in use"));
                }
            }
            let order = match draft.into_order(client_id, owner_id, now) {
                Ok(order) => order,
                Err(error) => return Ok(invalid_payload(KIND, validation_detail(error))),
            };
            repo.insert(&order).await?;
            Ok(ReplayOutcome::Applied(serde_json::to_value(&order)?))
        }
        SyncMethod::Update => {
            let (id, fields) = match target(KIND, payload) {
                Ok(target) => target,
                Err(outcome) => return Ok(outcome),
            };
            let Some(current) = repo.get(&id, owner_id).await? else {
                return Ok(not_found(KIND));
            };
            let mut updated: Order = match merge_update(KIND, &current, fields)? {
                Ok(updated) => updated,
                Err(outcome) => return Ok(outcome),
            };
            updated.updated_at = now;
            if let Err(error) = updated.validate() {
                return Ok(invalid_payload(KIND, validation_detail(error)));
            }
            if !repo.update(&updated).await? {
                return Ok(not_found(KIND));
            }
            Ok(ReplayOutcome::Applied(serde_json::to_value(&updated)?))
        }
        SyncMethod::Delete => {
            let (id, _) = match target(KIND, payload) {
                Ok(target) => target,
                Err(outcome) => return Ok(outcome),
            };
            if !repo.delete(&id, owner_id).await? {
                return Ok(not_found(KIND));
            }
            Ok(ReplayOutcome::Applied(json!({ "deletedId": id })))
        }
    }
}
