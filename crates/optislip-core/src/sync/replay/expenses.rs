use libsql::Connection;
use serde_json::{json, Value};

use super::{
    decode, invalid_payload, merge_update, not_found, target, validation_detail, ReplayOutcome,
};
use crate::db::{ExpenseRepository, LibSqlExpenseRepository};
use crate::error::Result;
use crate::models::{Expense, ExpenseDraft, ResourceKind, SyncMethod};

const KIND: ResourceKind = ResourceKind::Expenses;

pub(super) async fn replay(
    conn: &Connection,
    method: SyncMethod,
    payload: &Value,
    owner_id: &str,
    now: i64,
) -> Result<ReplayOutcome> {
    let repo = LibSqlExpenseRepository::new(conn);

    match method {
        SyncMethod::Create => {
            let draft: ExpenseDraft = match decode(KIND, payload) {
                Ok(draft) => draft,
                Err(outcome) => return Ok(outcome),
            };
            let expense = match draft.into_expense(owner_id, now) {
                Ok(expense) => expense,
                Err(error) => return Ok(invalid_payload(KIND, validation_detail(error))),
            };
            repo.insert(&expense).await?;
            Ok(ReplayOutcome::Applied(serde_json::to_value(&expense)?))
        }
        SyncMethod::Update => {
            let (id, fields) = match target(KIND, payload) {
                Ok(target) => target,
                Err(outcome) => return Ok(outcome),
            };
            let Some(current) = repo.get(&id, owner_id).await? else {
                return Ok(not_found(KIND));
            };
            let mut updated: Expense = match merge_update(KIND, &current, fields)? {
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
