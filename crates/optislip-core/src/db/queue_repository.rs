//! Sync queue repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use libsql::{params, Connection, Row};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{QueueStats, SyncItem, SyncItemId, SyncStatus};

const ITEM_COLUMNS: &str = "id, owner_id, endpoint, method, payload, status, attempts, \
     max_attempts, last_error, last_result, device_origin, priority, next_retry_at, created_at, \
     updated_at";

/// Replay order: highest priority first, then oldest, then submission order.
const QUEUE_ORDER: &str = "ORDER BY priority DESC, created_at ASC, seq ASC";

/// Trait for sync queue storage operations
///
/// Status transitions are conditional updates: each one only applies from the
/// state it expects and reports whether it did. Terminal items are never
/// touched by them.
#[allow(async_fn_in_trait)]
pub trait QueueRepository {
    /// Persist a new item
    async fn insert(&self, item: &SyncItem) -> Result<()>;

    /// Get an item by ID
    async fn get(&self, id: &SyncItemId) -> Result<Option<SyncItem>>;

    /// Pending items whose retry time has passed, in replay order
    async fn select_eligible(&self, owner_id: &str, now: i64, limit: usize)
        -> Result<Vec<SyncItem>>;

    /// All pending and processing items, in replay order
    async fn list_pending(&self, owner_id: &str) -> Result<Vec<SyncItem>>;

    /// Items for an owner, optionally filtered by status, in replay order
    async fn list(
        &self,
        owner_id: &str,
        status: Option<SyncStatus>,
        limit: usize,
    ) -> Result<Vec<SyncItem>>;

    /// Claim a pending item (`pending -> processing`)
    async fn mark_processing(&self, id: &SyncItemId, now: i64) -> Result<bool>;

    /// Finish a claimed item successfully, counting the attempt
    async fn mark_completed(&self, id: &SyncItemId, result: &Value, now: i64) -> Result<bool>;

    /// Return a claimed item to `pending` with a backoff deadline
    async fn mark_retry(
        &self,
        id: &SyncItemId,
        error: &str,
        next_retry_at: i64,
        attempts: u32,
        now: i64,
    ) -> Result<bool>;

    /// Finish a claimed item as failed
    async fn mark_failed(&self, id: &SyncItemId, error: &str, attempts: u32, now: i64)
        -> Result<bool>;

    /// Return items claimed at or before `claimed_before` to `pending`
    async fn release_stale_claims(&self, owner_id: &str, claimed_before: i64, now: i64)
        -> Result<u64>;

    /// Delete every item of an owner
    async fn clear_all(&self, owner_id: &str) -> Result<u64>;

    /// Per-status counts for an owner
    async fn stats(&self, owner_id: &str) -> Result<QueueStats>;

    /// Owners with at least one eligible item, oldest work first
    async fn owners_with_eligible(&self, now: i64, limit: usize) -> Result<Vec<String>>;
}

/// libSQL implementation of `QueueRepository`
pub struct LibSqlQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a sync item from a database row
    fn parse_item(row: &Row) -> Result<SyncItem> {
        let id: String = row.get(0)?;
        let method: String = row.get(3)?;
        let payload: String = row.get(4)?;
        let status: String = row.get(5)?;
        let last_result: Option<String> = row.get(9)?;

        Ok(SyncItem {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("Invalid sync item id: {id}")))?,
            owner_id: row.get(1)?,
            endpoint: row.get(2)?,
            method: method
                .parse()
                .map_err(|_| Error::Database(format!("Invalid sync method: {method}")))?,
            payload: serde_json::from_str(&payload)?,
            status: status.parse()?,
            attempts: column_u32(row, 6)?,
            max_attempts: column_u32(row, 7)?,
            last_error: row.get(8)?,
            last_result: last_result
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            device_origin: row.get(10)?,
            priority: row.get(11)?,
            next_retry_at: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }

    async fn collect(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<SyncItem>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(Self::parse_item(&row)?);
        }
        Ok(items)
    }
}

fn column_u32(row: &Row, idx: i32) -> Result<u32> {
    let value: i64 = row.get(idx)?;
    u32::try_from(value).map_err(|_| Error::Database(format!("Column {idx} out of range: {value}")))
}

impl QueueRepository for LibSqlQueueRepository<'_> {
    async fn insert(&self, item: &SyncItem) -> Result<()> {
        let payload = serde_json::to_string(&item.payload)?;
        let last_result = item
            .last_result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn
            .execute(
                "INSERT INTO sync_queue (id, owner_id, endpoint, method, payload, status, attempts,
                    max_attempts, last_error, last_result, device_origin, priority, next_retry_at,
                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    item.id.as_str(),
                    item.owner_id.as_str(),
                    item.endpoint.as_str(),
                    item.method.as_str(),
                    payload,
                    item.status.as_str(),
                    i64::from(item.attempts),
                    i64::from(item.max_attempts),
                    item.last_error.clone(),
                    last_result,
                    item.device_origin.clone(),
                    item.priority,
                    item.next_retry_at,
                    item.created_at,
                    item.updated_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: &SyncItemId) -> Result<Option<SyncItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM sync_queue WHERE id = ?1");
        let mut rows = self.conn.query(&sql, params![id.as_str()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_item(&row)?)),
            None => Ok(None),
        }
    }

    async fn select_eligible(
        &self,
        owner_id: &str,
        now: i64,
        limit: usize,
    ) -> Result<Vec<SyncItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM sync_queue
             WHERE owner_id = ?1 AND status = 'pending'
               AND (next_retry_at IS NULL OR next_retry_at <= ?2)
             {QUEUE_ORDER}
             LIMIT ?3"
        );
        self.collect(&sql, params![owner_id, now, limit as i64]).await
    }

    async fn list_pending(&self, owner_id: &str) -> Result<Vec<SyncItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM sync_queue
             WHERE owner_id = ?1 AND status IN ('pending', 'processing')
             {QUEUE_ORDER}"
        );
        self.collect(&sql, params![owner_id]).await
    }

    async fn list(
        &self,
        owner_id: &str,
        status: Option<SyncStatus>,
        limit: usize,
    ) -> Result<Vec<SyncItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM sync_queue
             WHERE owner_id = ?1 AND (?2 IS NULL OR status = ?2)
             {QUEUE_ORDER}
             LIMIT ?3"
        );
        self.collect(
            &sql,
            params![owner_id, status.map(SyncStatus::as_str), limit as i64],
        )
        .await
    }

    async fn mark_processing(&self, id: &SyncItemId, now: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE sync_queue SET status = 'processing', updated_at = ?2
                 WHERE id = ?1 AND status = 'pending'",
                params![id.as_str(), now],
            )
            .await?;
        Ok(rows == 1)
    }

    async fn mark_completed(&self, id: &SyncItemId, result: &Value, now: i64) -> Result<bool> {
        let result = serde_json::to_string(result)?;
        let rows = self
            .conn
            .execute(
                "UPDATE sync_queue
                 SET status = 'completed', last_result = ?2, last_error = NULL,
                     attempts = MIN(attempts + 1, max_attempts), next_retry_at = NULL,
                     updated_at = ?3
                 WHERE id = ?1 AND status = 'processing'",
                params![id.as_str(), result, now],
            )
            .await?;
        Ok(rows == 1)
    }

    async fn mark_retry(
        &self,
        id: &SyncItemId,
        error: &str,
        next_retry_at: i64,
        attempts: u32,
        now: i64,
    ) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE sync_queue
                 SET status = 'pending', last_error = ?2, next_retry_at = ?3, attempts = ?4,
                     updated_at = ?5
                 WHERE id = ?1 AND status = 'processing'",
                params![id.as_str(), error, next_retry_at, i64::from(attempts), now],
            )
            .await?;
        Ok(rows == 1)
    }

    async fn mark_failed(
        &self,
        id: &SyncItemId,
        error: &str,
        attempts: u32,
        now: i64,
    ) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE sync_queue
                 SET status = 'failed', last_error = ?2, attempts = ?3, next_retry_at = NULL,
                     updated_at = ?4
                 WHERE id = ?1 AND status = 'processing'",
                params![id.as_str(), error, i64::from(attempts), now],
            )
            .await?;
        Ok(rows == 1)
    }

    async fn release_stale_claims(
        &self,
        owner_id: &str,
        claimed_before: i64,
        now: i64,
    ) -> Result<u64> {
        let rows = self
            .conn
            .execute(
                "UPDATE sync_queue SET status = 'pending', updated_at = ?3
                 WHERE owner_id = ?1 AND status = 'processing' AND updated_at <= ?2",
                params![owner_id, claimed_before, now],
            )
            .await?;
        Ok(rows)
    }

    async fn clear_all(&self, owner_id: &str) -> Result<u64> {
        let rows = self
            .conn
            .execute("DELETE FROM sync_queue WHERE owner_id = ?1", params![owner_id])
            .await?;
        Ok(rows)
    }

    async fn stats(&self, owner_id: &str) -> Result<QueueStats> {
        let mut rows = self
            .conn
            .query(
                "SELECT status, COUNT(*) FROM sync_queue WHERE owner_id = ?1 GROUP BY status",
                params![owner_id],
            )
            .await?;

        let mut stats = QueueStats::default();
        while let Some(row) = rows.next().await? {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            stats.add(status.parse()?, u64::try_from(count).unwrap_or_default());
        }
        Ok(stats)
    }

    async fn owners_with_eligible(&self, now: i64, limit: usize) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT owner_id FROM sync_queue
                 WHERE status = 'pending' AND (next_retry_at IS NULL OR next_retry_at <= ?1)
                 GROUP BY owner_id
                 ORDER BY MIN(created_at) ASC
                 LIMIT ?2",
                params![now, limit as i64],
            )
            .await?;

        let mut owners = Vec::new();
        while let Some(row) = rows.next().await? {
            owners.push(row.get::<String>(0)?);
        }
        Ok(owners)
    }
}
