//! Shared database service wrapper used by the API and the CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::db::{
    AccountRepository, Database, ExpenseRepository, LibSqlAccountRepository,
    LibSqlExpenseRepository, LibSqlOrderRepository, LibSqlQueueRepository, OrderRepository,
    QueueRepository,
};
use crate::models::{Expense, Order, QueueStats, SubUser, SyncItem, SyncItemId, SyncStatus, User};
use crate::sync::{replay_item, ReplayOutcome};
use crate::Result;

/// Thread-safe service for DB and repository operations.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!("Opening database at {}", db_path.display());
        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem location, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Persist a new queue item.
    pub async fn insert_sync_item(&self, item: &SyncItem) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.insert(item).await
    }

    /// Fetch a queue item by id.
    pub async fn get_sync_item(&self, id: &SyncItemId) -> Result<Option<SyncItem>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.get(id).await
    }

    /// Eligible items in replay order.
    pub async fn select_eligible(
        &self,
        owner_id: &str,
        now: i64,
        limit: usize,
    ) -> Result<Vec<SyncItem>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.select_eligible(owner_id, now, limit).await
    }

    /// Pending and processing items in replay order.
    pub async fn list_pending(&self, owner_id: &str) -> Result<Vec<SyncItem>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.list_pending(owner_id).await
    }

    /// Items for an owner, optionally filtered by status.
    pub async fn list_sync_items(
        &self,
        owner_id: &str,
        status: Option<SyncStatus>,
        limit: usize,
    ) -> Result<Vec<SyncItem>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.list(owner_id, status, limit).await
    }

    pub async fn mark_processing(&self, id: &SyncItemId, now: i64) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.mark_processing(id, now).await
    }

    pub async fn mark_completed(&self, id: &SyncItemId, result: &Value, now: i64) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.mark_completed(id, result, now).await
    }

    pub async fn mark_retry(
        &self,
        id: &SyncItemId,
        error: &str,
        next_retry_at: i64,
        attempts: u32,
        now: i64,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.mark_retry(id, error, next_retry_at, attempts, now)
            .await
    }

    pub async fn mark_failed(
        &self,
        id: &SyncItemId,
        error: &str,
        attempts: u32,
        now: i64,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.mark_failed(id, error, attempts, now).await
    }

    /// Return abandoned claims to `pending`.
    pub async fn release_stale_claims(
        &self,
        owner_id: &str,
        claimed_before: i64,
        now: i64,
    ) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.release_stale_claims(owner_id, claimed_before, now)
            .await
    }

    /// Delete an owner's whole queue.
    pub async fn clear_queue(&self, owner_id: &str) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.clear_all(owner_id).await
    }

    pub async fn queue_stats(&self, owner_id: &str) -> Result<QueueStats> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.stats(owner_id).await
    }

    pub async fn owners_with_eligible(&self, now: i64, limit: usize) -> Result<Vec<String>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.owners_with_eligible(now, limit).await
    }

    /// Apply one queued mutation to its resource collection.
    pub async fn replay(&self, item: &SyncItem, now: i64) -> Result<ReplayOutcome> {
        let db = self.db.lock().await;
        replay_item(db.connection(), item, now).await
    }

    pub async fn list_expenses(&self, owner_id: &str, limit: usize) -> Result<Vec<Expense>> {
        let db = self.db.lock().await;
        let repo = LibSqlExpenseRepository::new(db.connection());
        repo.list(owner_id, limit).await
    }

    pub async fn list_orders(&self, owner_id: &str, limit: usize) -> Result<Vec<Order>> {
        let db = self.db.lock().await;
        let repo = LibSqlOrderRepository::new(db.connection());
        repo.list(owner_id, limit).await
    }

    pub async fn create_user(&self, user: &User) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlAccountRepository::new(db.connection());
        repo.create_user(user).await
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let db = self.db.lock().await;
        let repo = LibSqlAccountRepository::new(db.connection());
        repo.get_user(id).await
    }

    pub async fn create_sub_user(&self, sub_user: &SubUser) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlAccountRepository::new(db.connection());
        repo.create_sub_user(sub_user).await
    }

    pub async fn get_sub_user(&self, id: &str) -> Result<Option<SubUser>> {
        let db = self.db.lock().await;
        let repo = LibSqlAccountRepository::new(db.connection());
        repo.get_sub_user(id).await
    }

    pub async fn list_sub_users(&self, owner_id: &str) -> Result<Vec<SubUser>> {
        let db = self.db.lock().await;
        let repo = LibSqlAccountRepository::new(db.connection());
        repo.list_sub_users(owner_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewSyncItem, SyncMethod};
    use serde_json::json;

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_enqueue_and_list_roundtrip() {
        let service = DatabaseService::open_in_memory().await.unwrap();
        assert!(service.path().is_none());

        let item = NewSyncItem::new("/api/expenses", SyncMethod::Create, json!({"amount": 1}))
            .into_item("owner-1", 10);
        service.insert_sync_item(&item).await.unwrap();

        let pending = service.list_pending("owner-1").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, item.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_path_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("optislip.db");

        let service = DatabaseService::open_path(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(service.path(), Some(path.as_path()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replay_goes_through_the_shared_connection() {
        let service = DatabaseService::open_in_memory().await.unwrap();
        let item = NewSyncItem::new(
            "/api/expenses",
            SyncMethod::Create,
            json!({"amount": 12, "category": "Accessories"}),
        )
        .into_item("owner-1", 10);

        let outcome = service.replay(&item, 10).await.unwrap();
        assert!(outcome.is_applied());
        assert_eq!(service.list_expenses("owner-1", 10).await.unwrap().len(), 1);
    }
}
