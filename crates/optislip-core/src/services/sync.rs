//! Owner-scoped facade over the queue store and the dispatcher.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::DatabaseService;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::models::{
    NewSyncItem, QueueStats, SyncItem, SyncItemId, SyncRequest, SyncStatus, DEFAULT_MAX_ATTEMPTS,
};
use crate::sync::{
    DispatchConfig, DispatchSummary, Dispatcher, OwnerDispatch, Replayer, StoreReplayer,
};
use crate::util::fingerprint;

/// Tuning shared by every [`SyncService`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub dispatch: DispatchConfig,
    /// Applied when a request leaves `maxAttempts` out
    pub default_max_attempts: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            default_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Outcome of [`SyncService::enqueue_batch`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReceipt {
    /// Items persisted
    pub count: usize,
    /// Items dropped for an invalid shape or a store rejection
    pub rejected: usize,
}

/// Queue operations for a resolved owner.
///
/// Every method takes the root owner id produced by
/// [`IdentityResolver`](crate::IdentityResolver); nothing here looks at
/// sub-user identities.
pub struct SyncService<R = StoreReplayer> {
    db: DatabaseService,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<Dispatcher<R>>,
    default_max_attempts: u32,
}

impl<R> Clone for SyncService<R> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            clock: Arc::clone(&self.clock),
            dispatcher: Arc::clone(&self.dispatcher),
            default_max_attempts: self.default_max_attempts,
        }
    }
}

impl SyncService {
    /// Service that replays into the same database the queue lives in.
    pub fn new(db: DatabaseService, clock: Arc<dyn Clock>, options: SyncOptions) -> Self {
        let replayer = StoreReplayer::new(db.clone(), Arc::clone(&clock));
        Self::with_replayer(db, clock, options, replayer)
    }
}

impl<R: Replayer + 'static> SyncService<R> {
    pub fn with_replayer(
        db: DatabaseService,
        clock: Arc<dyn Clock>,
        options: SyncOptions,
        replayer: R,
    ) -> Self {
        let dispatcher = Dispatcher::new(db.clone(), replayer, Arc::clone(&clock), options.dispatch);
        Self {
            db,
            clock,
            dispatcher: Arc::new(dispatcher),
            default_max_attempts: options.default_max_attempts,
        }
    }

    pub const fn database(&self) -> &DatabaseService {
        &self.db
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Validate an intake request and persist it as a `pending` item.
    pub async fn enqueue(&self, owner_id: &str, request: SyncRequest) -> Result<SyncItem> {
        let new_item = request.validate(self.default_max_attempts)?;
        self.enqueue_item(owner_id, new_item).await
    }

    pub async fn enqueue_item(&self, owner_id: &str, new_item: NewSyncItem) -> Result<SyncItem> {
        require_owner(owner_id)?;
        new_item.validate()?;

        let item = new_item.into_item(owner_id, self.clock.now_millis());
        self.db.insert_sync_item(&item).await?;
        tracing::debug!(
            owner = fingerprint(owner_id),
            item = %item.id,
            method = %item.method,
            endpoint = %item.endpoint,
            "Sync item queued"
        );
        Ok(item)
    }

    /// Insert each element on its own. Invalid elements are counted, not fatal.
    ///
    /// Fails only when the store itself failed and nothing was inserted.
    pub async fn enqueue_batch(&self, owner_id: &str, items: Vec<Value>) -> Result<BatchReceipt> {
        require_owner(owner_id)?;
        let owner = fingerprint(owner_id);

        let mut receipt = BatchReceipt::default();
        let mut storage_error = None;
        for (index, raw) in items.into_iter().enumerate() {
            let request = match serde_json::from_value::<SyncRequest>(raw) {
                Ok(request) => request,
                Err(error) => {
                    tracing::warn!(owner, index, %error, "Dropping malformed batch item");
                    receipt.rejected += 1;
                    continue;
                }
            };
            match self.enqueue(owner_id, request).await {
                Ok(_) => receipt.count += 1,
                Err(error) => {
                    tracing::warn!(owner, index, %error, "Dropping rejected batch item");
                    receipt.rejected += 1;
                    if error.is_storage() {
                        storage_error = Some(error);
                    }
                }
            }
        }

        if receipt.count == 0 {
            if let Some(error) = storage_error {
                return Err(error);
            }
        }
        tracing::info!(
            owner,
            count = receipt.count,
            rejected = receipt.rejected,
            "Sync batch queued"
        );
        Ok(receipt)
    }

    /// `pending` and `processing` items in replay order
    pub async fn list_pending(&self, owner_id: &str) -> Result<Vec<SyncItem>> {
        self.db.list_pending(owner_id).await
    }

    pub async fn list(
        &self,
        owner_id: &str,
        status: Option<SyncStatus>,
        limit: usize,
    ) -> Result<Vec<SyncItem>> {
        self.db.list_sync_items(owner_id, status, limit).await
    }

    /// Fetch one item, hiding items that belong to someone else.
    pub async fn get(&self, owner_id: &str, id: &SyncItemId) -> Result<SyncItem> {
        self.db
            .get_sync_item(id)
            .await?
            .filter(|item| item.owner_id == owner_id)
            .ok_or_else(|| Error::NotFound(format!("Sync item {id}")))
    }

    pub async fn dispatch(&self, owner_id: &str) -> Result<DispatchSummary> {
        require_owner(owner_id)?;
        self.dispatcher.dispatch(owner_id).await
    }

    pub async fn dispatch_all(&self, max_owners: usize) -> Result<Vec<OwnerDispatch>> {
        self.dispatcher.dispatch_all(max_owners).await
    }

    /// Drop every item the owner has queued, whatever its status.
    pub async fn clear_queue(&self, owner_id: &str) -> Result<u64> {
        require_owner(owner_id)?;
        let deleted = self.db.clear_queue(owner_id).await?;
        tracing::info!(owner = fingerprint(owner_id), deleted, "Sync queue cleared");
        Ok(deleted)
    }

    pub async fn queue_stats(&self, owner_id: &str) -> Result<QueueStats> {
        self.db.queue_stats(owner_id).await
    }

    /// Run [`Self::dispatch_all`] every `interval` until the handle is aborted.
    pub fn spawn_auto_dispatch(&self, interval: Duration, max_owners: usize) -> JoinHandle<()> {
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match dispatcher.dispatch_all(max_owners).await {
                    Ok(passes) if !passes.is_empty() => {
                        tracing::info!(owners = passes.len(), "Background dispatch finished");
                    }
                    Ok(_) => {}
                    Err(error) => tracing::warn!(%error, "Background dispatch failed"),
                }
            }
        })
    }
}

fn require_owner(owner_id: &str) -> Result<()> {
    if owner_id.trim().is_empty() {
        return Err(Error::Ownership("Missing owner".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::SyncMethod;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn service() -> (SyncService, ManualClock) {
        let db = DatabaseService::open_in_memory().await.unwrap();
        let clock = ManualClock::default();
        let service = SyncService::new(db, Arc::new(clock.clone()), SyncOptions::default());
        (service, clock)
    }

    fn request(value: Value) -> SyncRequest {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_applies_defaults() {
        let (service, clock) = service().await;
        let item = service
            .enqueue(
                "owner-1",
                request(json!({"endpoint": "/api/expenses", "method": "POST"})),
            )
            .await
            .unwrap();

        assert_eq!(item.method, SyncMethod::Create);
        assert_eq!(item.status, SyncStatus::Pending);
        assert_eq!(item.payload, json!({}));
        assert_eq!(item.attempts, 0);
        assert_eq!(item.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(item.created_at, clock.now_millis());

        let stored = service.get("owner-1", &item.id).await.unwrap();
        assert_eq!(stored, item);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_rejects_missing_fields_without_persisting() {
        let (service, _) = service().await;
        let error = service
            .enqueue("owner-1", request(json!({"endpoint": "/api/expenses"})))
            .await
            .unwrap_err();

        assert!(matches!(error, Error::InvalidInput(_)));
        assert_eq!(service.queue_stats("owner-1").await.unwrap().total, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blank_owner_is_an_ownership_error() {
        let (service, _) = service().await;
        let error = service
            .enqueue(
                " ",
                request(json!({"endpoint": "/api/expenses", "method": "CREATE"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Ownership(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn get_hides_other_owners_items() {
        let (service, _) = service().await;
        let item = service
            .enqueue(
                "owner-1",
                request(json!({"endpoint": "/api/orders", "method": "DELETE", "data": {"_id": "x"}})),
            )
            .await
            .unwrap();

        let error = service.get("owner-2", &item.id).await.unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn batch_counts_inserted_and_rejected() {
        let (service, _) = service().await;
        let receipt = service
            .enqueue_batch(
                "owner-1",
                vec![
                    json!({"endpoint": "/api/expenses", "method": "CREATE", "data": {"amount": 1}}),
                    json!("not an object"),
                    json!({"endpoint": "/api/orders", "method": "GET"}),
                    json!({"endpoint": "/api/orders", "method": "UPDATE", "data": {"_id": "o1"}}),
                ],
            )
            .await
            .unwrap();

        assert_eq!(receipt, BatchReceipt { count: 2, rejected: 2 });
        assert_eq!(service.list_pending("owner-1").await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clear_queue_only_touches_the_owner() {
        let (service, _) = service().await;
        for owner in ["owner-1", "owner-1", "owner-2"] {
            service
                .enqueue(
                    owner,
                    request(json!({"endpoint": "/api/expenses", "method": "CREATE"})),
                )
                .await
                .unwrap();
        }

        assert_eq!(service.clear_queue("owner-1").await.unwrap(), 2);
        assert_eq!(service.queue_stats("owner-1").await.unwrap().total, 0);
        assert_eq!(service.queue_stats("owner-2").await.unwrap().total, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn auto_dispatch_drains_eligible_owners() {
        let (service, _) = service().await;
        for owner in ["owner-1", "owner-2"] {
            service
                .enqueue(
                    owner,
                    request(json!({
                        "endpoint": "/api/expenses",
                        "method": "CREATE",
                        "data": {"amount": 3, "category": "Salary"}
                    })),
                )
                .await
                .unwrap();
        }

        let handle = service.spawn_auto_dispatch(Duration::from_millis(10), 10);
        let mut drained = false;
        for _ in 0..100 {
            let first = service.queue_stats("owner-1").await.unwrap();
            let second = service.queue_stats("owner-2").await.unwrap();
            if first.completed == 1 && second.completed == 1 {
                drained = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();
        assert!(drained);
    }
}
