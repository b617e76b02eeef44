//! Dispatch passes: claim eligible items, replay them, record the outcome.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use super::backoff::{self, FailureDecision};
use super::lease::OwnerLeases;
use super::replay::ReplayOutcome;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::models::SyncItem;
use crate::services::DatabaseService;
use crate::util::{compact_text, fingerprint};

/// Default number of items replayed per pass.
pub const DEFAULT_BATCH_LIMIT: usize = 50;

/// Default age after which a `processing` claim is considered abandoned.
pub const DEFAULT_PROCESSING_TIMEOUT: Duration = Duration::from_secs(300);

/// Applies one queued mutation to the authoritative store.
pub trait Replayer: Send + Sync {
    fn replay(&self, item: &SyncItem) -> impl Future<Output = Result<ReplayOutcome>> + Send;
}

/// Replays against the resource collections of the shared database.
#[derive(Clone)]
pub struct StoreReplayer {
    db: DatabaseService,
    clock: Arc<dyn Clock>,
}

impl StoreReplayer {
    pub fn new(db: DatabaseService, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }
}

impl Replayer for StoreReplayer {
    async fn replay(&self, item: &SyncItem) -> Result<ReplayOutcome> {
        self.db.replay(item, self.clock.now_millis()).await
    }
}

/// Dispatch tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Items replayed per pass
    pub batch_limit: usize,
    /// Claims older than this are returned to `pending` at the start of a pass
    pub processing_timeout: Duration,
    /// Fail "Unknown endpoint" / "Invalid method" items without retrying
    pub fail_fast_on_permanent: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_BATCH_LIMIT,
            processing_timeout: DEFAULT_PROCESSING_TIMEOUT,
            fail_fast_on_permanent: false,
        }
    }
}

/// Aggregate counts for one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSummary {
    /// Items claimed and replayed
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    /// Selected items another pass claimed first
    pub skipped: usize,
}

/// Result of one owner's pass inside [`Dispatcher::dispatch_all`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerDispatch {
    pub owner_id: String,
    pub summary: DispatchSummary,
}

/// Runs dispatch passes. One pass per owner at a time.
pub struct Dispatcher<R> {
    db: DatabaseService,
    replayer: R,
    clock: Arc<dyn Clock>,
    config: DispatchConfig,
    leases: OwnerLeases,
}

impl<R: Replayer> Dispatcher<R> {
    pub fn new(
        db: DatabaseService,
        replayer: R,
        clock: Arc<dyn Clock>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            db,
            replayer,
            clock,
            config,
            leases: OwnerLeases::new(),
        }
    }

    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run one pass over `owner_id`'s eligible items.
    ///
    /// Per-item failures are recorded on the item and counted; only queue
    /// storage errors abort the pass.
    pub async fn dispatch(&self, owner_id: &str) -> Result<DispatchSummary> {
        let Some(_lease) = self.leases.try_acquire(owner_id) else {
            return Err(Error::DispatchInProgress(owner_id.to_string()));
        };
        let owner = fingerprint(owner_id);

        let now = self.clock.now_millis();
        let timeout_ms =
            i64::try_from(self.config.processing_timeout.as_millis()).unwrap_or(i64::MAX);
        let released = self
            .db
            .release_stale_claims(owner_id, now.saturating_sub(timeout_ms), now)
            .await?;
        if released > 0 {
            tracing::warn!(owner, released, "Released stale sync claims");
        }

        let batch = self
            .db
            .select_eligible(owner_id, now, self.config.batch_limit)
            .await?;
        let mut summary = DispatchSummary::default();
        if batch.is_empty() {
            tracing::debug!(owner, "No pending syncs");
            return Ok(summary);
        }

        for item in batch {
            if !self.db.mark_processing(&item.id, self.clock.now_millis()).await? {
                tracing::debug!(owner, item = %item.id, "Sync item claimed elsewhere, skipping");
                summary.skipped += 1;
                continue;
            }
            summary.processed += 1;

            let outcome = match self.replayer.replay(&item).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    tracing::warn!(owner, item = %item.id, %error, "Replay raised an error");
                    ReplayOutcome::rejected(compact_text(&error.to_string()))
                }
            };

            if self.record_outcome(&item, outcome).await? {
                summary.successful += 1;
            } else {
                summary.failed += 1;
            }
        }

        tracing::info!(
            owner,
            processed = summary.processed,
            successful = summary.successful,
            failed = summary.failed,
            skipped = summary.skipped,
            "Sync queue processed"
        );
        Ok(summary)
    }

    /// Store the outcome of a claimed item. Returns whether it succeeded.
    async fn record_outcome(&self, item: &SyncItem, outcome: ReplayOutcome) -> Result<bool> {
        let now = self.clock.now_millis();
        match outcome {
            ReplayOutcome::Applied(result) => {
                self.db.mark_completed(&item.id, &result, now).await?;
                tracing::info!(
                    item = %item.id,
                    method = %item.method,
                    endpoint = %item.endpoint,
                    "Sync item completed"
                );
                Ok(true)
            }
            ReplayOutcome::Rejected { error, permanent } => {
                let give_up = permanent && self.config.fail_fast_on_permanent;
                match backoff::on_failure(item.attempts, item.max_attempts, now, give_up) {
                    FailureDecision::Retry {
                        attempts,
                        next_retry_at,
                    } => {
                        self.db
                            .mark_retry(&item.id, &error, next_retry_at, attempts, now)
                            .await?;
                        tracing::info!(
                            item = %item.id,
                            endpoint = %item.endpoint,
                            attempts,
                            next_retry_at,
                            %error,
                            "Sync item failed, retry scheduled"
                        );
                    }
                    FailureDecision::Fail { attempts } => {
                        self.db.mark_failed(&item.id, &error, attempts, now).await?;
                        tracing::warn!(
                            item = %item.id,
                            endpoint = %item.endpoint,
                            attempts,
                            %error,
                            "Sync item failed permanently"
                        );
                    }
                }
                Ok(false)
            }
        }
    }
}

impl<R: Replayer + 'static> Dispatcher<R> {
    /// One pass for each owner with eligible work, run concurrently.
    ///
    /// Owners whose lease is already held are skipped. A failing pass is
    /// logged and does not stop the others.
    pub async fn dispatch_all(
        self: &Arc<Self>,
        max_owners: usize,
    ) -> Result<Vec<OwnerDispatch>> {
        let owners = self
            .db
            .owners_with_eligible(self.clock.now_millis(), max_owners)
            .await?;

        let mut tasks = JoinSet::new();
        for owner_id in owners {
            if self.leases.is_held(&owner_id) {
                continue;
            }
            let dispatcher = Arc::clone(self);
            tasks.spawn(async move {
                let result = dispatcher.dispatch(&owner_id).await;
                (owner_id, result)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((owner_id, Ok(summary))) => results.push(OwnerDispatch { owner_id, summary }),
                Ok((_, Err(Error::DispatchInProgress(_)))) => {}
                Ok((owner_id, Err(error))) => {
                    tracing::warn!(owner = fingerprint(&owner_id), %error, "Dispatch pass failed");
                }
                Err(error) => tracing::error!(%error, "Dispatch task panicked"),
            }
        }
        Ok(results)
    }
}
