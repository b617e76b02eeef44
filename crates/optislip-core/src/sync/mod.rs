//! Offline sync reconciliation: replay queued client mutations against the
//! authoritative store with retry, backoff and per-item status tracking.

pub mod backoff;
mod dispatcher;
mod lease;
mod replay;

pub use dispatcher::{
    DispatchConfig, DispatchSummary, Dispatcher, OwnerDispatch, Replayer, StoreReplayer,
    DEFAULT_BATCH_LIMIT, DEFAULT_PROCESSING_TIMEOUT,
};
pub use lease::{OwnerLease, OwnerLeases};
pub use replay::{replay_item, ReplayOutcome};
