//! optislip-core - Core library for Optislip
//!
//! This crate contains the sync queue models, the libSQL record store, the
//! per-resource replayers and the dispatcher that reconciles offline client
//! mutations against the authoritative store. The API server and the admin CLI
//! are thin layers over [`services::SyncService`].

pub mod clock;
pub mod db;
pub mod error;
pub mod identity;
pub mod models;
pub mod services;
pub mod sync;
pub mod util;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use identity::{IdentityResolver, OwnerContext, Principal};
pub use models::{SyncItem, SyncItemId, SyncMethod, SyncRequest, SyncStatus};
