//! Shared services used by the API server and the CLI.

pub mod database;
pub mod sync;

pub use database::DatabaseService;
pub use sync::{BatchReceipt, SyncOptions, SyncService};
