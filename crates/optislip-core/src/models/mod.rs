//! Data models for Optislip

mod account;
mod expense;
mod order;
mod record;
mod resource;
mod sync_item;
pub mod timestamp;

pub use account::{ProfileUpdate, SubUser, User};
pub use expense::{Expense, ExpenseCategory, ExpenseDraft};
pub use order::{EyePrescription, Order, OrderDraft, OrderStatus};
pub use record::{payload_record_id, RecordId};
pub use resource::ResourceKind;
pub use sync_item::{
    NewSyncItem, QueueStats, SyncItem, SyncItemId, SyncMethod, SyncRequest, SyncStatus,
    DEFAULT_MAX_ATTEMPTS, MAX_ATTEMPTS_CEILING,
};
