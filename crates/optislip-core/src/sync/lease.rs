//! In-process per-owner dispatch leases.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Tracks which owners currently have a dispatch pass running.
#[derive(Debug, Clone, Default)]
pub struct OwnerLeases {
    held: Arc<Mutex<HashSet<String>>>,
}

impl OwnerLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lease for `owner_id`, or `None` if another pass holds it.
    pub fn try_acquire(&self, owner_id: &str) -> Option<OwnerLease> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(owner_id.to_string()) {
            return None;
        }
        Some(OwnerLease {
            owner_id: owner_id.to_string(),
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_held(&self, owner_id: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(owner_id)
    }
}

/// Released on drop.
#[derive(Debug)]
pub struct OwnerLease {
    owner_id: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl Drop for OwnerLease {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.owner_id);
    }
}
