//! Scoped capacity claims.
//!
//! A `CapacityGuard` assigns capacity on construction and releases it
//! on drop, so the release runs on every exit path — success, failure,
//! or cancellation — exactly once. Leaked or double-released entries
//! are correctness bugs; the guard makes them unrepresentable.

use std::sync::Arc;

use muster_model::CapacityEntry;
use muster_pool::NodePool;

/// Holds one assigned capacity entry until dropped.
pub struct CapacityGuard {
    pool: Arc<NodePool>,
    entry: Option<CapacityEntry>,
}

impl CapacityGuard {
    /// Assign `entry` against the pool and take ownership of the
    /// matching release.
    pub fn assign(pool: Arc<NodePool>, entry: CapacityEntry) -> Self {
        pool.assign_capacity(&entry);
        Self {
            pool,
            entry: Some(entry),
        }
    }
}

impl Drop for CapacityGuard {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            self.pool.release_capacity(&entry);
        }
    }
}
