//! Capacity entries — transient per-invocation resource claims.

use crate::call::CallModel;
use crate::group::LbGroupId;

/// One in-flight invocation's resource claim against a group.
///
/// Created immediately before a placement attempt and released exactly
/// once when the invocation's execution path terminates. Never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityEntry {
    pub total_memory_mb: u64,
    pub group: LbGroupId,
}

impl CapacityEntry {
    pub fn for_call(model: &CallModel, group: LbGroupId) -> Self {
        Self {
            total_memory_mb: model.memory_mb,
            group,
        }
    }
}
