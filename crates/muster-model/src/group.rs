//! Logical groups — named partitions of the runner fleet.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::call::CallModel;

/// Identity of a logical group scoping placement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LbGroupId(String);

impl LbGroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LbGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps a call to the logical group it is placed in.
///
/// Implementations must be pure functions of the call model: the same
/// call must always resolve to the same group, or retries would
/// thrash across partitions.
pub trait GroupResolver: Send + Sync {
    fn resolve(&self, call: &CallModel) -> LbGroupId;
}

/// Resolver returning one fixed group for every call.
///
/// Stands in until a real multi-tenant grouping scheme exists; the
/// fleet behaves as a single partition.
pub struct StaticGroupResolver {
    group: LbGroupId,
}

impl StaticGroupResolver {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: LbGroupId::new(group),
        }
    }
}

impl Default for StaticGroupResolver {
    fn default() -> Self {
        Self::new("default")
    }
}

impl GroupResolver for StaticGroupResolver {
    fn resolve(&self, _call: &CallModel) -> LbGroupId {
        self.group.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::CallId;

    fn model(app: &str) -> CallModel {
        CallModel {
            id: CallId::new("c1"),
            app_id: app.to_string(),
            path: "/".to_string(),
            image: "img".to_string(),
            memory_mb: 64,
            timeout_secs: 10,
        }
    }

    #[test]
    fn static_resolver_ignores_call_identity() {
        let resolver = StaticGroupResolver::new("g1");
        assert_eq!(resolver.resolve(&model("a")), LbGroupId::new("g1"));
        assert_eq!(resolver.resolve(&model("b")), LbGroupId::new("g1"));
    }

    #[test]
    fn default_resolver_uses_default_group() {
        let resolver = StaticGroupResolver::default();
        assert_eq!(resolver.resolve(&model("a")).as_str(), "default");
    }
}
