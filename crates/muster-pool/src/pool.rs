//! The node pool — shared runner registry and capacity ledger.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use muster_model::{CapacityEntry, LbGroupId};

use crate::feed::{FeedSnapshot, NodeInfo};
use crate::runner::{HttpRunner, Runner};

/// Builds a runner transport for a discovered node.
pub type RunnerFactory = Arc<dyn Fn(&NodeInfo) -> Arc<dyn Runner> + Send + Sync>;

struct PoolState {
    runners: HashMap<LbGroupId, Vec<Arc<dyn Runner>>>,
    advertised_mb: HashMap<LbGroupId, u64>,
    committed_mb: HashMap<LbGroupId, u64>,
    shut_down: bool,
}

/// Process-wide registry of runner nodes grouped by logical group.
///
/// Internally synchronized: concurrent readers (`runners`) and writers
/// (`assign_capacity`/`release_capacity`, snapshot refresh) need no
/// external locking. All reads return owned snapshots, never live
/// references into pool state.
pub struct NodePool {
    state: RwLock<PoolState>,
    factory: RunnerFactory,
}

impl NodePool {
    /// Pool with the default HTTP runner transport.
    pub fn new() -> Self {
        Self::with_runner_factory(Arc::new(|node: &NodeInfo| {
            Arc::new(HttpRunner::new(node.address.clone())) as Arc<dyn Runner>
        }))
    }

    /// Pool with a custom runner transport (tests, alternate RPC).
    pub fn with_runner_factory(factory: RunnerFactory) -> Self {
        Self {
            state: RwLock::new(PoolState {
                runners: HashMap::new(),
                advertised_mb: HashMap::new(),
                committed_mb: HashMap::new(),
                shut_down: false,
            }),
            factory,
        }
    }

    /// Current live runner set for a group.
    ///
    /// Empty when the group is unknown, the fleet is cold, or the pool
    /// has shut down — callers interpret all three as "no capacity,
    /// keep waiting", never as an error.
    pub fn runners(&self, group: &LbGroupId) -> Vec<Arc<dyn Runner>> {
        let state = self.state.read().expect("pool lock");
        if state.shut_down {
            return Vec::new();
        }
        state.runners.get(group).cloned().unwrap_or_default()
    }

    /// Record that `entry.total_memory_mb` is committed against its
    /// group. Safe under arbitrary concurrent callers; does not block.
    pub fn assign_capacity(&self, entry: &CapacityEntry) {
        let mut state = self.state.write().expect("pool lock");
        let committed = state.committed_mb.entry(entry.group.clone()).or_default();
        *committed += entry.total_memory_mb;
        debug!(
            group = %entry.group,
            assigned_mb = entry.total_memory_mb,
            committed_mb = *committed,
            "capacity assigned"
        );
    }

    /// Reverse a prior assignment. Paired 1:1 with `assign_capacity`
    /// by the guaranteed-release discipline at the call site; an
    /// unpaired release is a bug and only saturates to zero.
    pub fn release_capacity(&self, entry: &CapacityEntry) {
        let mut state = self.state.write().expect("pool lock");
        let committed = state.committed_mb.entry(entry.group.clone()).or_default();
        if *committed < entry.total_memory_mb {
            warn!(
                group = %entry.group,
                released_mb = entry.total_memory_mb,
                committed_mb = *committed,
                "capacity release exceeds committed total"
            );
            *committed = 0;
        } else {
            *committed -= entry.total_memory_mb;
        }
        debug!(
            group = %entry.group,
            released_mb = entry.total_memory_mb,
            committed_mb = *committed,
            "capacity released"
        );
    }

    /// Memory currently committed against a group.
    pub fn committed_mb(&self, group: &LbGroupId) -> u64 {
        let state = self.state.read().expect("pool lock");
        state.committed_mb.get(group).copied().unwrap_or(0)
    }

    /// Memory advertised by the group's nodes, per the last snapshot.
    pub fn advertised_mb(&self, group: &LbGroupId) -> u64 {
        let state = self.state.read().expect("pool lock");
        state.advertised_mb.get(group).copied().unwrap_or(0)
    }

    /// Replace the runner view with a fresh feed snapshot.
    ///
    /// Committed capacity counters survive the rebuild: in-flight
    /// claims outlive node churn. Ignored after shutdown.
    pub fn apply_snapshot(&self, snapshot: FeedSnapshot) {
        let mut state = self.state.write().expect("pool lock");
        if state.shut_down {
            return;
        }

        let mut runners: HashMap<LbGroupId, Vec<Arc<dyn Runner>>> = HashMap::new();
        let mut advertised: HashMap<LbGroupId, u64> = HashMap::new();
        for (group, nodes) in snapshot.groups {
            let group = LbGroupId::new(group);
            advertised.insert(
                group.clone(),
                nodes.iter().map(|n| n.capacity_memory_mb).sum(),
            );
            runners.insert(
                group,
                nodes.iter().map(|n| (self.factory)(n)).collect(),
            );
        }

        debug!(groups = runners.len(), "applied pool snapshot");
        state.runners = runners;
        state.advertised_mb = advertised;
    }

    /// Register one runner directly, bypassing the feed.
    pub fn insert_runner(&self, group: &LbGroupId, runner: Arc<dyn Runner>) {
        let mut state = self.state.write().expect("pool lock");
        if state.shut_down {
            return;
        }
        state.runners.entry(group.clone()).or_default().push(runner);
    }

    /// All known node addresses, across groups, deduplicated.
    pub fn node_addresses(&self) -> Vec<String> {
        let state = self.state.read().expect("pool lock");
        if state.shut_down {
            return Vec::new();
        }
        let mut addrs: Vec<String> = state
            .runners
            .values()
            .flatten()
            .map(|r| r.address().to_string())
            .collect();
        addrs.sort();
        addrs.dedup();
        addrs
    }

    /// Stop serving runners. In-flight placement loops see an empty
    /// runner list and degrade to "no capacity" rather than crashing.
    pub fn shutdown(&self) {
        let mut state = self.state.write().expect("pool lock");
        if !state.shut_down {
            info!("node pool shut down");
        }
        state.shut_down = true;
        state.runners.clear();
        state.advertised_mb.clear();
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.read().expect("pool lock").shut_down
    }
}

impl Default for NodePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muster_model::{BoxFuture, Call};

    use crate::error::RunnerError;
    use crate::runner::TryExecOutcome;

    struct NullRunner {
        address: String,
    }

    impl Runner for NullRunner {
        fn address(&self) -> &str {
            &self.address
        }

        fn try_exec<'a>(
            &'a self,
            _call: &'a Call,
        ) -> BoxFuture<'a, Result<TryExecOutcome, RunnerError>> {
            Box::pin(async { Ok(TryExecOutcome::Rejected) })
        }
    }

    fn null_factory() -> RunnerFactory {
        Arc::new(|node: &NodeInfo| {
            Arc::new(NullRunner {
                address: node.address.clone(),
            }) as Arc<dyn Runner>
        })
    }

    fn snapshot(group: &str, addrs: &[&str]) -> FeedSnapshot {
        let mut groups = HashMap::new();
        groups.insert(
            group.to_string(),
            addrs
                .iter()
                .map(|a| NodeInfo {
                    address: a.to_string(),
                    capacity_memory_mb: 1024,
                })
                .collect(),
        );
        FeedSnapshot { groups }
    }

    fn g(name: &str) -> LbGroupId {
        LbGroupId::new(name)
    }

    #[test]
    fn unknown_group_is_empty_not_an_error() {
        let pool = NodePool::with_runner_factory(null_factory());
        assert!(pool.runners(&g("nowhere")).is_empty());
    }

    #[test]
    fn snapshot_populates_runners_and_advertised_capacity() {
        let pool = NodePool::with_runner_factory(null_factory());
        pool.apply_snapshot(snapshot("g1", &["10.0.0.1:8080", "10.0.0.2:8080"]));

        let runners = pool.runners(&g("g1"));
        assert_eq!(runners.len(), 2);
        assert_eq!(runners[0].address(), "10.0.0.1:8080");
        assert_eq!(pool.advertised_mb(&g("g1")), 2048);
    }

    #[test]
    fn new_snapshot_replaces_old_groups() {
        let pool = NodePool::with_runner_factory(null_factory());
        pool.apply_snapshot(snapshot("g1", &["a:1"]));
        pool.apply_snapshot(snapshot("g2", &["b:2"]));

        assert!(pool.runners(&g("g1")).is_empty());
        assert_eq!(pool.runners(&g("g2")).len(), 1);
    }

    #[test]
    fn capacity_conservation_over_interleaved_pairs() {
        let pool = NodePool::with_runner_factory(null_factory());
        let e1 = CapacityEntry {
            total_memory_mb: 128,
            group: g("g1"),
        };
        let e2 = CapacityEntry {
            total_memory_mb: 512,
            group: g("g1"),
        };

        pool.assign_capacity(&e1);
        pool.assign_capacity(&e2);
        assert_eq!(pool.committed_mb(&g("g1")), 640);
        pool.release_capacity(&e1);
        pool.assign_capacity(&e1);
        pool.release_capacity(&e2);
        pool.release_capacity(&e1);

        assert_eq!(pool.committed_mb(&g("g1")), 0);
    }

    #[test]
    fn capacity_is_tracked_per_group() {
        let pool = NodePool::with_runner_factory(null_factory());
        pool.assign_capacity(&CapacityEntry {
            total_memory_mb: 100,
            group: g("g1"),
        });
        pool.assign_capacity(&CapacityEntry {
            total_memory_mb: 200,
            group: g("g2"),
        });

        assert_eq!(pool.committed_mb(&g("g1")), 100);
        assert_eq!(pool.committed_mb(&g("g2")), 200);
    }

    #[test]
    fn unpaired_release_saturates_at_zero() {
        let pool = NodePool::with_runner_factory(null_factory());
        pool.release_capacity(&CapacityEntry {
            total_memory_mb: 64,
            group: g("g1"),
        });
        assert_eq!(pool.committed_mb(&g("g1")), 0);
    }

    #[test]
    fn committed_capacity_survives_snapshot_refresh() {
        let pool = NodePool::with_runner_factory(null_factory());
        pool.assign_capacity(&CapacityEntry {
            total_memory_mb: 256,
            group: g("g1"),
        });
        pool.apply_snapshot(snapshot("g1", &["a:1"]));
        assert_eq!(pool.committed_mb(&g("g1")), 256);
    }

    #[test]
    fn concurrent_capacity_updates_balance_out() {
        use std::thread;

        let pool = Arc::new(NodePool::with_runner_factory(null_factory()));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            handles.push(thread::spawn(move || {
                let entry = CapacityEntry {
                    total_memory_mb: 64,
                    group: LbGroupId::new("g1"),
                };
                for _ in 0..1000 {
                    pool.assign_capacity(&entry);
                    pool.release_capacity(&entry);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(pool.committed_mb(&g("g1")), 0);
    }

    #[test]
    fn shutdown_empties_runners_without_erroring() {
        let pool = NodePool::with_runner_factory(null_factory());
        pool.apply_snapshot(snapshot("g1", &["a:1"]));
        assert_eq!(pool.runners(&g("g1")).len(), 1);

        pool.shutdown();
        assert!(pool.is_shut_down());
        assert!(pool.runners(&g("g1")).is_empty());

        // Late snapshots are ignored once shut down.
        pool.apply_snapshot(snapshot("g1", &["b:2"]));
        assert!(pool.runners(&g("g1")).is_empty());
    }

    #[test]
    fn node_addresses_flatten_and_dedup() {
        let pool = NodePool::with_runner_factory(null_factory());
        let mut groups = HashMap::new();
        groups.insert(
            "g1".to_string(),
            vec![NodeInfo {
                address: "a:1".to_string(),
                capacity_memory_mb: 1,
            }],
        );
        groups.insert(
            "g2".to_string(),
            vec![
                NodeInfo {
                    address: "a:1".to_string(),
                    capacity_memory_mb: 1,
                },
                NodeInfo {
                    address: "b:2".to_string(),
                    capacity_memory_mb: 1,
                },
            ],
        );
        pool.apply_snapshot(FeedSnapshot { groups });

        assert_eq!(pool.node_addresses(), vec!["a:1", "b:2"]);
    }
}
