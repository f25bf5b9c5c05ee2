//! muster-ring — consistent-hash ring for routing keys to nodes.
//!
//! Maps an opaque routing key to one node of a changing node set.
//! Each node is projected onto the ring as many virtual points, so
//! adding or removing a node only remaps the keys that landed on that
//! node's points (~1/N of the key space) instead of reshuffling
//! everything the way modulo indexing would.

use std::collections::BTreeMap;

use xxhash_rust::xxh3;

/// Seed for XXH3 hashing. Fixed so selection is stable across process
/// restarts.
const RING_SEED: u64 = 0x6d75_7374;

/// Virtual points per node. 160 keeps the per-node share within a few
/// percent of 1/N for fleets of tens of nodes.
pub const DEFAULT_REPLICAS: usize = 160;

/// Hash a routing key onto the ring's key space.
///
/// Exposed so other components (e.g. per-call scan rotation) share the
/// same hash and seed.
pub fn hash_key(key: &str) -> u64 {
    xxh3::xxh3_64_with_seed(key.as_bytes(), RING_SEED)
}

/// Ring errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RingError {
    /// No candidate nodes; callers treat this as "no backend
    /// available", not a crash.
    #[error("no candidate nodes in the ring")]
    EmptyRing,
}

/// A consistent-hash ring over node addresses.
#[derive(Debug, Clone)]
pub struct HashRing {
    replicas: usize,
    ring: BTreeMap<u64, String>,
    nodes: Vec<String>,
}

impl HashRing {
    pub fn new(replicas: usize) -> Self {
        Self {
            replicas: replicas.max(1),
            ring: BTreeMap::new(),
            nodes: Vec::new(),
        }
    }

    /// Build a ring with the default replica count over `nodes`.
    pub fn with_nodes<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ring = Self::new(DEFAULT_REPLICAS);
        for node in nodes {
            ring.add_node(&node.into());
        }
        ring
    }

    /// Add a node; a no-op if it is already present.
    pub fn add_node(&mut self, node: &str) {
        if self.nodes.iter().any(|n| n == node) {
            return;
        }
        self.nodes.push(node.to_string());
        for point in 0..self.replicas {
            self.ring
                .insert(vnode_hash(node, point), node.to_string());
        }
    }

    /// Remove a node. Returns whether it was present.
    pub fn remove_node(&mut self, node: &str) -> bool {
        let Some(pos) = self.nodes.iter().position(|n| n == node) else {
            return false;
        };
        self.nodes.remove(pos);
        for point in 0..self.replicas {
            self.ring.remove(&vnode_hash(node, point));
        }
        true
    }

    /// Replace the node set wholesale.
    pub fn set_nodes(&mut self, nodes: &[String]) {
        self.ring.clear();
        self.nodes.clear();
        for node in nodes {
            self.add_node(node);
        }
    }

    /// Select the node owning `key`.
    ///
    /// Deterministic for a fixed node set: the first virtual point at
    /// or after the key's hash wins, wrapping at the top of the ring.
    pub fn select(&self, key: &str) -> Result<&str, RingError> {
        if self.ring.is_empty() {
            return Err(RingError::EmptyRing);
        }
        let h = hash_key(key);
        let owner = self
            .ring
            .range(h..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, node)| node.as_str());
        // Non-empty ring always yields an owner.
        owner.ok_or(RingError::EmptyRing)
    }

    /// Number of distinct nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Current node set, in insertion order.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS)
    }
}

fn vnode_hash(node: &str, point: usize) -> u64 {
    xxh3::xxh3_64_with_seed(format!("{node}#{point}").as_bytes(), RING_SEED)
}
