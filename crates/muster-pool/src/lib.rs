//! muster-pool — process-wide registry of runner nodes.
//!
//! Tracks live runners per logical group and the capacity committed
//! against each group. The pool refreshes itself from an external
//! control-plane feed on an interval and serves its last known-good
//! snapshot between refreshes: staleness is acceptable, unavailability
//! is not.
//!
//! # Architecture
//!
//! ```text
//! PoolRefresher (background task)
//!   └── PoolFeed::fetch() → FeedSnapshot ─┐
//!                                         ▼
//! NodePool ── runners(group) ──► Vec<Arc<dyn Runner>>  (snapshot copy)
//!   ├── assign_capacity / release_capacity (internally synchronized)
//!   └── shutdown() → runners() degrades to empty, never errors
//! ```

pub mod error;
pub mod feed;
pub mod pool;
pub mod refresh;
pub mod runner;
pub mod tls;

pub use error::{FeedError, RunnerError};
pub use feed::{FeedSnapshot, HttpFeed, NodeInfo, PoolFeed};
pub use pool::{NodePool, RunnerFactory};
pub use refresh::PoolRefresher;
pub use runner::{HttpRunner, Runner, TryExecOutcome};
pub use tls::TlsMaterial;
