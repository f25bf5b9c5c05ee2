//! Background pool refresh — explicit lifecycle around the feed loop.
//!
//! `PoolRefresher::start` spawns the refresh task; `shutdown` stops
//! it. Feed failures are logged and retried on the next tick, keeping
//! the pool's last known-good snapshot in place. Tests that need
//! deterministic refresh drive `NodePool::apply_snapshot` directly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::feed::PoolFeed;
use crate::pool::NodePool;

/// Handle to the background refresh task.
pub struct PoolRefresher {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl PoolRefresher {
    /// Start refreshing `pool` from `feed` every `interval`.
    pub fn start(pool: Arc<NodePool>, feed: Arc<dyn PoolFeed>, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!(?interval, "pool refresh loop started");
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        match feed.fetch().await {
                            Ok(snapshot) => pool.apply_snapshot(snapshot),
                            Err(e) => {
                                // Never fatal: serve the stale snapshot
                                // and retry on the next tick.
                                warn!(
                                    error = %e,
                                    "pool feed unreachable; serving last known snapshot"
                                );
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("pool refresh loop shutting down");
                        break;
                    }
                }
            }
        });

        Self {
            handle,
            shutdown_tx,
        }
    }

    /// Stop the refresh loop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}
