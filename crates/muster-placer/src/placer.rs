//! Placement strategies.
//!
//! The loop is a bounded spin-wait with cooperative backoff: snapshot
//! the group's runners, offer the call to each in order, sleep a short
//! interval when nobody accepts, re-check the deadline, repeat. An
//! empty runner set (cold fleet, scaling from zero) is just another
//! round. Dropping the returned future cancels the loop at any await
//! point, so an upstream disconnect never leaves a task spinning.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use muster_model::{BoxFuture, Call, LbGroupId};
use muster_pool::{NodePool, RunnerError, TryExecOutcome};
use muster_ring::hash_key;

/// Retry/backoff knobs, defaulted but overridable per constructor so
/// placement behavior is testable without timing hacks.
#[derive(Debug, Clone)]
pub struct PlacerConfig {
    /// Sleep after a round in which every runner declined.
    pub retry_wait: Duration,
    /// Sleep when the runner set is empty (scaling from zero).
    pub no_capacity_wait: Duration,
    /// Upper bound on one placement. Caps the call's slot deadline,
    /// so a call with a generous execution budget still stops
    /// searching for a runner after this long.
    pub placement_timeout: Duration,
}

impl Default for PlacerConfig {
    fn default() -> Self {
        Self {
            retry_wait: Duration::from_millis(10),
            no_capacity_wait: Duration::from_secs(1),
            placement_timeout: Duration::from_secs(15),
        }
    }
}

/// Placement errors.
#[derive(Debug, thiserror::Error)]
pub enum PlaceError {
    /// The deadline elapsed with no runner accepting the call. This is
    /// the caller-visible backpressure signal, distinct from any
    /// runner-side failure.
    #[error("server busy: no runner accepted the call before its deadline")]
    ServerBusy,

    /// A runner accepted the call and its execution failed.
    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// A placement strategy.
pub trait Placer: Send + Sync {
    fn place_call<'a>(
        &'a self,
        pool: &'a NodePool,
        call: &'a Call,
        group: &'a LbGroupId,
    ) -> BoxFuture<'a, Result<(), PlaceError>>;
}

/// Linear scan in pool order. The default strategy.
pub struct NaivePlacer {
    config: PlacerConfig,
}

impl NaivePlacer {
    pub fn new(config: PlacerConfig) -> Self {
        Self { config }
    }
}

impl Default for NaivePlacer {
    fn default() -> Self {
        Self::new(PlacerConfig::default())
    }
}

impl Placer for NaivePlacer {
    fn place_call<'a>(
        &'a self,
        pool: &'a NodePool,
        call: &'a Call,
        group: &'a LbGroupId,
    ) -> BoxFuture<'a, Result<(), PlaceError>> {
        Box::pin(place_loop(&self.config, pool, call, group, false))
    }
}

/// Scan rotated by the call id's hash, so retries for one call keep
/// converging on the same runners instead of thrashing across the
/// whole fleet when many calls contend.
pub struct RingPlacer {
    config: PlacerConfig,
}

impl RingPlacer {
    pub fn new(config: PlacerConfig) -> Self {
        Self { config }
    }
}

impl Default for RingPlacer {
    fn default() -> Self {
        Self::new(PlacerConfig::default())
    }
}

impl Placer for RingPlacer {
    fn place_call<'a>(
        &'a self,
        pool: &'a NodePool,
        call: &'a Call,
        group: &'a LbGroupId,
    ) -> BoxFuture<'a, Result<(), PlaceError>> {
        Box::pin(place_loop(&self.config, pool, call, group, true))
    }
}

/// Deterministic per-call scan order over `len` runners.
fn scan_order(len: usize, rotate_key: Option<&str>) -> impl Iterator<Item = usize> + use<> {
    let start = match rotate_key {
        Some(key) if len > 0 => (hash_key(key) % len as u64) as usize,
        _ => 0,
    };
    (0..len).map(move |i| (start + i) % len)
}

async fn place_loop(
    config: &PlacerConfig,
    pool: &NodePool,
    call: &Call,
    group: &LbGroupId,
    rotate: bool,
) -> Result<(), PlaceError> {
    let deadline = call
        .slot_deadline
        .min(Instant::now() + config.placement_timeout);

    loop {
        if Instant::now() >= deadline {
            warn!(call_id = %call.id(), %group, "placement deadline elapsed");
            return Err(PlaceError::ServerBusy);
        }

        let runners = pool.runners(group);
        let rotate_key = rotate.then(|| call.id().as_str());
        for idx in scan_order(runners.len(), rotate_key) {
            let runner = &runners[idx];
            let remaining = deadline.duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(call_id = %call.id(), %group, "placement deadline elapsed mid-round");
                return Err(PlaceError::ServerBusy);
            }

            match tokio::time::timeout(remaining, runner.try_exec(call)).await {
                Err(_) => {
                    warn!(
                        call_id = %call.id(),
                        runner = runner.address(),
                        "placement attempt outlived the deadline"
                    );
                    return Err(PlaceError::ServerBusy);
                }
                Ok(Err(e)) => {
                    // Transport-level failure: this runner is out for
                    // the round, the loop goes on.
                    warn!(
                        call_id = %call.id(),
                        runner = runner.address(),
                        error = %e,
                        "failed during call placement"
                    );
                }
                Ok(Ok(TryExecOutcome::Placed(result))) => {
                    debug!(
                        call_id = %call.id(),
                        runner = runner.address(),
                        ok = result.is_ok(),
                        "call placed"
                    );
                    // First acceptance wins: the runner owns the call,
                    // success or failure.
                    return result.map_err(PlaceError::Runner);
                }
                Ok(Ok(TryExecOutcome::Rejected)) => {
                    debug!(
                        call_id = %call.id(),
                        runner = runner.address(),
                        "runner rejected call"
                    );
                }
            }
        }

        let wait = if runners.is_empty() {
            config.no_capacity_wait
        } else {
            config.retry_wait
        };
        let wait = wait.min(deadline.duration_since(Instant::now()));
        tokio::time::sleep(wait).await;
    }
}
