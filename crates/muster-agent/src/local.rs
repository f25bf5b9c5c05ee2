//! The local delegate agent.
//!
//! Handles the call-lifecycle concerns that stay on this node:
//! admission, listener fan-out, and counters. Execution itself goes
//! through whatever slot was reserved on the call, so the same
//! delegate serves both local and remote execution paths.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::{debug, info};

use muster_model::{BoxFuture, Call, CallModel};

use crate::agent::{Agent, CallListener};
use crate::error::AgentError;

#[derive(Default)]
struct AgentStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time view of the agent counters.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
}

impl AgentStats {
    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Agent running calls through their reserved slot on this node.
pub struct LocalAgent {
    stats: Arc<AgentStats>,
    listeners: RwLock<Vec<Arc<dyn CallListener>>>,
}

impl LocalAgent {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(AgentStats::default()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn notify_started(&self, model: &CallModel) {
        for listener in self.listeners.read().expect("listener lock").iter() {
            listener.call_started(model);
        }
    }

    fn notify_ended(&self, model: &CallModel, success: bool) {
        for listener in self.listeners.read().expect("listener lock").iter() {
            listener.call_ended(model, success);
        }
    }
}

impl Default for LocalAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl Agent for LocalAgent {
    fn get_call(&self, model: CallModel) -> Result<Call, AgentError> {
        debug!(call_id = %model.id, app_id = %model.app_id, "admitting call");
        Ok(Call::new(model))
    }

    fn submit<'a>(&'a self, call: &'a Call) -> BoxFuture<'a, Result<(), AgentError>> {
        Box::pin(async move {
            let slot = call
                .reserved_slot()
                .ok_or_else(|| AgentError::Delegate("call has no reserved slot".to_string()))?;

            self.stats.submitted.fetch_add(1, Ordering::Relaxed);
            self.notify_started(&call.model);

            let result = slot.exec(call).await;
            match &result {
                Ok(()) => {
                    self.stats.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
            self.notify_ended(&call.model, result.is_ok());

            result.map_err(AgentError::from)
        })
    }

    fn enqueue<'a>(&'a self, _model: &'a CallModel) -> BoxFuture<'a, Result<(), AgentError>> {
        // No queue is wired up on this node.
        Box::pin(async { Err(AgentError::EnqueueUnsupported) })
    }

    fn add_call_listener(&self, listener: Arc<dyn CallListener>) {
        self.listeners
            .write()
            .expect("listener lock")
            .push(listener);
    }

    fn metrics_router(&self) -> Router {
        let stats = Arc::clone(&self.stats);
        Router::new().route(
            "/metrics",
            get(move || {
                let stats = Arc::clone(&stats);
                async move { Json(stats.snapshot()) }
            }),
        )
    }

    fn close<'a>(&'a self) -> BoxFuture<'a, Result<(), AgentError>> {
        Box::pin(async move {
            let stats = self.stats.snapshot();
            info!(
                submitted = stats.submitted,
                completed = stats.completed,
                failed = stats.failed,
                "local agent closed"
            );
            Ok(())
        })
    }
}
