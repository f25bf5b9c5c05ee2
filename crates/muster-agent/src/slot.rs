//! The remote execution slot.
//!
//! Stands in for a local slot reservation: `exec` is what actually
//! runs the placement protocol against the fleet. `close` is a no-op
//! since no local resource was reserved.

use std::sync::Arc;

use tracing::warn;

use muster_model::{BoxFuture, Call, CapacityEntry, ExecError, GroupResolver, Slot};
use muster_placer::{PlaceError, Placer};
use muster_pool::NodePool;

use crate::guard::CapacityGuard;

/// Slot implementation that places the call on a remote runner.
pub struct RemoteSlot {
    pool: Arc<NodePool>,
    placer: Arc<dyn Placer>,
    resolver: Arc<dyn GroupResolver>,
}

impl RemoteSlot {
    pub fn new(
        pool: Arc<NodePool>,
        placer: Arc<dyn Placer>,
        resolver: Arc<dyn GroupResolver>,
    ) -> Self {
        Self {
            pool,
            placer,
            resolver,
        }
    }
}

impl Slot for RemoteSlot {
    fn exec<'a>(&'a self, call: &'a Call) -> BoxFuture<'a, Result<(), ExecError>> {
        Box::pin(async move {
            let group = self.resolver.resolve(&call.model);
            let entry = CapacityEntry::for_call(&call.model, group.clone());

            // Claimed before the first placement attempt; the guard
            // releases on every exit path, including cancellation.
            let _guard = CapacityGuard::assign(Arc::clone(&self.pool), entry);

            let result = self.placer.place_call(&self.pool, call, &group).await;
            if let Err(e) = &result {
                warn!(call_id = %call.id(), %group, error = %e, "failed to place call");
            }
            result.map_err(|e| match e {
                PlaceError::ServerBusy => ExecError::ServerBusy,
                PlaceError::Runner(re) => ExecError::Failed(re.to_string()),
            })
        })
    }

    fn close<'a>(&'a self) -> BoxFuture<'a, Result<(), ExecError>> {
        // Nothing local to release on the remote path.
        Box::pin(async { Ok(()) })
    }
}
