//! Execution slots — the handle representing "this call will run".

use std::future::Future;
use std::pin::Pin;

use crate::call::Call;

/// Boxed future alias used at the dyn trait seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Terminal result of executing a slot.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// No runner accepted the call before its deadline. Upstream can
    /// retry with backoff or reject fast; this is backpressure, not a
    /// hard failure.
    #[error("server busy: no runner accepted the call before its deadline")]
    ServerBusy,
    /// The call was placed but execution failed.
    #[error("execution failed: {0}")]
    Failed(String),
}

/// Reserved execution path for one call, local or remote.
///
/// The slot's `exec` owns placement and execution; `close` releases
/// whatever local resource the slot reserved (nothing, on the remote
/// path).
pub trait Slot: Send + Sync {
    fn exec<'a>(&'a self, call: &'a Call) -> BoxFuture<'a, Result<(), ExecError>>;
    fn close<'a>(&'a self) -> BoxFuture<'a, Result<(), ExecError>>;
}
