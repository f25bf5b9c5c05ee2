//! Agent error types.

use thiserror::Error;

use muster_model::ExecError;

/// Errors that can occur during agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Asynchronous enqueue is unsupported on the remote path;
    /// silently accepting it would lose the call.
    #[error("enqueue is not supported by the lb agent")]
    EnqueueUnsupported,

    #[error("delegate error: {0}")]
    Delegate(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
