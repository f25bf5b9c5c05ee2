//! Pool error types.

use thiserror::Error;

/// Errors from one runner attempt.
///
/// Never fatal to a placement loop: the placer logs these and moves on
/// to the next runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("runner {address} unreachable: {message}")]
    Transport { address: String, message: String },

    #[error("runner {address} returned status {status}")]
    Execution { address: String, status: u16 },
}

/// Errors from the node-pool feed.
///
/// A failed fetch keeps the last known-good snapshot in place and is
/// retried on the next refresh tick; it never tears down the pool.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed connect failed: {0}")]
    Connect(#[from] std::io::Error),

    #[error("feed request failed: {0}")]
    Http(#[from] hyper::Error),

    #[error("feed request invalid: {0}")]
    Request(#[from] http::Error),

    #[error("feed returned status {0}")]
    Status(u16),

    #[error("feed payload invalid: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("tls configuration invalid: {0}")]
    Tls(String),
}
