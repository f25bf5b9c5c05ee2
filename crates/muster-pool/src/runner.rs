//! Runners — the RPC surface the pool hands to the placer.
//!
//! A runner either accepts a call (taking ownership of execution and
//! result delivery) or rejects it for lack of local capacity. The
//! default transport posts the call to the runner's invoke endpoint
//! over HTTP.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::debug;

use muster_model::{BoxFuture, Call};

use crate::error::RunnerError;

/// Outcome of offering a call to one runner.
#[derive(Debug)]
pub enum TryExecOutcome {
    /// The runner accepted the call and owns it; the inner result is
    /// the execution result, success or failure.
    Placed(Result<(), RunnerError>),
    /// The runner declined (insufficient local capacity, transient
    /// overload); try the next one.
    Rejected,
}

/// A worker node capable of executing calls up to its capacity.
pub trait Runner: Send + Sync {
    fn address(&self) -> &str;

    /// Offer `call` to this runner. Transport-level failures are the
    /// outer error; acceptance or rejection is the outcome.
    fn try_exec<'a>(&'a self, call: &'a Call)
    -> BoxFuture<'a, Result<TryExecOutcome, RunnerError>>;
}

/// HTTP transport to a runner's invoke endpoint.
///
/// Status mapping: 2xx means the runner accepted and executed the
/// call; 503 means backpressure (rejected, not an error); anything
/// else means the runner accepted but execution failed.
pub struct HttpRunner {
    address: String,
    invoke_path: String,
}

impl HttpRunner {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            invoke_path: "/invoke".to_string(),
        }
    }

    pub fn with_invoke_path(mut self, path: impl Into<String>) -> Self {
        self.invoke_path = path.into();
        self
    }

    async fn exec_once(&self, call: &Call) -> Result<TryExecOutcome, RunnerError> {
        let payload = serde_json::to_vec(&call.model).map_err(|e| RunnerError::Transport {
            address: self.address.clone(),
            message: e.to_string(),
        })?;

        let stream =
            TcpStream::connect(&self.address)
                .await
                .map_err(|e| RunnerError::Transport {
                    address: self.address.clone(),
                    message: e.to_string(),
                })?;
        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await.map_err(|e| {
            RunnerError::Transport {
                address: self.address.clone(),
                message: e.to_string(),
            }
        })?;
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("POST")
            .uri(&self.invoke_path)
            .header("host", &self.address)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| RunnerError::Transport {
                address: self.address.clone(),
                message: e.to_string(),
            })?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| RunnerError::Transport {
                address: self.address.clone(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if status.as_u16() == 503 {
            debug!(runner = %self.address, "runner rejected call");
            return Ok(TryExecOutcome::Rejected);
        }

        // The runner took the call. A failed body read means the
        // result was lost after acceptance, which is this runner's
        // failure to answer for, not a try-next-runner condition.
        let body = match resp.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                return Ok(TryExecOutcome::Placed(Err(RunnerError::Transport {
                    address: self.address.clone(),
                    message: format!("response body lost: {e}"),
                })));
            }
        };
        if let Ok(http) = call.http() {
            http.write_response(&body);
        }

        if status.is_success() {
            Ok(TryExecOutcome::Placed(Ok(())))
        } else {
            Ok(TryExecOutcome::Placed(Err(RunnerError::Execution {
                address: self.address.clone(),
                status: status.as_u16(),
            })))
        }
    }
}

impl Runner for HttpRunner {
    fn address(&self) -> &str {
        &self.address
    }

    fn try_exec<'a>(
        &'a self,
        call: &'a Call,
    ) -> BoxFuture<'a, Result<TryExecOutcome, RunnerError>> {
        Box::pin(self.exec_once(call))
    }
}
