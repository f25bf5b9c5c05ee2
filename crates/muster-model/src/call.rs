//! The call being placed and its capability accessors.
//!
//! `CallModel` is the wire-facing description of an invocation.
//! `Call` wraps it with the runtime state the placement path needs:
//! the slot deadline, an optional reserved execution slot, and an
//! optional HTTP exchange for request/response bytes.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::slot::Slot;

/// Errors raised by call accessors.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The call implementation does not carry an HTTP exchange.
    #[error("call does not support the HTTP capability")]
    CapabilityUnsupported,
}

/// Unique identity of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wire-facing description of an invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallModel {
    pub id: CallId,
    /// Owning application; input to logical group derivation.
    pub app_id: String,
    /// Request path; doubles as the routing key on the proxy path.
    pub path: String,
    /// Function image executed by the runner.
    pub image: String,
    /// Memory the invocation commits against its group.
    pub memory_mb: u64,
    /// Budget for placement plus execution, in seconds.
    pub timeout_secs: u64,
}

/// Request/response byte exchange attached to HTTP-originated calls.
///
/// Calls admitted through other front ends simply do not carry one;
/// accessors on [`Call`] surface that as a typed error instead of
/// requiring a downcast.
#[derive(Debug)]
pub struct HttpExchange {
    request_body: Bytes,
    response: Mutex<Vec<u8>>,
}

impl HttpExchange {
    pub fn new(request_body: Bytes) -> Self {
        Self {
            request_body,
            response: Mutex::new(Vec::new()),
        }
    }

    /// Body of the original request.
    pub fn request_body(&self) -> Bytes {
        self.request_body.clone()
    }

    /// Append a chunk of the runner's response.
    pub fn write_response(&self, chunk: &[u8]) {
        let mut buf = self.response.lock().expect("response lock");
        buf.extend_from_slice(chunk);
    }

    /// Drain the buffered response for delivery to the caller.
    pub fn take_response(&self) -> Vec<u8> {
        let mut buf = self.response.lock().expect("response lock");
        std::mem::take(&mut *buf)
    }
}

/// One in-flight invocation.
///
/// Owned by the front end; the placement subsystem only reads it,
/// except for attaching a reserved execution slot.
pub struct Call {
    pub model: CallModel,
    /// Placement must succeed (or fail definitively) by this instant.
    pub slot_deadline: Instant,
    reserved_slot: Option<Arc<dyn Slot>>,
    http: Option<Arc<HttpExchange>>,
}

impl Call {
    /// Build a call with the deadline derived from the model's timeout.
    pub fn new(model: CallModel) -> Self {
        let deadline = Instant::now() + Duration::from_secs(model.timeout_secs);
        Self {
            model,
            slot_deadline: deadline,
            reserved_slot: None,
            http: None,
        }
    }

    /// Override the slot deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.slot_deadline = deadline;
        self
    }

    /// Attach an HTTP exchange.
    pub fn with_http(mut self, exchange: HttpExchange) -> Self {
        self.http = Some(Arc::new(exchange));
        self
    }

    pub fn id(&self) -> &CallId {
        &self.model.id
    }

    /// Attach a reserved execution slot. The agent that admits the
    /// call decides whether execution is local or remote by choosing
    /// the slot implementation.
    pub fn reserve_slot(&mut self, slot: Arc<dyn Slot>) {
        self.reserved_slot = Some(slot);
    }

    pub fn reserved_slot(&self) -> Option<Arc<dyn Slot>> {
        self.reserved_slot.clone()
    }

    /// HTTP capability accessor.
    pub fn http(&self) -> Result<&HttpExchange, CallError> {
        self.http
            .as_deref()
            .ok_or(CallError::CapabilityUnsupported)
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("model", &self.model)
            .field("slot_deadline", &self.slot_deadline)
            .field("has_slot", &self.reserved_slot.is_some())
            .field("has_http", &self.http.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> CallModel {
        CallModel {
            id: CallId::new("c1"),
            app_id: "app".to_string(),
            path: "/hello".to_string(),
            image: "docker.io/library/hello:latest".to_string(),
            memory_mb: 128,
            timeout_secs: 30,
        }
    }

    #[tokio::test]
    async fn deadline_derived_from_timeout() {
        let call = Call::new(model());
        let remaining = call.slot_deadline.duration_since(Instant::now());
        assert!(remaining <= Duration::from_secs(30));
        assert!(remaining > Duration::from_secs(29));
    }

    #[test]
    fn http_capability_missing_is_typed_error() {
        let call = Call::new(model());
        assert!(matches!(
            call.http(),
            Err(CallError::CapabilityUnsupported)
        ));
    }

    #[test]
    fn http_exchange_round_trip() {
        let call = Call::new(model()).with_http(HttpExchange::new(Bytes::from_static(b"in")));
        let http = call.http().unwrap();
        assert_eq!(http.request_body(), Bytes::from_static(b"in"));

        http.write_response(b"out-");
        http.write_response(b"bytes");
        assert_eq!(http.take_response(), b"out-bytes");
        // Drained — a second take is empty.
        assert!(http.take_response().is_empty());
    }

    #[test]
    fn call_id_serializes_transparently() {
        let id = CallId::new("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
