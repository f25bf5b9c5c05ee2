//! Request forwarding — resolves a backend per request and proxies bytes.
//!
//! The router holds a consistent-hash ring over the configured node
//! addresses. Each inbound request derives its routing key from the
//! request path, selects a backend, and is forwarded verbatim
//! (method, headers, body) with the response streamed back.

use std::sync::{Arc, RwLock};

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Incoming};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use muster_ring::{HashRing, RingError};

/// Proxy errors.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The node set is empty; nothing to route to.
    #[error("no backends available")]
    NoBackends,

    #[error("connect to backend {backend} failed: {source}")]
    Connect {
        backend: String,
        source: std::io::Error,
    },

    #[error("upstream {backend} failed: {source}")]
    Upstream {
        backend: String,
        source: hyper::Error,
    },
}

/// Routes and forwards requests using consistent hashing.
pub struct ReverseRouter {
    ring: RwLock<HashRing>,
}

impl ReverseRouter {
    pub fn new(nodes: &[String]) -> Self {
        Self {
            ring: RwLock::new(HashRing::with_nodes(nodes.iter().cloned())),
        }
    }

    /// Replace the backend set. Subsequent requests re-resolve over
    /// the new ring; keys that stayed on surviving nodes keep their
    /// backend.
    pub fn set_backends(&self, nodes: &[String]) {
        let mut ring = self.ring.write().expect("ring lock");
        ring.set_nodes(nodes);
        debug!(count = nodes.len(), "updated proxy backends");
    }

    /// Snapshot of the current backend set.
    pub fn backends(&self) -> Vec<String> {
        let ring = self.ring.read().expect("ring lock");
        ring.nodes().to_vec()
    }

    /// Resolve the backend owning `key`.
    pub fn route(&self, key: &str) -> Result<String, ProxyError> {
        let ring = self.ring.read().expect("ring lock");
        ring.select(key)
            .map(str::to_string)
            .map_err(|RingError::EmptyRing| ProxyError::NoBackends)
    }

    /// Forward one request to its backend, streaming the response.
    ///
    /// Backend connection failures map to `502 Bad Gateway`; an empty
    /// node set maps to `503 Service Unavailable`. The original caller
    /// always gets a response, never a dropped request.
    pub async fn proxy<B>(&self, req: Request<B>) -> Response<BoxBody<Bytes, hyper::Error>>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let key = req.uri().path().to_string();
        let backend = match self.route(&key) {
            Ok(backend) => backend,
            Err(e) => {
                warn!(key, error = %e, "no backend for request");
                return gateway_response(StatusCode::SERVICE_UNAVAILABLE, "no backends available");
            }
        };

        debug!(key, backend, "forwarding request");
        match forward(&backend, req).await {
            Ok(resp) => resp.map(BodyExt::boxed),
            Err(e) => {
                warn!(backend, error = %e, "backend request failed");
                gateway_response(StatusCode::BAD_GATEWAY, "backend unreachable")
            }
        }
    }

    /// Accept loop: serve proxied connections until shutdown flips.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        info!(addr = %listener.local_addr()?, "reverse router listening");
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    debug!(%peer, "accepted connection");
                    let router = Arc::clone(&self);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = hyper::service::service_fn(move |req: Request<Incoming>| {
                            let router = Arc::clone(&router);
                            async move {
                                Ok::<_, std::convert::Infallible>(router.proxy(req).await)
                            }
                        });
                        if let Err(e) = hyper::server::conn::http1::Builder::new()
                            .serve_connection(io, service)
                            .await
                        {
                            debug!(error = %e, "connection closed with error");
                        }
                    });
                }
                _ = shutdown.changed() => {
                    info!("reverse router shutting down");
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Open a connection to `backend` and send the request through it.
async fn forward<B>(backend: &str, req: Request<B>) -> Result<Response<Incoming>, ProxyError>
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let stream = TcpStream::connect(backend)
        .await
        .map_err(|source| ProxyError::Connect {
            backend: backend.to_string(),
            source,
        })?;
    let io = TokioIo::new(stream);
    let (mut sender, conn) =
        hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|source| ProxyError::Upstream {
                backend: backend.to_string(),
                source,
            })?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    sender
        .send_request(req)
        .await
        .map_err(|source| ProxyError::Upstream {
            backend: backend.to_string(),
            source,
        })
}

fn gateway_response(status: StatusCode, msg: &'static str) -> Response<BoxBody<Bytes, hyper::Error>> {
    Response::builder()
        .status(status)
        .body(
            Full::new(Bytes::from_static(msg.as_bytes()))
                .map_err(|never| match never {})
                .boxed(),
        )
        .expect("static response")
}
