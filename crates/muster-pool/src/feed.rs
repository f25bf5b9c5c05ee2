//! Node-pool feed — the external control-plane source of truth.
//!
//! The feed returns a point-in-time list of live nodes per logical
//! group. It may be temporarily unreachable; the pool tolerates that
//! by serving its last known-good snapshot.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use muster_model::BoxFuture;

use crate::error::FeedError;
use crate::tls::{self, TlsMaterial};

/// One discovered node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub address: String,
    pub capacity_memory_mb: u64,
}

/// Point-in-time view of the fleet, grouped by logical group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedSnapshot {
    pub groups: std::collections::HashMap<String, Vec<NodeInfo>>,
}

/// Source the pool refreshes from.
pub trait PoolFeed: Send + Sync {
    fn fetch<'a>(&'a self) -> BoxFuture<'a, Result<FeedSnapshot, FeedError>>;
}

/// HTTP/JSON feed client, optionally secured with mutual TLS.
pub struct HttpFeed {
    addr: String,
    snapshot_path: String,
    tls: Option<Arc<rustls::ClientConfig>>,
}

impl HttpFeed {
    /// Plaintext feed connection.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            snapshot_path: "/v1/runners".to_string(),
            tls: None,
        }
    }

    /// Feed connection authenticated with the given mTLS material.
    pub fn with_tls(addr: impl Into<String>, material: &TlsMaterial) -> Result<Self, FeedError> {
        let config = tls::client_config(material)?;
        Ok(Self {
            addr: addr.into(),
            snapshot_path: "/v1/runners".to_string(),
            tls: Some(Arc::new(config)),
        })
    }

    pub fn with_snapshot_path(mut self, path: impl Into<String>) -> Self {
        self.snapshot_path = path.into();
        self
    }

    async fn fetch_snapshot(&self) -> Result<FeedSnapshot, FeedError> {
        let stream = TcpStream::connect(&self.addr).await?;

        match &self.tls {
            Some(config) => {
                let host = self.addr.split(':').next().unwrap_or(&self.addr);
                let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
                    .map_err(|e| FeedError::Tls(e.to_string()))?;
                let connector = TlsConnector::from(Arc::clone(config));
                let tls_stream = connector.connect(server_name, stream).await?;
                self.request_over(tls_stream).await
            }
            None => self.request_over(stream).await,
        }
    }

    async fn request_over<S>(&self, stream: S) -> Result<FeedSnapshot, FeedError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(&self.snapshot_path)
            .header("host", &self.addr)
            .header("accept", "application/json")
            .body(Empty::<Bytes>::new())?;

        let resp = sender.send_request(req).await?;
        if !resp.status().is_success() {
            return Err(FeedError::Status(resp.status().as_u16()));
        }

        let body = resp.into_body().collect().await?.to_bytes();
        let snapshot: FeedSnapshot = serde_json::from_slice(&body)?;
        debug!(groups = snapshot.groups.len(), "fetched pool snapshot");
        Ok(snapshot)
    }
}

impl PoolFeed for HttpFeed {
    fn fetch<'a>(&'a self) -> BoxFuture<'a, Result<FeedSnapshot, FeedError>> {
        Box::pin(self.fetch_snapshot())
    }
}
