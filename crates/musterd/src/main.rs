//! musterd — the Muster front proxy daemon.
//!
//! Routes incoming function calls to runner nodes by consistent
//! hashing on the request path. The backend set comes from static
//! seed nodes, optionally kept fresh from a node-pool feed.
//!
//! # Usage
//!
//! ```text
//! musterd --listen 0.0.0.0:8081 --nodes 10.0.0.1:8080,10.0.0.2:8080
//! musterd --feed pool.internal:9090 --tls-cert lb.pem --tls-key lb.key --tls-ca ca.pem
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use muster_pool::{HttpFeed, NodePool, PoolFeed, PoolRefresher, TlsMaterial};
use muster_proxy::ReverseRouter;

#[derive(Parser)]
#[command(name = "musterd", about = "Muster front proxy daemon")]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8081")]
    listen: SocketAddr,

    /// Comma-separated seed runner nodes.
    #[arg(long, default_value = "127.0.0.1:8080")]
    nodes: String,

    /// Node-pool feed address; when unset the seed nodes are final.
    #[arg(long)]
    feed: Option<String>,

    /// Feed refresh interval in seconds.
    #[arg(long, default_value = "5")]
    refresh_interval: u64,

    /// Client certificate (PEM) for the feed connection.
    #[arg(long)]
    tls_cert: Option<PathBuf>,

    /// Client private key (PEM) for the feed connection.
    #[arg(long)]
    tls_key: Option<PathBuf>,

    /// CA bundle (PEM) the feed certificate must chain to.
    #[arg(long)]
    tls_ca: Option<PathBuf>,
}

impl Cli {
    fn seed_nodes(&self) -> Vec<String> {
        self.nodes
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn tls_material(&self) -> anyhow::Result<Option<TlsMaterial>> {
        match (&self.tls_cert, &self.tls_key, &self.tls_ca) {
            (Some(cert), Some(key), Some(ca)) => Ok(Some(TlsMaterial {
                cert: cert.clone(),
                key: key.clone(),
                ca: ca.clone(),
            })),
            (None, None, None) => Ok(None),
            _ => anyhow::bail!("--tls-cert, --tls-key and --tls-ca must be given together"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,musterd=debug,muster=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let seeds = cli.seed_nodes();
    anyhow::ensure!(!seeds.is_empty(), "--nodes must name at least one runner");
    info!(listen = %cli.listen, nodes = seeds.len(), "musterd starting");

    let router = Arc::new(ReverseRouter::new(&seeds));
    let listener = TcpListener::bind(cli.listen).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Pool refresh, only when a feed is configured.
    let refresh = Duration::from_secs(cli.refresh_interval);
    let pool_parts = match &cli.feed {
        Some(addr) => {
            let feed: Arc<dyn PoolFeed> = match cli.tls_material()? {
                Some(material) => {
                    info!(feed = %addr, "connecting to pool feed over mTLS");
                    Arc::new(HttpFeed::with_tls(addr.clone(), &material)?)
                }
                None => {
                    info!(feed = %addr, "connecting to pool feed");
                    Arc::new(HttpFeed::new(addr.clone()))
                }
            };

            let pool = Arc::new(NodePool::new());
            let refresher = PoolRefresher::start(Arc::clone(&pool), feed, refresh);

            // Push discovered nodes into the router as they change.
            let sync_router = Arc::clone(&router);
            let sync_pool = Arc::clone(&pool);
            let mut sync_shutdown = shutdown_rx.clone();
            let sync = tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(refresh) => {
                            let nodes = sync_pool.node_addresses();
                            if !nodes.is_empty() {
                                sync_router.set_backends(&nodes);
                            }
                        }
                        _ = sync_shutdown.changed() => break,
                    }
                }
            });

            Some((pool, refresher, sync))
        }
        None => None,
    };

    let server = tokio::spawn(Arc::clone(&router).serve(listener, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    let _ = shutdown_tx.send(true);
    if let Some((pool, refresher, sync)) = pool_parts {
        refresher.shutdown().await;
        let _ = sync.await;
        pool.shutdown();
    }
    server.await??;

    info!("musterd stopped");
    Ok(())
}
