//! mTLS material for the node-pool feed connection.
//!
//! The feed is a control-plane service; connections to it present a
//! client certificate and verify the feed against a private CA. All
//! material is operator-supplied PEM.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};
use tracing::debug;

use crate::error::FeedError;

/// Paths to PEM-encoded mTLS material.
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    /// Client certificate chain presented to the feed.
    pub cert: PathBuf,
    /// Private key for the client certificate.
    pub key: PathBuf,
    /// CA bundle the feed's certificate must chain to.
    pub ca: PathBuf,
}

/// Build a rustls client config with client-certificate auth.
pub fn client_config(material: &TlsMaterial) -> Result<ClientConfig, FeedError> {
    let ca_certs = load_certs(&material.ca)?;
    let mut roots = RootCertStore::empty();
    for cert in ca_certs {
        roots
            .add(cert)
            .map_err(|e| FeedError::Tls(format!("invalid CA certificate: {e}")))?;
    }
    if roots.is_empty() {
        return Err(FeedError::Tls(format!(
            "no CA certificates in {}",
            material.ca.display()
        )));
    }

    let certs = load_certs(&material.cert)?;
    let key = load_key(&material.key)?;

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)
        .map_err(|e| FeedError::Tls(e.to_string()))?;

    debug!(
        cert = %material.cert.display(),
        ca = %material.ca.display(),
        "built mTLS client config for pool feed"
    );
    Ok(config)
}

fn load_certs(path: &PathBuf) -> Result<Vec<CertificateDer<'static>>, FeedError> {
    let file = File::open(path)
        .map_err(|e| FeedError::Tls(format!("open {}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| FeedError::Tls(format!("parse {}: {e}", path.display())))
}

fn load_key(path: &PathBuf) -> Result<PrivateKeyDer<'static>, FeedError> {
    let file = File::open(path)
        .map_err(|e| FeedError::Tls(format!("open {}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| FeedError::Tls(format!("parse {}: {e}", path.display())))?
        .ok_or_else(|| FeedError::Tls(format!("no private key in {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing(path: &str) -> TlsMaterial {
        TlsMaterial {
            cert: PathBuf::from(path),
            key: PathBuf::from(path),
            ca: PathBuf::from(path),
        }
    }

    #[test]
    fn missing_files_are_typed_errors() {
        let err = client_config(&missing("/nonexistent/feed.pem")).unwrap_err();
        assert!(matches!(err, FeedError::Tls(_)));
        assert!(err.to_string().contains("/nonexistent/feed.pem"));
    }
}
