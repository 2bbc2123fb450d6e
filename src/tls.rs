//! TLS credentials for the QUIC endpoints.
//!
//! The credentials are opaque bundles: the transport layer turns them into
//! rustls configs and nothing else inspects certificate contents. Both sides
//! speak TLS 1.3 only, using the ring crypto provider and the
//! [`ALPN_PROTOCOL`] identifier.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use quinn::crypto::rustls::{QuicClientConfig, QuicServerConfig};
use rustls::RootCertStore;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::{Result, TelemetryError};

/// ALPN protocol identifier negotiated by client and collector.
pub const ALPN_PROTOCOL: &[u8] = b"suction-quic";

fn provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Certificate chain and private key presented by the collector.
pub struct ServerCredentials {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl ServerCredentials {
    /// Build from DER-encoded parts.
    pub fn from_der(chain: Vec<CertificateDer<'static>>, key: PrivateKeyDer<'static>) -> Self {
        Self { chain, key }
    }

    /// Load a PEM certificate chain and PEM private key.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self> {
        let chain = read_certificates(cert_path)?;

        let mut reader = open_pem(key_path)?;
        let key = rustls_pemfile::private_key(&mut reader)
            .map_err(|e| {
                TelemetryError::tls_with_source(
                    format!("cannot parse private key {}", key_path.display()),
                    e,
                )
            })?
            .ok_or_else(|| {
                TelemetryError::tls(format!("no private key found in {}", key_path.display()))
            })?;

        Ok(Self { chain, key })
    }

    pub(crate) fn quic_config(&self) -> Result<QuicServerConfig> {
        let mut tls = rustls::ServerConfig::builder_with_provider(provider())
            .with_protocol_versions(&[&rustls::version::TLS13])
            .map_err(|e| TelemetryError::tls_with_source("unsupported TLS versions", e))?
            .with_no_client_auth()
            .with_single_cert(self.chain.clone(), self.key.clone_key())
            .map_err(|e| TelemetryError::tls_with_source("invalid server certificate or key", e))?;
        tls.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

        QuicServerConfig::try_from(tls)
            .map_err(|e| TelemetryError::tls_with_source("TLS config unusable for QUIC", e))
    }
}

impl fmt::Debug for ServerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCredentials")
            .field("chain_len", &self.chain.len())
            .finish_non_exhaustive()
    }
}

/// Trust anchors the client uses to verify the collector.
#[derive(Clone)]
pub struct ClientCredentials {
    roots: Arc<RootCertStore>,
}

impl ClientCredentials {
    /// Trust the given DER certificates.
    pub fn from_der(certs: impl IntoIterator<Item = CertificateDer<'static>>) -> Result<Self> {
        let mut roots = RootCertStore::empty();
        for cert in certs {
            roots
                .add(cert)
                .map_err(|e| TelemetryError::tls_with_source("invalid trust anchor", e))?;
        }
        if roots.is_empty() {
            return Err(TelemetryError::tls("no trust anchors provided"));
        }
        Ok(Self { roots: Arc::new(roots) })
    }

    /// Trust every certificate in a PEM file.
    pub fn from_pem_file(ca_path: &Path) -> Result<Self> {
        Self::from_der(read_certificates(ca_path)?)
    }

    pub(crate) fn quic_config(&self) -> Result<QuicClientConfig> {
        let mut tls = rustls::ClientConfig::builder_with_provider(provider())
            .with_protocol_versions(&[&rustls::version::TLS13])
            .map_err(|e| TelemetryError::tls_with_source("unsupported TLS versions", e))?
            .with_root_certificates(Arc::clone(&self.roots))
            .with_no_client_auth();
        tls.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

        QuicClientConfig::try_from(tls)
            .map_err(|e| TelemetryError::tls_with_source("TLS config unusable for QUIC", e))
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials").field("roots", &self.roots.len()).finish()
    }
}

fn open_pem(path: &Path) -> Result<BufReader<File>> {
    File::open(path).map(BufReader::new).map_err(|e| {
        TelemetryError::tls_with_source(format!("cannot open {}", path.display()), e)
    })
}

fn read_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = open_pem(path)?;
    let chain = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            TelemetryError::tls_with_source(format!("cannot parse {}", path.display()), e)
        })?;

    if chain.is_empty() {
        return Err(TelemetryError::tls(format!("no certificates found in {}", path.display())));
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorClass;

    #[test]
    fn missing_files_are_configuration_errors() {
        let err = ServerCredentials::from_pem_files(
            Path::new("/nonexistent/server.crt"),
            Path::new("/nonexistent/server.key"),
        )
        .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Configuration);

        let err = ClientCredentials::from_pem_file(Path::new("/nonexistent/ca.crt")).unwrap_err();
        assert!(matches!(err, TelemetryError::Tls { .. }));
    }

    #[test]
    fn empty_trust_store_is_rejected() {
        let err = ClientCredentials::from_der(Vec::new()).unwrap_err();
        assert!(err.to_string().contains("no trust anchors"));
    }

    #[test]
    fn generated_certificate_builds_both_configs() {
        let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert = generated.cert.der().clone();
        let key = PrivateKeyDer::Pkcs8(generated.key_pair.serialize_der().into());

        let server = ServerCredentials::from_der(vec![cert.clone()], key);
        server.quic_config().unwrap();

        let client = ClientCredentials::from_der([cert]).unwrap();
        client.quic_config().unwrap();
        assert!(format!("{client:?}").contains("roots"));
    }
}
