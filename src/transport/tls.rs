//! TLS layer built on tokio-rustls
//!
//! Two variants share this implementation: the standard TLS layer and the
//! enhanced layer selected by the `xtls-rprx-origin` flow. They differ in the
//! resumption cache they are handed and in how they are reported, so a
//! session ticket issued on one never resumes on the other.
//!
//! # Features
//!
//! - TLS 1.2 and 1.3 (ring provider)
//! - Server Name Indication from `servername` or the server host
//! - Certificate verification via webpki-roots
//! - Optional certificate verification skip
//! - Client configs built once per verify mode and resumption cache

use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use parking_lot::Mutex;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::{ClientSessionStore, Resumption};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{
    ClientConfig, DigitallySignedStruct, Error as RustlsError, RootCertStore, SignatureScheme,
};
use tokio_rustls::TlsConnector;

use super::{BoxedStream, TlsHandshaker, TransportError};

/// Parameters for one TLS handshake
#[derive(Clone)]
pub struct TlsParams {
    /// Server name for SNI and certificate verification
    pub server_name: String,

    /// Skip certificate verification (INSECURE)
    pub skip_verify: bool,

    /// Resumption cache for this variant
    pub session_cache: Arc<dyn ClientSessionStore>,
}

impl TlsParams {
    /// Create TLS parameters
    pub fn new(
        server_name: impl Into<String>,
        skip_verify: bool,
        session_cache: Arc<dyn ClientSessionStore>,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            skip_verify,
            session_cache,
        }
    }

    /// Whether `self` resumes from `cache`
    #[must_use]
    pub fn uses_cache(&self, cache: &Arc<dyn ClientSessionStore>) -> bool {
        Arc::ptr_eq(&self.session_cache, cache)
    }
}

/// Equal when server name and verify flag match and both point at the same cache
impl PartialEq for TlsParams {
    fn eq(&self, other: &Self) -> bool {
        self.server_name == other.server_name
            && self.skip_verify == other.skip_verify
            && self.uses_cache(&other.session_cache)
    }
}

impl Eq for TlsParams {}

impl fmt::Debug for TlsParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsParams")
            .field("server_name", &self.server_name)
            .field("skip_verify", &self.skip_verify)
            .finish_non_exhaustive()
    }
}

/// Which TLS layer a handshaker implements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVariant {
    /// Ordinary TLS
    Standard,
    /// TLS for the `xtls-rprx-origin` flow
    Enhanced,
}

impl fmt::Display for TlsVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "tls"),
            Self::Enhanced => write!(f, "xtls"),
        }
    }
}

/// webpki roots, parsed on first use and shared by every handshaker
fn webpki_root_store() -> Arc<RootCertStore> {
    static ROOTS: OnceLock<Arc<RootCertStore>> = OnceLock::new();
    ROOTS
        .get_or_init(|| {
            Arc::new(RootCertStore::from_iter(
                webpki_roots::TLS_SERVER_ROOTS.iter().cloned(),
            ))
        })
        .clone()
}

/// A built client config and the key it was built for
struct CachedConfig {
    skip_verify: bool,
    session_cache: Arc<dyn ClientSessionStore>,
    config: Arc<ClientConfig>,
}

/// Default [`TlsHandshaker`] backed by tokio-rustls
#[derive(Clone)]
pub struct RustlsHandshaker {
    variant: TlsVariant,
    configs: Arc<Mutex<Vec<CachedConfig>>>,
}

impl RustlsHandshaker {
    /// Handshaker for the standard TLS layer
    #[must_use]
    pub fn standard() -> Self {
        Self::with_variant(TlsVariant::Standard)
    }

    /// Handshaker for the enhanced TLS layer
    #[must_use]
    pub fn enhanced() -> Self {
        Self::with_variant(TlsVariant::Enhanced)
    }

    fn with_variant(variant: TlsVariant) -> Self {
        Self {
            variant,
            configs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The variant this handshaker implements
    #[must_use]
    pub const fn variant(&self) -> TlsVariant {
        self.variant
    }

    /// Client config for `params`, built on first use
    ///
    /// Keyed by the verify flag and the identity of the resumption cache;
    /// the server name is supplied per connection.
    fn config_for(&self, params: &TlsParams) -> Result<Arc<ClientConfig>, TransportError> {
        let mut configs = self.configs.lock();
        if let Some(cached) = configs.iter().find(|c| {
            c.skip_verify == params.skip_verify && params.uses_cache(&c.session_cache)
        }) {
            return Ok(Arc::clone(&cached.config));
        }

        let config = Arc::new(Self::client_config(params)?);
        configs.push(CachedConfig {
            skip_verify: params.skip_verify,
            session_cache: Arc::clone(&params.session_cache),
            config: Arc::clone(&config),
        });
        Ok(config)
    }

    /// Build the rustls client configuration for `params`
    fn client_config(params: &TlsParams) -> Result<ClientConfig, TransportError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| TransportError::tls_config(e.to_string()))?;

        let mut config = if params.skip_verify {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(InsecureServerCertVerifier))
                .with_no_client_auth()
        } else {
            builder
                .with_root_certificates(webpki_root_store())
                .with_no_client_auth()
        };

        config.resumption = Resumption::store(Arc::clone(&params.session_cache));

        Ok(config)
    }
}

impl fmt::Debug for RustlsHandshaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RustlsHandshaker")
            .field("variant", &self.variant)
            .field("cached_configs", &self.configs.lock().len())
            .finish()
    }
}

#[async_trait]
impl TlsHandshaker for RustlsHandshaker {
    async fn handshake(
        &self,
        stream: BoxedStream,
        params: &TlsParams,
    ) -> Result<BoxedStream, TransportError> {
        let server_name: ServerName<'static> = params
            .server_name
            .clone()
            .try_into()
            .map_err(|_| TransportError::invalid_server_name(&params.server_name))?;

        let connector = TlsConnector::from(self.config_for(params)?);

        let tls_stream = connector
            .connect(server_name, stream)
            .await
            .map_err(|e| TransportError::tls_handshake(&params.server_name, e))?;

        tracing::debug!(
            variant = %self.variant,
            server_name = %params.server_name,
            skip_verify = params.skip_verify,
            "TLS handshake complete"
        );

        Ok(Box::new(tls_stream))
    }
}

/// Certificate verifier that accepts any certificate
///
/// Only reachable through `skip-cert-verify`. The connection is open to
/// man-in-the-middle attacks.
#[derive(Debug)]
struct InsecureServerCertVerifier;

impl ServerCertVerifier for InsecureServerCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, RustlsError> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, RustlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, RustlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
