//! Transport layering engine
//!
//! Decides which single layer wraps the raw proxy connection and then runs
//! it. Planning is pure: the same options always produce an equal
//! [`LayerPlan`], including the same session cache instance.
//!
//! | network | tls | flow               | plan          | cache    |
//! |---------|-----|--------------------|---------------|----------|
//! | `ws`    | any | any                | `WebSocket`   | standard |
//! | other   | yes | `xtls-rprx-origin` | `EnhancedTls` | enhanced |
//! | other   | yes | other              | `Tls`         | standard |
//! | other   | no  | any                | `Passthrough` |          |
//!
//! There is no fallback between branches; a failing layer fails the whole
//! connection.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::{
    BoxedStream, RustlsHandshaker, SessionCacheProvider, TlsHandshaker, TlsParams, TransportError,
    WebSocketConnector, WebSocketLayer, WebSocketParams,
};
use crate::config::{NetworkMode, VlessOption};

/// The layer chosen for one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerPlan {
    /// WebSocket upgrade, with TLS inside it when enabled
    WebSocket(WebSocketParams),
    /// Standard TLS
    Tls(TlsParams),
    /// Enhanced TLS for the `xtls-rprx-origin` flow
    EnhancedTls(TlsParams),
    /// No layer: the raw connection is used as-is
    Passthrough,
}

impl LayerPlan {
    /// Short name for logging
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::WebSocket(_) => "websocket",
            Self::Tls(_) => "tls",
            Self::EnhancedTls(_) => "xtls",
            Self::Passthrough => "none",
        }
    }

    /// TLS parameters of the plan, wherever the handshake happens
    #[must_use]
    pub fn tls_params(&self) -> Option<&TlsParams> {
        match self {
            Self::WebSocket(ws) => ws.tls.as_ref(),
            Self::Tls(tls) | Self::EnhancedTls(tls) => Some(tls),
            Self::Passthrough => None,
        }
    }
}

impl fmt::Display for LayerPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Applies the configured transport layer to a raw connection
#[derive(Clone)]
pub struct LayerEngine {
    caches: SessionCacheProvider,
    tls: Arc<dyn TlsHandshaker>,
    enhanced_tls: Arc<dyn TlsHandshaker>,
    websocket: Arc<dyn WebSocketConnector>,
}

impl LayerEngine {
    /// Create an engine with the default rustls and tungstenite layers
    #[must_use]
    pub fn new(caches: &SessionCacheProvider) -> Self {
        Self::with_collaborators(
            caches,
            Arc::new(RustlsHandshaker::standard()),
            Arc::new(RustlsHandshaker::enhanced()),
            Arc::new(WebSocketLayer::new()),
        )
    }

    /// Create an engine with caller-supplied layers
    #[must_use]
    pub fn with_collaborators(
        caches: &SessionCacheProvider,
        tls: Arc<dyn TlsHandshaker>,
        enhanced_tls: Arc<dyn TlsHandshaker>,
        websocket: Arc<dyn WebSocketConnector>,
    ) -> Self {
        Self {
            caches: caches.clone(),
            tls,
            enhanced_tls,
            websocket,
        }
    }

    /// Session caches this engine hands to its TLS layers
    #[must_use]
    pub fn caches(&self) -> &SessionCacheProvider {
        &self.caches
    }

    /// Decide which layer `option` calls for
    #[must_use]
    pub fn plan(&self, server_host: &str, server_port: u16, option: &VlessOption) -> LayerPlan {
        let server_name = if option.server_name.is_empty() {
            server_host
        } else {
            option.server_name.as_str()
        };

        match option.network_mode() {
            NetworkMode::WebSocket => {
                let tls = option.tls.then(|| {
                    TlsParams::new(server_name, option.skip_cert_verify, self.caches.standard())
                });
                LayerPlan::WebSocket(WebSocketParams {
                    host: server_host.to_string(),
                    port: server_port,
                    path: option.ws_path.clone(),
                    headers: option.ws_headers.clone(),
                    tls,
                })
            }
            NetworkMode::Direct if option.tls && option.is_xtls_origin() => LayerPlan::EnhancedTls(
                TlsParams::new(server_name, option.skip_cert_verify, self.caches.enhanced()),
            ),
            NetworkMode::Direct if option.tls => LayerPlan::Tls(TlsParams::new(
                server_name,
                option.skip_cert_verify,
                self.caches.standard(),
            )),
            NetworkMode::Direct => LayerPlan::Passthrough,
        }
    }

    /// Run a plan against `stream`
    ///
    /// # Errors
    ///
    /// Returns the layer's `TransportError` unchanged.
    pub async fn execute(
        &self,
        stream: BoxedStream,
        plan: &LayerPlan,
    ) -> Result<BoxedStream, TransportError> {
        match plan {
            LayerPlan::WebSocket(params) => self.websocket.connect(stream, params).await,
            LayerPlan::Tls(params) => self.tls.handshake(stream, params).await,
            LayerPlan::EnhancedTls(params) => self.enhanced_tls.handshake(stream, params).await,
            LayerPlan::Passthrough => Ok(stream),
        }
    }

    /// Plan and apply the transport layer for `option`
    ///
    /// # Errors
    ///
    /// Returns the layer's `TransportError` unchanged.
    pub async fn apply_layers(
        &self,
        stream: BoxedStream,
        server_host: &str,
        server_port: u16,
        option: &VlessOption,
    ) -> Result<BoxedStream, TransportError> {
        let plan = self.plan(server_host, server_port, option);

        debug!(
            proxy = %option.name,
            layer = %plan,
            server_name = plan.tls_params().map(|p| p.server_name.as_str()),
            "Applying transport layer"
        );

        self.execute(stream, &plan).await
    }
}

impl fmt::Debug for LayerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerEngine").finish_non_exhaustive()
    }
}
