//! Configuration types for vless-outbound
//!
//! Configuration is loaded from JSON. Proxy entries use the kebab-case keys
//! common to Clash-style proxy lists (`ws-path`, `skip-cert-verify`, ...).

use std::collections::HashSet;
use std::fmt;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::ConfigError;
use crate::vless::XTLS_ORIGIN_FLOW;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,

    /// VLESS proxy definitions
    pub proxies: Vec<VlessOption>,
}

impl Config {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proxies.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one proxy must be configured".into(),
            ));
        }

        let mut names: HashSet<&str> = HashSet::new();
        for proxy in &self.proxies {
            proxy.validate()?;
            if !names.insert(&proxy.name) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate proxy name: {}",
                    proxy.name
                )));
            }
        }

        Ok(())
    }

    /// Look up a proxy by name
    #[must_use]
    pub fn proxy(&self, name: &str) -> Option<&VlessOption> {
        self.proxies.iter().find(|p| p.name == name)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Include target (module path)
    #[serde(default = "default_true")]
    pub target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: true,
        }
    }
}

/// Transport mode selected by the `network` option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkMode {
    /// Raw TCP, optionally wrapped in TLS
    Direct,
    /// WebSocket framing, optionally over TLS
    WebSocket,
}

/// A single VLESS proxy definition
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct VlessOption {
    /// Proxy name
    pub name: String,

    /// Proxy server host (IP or hostname)
    pub server: String,

    /// Proxy server port
    pub port: u16,

    /// User UUID (hyphenated string)
    pub uuid: String,

    /// Whether this proxy may carry UDP
    #[serde(default)]
    pub udp: bool,

    /// Enable TLS
    #[serde(default)]
    pub tls: bool,

    /// Network mode: "ws" for WebSocket, anything else is direct
    #[serde(default)]
    pub network: String,

    /// WebSocket request path
    #[serde(default)]
    pub ws_path: String,

    /// Extra WebSocket upgrade headers, in order; duplicates are sent as-is
    ///
    /// Accepts an object (`{"Host": "cdn"}`) or a list of pairs
    /// (`[["X-Tag", "a"], ["X-Tag", "b"]]`).
    #[serde(default, deserialize_with = "deserialize_headers")]
    pub ws_headers: Vec<(String, String)>,

    /// Skip certificate verification (INSECURE)
    #[serde(default)]
    pub skip_cert_verify: bool,

    /// SNI override; empty means use `server`
    #[serde(default, rename = "servername")]
    pub server_name: String,

    /// Flow control (e.g. "xtls-rprx-origin"), empty for none
    #[serde(default)]
    pub flow: String,
}

impl VlessOption {
    /// Create a minimal option: direct TCP, no TLS
    pub fn new(
        name: impl Into<String>,
        server: impl Into<String>,
        port: u16,
        uuid: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            server: server.into(),
            port,
            uuid: uuid.into(),
            udp: false,
            tls: false,
            network: String::new(),
            ws_path: String::new(),
            ws_headers: Vec::new(),
            skip_cert_verify: false,
            server_name: String::new(),
            flow: String::new(),
        }
    }

    /// Enable TLS
    #[must_use]
    pub fn with_tls(mut self) -> Self {
        self.tls = true;
        self
    }

    /// Switch to WebSocket mode with the given path
    #[must_use]
    pub fn with_websocket(mut self, path: impl Into<String>) -> Self {
        self.network = "ws".into();
        self.ws_path = path.into();
        self
    }

    /// Add a WebSocket upgrade header
    #[must_use]
    pub fn with_ws_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.ws_headers.push((name.into(), value.into()));
        self
    }

    /// Set the SNI override
    #[must_use]
    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = server_name.into();
        self
    }

    /// Set the flow
    #[must_use]
    pub fn with_flow(mut self, flow: impl Into<String>) -> Self {
        self.flow = flow.into();
        self
    }

    /// Skip certificate verification (INSECURE)
    #[must_use]
    pub fn insecure_skip_verify(mut self) -> Self {
        self.skip_cert_verify = true;
        self
    }

    /// Allow UDP through this proxy
    #[must_use]
    pub fn with_udp(mut self) -> Self {
        self.udp = true;
        self
    }

    /// Resolved network mode
    #[must_use]
    pub fn network_mode(&self) -> NetworkMode {
        if self.network == "ws" {
            NetworkMode::WebSocket
        } else {
            NetworkMode::Direct
        }
    }

    /// Whether the flow selects the enhanced-TLS (XTLS origin) variant
    #[must_use]
    pub fn is_xtls_origin(&self) -> bool {
        self.flow == XTLS_ORIGIN_FLOW
    }

    /// Validate the option
    ///
    /// Only fields needed by every mode are checked; WebSocket and TLS
    /// fields are ignored when their mode is inactive.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "Proxy name cannot be empty".into(),
            ));
        }

        if self.server.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Proxy '{}': server cannot be empty",
                self.name
            )));
        }

        if self.port == 0 {
            return Err(ConfigError::ValidationError(format!(
                "Proxy '{}': port must be greater than 0",
                self.name
            )));
        }

        Uuid::parse_str(&self.uuid).map_err(|e| {
            ConfigError::ValidationError(format!(
                "Proxy '{}': invalid uuid '{}': {e}",
                self.name, self.uuid
            ))
        })?;

        Ok(())
    }
}

/// Read `ws-headers` from an object in key order or from a list of pairs
fn deserialize_headers<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct HeadersVisitor;

    impl<'de> Visitor<'de> for HeadersVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of header names to values or a list of [name, value] pairs")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut headers = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, String>()? {
                headers.push(entry);
            }
            Ok(headers)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut headers = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(pair) = seq.next_element::<(String, String)>()? {
                headers.push(pair);
            }
            Ok(headers)
        }
    }

    deserializer.deserialize_any(HeadersVisitor)
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}
