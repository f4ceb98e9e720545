//! Configuration module for vless-outbound
//!
//! This module provides configuration types and loading utilities.
//!
//! # Example
//!
//! ```no_run
//! use vless_outbound::config::load_config;
//!
//! let config = load_config("/etc/vless-outbound/config.json").unwrap();
//! println!("First proxy: {}", config.proxies[0].name);
//! ```

mod loader;
mod types;

pub use loader::{load_config, load_config_str, load_config_with_env, ENV_LOG_LEVEL};
pub use types::{Config, LogConfig, NetworkMode, VlessOption};
