//! TLS session resumption caches
//!
//! The standard TLS layer and the enhanced (XTLS origin) layer keep separate
//! resumption namespaces. One provider is created per process, or per test,
//! and handed to every outbound built from it.

use std::fmt;
use std::sync::Arc;

use rustls::client::{ClientSessionMemoryCache, ClientSessionStore};

/// Entries kept by each cache
pub const SESSION_CACHE_CAPACITY: usize = 256;

/// Owner of the two session caches
///
/// Cloning is cheap and yields a provider that shares the same caches.
#[derive(Clone)]
pub struct SessionCacheProvider {
    standard: Arc<dyn ClientSessionStore>,
    enhanced: Arc<dyn ClientSessionStore>,
}

impl SessionCacheProvider {
    /// Create a provider with two empty caches
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(SESSION_CACHE_CAPACITY)
    }

    /// Create a provider whose caches hold up to `capacity` entries each
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            standard: Arc::new(ClientSessionMemoryCache::new(capacity)),
            enhanced: Arc::new(ClientSessionMemoryCache::new(capacity)),
        }
    }

    /// Cache used by the standard TLS layer and by WebSocket-over-TLS
    #[must_use]
    pub fn standard(&self) -> Arc<dyn ClientSessionStore> {
        Arc::clone(&self.standard)
    }

    /// Cache used by the enhanced TLS layer
    #[must_use]
    pub fn enhanced(&self) -> Arc<dyn ClientSessionStore> {
        Arc::clone(&self.enhanced)
    }
}

impl Default for SessionCacheProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionCacheProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCacheProvider").finish_non_exhaustive()
    }
}
