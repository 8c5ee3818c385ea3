//! Server configuration.
//!
//! [`ServerConfig`] is built once, before the server starts, and is
//! immutable afterwards. The only two cross-field invariants the original
//! enforces — `www_root` set or URL handlers enabled, and a cache floor of
//! 128 KiB — are checked in [`ServerConfigBuilder::build`] so every caller
//! gets them for free instead of re-checking ad hoc.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ServerError;

/// Minimum allowed `cache_limit`, in bytes.
pub const MIN_CACHE_LIMIT: usize = 128 << 10;

/// Default listen URI when none is given.
pub const DEFAULT_URI: &str = "tcp://0.0.0.0/80";

/// Default cache size limit, in bytes (10 MiB, matching the original's
/// hard-coded default before LRU eviction kicks in).
pub const DEFAULT_CACHE_LIMIT: usize = 10 << 20;

/// Serializable so a host process can persist or transmit the resolved
/// configuration (e.g. to log it as structured JSON, or hand it to a
/// management API) without re-deriving it from CLI text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub www_root: Option<PathBuf>,
    pub cache_limit: usize,
    pub enable_url_handlers: bool,
    pub uri: String,
    pub fifo_size: usize,
    pub prealloc_fifos: u32,
    pub private_segment_size: usize,
    pub use_ptr_thresh: usize,
    pub debug_level: u8,
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

/// Fallible builder for [`ServerConfig`]. Mirrors the field-by-field
/// accumulation the CLI grammar parser in [`crate::cli`] does, but is also
/// usable directly by embedders that don't go through the CLI at all.
pub struct ServerConfigBuilder {
    www_root: Option<PathBuf>,
    cache_limit: usize,
    enable_url_handlers: bool,
    uri: String,
    fifo_size: usize,
    prealloc_fifos: u32,
    private_segment_size: usize,
    use_ptr_thresh: usize,
    debug_level: u8,
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self {
            www_root: None,
            cache_limit: DEFAULT_CACHE_LIMIT,
            enable_url_handlers: false,
            uri: DEFAULT_URI.to_string(),
            fifo_size: 0,
            prealloc_fifos: 0,
            private_segment_size: 0,
            use_ptr_thresh: 8 << 10,
            debug_level: 0,
        }
    }
}

impl ServerConfigBuilder {
    pub fn www_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.www_root = Some(path.into());
        self
    }

    pub fn cache_limit(mut self, bytes: usize) -> Self {
        self.cache_limit = bytes;
        self
    }

    pub fn enable_url_handlers(mut self, enabled: bool) -> Self {
        self.enable_url_handlers = enabled;
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn fifo_size(mut self, bytes: usize) -> Self {
        self.fifo_size = bytes;
        self
    }

    pub fn prealloc_fifos(mut self, n: u32) -> Self {
        self.prealloc_fifos = n;
        self
    }

    pub fn private_segment_size(mut self, bytes: usize) -> Self {
        self.private_segment_size = bytes;
        self
    }

    pub fn use_ptr_thresh(mut self, bytes: usize) -> Self {
        self.use_ptr_thresh = bytes;
        self
    }

    pub fn debug_level(mut self, level: u8) -> Self {
        self.debug_level = level;
        self
    }

    pub fn build(self) -> Result<ServerConfig, ServerError> {
        if self.www_root.is_none() && !self.enable_url_handlers {
            return Err(ServerError::NoRoot);
        }
        if self.cache_limit < MIN_CACHE_LIMIT {
            return Err(ServerError::CacheTooSmall { min: MIN_CACHE_LIMIT, got: self.cache_limit });
        }
        Ok(ServerConfig {
            www_root: self.www_root,
            cache_limit: self.cache_limit,
            enable_url_handlers: self.enable_url_handlers,
            uri: self.uri,
            fifo_size: self.fifo_size,
            prealloc_fifos: self.prealloc_fifos,
            private_segment_size: self.private_segment_size,
            use_ptr_thresh: self.use_ptr_thresh,
            debug_level: self.debug_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_root_or_handlers() {
        let err = ServerConfig::builder().build().unwrap_err();
        assert!(matches!(err, ServerError::NoRoot));
    }

    #[test]
    fn url_handlers_alone_is_sufficient() {
        let cfg = ServerConfig::builder().enable_url_handlers(true).build().unwrap();
        assert!(cfg.www_root.is_none());
        assert!(cfg.enable_url_handlers);
    }

    #[test]
    fn rejects_undersized_cache() {
        let err = ServerConfig::builder()
            .www_root("/srv")
            .cache_limit(1024)
            .build()
            .unwrap_err();
        assert!(matches!(err, ServerError::CacheTooSmall { .. }));
    }

    #[test]
    fn accepts_minimum_cache_size() {
        let cfg = ServerConfig::builder()
            .www_root("/srv")
            .cache_limit(MIN_CACHE_LIMIT)
            .build()
            .unwrap();
        assert_eq!(cfg.cache_limit, MIN_CACHE_LIMIT);
    }
}
