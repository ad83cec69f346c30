//! Layout cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_SOURCE_LIMIT: usize = 100;
const DEFAULT_COMPILED_LIMIT: usize = 100;

/// Configuration for the two layout cache keyspaces.
///
/// A TTL of zero means entries live for the lifetime of the process (the
/// default); capacity limits always apply via LRU eviction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum layout sources cached by name.
    pub source_limit: usize,
    /// Maximum compiled layouts cached by content fingerprint.
    pub compiled_limit: usize,
    /// Seconds before a cached source expires; 0 disables expiry.
    pub source_ttl_seconds: u64,
    /// Seconds before a compiled layout expires; 0 disables expiry.
    pub compiled_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            source_limit: DEFAULT_SOURCE_LIMIT,
            compiled_limit: DEFAULT_COMPILED_LIMIT,
            source_ttl_seconds: 0,
            compiled_ttl_seconds: 0,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            source_limit: settings.source_limit,
            compiled_limit: settings.compiled_limit,
            source_ttl_seconds: settings.source_ttl_seconds,
            compiled_ttl_seconds: settings.compiled_ttl_seconds,
        }
    }
}

impl CacheConfig {
    /// Returns the source limit as NonZeroUsize, clamping to 1 if zero.
    pub fn source_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.source_limit).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the compiled limit as NonZeroUsize, clamping to 1 if zero.
    pub fn compiled_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.compiled_limit).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn source_ttl(&self) -> Option<Duration> {
        (self.source_ttl_seconds > 0).then(|| Duration::from_secs(self.source_ttl_seconds))
    }

    pub fn compiled_ttl(&self) -> Option<Duration> {
        (self.compiled_ttl_seconds > 0).then(|| Duration::from_secs(self.compiled_ttl_seconds))
    }
}
