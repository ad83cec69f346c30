//! Layout cache storage.
//!
//! Two independent keyspaces inside one store:
//! - layout name → raw source text
//! - content fingerprint of the source text → compiled layout
//!
//! The split deliberately decouples "which named layout" from "which exact
//! bytes": two differently-named layouts with identical source compile once,
//! and a layout file whose content changes under the same name yields a new
//! compiled form without manual invalidation.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use lru::LruCache;
use metrics::counter;
use sha2::{Digest, Sha256};

use crate::application::render::CompiledLayout;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_SOURCE_HIT: &str = "pergamena_layout_source_hit_total";
pub(crate) const METRIC_SOURCE_MISS: &str = "pergamena_layout_source_miss_total";
pub(crate) const METRIC_COMPILED_HIT: &str = "pergamena_layout_compiled_hit_total";
pub(crate) const METRIC_COMPILED_MISS: &str = "pergamena_layout_compiled_miss_total";

/// Stable content fingerprint of a layout source: hex-encoded SHA-256 over
/// the raw bytes. Identical bytes always fingerprint identically; any
/// differing byte yields a distinct key.
pub fn fingerprint(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}

struct Timestamped<T> {
    value: T,
    stored_at: Instant,
}

impl<T: Clone> Timestamped<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
        }
    }

    fn live_value(&self, ttl: Option<Duration>) -> Option<T> {
        match ttl {
            Some(ttl) if self.stored_at.elapsed() > ttl => None,
            _ => Some(self.value.clone()),
        }
    }
}

/// In-memory store for layout sources and their compiled forms.
///
/// Safe for concurrent reads and racing first-writes: two concurrent misses
/// on the same key may both produce a value, but both values are equivalent
/// and the store converges to a single entry.
pub struct LayoutStore {
    sources: RwLock<LruCache<String, Timestamped<String>>>,
    compiled: RwLock<LruCache<String, Timestamped<CompiledLayout>>>,
    source_ttl: Option<Duration>,
    compiled_ttl: Option<Duration>,
}

impl LayoutStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            sources: RwLock::new(LruCache::new(config.source_limit_non_zero())),
            compiled: RwLock::new(LruCache::new(config.compiled_limit_non_zero())),
            source_ttl: config.source_ttl(),
            compiled_ttl: config.compiled_ttl(),
        }
    }

    pub fn get_source(&self, name: &str) -> Option<String> {
        let mut sources = rw_write(&self.sources, SOURCE, "get_source");
        let live = sources
            .get(name)
            .map(|entry| entry.live_value(self.source_ttl));
        match live {
            Some(Some(text)) => {
                counter!(METRIC_SOURCE_HIT).increment(1);
                Some(text)
            }
            Some(None) => {
                // Expired; drop the stale entry so it reloads.
                sources.pop(name);
                counter!(METRIC_SOURCE_MISS).increment(1);
                None
            }
            None => {
                counter!(METRIC_SOURCE_MISS).increment(1);
                None
            }
        }
    }

    pub fn set_source(&self, name: &str, text: String) {
        rw_write(&self.sources, SOURCE, "set_source")
            .put(name.to_string(), Timestamped::new(text));
    }

    pub fn invalidate_source(&self, name: &str) {
        rw_write(&self.sources, SOURCE, "invalidate_source").pop(name);
    }

    pub fn get_compiled(&self, fingerprint: &str) -> Option<CompiledLayout> {
        let mut compiled = rw_write(&self.compiled, SOURCE, "get_compiled");
        let live = compiled
            .get(fingerprint)
            .map(|entry| entry.live_value(self.compiled_ttl));
        match live {
            Some(Some(layout)) => {
                counter!(METRIC_COMPILED_HIT).increment(1);
                Some(layout)
            }
            Some(None) => {
                compiled.pop(fingerprint);
                counter!(METRIC_COMPILED_MISS).increment(1);
                None
            }
            None => {
                counter!(METRIC_COMPILED_MISS).increment(1);
                None
            }
        }
    }

    pub fn set_compiled(&self, fingerprint: &str, layout: CompiledLayout) {
        rw_write(&self.compiled, SOURCE, "set_compiled")
            .put(fingerprint.to_string(), Timestamped::new(layout));
    }

    /// Clear both keyspaces.
    pub fn clear(&self) {
        rw_write(&self.sources, SOURCE, "clear.sources").clear();
        rw_write(&self.compiled, SOURCE, "clear.compiled").clear();
    }

    /// Number of cached sources.
    pub fn source_len(&self) -> usize {
        rw_read(&self.sources, SOURCE, "source_len").len()
    }

    /// Number of cached compiled layouts.
    pub fn compiled_len(&self) -> usize {
        rw_read(&self.compiled, SOURCE, "compiled_len").len()
    }
}
