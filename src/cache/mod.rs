//! Pergamena Layout Cache
//!
//! Two keyspaces inside one process-wide store:
//!
//! - **Sources**: layout name → raw source text
//! - **Compiled**: content fingerprint → compiled, invocable layout
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `pergamena.toml`:
//!
//! ```toml
//! [cache]
//! source_limit = 100
//! compiled_limit = 100
//! source_ttl_seconds = 0    # 0 = entries live for the process lifetime
//! compiled_ttl_seconds = 0
//! ```

mod config;
mod lock;
mod store;

pub use config::CacheConfig;
pub use store::{LayoutStore, fingerprint};

pub(crate) use store::{
    METRIC_COMPILED_HIT, METRIC_COMPILED_MISS, METRIC_SOURCE_HIT, METRIC_SOURCE_MISS,
};
