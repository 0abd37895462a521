//! Incremental module cache
//!
//! Scanned module records are kept per path and reused while the file's
//! version, or failing that its content hash, is unchanged. The cache can be
//! written out as JSON so a host can carry it across sessions.

mod error;
mod hash;
mod invalidation;
mod module;

pub use error::{CacheError, Result};
pub use hash::{hash_config, hash_content};
pub use invalidation::InvalidationEngine;
pub use module::{CacheStats, CachedModule, ModuleCache, StaleFile};

/// Cache format version - increment when the persisted layout changes
pub const CACHE_VERSION: u32 = 1;
