use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use super::{hash_content, CacheError, Result, CACHE_VERSION};
use crate::fs::{File, StoreSnapshot};
use crate::scanner::{self, ModuleRecord};

/// Cached scan result for one path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedModule {
    /// File version the record was produced or last confirmed for
    pub version: u64,

    /// Blake3 hash of the content that was scanned
    pub content_hash: String,

    pub record: Arc<ModuleRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Same version as cached
    pub hits: usize,
    /// New version, identical content
    pub content_hits: usize,
    /// Rescanned
    pub misses: usize,
    /// Dropped because the file left the store
    pub evictions: usize,
}

/// A file whose cached record cannot be reused on version alone
#[derive(Debug, Clone)]
pub struct StaleFile {
    pub file: Arc<File>,
    previous: Option<CachedModule>,
}

impl StaleFile {
    /// Hash the content, reusing the previous record when it is unchanged.
    /// The flag is true when the file had to be rescanned.
    pub fn refresh(&self) -> (CachedModule, bool) {
        let content_hash = hash_content(&self.file.content);
        if let Some(previous) = &self.previous {
            if previous.content_hash == content_hash {
                let record = ModuleRecord {
                    version: self.file.version,
                    ..(*previous.record).clone()
                };
                let module = CachedModule {
                    version: self.file.version,
                    content_hash,
                    record: Arc::new(record),
                };
                return (module, false);
            }
        }

        let record = scanner::scan(&self.file.path, self.file.version, &self.file.content);
        let module = CachedModule {
            version: self.file.version,
            content_hash,
            record: Arc::new(record),
        };
        (module, true)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedCache {
    version: u32,
    config_hash: String,
    modules: BTreeMap<String, CachedModule>,
}

/// Module records keyed by store path
#[derive(Debug, Default)]
pub struct ModuleCache {
    config_hash: String,
    modules: FxHashMap<String, CachedModule>,
    stats: CacheStats,
}

impl ModuleCache {
    pub fn new(config_hash: impl Into<String>) -> Self {
        Self {
            config_hash: config_hash.into(),
            ..Default::default()
        }
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    /// Drop every record if `config_hash` differs from the cached one.
    /// Returns true when the cache was cleared.
    pub fn ensure_config(&mut self, config_hash: &str) -> bool {
        if self.config_hash == config_hash {
            return false;
        }
        info!(
            dropped = self.modules.len(),
            "Build options changed, clearing module cache"
        );
        self.config_hash = config_hash.to_string();
        self.modules.clear();
        true
    }

    pub fn get(&self, path: &str) -> Option<&CachedModule> {
        self.modules.get(path)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn clear(&mut self) {
        self.modules.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Split `snapshot` into records reusable as-is and files that need a
    /// refresh. Paths no longer in the snapshot are evicted.
    pub fn plan(
        &mut self,
        snapshot: &StoreSnapshot,
    ) -> (FxHashMap<String, Arc<ModuleRecord>>, Vec<StaleFile>) {
        let before = self.modules.len();
        self.modules.retain(|path, _| snapshot.contains(path));
        self.stats.evictions += before - self.modules.len();

        let mut fresh = FxHashMap::default();
        let mut stale = Vec::new();
        for (path, file) in snapshot.files.iter() {
            match self.modules.get(path) {
                Some(cached) if cached.version == file.version => {
                    self.stats.hits += 1;
                    fresh.insert(path.clone(), Arc::clone(&cached.record));
                }
                previous => stale.push(StaleFile {
                    file: Arc::clone(file),
                    previous: previous.cloned(),
                }),
            }
        }

        debug!(fresh = fresh.len(), stale = stale.len(), "planned cache refresh");
        (fresh, stale)
    }

    /// Record the outcome of [`StaleFile::refresh`]
    pub fn store(&mut self, path: String, module: CachedModule, rescanned: bool) -> Arc<ModuleRecord> {
        if rescanned {
            self.stats.misses += 1;
        } else {
            self.stats.content_hits += 1;
        }
        let record = Arc::clone(&module.record);
        self.modules.insert(path, module);
        record
    }

    /// Serialize the cache for a later session
    pub fn to_json(&self) -> Result<String> {
        let persisted = PersistedCache {
            version: CACHE_VERSION,
            config_hash: self.config_hash.clone(),
            modules: self
                .modules
                .iter()
                .map(|(path, module)| (path.clone(), module.clone()))
                .collect(),
        };
        Ok(serde_json::to_string(&persisted)?)
    }

    /// Load a cache written by [`ModuleCache::to_json`], rejecting it when
    /// the format or the build options differ
    pub fn from_json(json: &str, config_hash: &str) -> Result<Self> {
        let persisted: PersistedCache = serde_json::from_str(json)?;
        if persisted.version != CACHE_VERSION {
            return Err(CacheError::VersionMismatch {
                expected: CACHE_VERSION,
                found: persisted.version,
            });
        }
        if persisted.config_hash != config_hash {
            return Err(CacheError::ConfigMismatch);
        }

        info!(modules = persisted.modules.len(), "Loaded module cache");
        // Versions restart with every store, so a loaded record is only
        // reusable once its content hash matches. Version 0 is never issued.
        let modules = persisted
            .modules
            .into_iter()
            .map(|(path, module)| (path, CachedModule { version: 0, ..module }))
            .collect();
        Ok(Self {
            config_hash: persisted.config_hash,
            modules,
            stats: CacheStats::default(),
        })
    }
}
