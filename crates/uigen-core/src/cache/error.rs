use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Config hash mismatch (cache invalidated)")]
    ConfigMismatch,
}

pub type Result<T> = std::result::Result<T, CacheError>;
