use thiserror::Error;

use crate::diagnostics::{Diagnostic, DiagnosticKind};

/// Errors from the virtual file store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("File already exists: {path}")]
    AlreadyExists { path: String },

    #[error("Edit failed on {path}: {reason}")]
    EditFailed { path: String, reason: String },

    #[error("Invalid store state: {0}")]
    InvalidState(String),
}

impl StoreError {
    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        StoreError::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Diagnostic for hosts that keep going after a store operation fails,
    /// such as a watcher mirroring disk changes. `None` for errors that are
    /// not about a single path.
    pub fn to_diagnostic(&self) -> Option<Diagnostic> {
        let (kind, path) = match self {
            StoreError::NotFound { path } => (DiagnosticKind::NotFound, path),
            StoreError::InvalidPath { path, .. } | StoreError::AlreadyExists { path } => {
                (DiagnosticKind::InvalidPath, path)
            }
            StoreError::EditFailed { .. } | StoreError::InvalidState(_) => return None,
        };
        Some(Diagnostic::error(kind, path.as_str(), self.to_string()))
    }

    pub(crate) fn edit_failed(path: &str, reason: impl Into<String>) -> Self {
        StoreError::EditFailed {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors from resolving a single import specifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Cannot find module '{specifier}' from {from}")]
    ModuleNotFound {
        specifier: String,
        from: String,
        /// Every path probed, in probe order
        tried: Vec<String>,
    },

    #[error("Invalid import '{specifier}' from {from}: {reason}")]
    InvalidPath {
        specifier: String,
        from: String,
        reason: String,
    },
}

/// Errors that abort a build before it produces a result
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Build cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Top-level error for callers that drive the whole pipeline
#[derive(Debug, Error)]
pub enum UigenError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] crate::cache::CacheError),
}
