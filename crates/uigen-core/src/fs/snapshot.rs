use crate::errors::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A single file in the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub path: String,
    pub content: String,
    /// Store-wide monotonic version of the last write to this path
    pub version: u64,
}

pub(crate) type FileMap = BTreeMap<String, Arc<File>>;

/// Immutable point-in-time view of the store.
///
/// Cloning is cheap; a snapshot never observes writes made after it was taken.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub(crate) files: Arc<FileMap>,
    pub(crate) generation: u64,
}

impl StoreSnapshot {
    pub fn get(&self, path: &str) -> Option<&File> {
        self.files.get(path).map(|f| f.as_ref())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn read(&self, path: &str) -> Result<&str, StoreError> {
        self.get(path)
            .map(|f| f.content.as_str())
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })
    }

    pub fn version(&self, path: &str) -> Option<u64> {
        self.get(path).map(|f| f.version)
    }

    /// Paths in sorted order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(|k| k.as_str())
    }

    pub fn files(&self) -> impl Iterator<Item = &File> {
        self.files.values().map(|f| f.as_ref())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Store generation at the moment the snapshot was taken
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Serializable form of the whole store, keyed by path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectState {
    pub files: BTreeMap<String, String>,
}

impl ProjectState {
    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self).map_err(|e| StoreError::InvalidState(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        serde_json::from_str(json).map_err(|e| StoreError::InvalidState(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_state_json() {
        let mut state = ProjectState::default();
        state
            .files
            .insert("/App.jsx".to_string(), "export default 1".to_string());

        let json = state.to_json().unwrap();
        assert!(json.contains("\"/App.jsx\""));
        assert_eq!(ProjectState::from_json(&json).unwrap(), state);
    }

    #[test]
    fn test_project_state_rejects_garbage() {
        assert!(matches!(
            ProjectState::from_json("[1, 2"),
            Err(StoreError::InvalidState(_))
        ));
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = StoreSnapshot::default();
        assert!(snapshot.is_empty());
        assert!(snapshot.read("/App.jsx").is_err());
        assert_eq!(snapshot.generation(), 0);
    }
}
