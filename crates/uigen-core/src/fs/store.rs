use super::edit;
use super::path::{self, ROOT};
use super::snapshot::{File, FileMap, ProjectState, StoreSnapshot};
use super::FileSource;
use crate::errors::StoreError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
}

/// One child of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
}

#[derive(Debug, Default)]
struct StoreState {
    files: Arc<FileMap>,
    /// Last version handed out; versions are never reused
    last_version: u64,
    /// Bumped by every mutation, including deletes
    generation: u64,
}

impl StoreState {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }

    fn put(&mut self, path: String, content: String) -> u64 {
        let version = self.next_version();
        self.generation += 1;
        Arc::make_mut(&mut self.files).insert(
            path.clone(),
            Arc::new(File {
                path,
                content,
                version,
            }),
        );
        version
    }

    fn get(&self, path: &str) -> Result<&Arc<File>, StoreError> {
        self.files.get(path).ok_or_else(|| StoreError::NotFound {
            path: path.to_string(),
        })
    }
}

/// In-memory project filesystem shared between the generation process and
/// builds.
///
/// One writer at a time; every operation is atomic from a reader's point of
/// view, and builds work on [`StoreSnapshot`]s rather than the live store.
#[derive(Debug, Default)]
pub struct VirtualFileStore {
    state: RwLock<StoreState>,
}

impl VirtualFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `(path, content)` pairs
    pub fn with_files<I, P, C>(files: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        let store = Self::new();
        for (path, content) in files {
            store.write(path.as_ref(), content)?;
        }
        Ok(store)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create or overwrite a file, returning its new version
    pub fn write(&self, path: &str, content: impl Into<String>) -> Result<u64, StoreError> {
        let path = path::normalize(path)?;
        let version = self.write_state().put(path.clone(), content.into());
        debug!(path = %path, version, "wrote file");
        Ok(version)
    }

    pub fn read(&self, path: &str) -> Result<String, StoreError> {
        Ok(self.file(path)?.content.clone())
    }

    pub fn file(&self, path: &str) -> Result<Arc<File>, StoreError> {
        let path = path::normalize(path)?;
        self.read_state().get(&path).cloned()
    }

    /// False for missing files and for paths that do not normalize
    pub fn exists(&self, path: &str) -> bool {
        path::normalize(path)
            .map(|p| self.read_state().files.contains_key(&p))
            .unwrap_or(false)
    }

    pub fn version(&self, path: &str) -> Option<u64> {
        let path = path::normalize(path).ok()?;
        self.read_state().files.get(&path).map(|f| f.version)
    }

    /// All file paths, sorted
    pub fn list(&self) -> Vec<String> {
        self.read_state().files.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read_state().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_state().files.is_empty()
    }

    /// Counter bumped by every mutation
    pub fn generation(&self) -> u64 {
        self.read_state().generation
    }

    /// Immediate children of `dir`; directories are derived from file paths
    pub fn list_directory(&self, dir: &str) -> Result<Vec<DirEntry>, StoreError> {
        let dir = path::normalize_dir(dir)?;
        let state = self.read_state();
        if state.files.contains_key(&dir) {
            return Err(StoreError::invalid_path(&dir, "is a file, not a directory"));
        }

        let prefix_len = if dir == ROOT { 1 } else { dir.len() + 1 };
        let mut children: BTreeMap<&str, EntryKind> = BTreeMap::new();
        for file_path in state.files.keys().filter(|p| path::is_within(p, &dir)) {
            let rest = &file_path[prefix_len..];
            match rest.split_once('/') {
                Some((child_dir, _)) => {
                    children.insert(child_dir, EntryKind::Directory);
                }
                None => {
                    children.entry(rest).or_insert(EntryKind::File);
                }
            }
        }

        if children.is_empty() && dir != ROOT {
            return Err(StoreError::NotFound { path: dir });
        }

        let mut entries: Vec<DirEntry> = children
            .into_iter()
            .map(|(name, kind)| DirEntry {
                name: name.to_string(),
                path: if dir == ROOT {
                    format!("/{}", name)
                } else {
                    format!("{}/{}", dir, name)
                },
                kind,
            })
            .collect();
        entries.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
        Ok(entries)
    }

    /// Remove a file
    pub fn delete(&self, path: &str) -> Result<Arc<File>, StoreError> {
        let path = path::normalize(path)?;
        let mut state = self.write_state();
        if !state.files.contains_key(&path) {
            return Err(StoreError::NotFound { path });
        }
        state.generation += 1;
        let removed = Arc::make_mut(&mut state.files)
            .remove(&path)
            .ok_or_else(|| StoreError::NotFound { path: path.clone() })?;
        debug!(path = %path, "deleted file");
        Ok(removed)
    }

    /// Move a file, or every file under a directory, to a new location.
    ///
    /// Returns the `(old, new)` path pairs that moved. Nothing is moved when
    /// any target already exists.
    pub fn rename(&self, from: &str, to: &str) -> Result<Vec<(String, String)>, StoreError> {
        let from_dir = path::normalize_dir(from)?;
        if from_dir == ROOT {
            return Err(StoreError::invalid_path(from, "the root cannot be moved"));
        }

        let mut state = self.write_state();
        let moves: Vec<(String, String)> = if state.files.contains_key(&from_dir) {
            vec![(from_dir, path::normalize(to)?)]
        } else {
            let to_dir = path::normalize_dir(to)?;
            if to_dir == from_dir || path::is_within(&to_dir, &from_dir) {
                return Err(StoreError::invalid_path(
                    to,
                    "cannot move a directory into itself",
                ));
            }
            state
                .files
                .keys()
                .filter(|p| path::is_within(p, &from_dir))
                .map(|p| {
                    let rest = &p[from_dir.len()..];
                    let target = if to_dir == ROOT {
                        rest.to_string()
                    } else {
                        format!("{}{}", to_dir, rest)
                    };
                    (p.clone(), target)
                })
                .collect()
        };

        if moves.is_empty() {
            return Err(StoreError::NotFound {
                path: from.to_string(),
            });
        }
        if let Some((_, target)) = moves.iter().find(|(_, t)| state.files.contains_key(t)) {
            return Err(StoreError::AlreadyExists {
                path: target.clone(),
            });
        }

        for (old, new) in &moves {
            let files = Arc::make_mut(&mut state.files);
            if let Some(file) = files.remove(old) {
                let content = file.content.clone();
                state.put(new.clone(), content);
            }
        }
        debug!(from = %from, to = %to, moved = moves.len(), "renamed");
        Ok(moves)
    }

    /// Replace the single occurrence of `old` in a file with `new`
    pub fn replace_in_file(&self, path: &str, old: &str, new: &str) -> Result<u64, StoreError> {
        let path = path::normalize(path)?;
        let mut state = self.write_state();
        let current = state.get(&path)?;
        let updated = edit::replace_unique(&current.content, old, new)
            .map_err(|reason| StoreError::edit_failed(&path, reason))?;
        Ok(state.put(path, updated))
    }

    /// Insert `text` after line `line` of a file (0 inserts at the top)
    pub fn insert_at_line(&self, path: &str, line: usize, text: &str) -> Result<u64, StoreError> {
        let path = path::normalize(path)?;
        let mut state = self.write_state();
        let current = state.get(&path)?;
        let updated = edit::insert_after_line(&current.content, line, text)
            .map_err(|reason| StoreError::edit_failed(&path, reason))?;
        Ok(state.put(path, updated))
    }

    /// Point-in-time view for a build
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.read_state();
        StoreSnapshot {
            files: Arc::clone(&state.files),
            generation: state.generation,
        }
    }

    pub fn export_state(&self) -> ProjectState {
        ProjectState {
            files: self
                .read_state()
                .files
                .iter()
                .map(|(path, file)| (path.clone(), file.content.clone()))
                .collect(),
        }
    }

    /// Replace the whole store with `state`; nothing changes if any path is
    /// invalid
    pub fn import_state(&self, state: &ProjectState) -> Result<(), StoreError> {
        let normalized = state
            .files
            .iter()
            .map(|(p, content)| Ok((path::normalize(p)?, content.clone())))
            .collect::<Result<Vec<_>, StoreError>>()?;

        let mut guard = self.write_state();
        guard.files = Arc::new(FileMap::new());
        for (path, content) in normalized {
            guard.put(path, content);
        }
        guard.generation += 1;
        debug!(files = guard.files.len(), "imported project state");
        Ok(())
    }

    pub fn clear(&self) {
        let mut state = self.write_state();
        state.files = Arc::new(FileMap::new());
        state.generation += 1;
    }
}

impl FileSource for VirtualFileStore {
    fn contains(&self, path: &str) -> bool {
        self.read_state().files.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read() {
        let store = VirtualFileStore::new();
        let v1 = store.write("/App.jsx", "export default function App() {}").unwrap();

        assert_eq!(
            store.read("/App.jsx").unwrap(),
            "export default function App() {}"
        );
        assert_eq!(store.version("/App.jsx"), Some(v1));
        assert!(store.exists("App.jsx"));
    }

    #[test]
    fn test_overwrite_bumps_version() {
        let store = VirtualFileStore::new();
        let v1 = store.write("/App.jsx", "a").unwrap();
        let v2 = store.write("/App.jsx", "a").unwrap();
        assert!(v2 > v1);
    }

    #[test]
    fn test_versions_never_reused_after_delete() {
        let store = VirtualFileStore::new();
        let v1 = store.write("/a.js", "1").unwrap();
        store.delete("/a.js").unwrap();
        let v2 = store.write("/a.js", "1").unwrap();
        assert!(v2 > v1);
    }

    #[test]
    fn test_read_missing() {
        let store = VirtualFileStore::new();
        assert_eq!(
            store.read("/nope.jsx"),
            Err(StoreError::NotFound {
                path: "/nope.jsx".to_string()
            })
        );
    }

    #[test]
    fn test_invalid_paths_rejected() {
        let store = VirtualFileStore::new();
        assert!(matches!(
            store.write("/../escape.js", "x"),
            Err(StoreError::InvalidPath { .. })
        ));
        assert!(matches!(
            store.read("../x"),
            Err(StoreError::InvalidPath { .. })
        ));
        assert!(!store.exists("/../escape.js"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_list_is_sorted() {
        let store =
            VirtualFileStore::with_files([("/b.js", ""), ("/App.jsx", ""), ("/a/c.js", "")])
                .unwrap();
        assert_eq!(store.list(), vec!["/App.jsx", "/a/c.js", "/b.js"]);
    }

    #[test]
    fn test_delete() {
        let store = VirtualFileStore::with_files([("/a.js", "x")]).unwrap();
        let generation = store.generation();
        let removed = store.delete("/a.js").unwrap();
        assert_eq!(removed.content, "x");
        assert!(!store.exists("/a.js"));
        assert!(store.generation() > generation);
        assert!(matches!(
            store.delete("/a.js"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_list_directory() {
        let store = VirtualFileStore::with_files([
            ("/App.jsx", ""),
            ("/components/Calculator.jsx", ""),
            ("/components/ui/Button.jsx", ""),
        ])
        .unwrap();

        let root = store.list_directory("/").unwrap();
        assert_eq!(
            root,
            vec![
                DirEntry {
                    name: "components".into(),
                    path: "/components".into(),
                    kind: EntryKind::Directory
                },
                DirEntry {
                    name: "App.jsx".into(),
                    path: "/App.jsx".into(),
                    kind: EntryKind::File
                },
            ]
        );

        let components = store.list_directory("/components").unwrap();
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].name, "ui");
        assert_eq!(components[1].path, "/components/Calculator.jsx");

        assert!(matches!(
            store.list_directory("/missing"),
            Err(StoreError::NotFound { .. })
        ));
        assert!(store.list_directory("/App.jsx").is_err());
    }

    #[test]
    fn test_rename_file() {
        let store = VirtualFileStore::with_files([("/Calc.jsx", "x")]).unwrap();
        let moved = store.rename("/Calc.jsx", "/components/Calculator.jsx").unwrap();
        assert_eq!(
            moved,
            vec![(
                "/Calc.jsx".to_string(),
                "/components/Calculator.jsx".to_string()
            )]
        );
        assert!(!store.exists("/Calc.jsx"));
        assert_eq!(store.read("/components/Calculator.jsx").unwrap(), "x");
    }

    #[test]
    fn test_rename_directory() {
        let store = VirtualFileStore::with_files([
            ("/widgets/A.jsx", "a"),
            ("/widgets/deep/B.jsx", "b"),
            ("/widgetsX.jsx", "c"),
        ])
        .unwrap();
        let moved = store.rename("/widgets", "/components").unwrap();
        assert_eq!(moved.len(), 2);
        assert_eq!(
            store.list(),
            vec![
                "/components/A.jsx",
                "/components/deep/B.jsx",
                "/widgetsX.jsx"
            ]
        );
    }

    #[test]
    fn test_rename_conflict_is_atomic() {
        let store =
            VirtualFileStore::with_files([("/a/x.js", "1"), ("/a/y.js", "2"), ("/b/y.js", "3")])
                .unwrap();
        assert!(matches!(
            store.rename("/a", "/b"),
            Err(StoreError::AlreadyExists { .. })
        ));
        assert_eq!(store.len(), 3);
        assert_eq!(store.read("/a/x.js").unwrap(), "1");
        assert!(store.rename("/a", "/a/inner").is_err());
        assert!(matches!(
            store.rename("/nothing", "/else"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_replace_in_file() {
        let store = VirtualFileStore::with_files([("/App.jsx", "const n = 1;")]).unwrap();
        let before = store.version("/App.jsx").unwrap();
        let after = store.replace_in_file("/App.jsx", "1", "2").unwrap();
        assert!(after > before);
        assert_eq!(store.read("/App.jsx").unwrap(), "const n = 2;");

        let err = store.replace_in_file("/App.jsx", "zzz", "y").unwrap_err();
        assert!(matches!(err, StoreError::EditFailed { .. }));
        assert_eq!(store.version("/App.jsx"), Some(after));
    }

    #[test]
    fn test_insert_at_line() {
        let store = VirtualFileStore::with_files([("/App.jsx", "b\nc\n")]).unwrap();
        store
            .insert_at_line("/App.jsx", 0, "import x from './x';")
            .unwrap();
        assert_eq!(
            store.read("/App.jsx").unwrap(),
            "import x from './x';\nb\nc\n"
        );
        assert!(store.insert_at_line("/App.jsx", 10, "x").is_err());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let store = VirtualFileStore::with_files([("/a.js", "old")]).unwrap();
        let snapshot = store.snapshot();
        store.write("/a.js", "new").unwrap();
        store.write("/b.js", "b").unwrap();

        assert_eq!(snapshot.read("/a.js").unwrap(), "old");
        assert!(!snapshot.contains("/b.js"));
        assert_eq!(store.snapshot().read("/a.js").unwrap(), "new");
    }

    #[test]
    fn test_export_import_state() {
        let store =
            VirtualFileStore::with_files([("/App.jsx", "app"), ("/lib/x.js", "x")]).unwrap();
        let state = store.export_state();

        let restored = VirtualFileStore::new();
        restored.write("/stale.js", "gone").unwrap();
        restored.import_state(&state).unwrap();

        assert_eq!(restored.list(), vec!["/App.jsx", "/lib/x.js"]);
        assert_eq!(restored.read("/lib/x.js").unwrap(), "x");
    }

    #[test]
    fn test_import_state_invalid_path_leaves_store_untouched() {
        let store = VirtualFileStore::with_files([("/keep.js", "k")]).unwrap();
        let mut state = ProjectState::default();
        state.files.insert("/../bad.js".to_string(), String::new());
        assert!(store.import_state(&state).is_err());
        assert_eq!(store.list(), vec!["/keep.js"]);
    }

    #[test]
    fn test_clear() {
        let store = VirtualFileStore::with_files([("/a.js", "")]).unwrap();
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_writers_and_snapshots() {
        use std::thread;

        let store = Arc::new(VirtualFileStore::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..50 {
                        store.write(&format!("/t{}/f{}.js", t, i), "x").unwrap();
                        let snapshot = store.snapshot();
                        assert!(snapshot.contains(&format!("/t{}/f{}.js", t, i)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 200);
    }
}
