//! Virtual project filesystem.

pub mod edit;
pub mod path;
mod snapshot;
mod store;

pub use snapshot::{File, ProjectState, StoreSnapshot};
pub use store::{DirEntry, EntryKind, VirtualFileStore};

pub(crate) use snapshot::FileMap;

/// Lookup seam used by the resolver.
///
/// Paths passed in are already normalized.
pub trait FileSource: Send + Sync {
    fn contains(&self, path: &str) -> bool;
}

impl FileSource for StoreSnapshot {
    fn contains(&self, path: &str) -> bool {
        StoreSnapshot::contains(self, path)
    }
}
