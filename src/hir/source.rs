//! File set: stable [`FileId`]s for paths, plus the last indexed content hash.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::cache::ContentHash;
use crate::base::FileId;

/// Maps file paths to [`FileId`]s and back.
///
/// Ids are never reused: removing a path and adding it again yields the
/// same id, so symbols keyed by id stay attributable.
#[derive(Debug, Default)]
pub struct FileSet {
    inner: RwLock<FileSetInner>,
}

#[derive(Debug, Default)]
struct FileSetInner {
    path_to_id: IndexMap<Arc<str>, FileId>,
    id_to_path: IndexMap<FileId, Arc<str>>,
    /// Hash of the contents the file was last indexed with.
    hashes: IndexMap<FileId, ContentHash>,
    next_id: u32,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or assign the id for `path`.
    pub fn file_id(&self, path: &str) -> FileId {
        // Fast path: read lock
        {
            let inner = self.inner.read();
            if let Some(&id) = inner.path_to_id.get(path) {
                return id;
            }
        }

        let mut inner = self.inner.write();
        // Another writer may have won the race.
        if let Some(&id) = inner.path_to_id.get(path) {
            return id;
        }

        let id = FileId::new(inner.next_id);
        inner.next_id += 1;
        let path: Arc<str> = Arc::from(path);
        inner.path_to_id.insert(path.clone(), id);
        inner.id_to_path.insert(id, path);
        id
    }

    /// The id of an already known path.
    pub fn lookup(&self, path: &str) -> Option<FileId> {
        self.inner.read().path_to_id.get(path).copied()
    }

    pub fn path(&self, file: FileId) -> Option<Arc<str>> {
        self.inner.read().id_to_path.get(&file).cloned()
    }

    /// Record the hash `file` was indexed with; returns the previous one.
    pub fn set_hash(&self, file: FileId, hash: ContentHash) -> Option<ContentHash> {
        self.inner.write().hashes.insert(file, hash)
    }

    pub fn hash(&self, file: FileId) -> Option<ContentHash> {
        self.inner.read().hashes.get(&file).cloned()
    }

    /// Forget the indexed contents of `file`. The path keeps its id.
    pub fn forget(&self, file: FileId) {
        self.inner.write().hashes.shift_remove(&file);
    }

    /// Number of files with indexed contents.
    pub fn len(&self) -> usize {
        self.inner.read().hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of files with indexed contents, in first-seen order.
    pub fn files(&self) -> Vec<FileId> {
        let inner = self.inner.read();
        inner
            .id_to_path
            .keys()
            .filter(|id| inner.hashes.contains_key(*id))
            .copied()
            .collect()
    }
}

impl Clone for FileSet {
    fn clone(&self) -> Self {
        let inner = self.inner.read();
        Self {
            inner: RwLock::new(FileSetInner {
                path_to_id: inner.path_to_id.clone(),
                id_to_path: inner.id_to_path.clone(),
                hashes: inner.hashes.clone(),
                next_id: inner.next_id,
            }),
        }
    }
}
