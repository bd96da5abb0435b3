//! Index cache interface.
//!
//! The in-memory [`SymbolTable`](super::SymbolTable) is the source of truth;
//! a cache only lets a host skip re-collecting declarations for files whose
//! contents did not change. Entries are keyed by path plus a SHA-256 content
//! hash, and any hash mismatch for a path invalidates that path's entry.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};

use super::symbols::DeclaredSymbol;
use super::table::PendingRelationship;

/// SHA-256 of file contents, hex encoded.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContentHash(String);

impl ContentHash {
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hex::encode(hasher.finalize()))
    }

    pub fn of(text: &str) -> Self {
        Self::compute(text.as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path: Arc<str>,
    pub hash: ContentHash,
}

impl CacheKey {
    pub fn new(path: impl Into<Arc<str>>, text: &str) -> Self {
        Self {
            path: path.into(),
            hash: ContentHash::of(text),
        }
    }
}

/// Everything declaration collection produced for one file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexEntry {
    pub symbols: Vec<DeclaredSymbol>,
    pub relationships: Vec<PendingRelationship>,
}

/// Storage for per-file index entries.
pub trait IndexCache: Send + Sync {
    /// The entry for `key`, if one was stored under the same content hash.
    fn get(&self, key: &CacheKey) -> Option<Arc<IndexEntry>>;

    /// Store an entry, replacing whatever the path had before.
    fn put(&self, key: CacheKey, entry: IndexEntry);

    /// Drop the entry for `path`.
    fn invalidate(&self, path: &str);
}

/// Process-local [`IndexCache`].
#[derive(Debug, Default)]
pub struct MemoryIndexCache {
    entries: RwLock<FxHashMap<Arc<str>, (ContentHash, Arc<IndexEntry>)>>,
}

impl MemoryIndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl IndexCache for MemoryIndexCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<IndexEntry>> {
        {
            let entries = self.entries.read();
            match entries.get(&key.path) {
                None => return None,
                Some((hash, entry)) if *hash == key.hash => return Some(entry.clone()),
                Some(_) => {}
            }
        }
        // Stale: contents changed since the entry was stored.
        self.entries.write().remove(&key.path);
        None
    }

    fn put(&self, key: CacheKey, entry: IndexEntry) {
        self.entries
            .write()
            .insert(key.path, (key.hash, Arc::new(entry)));
    }

    fn invalidate(&self, path: &str) {
        self.entries.write().remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::FileId;
    use crate::hir::symbols::SymbolKind;

    #[test]
    fn test_content_hash_is_sha256_hex() {
        let hash = ContentHash::of("");
        assert_eq!(
            hash.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(ContentHash::of("a"), ContentHash::of("b"));
    }

    #[test]
    fn test_hash_mismatch_invalidates_entry() {
        let cache = MemoryIndexCache::new();
        let entry = IndexEntry {
            symbols: vec![DeclaredSymbol::new(SymbolKind::Class, "A", FileId::new(0))],
            relationships: Vec::new(),
        };
        cache.put(CacheKey::new("a.php", "class A {}"), entry.clone());

        assert_eq!(
            cache.get(&CacheKey::new("a.php", "class A {}")).as_deref(),
            Some(&entry)
        );
        assert!(cache.get(&CacheKey::new("a.php", "class B {}")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate() {
        let cache = MemoryIndexCache::new();
        cache.put(CacheKey::new("a.php", "x"), IndexEntry::default());
        assert_eq!(cache.len(), 1);
        cache.invalidate("a.php");
        assert!(cache.get(&CacheKey::new("a.php", "x")).is_none());
    }
}
