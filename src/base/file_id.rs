//! File identifiers for declaring-file identity.

use std::fmt;

/// Identity of a source file in the indexed corpus.
///
/// Declared symbols record the `FileId` of the file that declared them so
/// that re-indexing or removing a file only drops that file's entries. The
/// path itself lives in [`FileSet`](crate::hir::FileSet).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct FileId(u32);

impl FileId {
    /// Create a FileId from a raw index.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

impl From<u32> for FileId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_identity() {
        assert_eq!(FileId::new(3), FileId::from(3));
        assert_ne!(FileId::new(3), FileId::new(4));
        assert_eq!(FileId::new(7).index(), 7);
    }

    #[test]
    fn test_file_id_display() {
        assert_eq!(FileId::new(2).to_string(), "file#2");
        assert_eq!(format!("{:?}", FileId::new(2)), "FileId(2)");
    }
}
