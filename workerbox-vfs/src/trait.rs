//! VirtualFileSystem trait definition

use crate::error::VfsResult;
use std::path::Path;
use std::sync::Arc;

/// Virtual File System trait
///
/// Read-only view of the files a worker may import. Paths passed in are
/// always absolute and already normalised by the caller.
///
/// # Implementations
/// - `MemoryFileSystem`: In-memory file system
/// - `NativeFileSystem`: Native OS file system
/// - `RecordingFileSystem`: read-counting wrapper
pub trait VirtualFileSystem: Send + Sync {
    /// Read file contents
    ///
    /// # Arguments
    /// * `path` - Absolute file path
    ///
    /// # Returns
    /// File contents as bytes, or VfsError (`NotFound` for missing files)
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>>;

    /// Check if path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if path exists and is a file
    fn is_file(&self, path: &Path) -> bool;
}

impl<T: VirtualFileSystem + ?Sized> VirtualFileSystem for Arc<T> {
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>> {
        (**self).read_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        (**self).is_file(path)
    }
}

impl<T: VirtualFileSystem + ?Sized> VirtualFileSystem for Box<T> {
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>> {
        (**self).read_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        (**self).is_file(path)
    }
}
