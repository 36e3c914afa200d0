//! Read-recording layer

use crate::VfsResult;
use crate::VirtualFileSystem;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Wraps a file system and counts `read_file` calls per path.
///
/// Clones share the same counters, so a test can keep one handle while the
/// linker owns another.
#[derive(Debug, Clone)]
pub struct RecordingFileSystem<F> {
    inner: F,
    reads: Arc<Mutex<BTreeMap<PathBuf, usize>>>,
}

impl<F: VirtualFileSystem> RecordingFileSystem<F> {
    /// Wrap `inner`
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            reads: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// How many times `path` was read, successful or not
    pub fn read_count(&self, path: impl AsRef<Path>) -> usize {
        self.reads
            .lock()
            .map(|reads| reads.get(path.as_ref()).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Total number of reads across all paths
    pub fn total_reads(&self) -> usize {
        self.reads
            .lock()
            .map(|reads| reads.values().sum())
            .unwrap_or(0)
    }

    /// Snapshot of all recorded counters
    pub fn reads(&self) -> BTreeMap<PathBuf, usize> {
        self.reads.lock().map(|reads| reads.clone()).unwrap_or_default()
    }

    /// The wrapped file system
    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl<F: VirtualFileSystem> VirtualFileSystem for RecordingFileSystem<F> {
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>> {
        if let Ok(mut reads) = self.reads.lock() {
            *reads.entry(path.to_path_buf()).or_insert(0) += 1;
        }
        self.inner.read_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.inner.is_file(path)
    }
}
