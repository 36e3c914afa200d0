//! Workerbox Virtual File System
//!
//! The content reader behind module linking: every module file is fetched
//! by absolute path through [`VirtualFileSystem`].
//!
//! # Backends
//! - [`MemoryFileSystem`]: in-memory files, used by tests and embedders
//! - [`NativeFileSystem`]: the local OS file system
//! - [`RecordingFileSystem`]: wraps any backend and counts reads per path
//!
//! # Usage
//! ```rust
//! use workerbox_vfs::{MemoryFileSystem, VirtualFileSystem};
//! use std::path::Path;
//!
//! let fs = MemoryFileSystem::with_files([("/text.txt", b"hello\n".to_vec())]);
//! let content = fs.read_file(Path::new("/text.txt")).unwrap();
//! assert_eq!(content, b"hello\n");
//! ```

mod error;
mod memory;
mod native;
mod recording;
mod r#trait;

pub use error::{VfsError, VfsResult};
pub use memory::MemoryFileSystem;
pub use native::NativeFileSystem;
pub use r#trait::VirtualFileSystem;
pub use recording::RecordingFileSystem;

/// Create a new memory-based file system.
pub fn memory_fs() -> MemoryFileSystem {
    MemoryFileSystem::new()
}

/// Create a new native file system.
pub fn native_fs() -> NativeFileSystem {
    NativeFileSystem::new()
}
