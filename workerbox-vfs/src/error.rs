//! VFS Error Types

use thiserror::Error;

/// Result type for VFS operations
pub type VfsResult<T> = Result<T, VfsError>;

/// Error type for VFS operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VfsError {
    /// File not found
    #[error("file not found: {path}")]
    NotFound { path: String },

    /// Permission denied
    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    /// Path exists but is not a regular file
    #[error("not a file: {path}")]
    NotAFile { path: String },

    /// Any other read failure
    #[error("failed to read '{path}': {message}")]
    Io { path: String, message: String },
}

impl VfsError {
    /// The path the failed operation was about
    pub fn path(&self) -> &str {
        match self {
            VfsError::NotFound { path }
            | VfsError::PermissionDenied { path }
            | VfsError::NotAFile { path }
            | VfsError::Io { path, .. } => path,
        }
    }

    /// Whether the failure means the file does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, VfsError::NotFound { .. })
    }

    pub(crate) fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        let path = path.to_string_lossy().into_owned();
        match err.kind() {
            std::io::ErrorKind::NotFound => VfsError::NotFound { path },
            std::io::ErrorKind::PermissionDenied => VfsError::PermissionDenied { path },
            _ => VfsError::Io {
                path,
                message: err.to_string(),
            },
        }
    }
}
