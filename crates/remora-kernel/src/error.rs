//! File service error types.

use std::io;
use thiserror::Error;

use remora_types::Errno;

use crate::table::Fd;

/// File service error type.
///
/// Each variant corresponds to exactly one negative result code; see
/// [`FsError::errno`]. I/O failures are classified at the point of detection
/// because the same `io::Error` means different things during creation
/// (`EIO`) and on an already-open handle (`EBUSY`).
#[derive(Debug, Error)]
pub enum FsError {
    /// Absent path on open, or an unrecognised mode/whence.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation is undefined for directories.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Directory operation on something that is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Unknown descriptor, or write on a read-only descriptor.
    #[error("bad descriptor: {0}")]
    BadDescriptor(Fd),

    /// Deletion refused by the storage permission model.
    #[error("operation not permitted: {0}")]
    NotPermitted(String),

    /// Path escapes the storage root, or access denied on stat.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// I/O failure on an already-open handle.
    #[error("resource busy: {0}")]
    Busy(#[source] io::Error),

    /// No destination buffer supplied for a read.
    #[error("bad address")]
    BadAddress,

    /// I/O failure during creation, deletion or stat.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    /// The descriptor counter has no values left.
    #[error("descriptor space exhausted")]
    DescriptorsExhausted,
}

impl FsError {
    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// The POSIX error number reported to clients.
    pub fn errno(&self) -> Errno {
        match self {
            FsError::InvalidArgument(_) => Errno::EINVAL,
            FsError::NotFound(_) => Errno::ENOENT,
            FsError::IsADirectory(_) => Errno::EISDIR,
            FsError::NotADirectory(_) => Errno::ENOTDIR,
            FsError::AlreadyExists(_) => Errno::EEXIST,
            FsError::BadDescriptor(_) => Errno::EBADF,
            FsError::NotPermitted(_) => Errno::EPERM,
            FsError::PermissionDenied(_) => Errno::EACCES,
            FsError::Busy(_) => Errno::EBUSY,
            FsError::BadAddress => Errno::EFAULT,
            FsError::Io(_) => Errno::EIO,
            FsError::DescriptorsExhausted => Errno::EIO,
        }
    }
}

/// File service result type.
pub type FsResult<T> = Result<T, FsError>;

/// Fold a result into the signed integer returned to clients.
pub(crate) fn fold<T>(result: &FsResult<T>, ok: impl FnOnce(&T) -> i64) -> i64 {
    match result {
        Ok(value) => ok(value),
        Err(e) => e.errno().as_neg().into(),
    }
}
