//! VFS error types.

use std::io;

use mufs_types::{FileOperation, UrlError};
use thiserror::Error;

/// VFS error type.
///
/// Callers branch on the kind: [`VfsError::Unsupported`] means "don't offer
/// this feature", [`VfsError::AccessDenied`] means "retry with more
/// privileges", conflicts ([`VfsError::NotFound`], [`VfsError::AlreadyExists`])
/// carry the path for a targeted message, and [`VfsError::Io`] is everything
/// else.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Malformed or non-absolute resource address.
    #[error("invalid address: {0}")]
    InvalidUrl(#[from] UrlError),

    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The OS refused the operation for lack of permission.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The backend does not implement this operation.
    #[error("operation not supported: {0}")]
    Unsupported(FileOperation),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Directory not empty.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Source and destination live on different volumes.
    #[error("cross-volume move: {0}")]
    CrossVolume(String),

    /// Source and destination are the same file.
    #[error("source and destination are the same file: {0}")]
    SameFile(String),

    /// No provider registered for a scheme.
    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    /// A provider is already registered for a scheme.
    #[error("protocol already registered: {0}")]
    ProtocolAlreadyRegistered(String),

    /// Filename pattern failed to compile.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// The issuing thread was interrupted during a blocking call.
    #[error("interrupted")]
    Interrupted,

    /// Stream used after close or after an interruption closed it.
    #[error("stream closed")]
    StreamClosed,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create an AccessDenied error.
    pub fn access_denied(path: impl Into<String>) -> Self {
        Self::AccessDenied(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a DirectoryNotEmpty error.
    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    /// Create a CrossVolume error.
    pub fn cross_volume(path: impl Into<String>) -> Self {
        Self::CrossVolume(path.into())
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Classify a native I/O error raised while operating on `path`.
    ///
    /// An `io::Error` that wraps a `VfsError` (as produced by the stream
    /// adapters) is unwrapped back to it.
    pub fn from_io(err: io::Error, path: impl Into<String>) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<VfsError>()) {
            return match err.into_inner().map(|inner| inner.downcast::<VfsError>()) {
                Some(Ok(vfs)) => *vfs,
                _ => VfsError::other("unreadable wrapped error"),
            };
        }

        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path),
            io::ErrorKind::PermissionDenied => Self::AccessDenied(path),
            io::ErrorKind::AlreadyExists => Self::AlreadyExists(path),
            io::ErrorKind::NotADirectory => Self::NotADirectory(path),
            io::ErrorKind::IsADirectory => Self::IsADirectory(path),
            io::ErrorKind::DirectoryNotEmpty => Self::DirectoryNotEmpty(path),
            io::ErrorKind::CrossesDevices => Self::CrossVolume(path),
            io::ErrorKind::Interrupted => Self::Interrupted,
            _ => Self::Io(err),
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied(_))
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self {
            VfsError::InvalidUrl(_) | VfsError::InvalidPattern(_) => io::ErrorKind::InvalidInput,
            VfsError::NotFound(_) | VfsError::UnknownProtocol(_) => io::ErrorKind::NotFound,
            VfsError::AlreadyExists(_) | VfsError::ProtocolAlreadyRegistered(_) => {
                io::ErrorKind::AlreadyExists
            }
            VfsError::AccessDenied(_) => io::ErrorKind::PermissionDenied,
            VfsError::Unsupported(_) => io::ErrorKind::Unsupported,
            VfsError::NotADirectory(_) => io::ErrorKind::NotADirectory,
            VfsError::IsADirectory(_) => io::ErrorKind::IsADirectory,
            VfsError::DirectoryNotEmpty(_) => io::ErrorKind::DirectoryNotEmpty,
            VfsError::CrossVolume(_) => io::ErrorKind::CrossesDevices,
            VfsError::SameFile(_) => io::ErrorKind::InvalidInput,
            // Not `ErrorKind::Interrupted`: std helpers retry that kind
            VfsError::Interrupted | VfsError::StreamClosed => io::ErrorKind::Other,
            VfsError::Io(e) => e.kind(),
            VfsError::Other(_) => io::ErrorKind::Other,
        }
    }
}

impl From<io::Error> for VfsError {
    fn from(err: io::Error) -> Self {
        let message = err.to_string();
        Self::from_io(err, message)
    }
}

/// Convert VfsError to std::io::Error for compatibility.
///
/// The VfsError travels inside the io::Error; [`VfsError::from_io`] recovers it.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::Io(e) => e,
            other => io::Error::new(other.io_kind(), other),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
