// Error types for tetherfs operations
use crate::context::ContextId;
use std::io;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

/// Closed taxonomy of filesystem operation errors.
///
/// Every dispatched operation resolves to one of these kinds through its
/// completion. `ContextViolation` is the exception: it indicates a caller
/// bug and is returned synchronously at the call site, before any dispatch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Entry already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    #[error("Directory not empty: {0}. Use recursive delete")]
    NotEmpty(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Not a symbolic link: {0}")]
    NotALink(PathBuf),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File handle is closed")]
    HandleClosed,

    #[error("Handle owned by context {owner} was used from context {caller}")]
    ContextViolation {
        owner: ContextId,
        caller: ContextId,
    },

    #[error("Operation panicked: {0}")]
    Fault(String),

    #[error("Worker pool shut down before the operation completed")]
    Shutdown,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn not_found<P: AsRef<Path>>(path: P) -> Self {
        Error::NotFound(path.as_ref().to_path_buf())
    }

    pub fn already_exists<P: AsRef<Path>>(path: P) -> Self {
        Error::AlreadyExists(path.as_ref().to_path_buf())
    }

    pub fn not_empty<P: AsRef<Path>>(path: P) -> Self {
        Error::NotEmpty(path.as_ref().to_path_buf())
    }

    pub fn not_a_directory<P: AsRef<Path>>(path: P) -> Self {
        Error::NotADirectory(path.as_ref().to_path_buf())
    }

    pub fn not_a_link<P: AsRef<Path>>(path: P) -> Self {
        Error::NotALink(path.as_ref().to_path_buf())
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn fault<S: Into<String>>(msg: S) -> Self {
        Error::Fault(msg.into())
    }

    /// Translate an OS error into a domain kind, keeping the path for context.
    ///
    /// Kinds without a stable `io::ErrorKind` mapping are matched on the raw
    /// errno. Anything unmapped is carried through as `Io`.
    pub fn from_io<P: AsRef<Path>>(path: P, err: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path),
            io::ErrorKind::AlreadyExists => Error::AlreadyExists(path),
            io::ErrorKind::PermissionDenied => Error::PermissionDenied(path),
            _ => match err.raw_os_error() {
                Some(libc::ENOTEMPTY) => Error::NotEmpty(path),
                Some(libc::ENOTDIR) => Error::NotADirectory(path),
                Some(libc::EXDEV) => Error::NotSupported(format!(
                    "atomic move not supported involving {}",
                    path.display()
                )),
                _ => Error::Io { path, source: err },
            },
        }
    }
}
