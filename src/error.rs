//! Error types for sqlfs

use std::io;
use thiserror::Error;

/// Result type for sqlfs operations
pub type Result<T> = std::result::Result<T, FsError>;

/// Filesystem and storage errors
#[derive(Error, Debug)]
pub enum FsError {
    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("File exists: {0}")]
    AlreadyExists(String),

    #[error("Directory not empty: {0}")]
    NotEmpty(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// The URL does not belong to this engine; the host should handle it itself.
    #[error("Path not handled by this engine: {0}")]
    ForeignPath(String),

    #[error("Unknown connection: {0}")]
    UnknownConnection(String),

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FsError {
    /// True when the backing store (not the filesystem logic) failed.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            FsError::Sqlx(_) | FsError::Migration(_) | FsError::Connection(_) | FsError::Query(_)
        )
    }

    /// True when the caller should pass the path through to another handler.
    pub fn is_foreign(&self) -> bool {
        matches!(self, FsError::ForeignPath(_))
    }
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        let kind = match &err {
            FsError::NotFound(_) | FsError::UnknownConnection(_) => io::ErrorKind::NotFound,
            FsError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            FsError::NotEmpty(_) => io::ErrorKind::DirectoryNotEmpty,
            FsError::NotADirectory(_) => io::ErrorKind::NotADirectory,
            FsError::IsADirectory(_) => io::ErrorKind::IsADirectory,
            FsError::PermissionDenied(_) => io::ErrorKind::PermissionDenied,
            FsError::InvalidArgument(_) | FsError::ForeignPath(_) => io::ErrorKind::InvalidInput,
            FsError::Unsupported(_) => io::ErrorKind::Unsupported,
            FsError::Serialization(_) => io::ErrorKind::InvalidData,
            FsError::Io(e) => e.kind(),
            FsError::InvalidState(_)
            | FsError::Sqlx(_)
            | FsError::Migration(_)
            | FsError::Connection(_)
            | FsError::Query(_) => io::ErrorKind::Other,
        };
        match err {
            FsError::Io(e) => e,
            other => io::Error::new(kind, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_kinds() {
        let err: io::Error = FsError::NotEmpty("sql:/db/fs/a".into()).into();
        assert_eq!(err.kind(), io::ErrorKind::DirectoryNotEmpty);

        let err: io::Error = FsError::PermissionDenied("read-only".into()).into();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn test_classification() {
        assert!(FsError::Connection("refused".into()).is_storage_failure());
        assert!(!FsError::NotFound("x".into()).is_storage_failure());
        assert!(FsError::ForeignPath("/tmp/x".into()).is_foreign());
    }
}
