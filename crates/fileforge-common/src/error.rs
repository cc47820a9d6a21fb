//! Common error types used throughout fileforge.
//!
//! Covers failures that are not tied to a single conversion: snapshotting a
//! file, parsing a format tag, or reading a header.

use std::path::PathBuf;

/// Common error type for fileforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The path exists but is not a regular file.
    #[error("not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    /// A format tag could not be parsed.
    #[error("invalid format tag: {0:?}")]
    InvalidFormat(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Map an I/O error on `path`, turning `NotFound` into [`Error::NotFound`].
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.into())
        } else {
            Self::Io(err)
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound(PathBuf::from("/tmp/missing.png"));
        assert_eq!(err.to_string(), "file not found: /tmp/missing.png");

        let err = Error::InvalidFormat("..".to_string());
        assert_eq!(err.to_string(), "invalid format tag: \"..\"");
    }

    #[test]
    fn test_from_io_maps_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            Error::from_io("/a/b", io_err),
            Error::NotFound(_)
        ));

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(Error::from_io("/a/b", io_err), Error::Io(_)));
    }
}
