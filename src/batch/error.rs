use fileforge_codecs::CodecError;
use fileforge_common::{FileCategory, FormatTag};
use std::path::PathBuf;

/// Problems with a batch request itself. These are reported before any job
/// runs; per-file failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("input root does not exist: {}", .0.display())]
    InputRootMissing(PathBuf),

    #[error("input root is not a directory: {}", .0.display())]
    InputRootNotDirectory(PathBuf),

    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("worker count must be at least 1")]
    InvalidWorkers,

    #[error("no {category} adapter can write {target}")]
    UnsupportedTarget {
        category: FileCategory,
        target: FormatTag,
    },

    #[error("cannot tell which category produces {0} files")]
    UnknownTargetCategory(FormatTag),

    #[error("no adapter registered for {0} files")]
    NoAdapter(FileCategory),

    #[error("invalid conversion options: {0}")]
    InvalidOptions(#[from] CodecError),

    #[error("failed to start batch thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("a batch worker panicked")]
    Panicked,
}
