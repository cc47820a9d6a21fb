//! Error types for fileforge-codecs.

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised while converting or inspecting a file.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// An external tool ran but reported failure.
    #[error("tool execution failed: {tool}: {message}")]
    ToolFailed { tool: String, message: String },

    /// An external tool exceeded its time budget and was killed.
    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    /// Failed to parse tool output.
    #[error("failed to parse {tool} output: {message}")]
    ParseError { tool: String, message: String },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image codec rejected the input or output.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unsupported operation or format.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Workspace error.
    #[error("workspace error: {0}")]
    Workspace(String),
}

impl CodecError {
    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a tool execution failed error.
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse_error(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported conversion error.
    pub fn unsupported_conversion(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::Unsupported(format!("{from} -> {to}"))
    }

    /// Create an input error for a missing file.
    pub fn missing(path: impl Into<PathBuf>) -> Self {
        Self::InvalidInput(format!("file not found: {}", path.into().display()))
    }
}

impl From<fileforge_common::Error> for CodecError {
    fn from(err: fileforge_common::Error) -> Self {
        match err {
            fileforge_common::Error::Io(e) => Self::Io(e),
            other => Self::InvalidInput(other.to_string()),
        }
    }
}
