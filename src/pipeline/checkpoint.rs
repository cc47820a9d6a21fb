//! Checkpoints and error kinds recorded for each conversion.

use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// One verification step of a conversion, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Checkpoint {
    InputValidated,
    OutputFormatValidated,
    OutputPathPrepared,
    ConversionExecuted,
    OutputValidated,
    IntegrityVerified,
}

impl Checkpoint {
    /// Every checkpoint in evaluation order.
    pub const ALL: [Checkpoint; 6] = [
        Checkpoint::InputValidated,
        Checkpoint::OutputFormatValidated,
        Checkpoint::OutputPathPrepared,
        Checkpoint::ConversionExecuted,
        Checkpoint::OutputValidated,
        Checkpoint::IntegrityVerified,
    ];

    /// Error reported when this checkpoint fails.
    pub fn failure_kind(self) -> ErrorKind {
        match self {
            Self::InputValidated => ErrorKind::InvalidInput,
            Self::OutputFormatValidated => ErrorKind::UnsupportedFormat,
            Self::OutputPathPrepared => ErrorKind::PathError,
            Self::ConversionExecuted => ErrorKind::ConversionFailed,
            Self::OutputValidated | Self::IntegrityVerified => ErrorKind::IntegrityError,
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InputValidated => "input validated",
            Self::OutputFormatValidated => "output format validated",
            Self::OutputPathPrepared => "output path prepared",
            Self::ConversionExecuted => "conversion executed",
            Self::OutputValidated => "output validated",
            Self::IntegrityVerified => "integrity verified",
        };
        f.write_str(name)
    }
}

/// Why a file did not convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ErrorKind {
    InvalidInput,
    UnsupportedFormat,
    PathError,
    ConversionFailed,
    IntegrityError,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidInput => "invalid input",
            Self::UnsupportedFormat => "unsupported format",
            Self::PathError => "path error",
            Self::ConversionFailed => "conversion failed",
            Self::IntegrityError => "integrity error",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// The recorded result of one checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckpointRecord {
    pub checkpoint: Checkpoint,
    pub passed: bool,
    pub message: Option<String>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl CheckpointRecord {
    pub fn pass(checkpoint: Checkpoint, message: Option<String>, elapsed: Duration) -> Self {
        Self {
            checkpoint,
            passed: true,
            message,
            elapsed,
        }
    }

    pub fn fail(checkpoint: Checkpoint, message: String, elapsed: Duration) -> Self {
        Self {
            checkpoint,
            passed: false,
            message: Some(message),
            elapsed,
        }
    }
}

/// Serialize a duration as fractional seconds.
pub(crate) fn serialize_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}
