//! The unit of work: one source, one destination, one adapter.

use super::checkpoint::{serialize_secs, Checkpoint, CheckpointRecord, ErrorKind};
use super::executor::ValidationPipeline;
use fileforge_codecs::{target_format, AdapterRegistry, CodecAdapter, ConversionOptions};
use fileforge_common::{FileCategory, FileDescriptor, FormatTag};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Errors building a single-file job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Source(#[from] fileforge_common::Error),

    #[error("cannot classify {}", .0.display())]
    UnknownCategory(PathBuf),

    #[error("no adapter registered for {0} files")]
    NoAdapter(FileCategory),

    #[error(transparent)]
    Target(#[from] fileforge_codecs::CodecError),
}

/// A single conversion request with its adapter resolved.
///
/// Jobs are consumed by [`ConversionJob::run`]; nothing in a job is shared
/// with any other job.
pub struct ConversionJob {
    pub source: FileDescriptor,
    pub destination: PathBuf,
    pub target: FormatTag,
    pub options: ConversionOptions,
    pub adapter: Arc<dyn CodecAdapter>,
}

impl ConversionJob {
    pub fn new(
        source: FileDescriptor,
        destination: PathBuf,
        target: FormatTag,
        options: ConversionOptions,
        adapter: Arc<dyn CodecAdapter>,
    ) -> Self {
        Self {
            source,
            destination,
            target,
            options,
            adapter,
        }
    }

    /// Build a job for one file, picking the adapter from the classifier's
    /// category. The target comes from `output_format` or the destination
    /// extension.
    pub fn for_path(
        source: &Path,
        destination: &Path,
        options: ConversionOptions,
        registry: &AdapterRegistry,
    ) -> Result<Self, JobError> {
        let descriptor = FileDescriptor::snapshot(source)?;
        if !descriptor.category.is_known() {
            return Err(JobError::UnknownCategory(source.to_path_buf()));
        }
        let adapter = registry
            .get(descriptor.category)
            .ok_or(JobError::NoAdapter(descriptor.category))?;
        let target = target_format(destination, &options)?;

        Ok(Self::new(
            descriptor,
            destination.to_path_buf(),
            target,
            options,
            adapter,
        ))
    }

    /// Run the job through `pipeline`, consuming it.
    pub fn run(self, pipeline: &ValidationPipeline) -> ConversionOutcome {
        pipeline.run(self)
    }
}

impl fmt::Debug for ConversionJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionJob")
            .field("source", &self.source.path)
            .field("destination", &self.destination)
            .field("target", &self.target)
            .field("adapter", &self.adapter.name())
            .finish()
    }
}

/// What happened to one job.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutcome {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub success: bool,
    /// Checkpoints actually evaluated, in order.
    pub checkpoints: Vec<CheckpointRecord>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub output: Option<FileDescriptor>,
    pub error: Option<ErrorKind>,
    /// Set once the source was deleted after a verified conversion.
    pub original_removed: bool,
}

impl ConversionOutcome {
    /// The checkpoint that stopped the pipeline, if any.
    pub fn failed_checkpoint(&self) -> Option<&CheckpointRecord> {
        self.checkpoints.iter().find(|c| !c.passed)
    }

    /// Whether `checkpoint` was reached and passed.
    pub fn passed(&self, checkpoint: Checkpoint) -> bool {
        self.checkpoints
            .iter()
            .any(|c| c.checkpoint == checkpoint && c.passed)
    }

    /// Failure message from the failing checkpoint.
    pub fn message(&self) -> Option<&str> {
        self.failed_checkpoint().and_then(|c| c.message.as_deref())
    }

    /// One-line description for progress output.
    pub fn summary(&self) -> String {
        match self.failed_checkpoint() {
            None => match &self.output {
                Some(output) => format!("converted ({} bytes)", output.size),
                None => "converted".to_string(),
            },
            Some(record) => format!(
                "failed at {}: {}",
                record.checkpoint,
                record.message.as_deref().unwrap_or("no details")
            ),
        }
    }
}
