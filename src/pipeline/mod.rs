//! Checkpointed execution of a single conversion.

pub mod checkpoint;
pub mod executor;
pub mod job;

pub use checkpoint::{Checkpoint, CheckpointRecord, ErrorKind};
pub use executor::{CheckContext, CheckFn, CheckResult, ValidationPipeline, CHECKS};
pub use job::{ConversionJob, ConversionOutcome, JobError};
