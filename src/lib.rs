//! Fileforge - batch file format conversion
//!
//! The library exposes the orchestration core: scanning, the checkpointed
//! conversion pipeline, the batch engine and progress reporting. Format
//! work itself lives in `fileforge-codecs`.

pub mod batch;
pub mod config;
pub mod pipeline;
pub mod progress;
pub mod scanner;

pub use batch::{BatchEngine, BatchError, BatchHandle, BatchResult, BatchSpec, CancelToken};
pub use pipeline::{ConversionJob, ConversionOutcome, ValidationPipeline};
pub use progress::{ProgressEvent, ProgressReporter};
