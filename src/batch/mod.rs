//! Bulk conversion over a directory tree.
//!
//! A [`BatchSpec`] describes the request, a [`BatchEngine`] turns it into
//! jobs and runs them on a bounded worker pool, and the finished
//! [`BatchResult`] accounts for every file that was discovered.

mod engine;
mod error;
mod handle;
mod result;
mod spec;

pub use engine::BatchEngine;
pub use error::BatchError;
pub use handle::{BatchHandle, CancelToken};
pub use result::{BatchResult, FileReport, FileStatus, SkipReason};
pub use spec::{BatchSpec, DEFAULT_OUTPUT_SUFFIX};
