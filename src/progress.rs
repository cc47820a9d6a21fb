//! Progress events streamed from a running batch.
//!
//! A reporter is called once per finished job, always from the thread that
//! aggregates the batch, so calls never overlap. Reporters that drive a UI
//! on another thread are responsible for marshaling the event there.

use crate::pipeline::{Checkpoint, ConversionOutcome, ErrorKind};
use serde::Serialize;
use std::path::PathBuf;

/// One finished job.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    /// Jobs finished so far, including this one. Increases by one per event.
    pub completed: usize,
    /// Jobs dispatched to workers. Files skipped during planning are not
    /// counted, so this can be smaller than `BatchResult::total`.
    pub total: usize,
    pub filename: String,
    pub source: PathBuf,
    pub success: bool,
    /// Human-readable outcome, e.g. `converted (2048 bytes)`.
    pub summary: String,
    pub error: Option<ErrorKind>,
    /// Checkpoint that failed, if any.
    pub checkpoint: Option<Checkpoint>,
}

impl ProgressEvent {
    pub fn from_outcome(completed: usize, total: usize, outcome: &ConversionOutcome) -> Self {
        let filename = outcome
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| outcome.source.display().to_string());
        Self {
            completed,
            total,
            filename,
            source: outcome.source.clone(),
            success: outcome.success,
            summary: outcome.summary(),
            error: outcome.error,
            checkpoint: outcome.failed_checkpoint().map(|c| c.checkpoint),
        }
    }

    /// Completion as a fraction in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }
}

/// Sink for progress events, owned by the presentation layer.
pub trait ProgressReporter: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressReporter for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Logs each event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn emit(&self, event: ProgressEvent) {
        if event.success {
            tracing::info!(
                "[{}/{}] {}: {}",
                event.completed,
                event.total,
                event.filename,
                event.summary
            );
        } else {
            tracing::warn!(
                "[{}/{}] {}: {}",
                event.completed,
                event.total,
                event.filename,
                event.summary
            );
        }
    }
}

/// Forwards events over a channel to a consumer on another thread.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: crossbeam_channel::Sender<ProgressEvent>,
}

impl ChannelReporter {
    /// Create a reporter and the receiving end of its channel.
    pub fn channel() -> (Self, crossbeam_channel::Receiver<ProgressEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl ProgressReporter for ChannelReporter {
    fn emit(&self, event: ProgressEvent) {
        // A dropped receiver just means nobody is watching any more.
        let _ = self.tx.send(event);
    }
}
