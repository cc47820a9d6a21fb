//! Per-file reports and the aggregated batch result.

use crate::pipeline::checkpoint::serialize_secs;
use crate::pipeline::{ConversionOutcome, ErrorKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Why a file was left out of the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Did not match the batch pattern.
    PatternMismatch,
    /// The classifier could not place the file in any category.
    Unsupported,
    /// Classified, but not in the category this batch converts.
    CategoryMismatch,
    EmptyFile,
    Unreadable,
    /// The destination exists and overwriting is disabled.
    AlreadyExists,
    /// Cancellation was requested before the job started.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::PatternMismatch => "does not match pattern",
            Self::Unsupported => "unsupported file type",
            Self::CategoryMismatch => "different category",
            Self::EmptyFile => "empty file",
            Self::Unreadable => "unreadable",
            Self::AlreadyExists => "destination already exists",
            Self::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

/// Final state of one discovered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum FileStatus {
    Converted,
    Failed,
    Skipped(SkipReason),
}

/// What happened to one discovered file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    /// Source size at enumeration time, zero when it could not be read.
    pub size: u64,
    #[serde(flatten)]
    pub status: FileStatus,
    /// Present for every file that went through the pipeline.
    pub outcome: Option<ConversionOutcome>,
}

impl FileReport {
    pub fn skipped(source: PathBuf, destination: Option<PathBuf>, reason: SkipReason) -> Self {
        Self {
            source,
            destination,
            size: 0,
            status: FileStatus::Skipped(reason),
            outcome: None,
        }
    }

    pub fn finished(size: u64, outcome: ConversionOutcome) -> Self {
        let status = if outcome.success {
            FileStatus::Converted
        } else {
            FileStatus::Failed
        };
        Self {
            source: outcome.source.clone(),
            destination: Some(outcome.destination.clone()),
            size,
            status,
            outcome: Some(outcome),
        }
    }

    /// Error kind for failures and cancellations.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self.status {
            FileStatus::Failed => self.outcome.as_ref().and_then(|o| o.error),
            FileStatus::Skipped(SkipReason::Cancelled) => Some(ErrorKind::Cancelled),
            _ => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self.status {
            FileStatus::Skipped(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Read-only snapshot of a finished batch.
///
/// `successful + failed + skipped == total` always holds.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    /// One report per discovered file, sorted by source path.
    pub entries: Vec<FileReport>,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
}

impl BatchResult {
    /// Share of attempted conversions that succeeded, in `0.0..=1.0`.
    pub fn success_rate(&self) -> f64 {
        let attempted = self.successful + self.failed;
        if attempted == 0 {
            return 0.0;
        }
        self.successful as f64 / attempted as f64
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }

    /// Bytes read from sources that converted successfully.
    pub fn bytes_in(&self) -> u64 {
        self.entries
            .iter()
            .filter(|e| e.status == FileStatus::Converted)
            .map(|e| e.size)
            .sum()
    }

    /// Bytes written to verified outputs.
    pub fn bytes_out(&self) -> u64 {
        self.outcomes()
            .filter(|o| o.success)
            .filter_map(|o| o.output.as_ref())
            .map(|o| o.size)
            .sum()
    }

    /// Every outcome produced by the pipeline.
    pub fn outcomes(&self) -> impl Iterator<Item = &ConversionOutcome> {
        self.entries.iter().filter_map(|e| e.outcome.as_ref())
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.entries
            .iter()
            .filter(|e| e.status == FileStatus::Failed)
    }

    pub fn failures_by_kind(&self) -> BTreeMap<ErrorKind, usize> {
        let mut counts = BTreeMap::new();
        for kind in self.failures().filter_map(FileReport::error_kind) {
            *counts.entry(kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn skipped_by_reason(&self) -> BTreeMap<SkipReason, usize> {
        let mut counts = BTreeMap::new();
        for reason in self.entries.iter().filter_map(FileReport::skip_reason) {
            *counts.entry(reason).or_insert(0) += 1;
        }
        counts
    }

    pub fn entry(&self, source: &std::path::Path) -> Option<&FileReport> {
        self.entries.iter().find(|e| e.source == source)
    }
}

/// Mutable counts owned by the thread aggregating a running batch.
#[derive(Debug)]
pub(crate) struct BatchAccumulator {
    total: usize,
    successful: usize,
    failed: usize,
    skipped: usize,
    entries: Vec<FileReport>,
    started_at: DateTime<Utc>,
}

impl BatchAccumulator {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            total,
            successful: 0,
            failed: 0,
            skipped: 0,
            entries: Vec::with_capacity(total),
            started_at: Utc::now(),
        }
    }

    pub(crate) fn push(&mut self, report: FileReport) {
        match report.status {
            FileStatus::Converted => self.successful += 1,
            FileStatus::Failed => self.failed += 1,
            FileStatus::Skipped(_) => self.skipped += 1,
        }
        self.entries.push(report);
    }

    pub(crate) fn recorded(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn finish(mut self, duration: Duration, cancelled: bool) -> BatchResult {
        debug_assert_eq!(self.successful + self.failed + self.skipped, self.total);
        self.entries.sort_by(|a, b| a.source.cmp(&b.source));
        BatchResult {
            total: self.total,
            successful: self.successful,
            failed: self.failed,
            skipped: self.skipped,
            entries: self.entries,
            duration,
            cancelled,
            started_at: self.started_at,
        }
    }
}
