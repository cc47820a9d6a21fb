//! Batch scheduling: enumerate, plan, fan out, aggregate.
//!
//! Jobs flow from a dispatcher thread to a fixed pool of workers over a
//! rendezvous channel, so a job is only handed out when a worker is ready
//! for it. Outcomes flow back over a second channel to the calling thread,
//! which owns the accumulator and the progress reporter; nothing else
//! mutates batch state.

use super::error::BatchError;
use super::handle::{BatchHandle, CancelToken};
use super::result::{BatchAccumulator, BatchResult, FileReport, SkipReason};
use super::spec::BatchSpec;
use crate::pipeline::{ConversionJob, ConversionOutcome, ValidationPipeline};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::scanner::{scan, ScanEntry, ScanOptions};
use crossbeam_channel::{Receiver, SendError, Sender};
use fileforge_codecs::AdapterRegistry;
use fileforge_common::FormatTag;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Runs batches against a set of adapters.
#[derive(Debug, Clone)]
pub struct BatchEngine {
    registry: AdapterRegistry,
    pipeline: ValidationPipeline,
}

/// Everything decided before the first job starts.
struct Plan {
    total: usize,
    skipped: Vec<FileReport>,
    jobs: Vec<ConversionJob>,
}

/// Message from a worker or the dispatcher to the aggregator.
enum Completion {
    Finished {
        size: u64,
        outcome: ConversionOutcome,
    },
    NotStarted {
        source: PathBuf,
        destination: PathBuf,
    },
}

impl Completion {
    fn not_started(job: ConversionJob) -> Self {
        Self::NotStarted {
            source: job.source.path,
            destination: job.destination,
        }
    }
}

impl BatchEngine {
    pub fn new(registry: AdapterRegistry) -> Self {
        Self {
            registry,
            pipeline: ValidationPipeline::new(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: ValidationPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Run `spec` to completion on the calling thread.
    pub fn run(
        &self,
        spec: &BatchSpec,
        reporter: &dyn ProgressReporter,
    ) -> Result<BatchResult, BatchError> {
        self.run_with_cancel(spec, reporter, &CancelToken::new())
    }

    /// Run `spec`, checking `cancel` before each job is dispatched.
    ///
    /// Cancellation never interrupts a running job. Jobs that never started
    /// are reported as skipped with [`SkipReason::Cancelled`].
    pub fn run_with_cancel(
        &self,
        spec: &BatchSpec,
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<BatchResult, BatchError> {
        let started = Instant::now();
        let plan = self.plan(spec)?;

        let mut acc = BatchAccumulator::new(plan.total);
        for report in plan.skipped {
            acc.push(report);
        }

        if !plan.jobs.is_empty() {
            let workers = spec.worker_count(plan.jobs.len());
            let pipeline = match spec.max_input_bytes {
                Some(limit) => self.pipeline.clone().with_max_input_bytes(Some(limit)),
                None => self.pipeline.clone(),
            };
            info!(
                "Converting {} of {} files to {} with {} workers",
                plan.jobs.len(),
                plan.total,
                spec.target_format,
                workers
            );
            execute(plan.jobs, workers, &pipeline, reporter, cancel, &mut acc)?;
        }

        if acc.recorded() != plan.total {
            return Err(BatchError::Panicked);
        }

        let result = acc.finish(started.elapsed(), cancel.is_cancelled());
        info!(
            "Batch finished in {:.1?}: {} converted, {} failed, {} skipped{}",
            result.duration,
            result.successful,
            result.failed,
            result.skipped,
            if result.cancelled { " (cancelled)" } else { "" }
        );
        Ok(result)
    }

    /// Validate `spec` and run it on a background thread.
    pub fn spawn(
        &self,
        spec: BatchSpec,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<BatchHandle, BatchError> {
        spec.validate(&self.registry)?;

        let engine = self.clone();
        let token = CancelToken::new();
        let thread_token = token.clone();
        let thread = std::thread::Builder::new()
            .name("fileforge-batch".to_string())
            .spawn(move || engine.run_with_cancel(&spec, reporter.as_ref(), &thread_token))
            .map_err(BatchError::Spawn)?;

        Ok(BatchHandle::new(token, thread))
    }

    fn plan(&self, spec: &BatchSpec) -> Result<Plan, BatchError> {
        spec.validate(&self.registry)?;

        let root = spec
            .input_root
            .canonicalize()
            .map_err(|_| BatchError::InputRootMissing(spec.input_root.clone()))?;
        let output_root = resolve_output_root(&spec.output_root());
        let pattern = spec.compile_pattern()?;
        let category = spec.effective_category();
        let adapter = self
            .registry
            .get(category)
            .ok_or(BatchError::NoAdapter(category))?;

        let nested_output = output_root != root && output_root.starts_with(&root);
        let mut entries = scan(&ScanOptions {
            root: &root,
            recursive: spec.recursive,
            pattern: pattern.as_ref(),
            category: Some(category),
            exclude: nested_output.then_some(output_root.as_path()),
        });
        if let Some(only) = &spec.only {
            let only: HashSet<&Path> = only.iter().map(PathBuf::as_path).collect();
            entries.retain(|entry| only.contains(entry.path()));
        }

        let total = entries.len();
        let mut skipped = Vec::new();
        let mut jobs = Vec::new();
        let mut claimed = HashSet::new();

        for entry in entries {
            let source = match entry {
                ScanEntry::Skipped { path, reason } => {
                    skipped.push(FileReport::skipped(path, None, reason));
                    continue;
                }
                ScanEntry::Candidate(source) => source,
            };

            let destination = destination_for(
                &root,
                &output_root,
                &source.path,
                &spec.target_format,
                &mut claimed,
            );
            if !spec.options.overwrite && destination.exists() {
                debug!("Skipping {:?}: {:?} already exists", source.path, destination);
                skipped.push(FileReport::skipped(
                    source.path,
                    Some(destination),
                    SkipReason::AlreadyExists,
                ));
                continue;
            }

            let mut options = spec.options.clone();
            options.delete_original |= spec.delete_original;
            options.output_format = Some(spec.target_format.clone());

            jobs.push(ConversionJob::new(
                source,
                destination,
                spec.target_format.clone(),
                options,
                Arc::clone(&adapter),
            ));
        }

        Ok(Plan {
            total,
            skipped,
            jobs,
        })
    }
}

/// Fan `jobs` out over `workers` threads and fold the results into `acc`.
fn execute(
    jobs: Vec<ConversionJob>,
    workers: usize,
    pipeline: &ValidationPipeline,
    reporter: &dyn ProgressReporter,
    cancel: &CancelToken,
    acc: &mut BatchAccumulator,
) -> Result<(), BatchError> {
    let total = jobs.len();
    let (job_tx, job_rx) = crossbeam_channel::bounded::<ConversionJob>(0);
    let (done_tx, done_rx) = crossbeam_channel::unbounded::<Completion>();

    // Channels are moved in so an early return disconnects them before
    // the scope joins its threads.
    std::thread::scope(move |scope| {
        let mut handles = Vec::with_capacity(workers + 1);
        for id in 0..workers {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("fileforge-worker-{id}"))
                .spawn_scoped(scope, move || work(&job_rx, &done_tx, pipeline, cancel))
                .map_err(BatchError::Spawn)?;
            handles.push(handle);
        }
        drop(job_rx);

        let dispatch_tx = done_tx.clone();
        let handle = std::thread::Builder::new()
            .name("fileforge-dispatch".to_string())
            .spawn_scoped(scope, move || dispatch(jobs, &job_tx, &dispatch_tx, cancel))
            .map_err(BatchError::Spawn)?;
        handles.push(handle);
        drop(done_tx);

        let mut completed = 0;
        for completion in done_rx.iter() {
            match completion {
                Completion::Finished { size, outcome } => {
                    completed += 1;
                    reporter.emit(ProgressEvent::from_outcome(completed, total, &outcome));
                    acc.push(FileReport::finished(size, outcome));
                }
                Completion::NotStarted {
                    source,
                    destination,
                } => acc.push(FileReport::skipped(
                    source,
                    Some(destination),
                    SkipReason::Cancelled,
                )),
            }
        }

        let mut panicked = false;
        for handle in handles {
            panicked |= handle.join().is_err();
        }
        if panicked {
            return Err(BatchError::Panicked);
        }
        Ok(())
    })
}

fn dispatch(
    jobs: Vec<ConversionJob>,
    job_tx: &Sender<ConversionJob>,
    done_tx: &Sender<Completion>,
    cancel: &CancelToken,
) {
    let mut pending = jobs.into_iter();
    for job in pending.by_ref() {
        if cancel.is_cancelled() {
            debug!("Cancellation requested, holding back remaining jobs");
            let _ = done_tx.send(Completion::not_started(job));
            break;
        }
        if let Err(SendError(job)) = job_tx.send(job) {
            let _ = done_tx.send(Completion::not_started(job));
            break;
        }
    }
    for job in pending {
        let _ = done_tx.send(Completion::not_started(job));
    }
}

fn work(
    job_rx: &Receiver<ConversionJob>,
    done_tx: &Sender<Completion>,
    pipeline: &ValidationPipeline,
    cancel: &CancelToken,
) {
    for job in job_rx.iter() {
        // A job handed over after cancellation has not started yet.
        let completion = if cancel.is_cancelled() {
            Completion::not_started(job)
        } else {
            let size = job.source.size;
            Completion::Finished {
                size,
                outcome: pipeline.run(job),
            }
        };
        if done_tx.send(completion).is_err() {
            break;
        }
    }
}

/// Mirror `source` from `root` into `output_root` with the target extension.
///
/// Destinations already claimed in this batch get a numeric suffix, so two
/// sources never share an output.
fn destination_for(
    root: &Path,
    output_root: &Path,
    source: &Path,
    target: &FormatTag,
    claimed: &mut HashSet<PathBuf>,
) -> PathBuf {
    let relative = source
        .strip_prefix(root)
        .ok()
        .map(Path::to_path_buf)
        .or_else(|| source.file_name().map(PathBuf::from))
        .unwrap_or_default();
    let base = output_root.join(relative).with_extension(target.as_str());
    if claimed.insert(base.clone()) {
        return base;
    }

    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut n = 1;
    loop {
        let candidate = base.with_file_name(format!("{stem}_{n}.{target}"));
        if claimed.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Absolute form of `path` comparable with a canonical input root, even
/// when the directory does not exist yet.
fn resolve_output_root(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    match (parent.canonicalize(), path.file_name()) {
        (Ok(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}
