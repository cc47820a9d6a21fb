use super::checkpoint::{Checkpoint, CheckpointRecord};
use super::job::{ConversionJob, ConversionOutcome};
use fileforge_codecs::MediaSummary;
use fileforge_common::signature::{self, read_header};
use fileforge_common::FileDescriptor;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;

/// Result of one check: an optional note on success, a message on failure.
pub type CheckResult = Result<Option<String>, String>;

/// A checkpoint implementation. State produced by earlier checks (input
/// summary, output snapshot) is passed forward through the context.
pub type CheckFn = fn(&ConversionJob, &mut CheckContext<'_>) -> CheckResult;

/// Durations of media may drift this much (relative) through a transcode.
const DURATION_TOLERANCE: f64 = 0.05;

/// Ordered checks. The pipeline never reorders or skips entries.
pub const CHECKS: [(Checkpoint, CheckFn); 6] = [
    (Checkpoint::InputValidated, input_validated),
    (Checkpoint::OutputFormatValidated, output_format_validated),
    (Checkpoint::OutputPathPrepared, output_path_prepared),
    (Checkpoint::ConversionExecuted, conversion_executed),
    (Checkpoint::OutputValidated, output_validated),
    (Checkpoint::IntegrityVerified, integrity_verified),
];

/// State carried between checks of a single job.
#[derive(Debug)]
pub struct CheckContext<'a> {
    pub pipeline: &'a ValidationPipeline,
    pub input: Option<MediaSummary>,
    pub output: Option<FileDescriptor>,
    pub output_summary: Option<MediaSummary>,
}

impl<'a> CheckContext<'a> {
    pub fn new(pipeline: &'a ValidationPipeline) -> Self {
        Self {
            pipeline,
            input: None,
            output: None,
            output_summary: None,
        }
    }
}

/// Runs the checkpoint sequence around one adapter call.
#[derive(Debug, Clone, Default)]
pub struct ValidationPipeline {
    max_input_bytes: Option<u64>,
}

impl ValidationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject sources larger than `bytes` at input validation.
    pub fn with_max_input_bytes(mut self, bytes: Option<u64>) -> Self {
        self.max_input_bytes = bytes;
        self
    }

    /// Execute every checkpoint in order, stopping at the first failure.
    ///
    /// When the job asks for it, the source is deleted only after the last
    /// checkpoint has passed.
    pub fn run(&self, job: ConversionJob) -> ConversionOutcome {
        let started = Instant::now();
        let mut ctx = CheckContext::new(self);
        let mut checkpoints = Vec::with_capacity(CHECKS.len());
        let mut error = None;

        tracing::debug!(
            "Converting {:?} -> {:?} with {}",
            job.source.path,
            job.destination,
            job.adapter.name()
        );

        for (checkpoint, check) in CHECKS {
            let step = Instant::now();
            match check(&job, &mut ctx) {
                Ok(note) => {
                    tracing::trace!("{:?}: {} passed", job.source.path, checkpoint);
                    checkpoints.push(CheckpointRecord::pass(checkpoint, note, step.elapsed()));
                }
                Err(message) => {
                    tracing::warn!(
                        "{:?}: {} failed: {}",
                        job.source.path,
                        checkpoint,
                        message
                    );
                    checkpoints.push(CheckpointRecord::fail(checkpoint, message, step.elapsed()));
                    error = Some(checkpoint.failure_kind());
                    break;
                }
            }
        }

        let success = error.is_none();
        let converted = checkpoints
            .iter()
            .any(|c| c.checkpoint == Checkpoint::ConversionExecuted && c.passed);
        if !success && converted {
            // A rejected output must not look like a finished conversion.
            match std::fs::remove_file(&job.destination) {
                Ok(()) => tracing::debug!("Removed rejected output {:?}", job.destination),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    "Could not remove rejected output {:?}: {}",
                    job.destination,
                    e
                ),
            }
        }

        let mut original_removed = false;
        if success && job.options.delete_original {
            match std::fs::remove_file(&job.source.path) {
                Ok(()) => {
                    tracing::debug!("Removed original {:?}", job.source.path);
                    original_removed = true;
                }
                Err(e) => tracing::warn!("Could not remove original {:?}: {}", job.source.path, e),
            }
        }

        ConversionOutcome {
            source: job.source.path,
            destination: job.destination,
            success,
            checkpoints,
            elapsed: started.elapsed(),
            output: ctx.output,
            error,
            original_removed,
        }
    }
}

/// Source exists, is readable, is unchanged since the snapshot, and its
/// content matches its declared format.
pub fn input_validated(job: &ConversionJob, ctx: &mut CheckContext<'_>) -> CheckResult {
    let source = &job.source;
    let metadata = std::fs::metadata(&source.path)
        .map_err(|e| format!("cannot access {}: {}", source.path.display(), e))?;
    if !metadata.is_file() {
        return Err(format!("{} is not a regular file", source.path.display()));
    }
    if metadata.len() == 0 {
        return Err("source is empty".to_string());
    }
    if let Some(limit) = ctx.pipeline.max_input_bytes {
        if metadata.len() > limit {
            return Err(format!(
                "source is {} bytes, limit is {}",
                metadata.len(),
                limit
            ));
        }
    }
    match source.has_changed() {
        Ok(false) => {}
        Ok(true) => return Err("source changed after it was scanned".to_string()),
        Err(e) => return Err(e.to_string()),
    }

    if !job.adapter.supports_input(&source.format) {
        return Err(format!(
            "{} adapter cannot read {}",
            job.adapter.name(),
            source.format
        ));
    }

    let header = read_header(&source.path).map_err(|e| e.to_string())?;
    if !signature::matches(&source.format, &header) {
        return Err(format!("content is not valid {}", source.format));
    }

    let summary = job
        .adapter
        .inspect(&source.path)
        .map_err(|e| format!("cannot parse {}: {}", source.format, e))?;
    ctx.input = Some(summary);

    Ok(Some(format!("{} bytes of {}", metadata.len(), source.format)))
}

/// The adapter can write the target format from this source format.
pub fn output_format_validated(job: &ConversionJob, _ctx: &mut CheckContext<'_>) -> CheckResult {
    if !job.adapter.supports_output(&job.target) {
        return Err(format!(
            "{} adapter cannot write {}",
            job.adapter.name(),
            job.target
        ));
    }
    if !job.adapter.supports_conversion(&job.source.format, &job.target) {
        return Err(format!(
            "no conversion from {} to {}",
            job.source.format, job.target
        ));
    }
    Ok(None)
}

/// The destination directory exists and nothing is overwritten by accident.
pub fn output_path_prepared(job: &ConversionJob, _ctx: &mut CheckContext<'_>) -> CheckResult {
    let dest = &job.destination;
    if same_file(dest, &job.source.path) {
        return Err("destination is the source file".to_string());
    }

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create {}: {}", parent.display(), e))?;
    }

    match std::fs::metadata(dest) {
        Ok(meta) if meta.is_dir() => Err(format!("{} is a directory", dest.display())),
        Ok(_) if !job.options.overwrite => {
            Err(format!("{} already exists", dest.display()))
        }
        Ok(_) => Ok(Some("existing file will be replaced".to_string())),
        Err(_) => Ok(None),
    }
}

/// Run the adapter. Errors and panics become the failure message verbatim.
pub fn conversion_executed(job: &ConversionJob, ctx: &mut CheckContext<'_>) -> CheckResult {
    let started = Instant::now();
    let result = catch_unwind(AssertUnwindSafe(|| {
        job.adapter
            .convert(&job.source.path, &job.destination, &job.options)
    }));

    match result {
        Ok(Ok(output)) => {
            let note = format!("{} bytes in {:.2?}", output.size, started.elapsed());
            ctx.output = Some(output);
            Ok(Some(note))
        }
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => Err(panic_message(panic.as_ref())),
    }
}

/// The output exists and parses as the target format.
pub fn output_validated(job: &ConversionJob, ctx: &mut CheckContext<'_>) -> CheckResult {
    let header = read_header(&job.destination)
        .map_err(|e| format!("cannot read output: {}", e))?;
    if !signature::matches(&job.target, &header) {
        return Err(format!("output is not valid {}", job.target));
    }

    let summary = job
        .adapter
        .inspect(&job.destination)
        .map_err(|e| format!("cannot parse output: {}", e))?;
    ctx.output_summary = Some(summary);
    Ok(None)
}

/// Cheap invariants between input and output.
pub fn integrity_verified(job: &ConversionJob, ctx: &mut CheckContext<'_>) -> CheckResult {
    let output = ctx
        .output_summary
        .as_ref()
        .ok_or_else(|| "output was not inspected".to_string())?;
    if output.size == 0 {
        return Err("output is empty".to_string());
    }

    let mut notes = vec![format!("{} bytes", output.size)];
    let input = ctx.input.as_ref();

    if let (Some((in_w, in_h)), Some((out_w, out_h))) =
        (input.and_then(MediaSummary::dimensions), output.dimensions())
    {
        let (max_w, max_h) = job.options.fit_dimensions(in_w, in_h);
        if out_w == 0 || out_h == 0 || out_w > max_w || out_h > max_h {
            return Err(format!(
                "output is {out_w}x{out_h}, expected at most {max_w}x{max_h}"
            ));
        }
        notes.push(format!("{out_w}x{out_h}"));
    }

    if let (Some(in_pages), Some(out_pages)) = (input.and_then(|i| i.pages), output.pages) {
        if in_pages != out_pages {
            return Err(format!("page count changed from {in_pages} to {out_pages}"));
        }
        notes.push(format!("{out_pages} pages"));
    }

    if let (Some(in_secs), Some(out_secs)) = (input.and_then(|i| i.duration), output.duration) {
        let tolerance = (in_secs * DURATION_TOLERANCE).max(1.0);
        if (in_secs - out_secs).abs() > tolerance {
            return Err(format!(
                "duration changed from {in_secs:.1}s to {out_secs:.1}s"
            ));
        }
        notes.push(format!("{out_secs:.1}s"));
    }

    Ok(Some(notes.join(", ")))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("adapter panicked: {detail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use fileforge_codecs::{CodecAdapter, CodecError, ConversionOptions};
    use fileforge_common::{FileCategory, FormatTag};
    use std::path::PathBuf;
    use std::sync::Arc;

    struct TextAdapter;

    impl CodecAdapter for TextAdapter {
        fn name(&self) -> &str {
            "text"
        }
        fn category(&self) -> FileCategory {
            FileCategory::Document
        }
        fn input_formats(&self) -> &[&'static str] {
            &["txt"]
        }
        fn output_formats(&self) -> &[&'static str] {
            &["md"]
        }
        fn convert(
            &self,
            source: &Path,
            dest: &Path,
            _options: &ConversionOptions,
        ) -> fileforge_codecs::Result<FileDescriptor> {
            let text = std::fs::read_to_string(source)?;
            if text.contains("explode") {
                panic!("boom");
            }
            if text.contains("refuse") {
                return Err(CodecError::tool_failed("text", "refused"));
            }
            std::fs::write(dest, text)?;
            Ok(FileDescriptor::snapshot(dest)?)
        }
    }

    fn job(dir: &Path, contents: &str, options: ConversionOptions) -> ConversionJob {
        let source = dir.join("in.txt");
        std::fs::write(&source, contents).unwrap();
        ConversionJob::new(
            FileDescriptor::snapshot(&source).unwrap(),
            dir.join("out").join("in.md"),
            FormatTag::new("md").unwrap(),
            options,
            Arc::new(TextAdapter),
        )
    }

    fn summary(width: u32, height: u32) -> MediaSummary {
        MediaSummary {
            size: 10,
            width: Some(width),
            height: Some(height),
            ..Default::default()
        }
    }

    #[test]
    fn test_success_records_all_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = ValidationPipeline::new().run(job(dir.path(), "hello", Default::default()));

        assert!(outcome.success);
        let seen: Vec<_> = outcome.checkpoints.iter().map(|c| c.checkpoint).collect();
        assert_eq!(seen, Checkpoint::ALL);
        assert!(outcome.checkpoints.iter().all(|c| c.passed));
        assert_eq!(std::fs::read_to_string(dir.path().join("out/in.md")).unwrap(), "hello");
    }

    #[test]
    fn test_binary_content_fails_input_validation() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = ValidationPipeline::new().run(job(dir.path(), "a\0b", Default::default()));

        assert!(!outcome.success);
        assert_eq!(outcome.checkpoints.len(), 1);
        assert_eq!(outcome.error, Some(crate::pipeline::ErrorKind::InvalidInput));
    }

    #[test]
    fn test_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = ValidationPipeline::new()
            .with_max_input_bytes(Some(3))
            .run(job(dir.path(), "too long", Default::default()));
        assert_eq!(outcome.error, Some(crate::pipeline::ErrorKind::InvalidInput));
        assert!(outcome.message().unwrap().contains("limit"));
    }

    #[test]
    fn test_adapter_error_is_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = ValidationPipeline::new().run(job(dir.path(), "refuse", Default::default()));

        let failed = outcome.failed_checkpoint().unwrap();
        assert_eq!(failed.checkpoint, Checkpoint::ConversionExecuted);
        assert_eq!(
            failed.message.as_deref(),
            Some("tool execution failed: text: refused")
        );
        assert_eq!(outcome.checkpoints.len(), 4);
    }

    #[test]
    fn test_adapter_panic_is_contained() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = ValidationPipeline::new().run(job(dir.path(), "explode", Default::default()));

        assert_eq!(outcome.error, Some(crate::pipeline::ErrorKind::ConversionFailed));
        assert_eq!(outcome.message(), Some("adapter panicked: boom"));
    }

    #[test]
    fn test_output_path_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), "hello", Default::default());
        std::fs::create_dir_all(dir.path().join("out")).unwrap();
        std::fs::write(&job.destination, "old").unwrap();

        let pipeline = ValidationPipeline::new();
        let mut ctx = CheckContext::new(&pipeline);
        let err = output_path_prepared(&job, &mut ctx).unwrap_err();
        assert!(err.contains("already exists"));
    }

    #[test]
    fn test_output_path_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), "hello", Default::default());

        let pipeline = ValidationPipeline::new();
        let mut ctx = CheckContext::new(&pipeline);
        output_path_prepared(&job, &mut ctx).unwrap();
        assert!(dir.path().join("out").is_dir());
    }

    #[test]
    fn test_integrity_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let options = ConversionOptions {
            width: Some(100),
            ..Default::default()
        };
        let job = job(dir.path(), "hello", options);
        let pipeline = ValidationPipeline::new();

        let mut ctx = CheckContext::new(&pipeline);
        ctx.input = Some(summary(400, 200));
        ctx.output_summary = Some(summary(100, 50));
        assert!(integrity_verified(&job, &mut ctx).is_ok());

        ctx.output_summary = Some(summary(400, 200));
        let err = integrity_verified(&job, &mut ctx).unwrap_err();
        assert!(err.contains("expected at most 100x50"));
    }

    #[test]
    fn test_integrity_pages_and_duration() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), "hello", Default::default());
        let pipeline = ValidationPipeline::new();
        let mut ctx = CheckContext::new(&pipeline);

        ctx.input = Some(MediaSummary {
            size: 1,
            pages: Some(3),
            ..Default::default()
        });
        ctx.output_summary = Some(MediaSummary {
            size: 1,
            pages: Some(2),
            ..Default::default()
        });
        assert!(integrity_verified(&job, &mut ctx).is_err());

        ctx.input = Some(MediaSummary {
            size: 1,
            duration: Some(60.0),
            ..Default::default()
        });
        ctx.output_summary = Some(MediaSummary {
            size: 1,
            duration: Some(61.5),
            ..Default::default()
        });
        assert!(integrity_verified(&job, &mut ctx).is_ok());

        ctx.output_summary = Some(MediaSummary {
            size: 1,
            duration: Some(30.0),
            ..Default::default()
        });
        assert!(integrity_verified(&job, &mut ctx).is_err());
    }

    #[test]
    fn test_same_file_detection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "x").unwrap();
        let indirect: PathBuf = dir.path().join(".").join("a.txt");
        assert!(same_file(&path, &indirect));
        assert!(!same_file(&path, &dir.path().join("b.txt")));
    }
}
