//! Batch engine scenarios against real directories.

mod common;

use assert_matches::assert_matches;
use common::*;
use fileforge::batch::{BatchError, BatchSpec, FileStatus, SkipReason};
use fileforge::pipeline::{Checkpoint, ErrorKind};
use fileforge::progress::{ChannelReporter, NullReporter};
use fileforge_common::FormatTag;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn tag(s: &str) -> FormatTag {
    FormatTag::new(s).unwrap()
}

#[test]
fn test_mixed_batch_counts() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input");
    write_png(&input.join("a.png"), 8, 8);
    write_png(&input.join("b.png"), 8, 8);
    write_png(&input.join("c.png"), 8, 8);
    write_corrupt(&input.join("broken.png"));
    std::fs::write(input.join("notes.xyz"), "hello").unwrap();

    let spec = BatchSpec::new(&input, tag("jpg")).with_output_root(dir.path().join("out"));
    let result = image_engine().run(&spec, &NullReporter).unwrap();

    assert_counts(&result);
    assert_eq!(result.total, 5);
    assert_eq!(result.successful, 3);
    assert_eq!(result.failed, 1);
    assert_eq!(result.skipped, 1);
    assert!(!result.cancelled);

    let broken = result
        .entries
        .iter()
        .find(|e| e.source.ends_with("broken.png"))
        .unwrap();
    assert_eq!(broken.status, FileStatus::Failed);
    let outcome = broken.outcome.as_ref().unwrap();
    assert_eq!(outcome.checkpoints.len(), 1);
    assert_eq!(outcome.failed_checkpoint().unwrap().checkpoint, Checkpoint::InputValidated);
    assert_eq!(outcome.error, Some(ErrorKind::InvalidInput));
    assert!(outcome.message().is_some());

    let unsupported = result
        .entries
        .iter()
        .find(|e| e.source.ends_with("notes.xyz"))
        .unwrap();
    assert_eq!(unsupported.status, FileStatus::Skipped(SkipReason::Unsupported));

    for outcome in result.outcomes().filter(|o| o.success) {
        let seen: Vec<_> = outcome.checkpoints.iter().map(|c| c.checkpoint).collect();
        assert_eq!(seen, Checkpoint::ALL);
        assert!(outcome.destination.exists());
    }
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        assert!(dir.path().join("out").join(name).exists(), "{name} missing");
    }
    assert!(!dir.path().join("out/broken.jpg").exists());
    assert_eq!(result.failures_by_kind().get(&ErrorKind::InvalidInput), Some(&1));
}

#[test]
fn test_delete_original_after_verification() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input");
    let source = input.join("photo.png");
    write_png(&source, 6, 4);

    let spec = BatchSpec::new(&input, tag("bmp"))
        .with_output_root(dir.path().join("out"))
        .delete_original(true);
    let result = image_engine().run(&spec, &NullReporter).unwrap();

    assert_eq!(result.successful, 1);
    let outcome = result.outcomes().next().unwrap();
    assert!(outcome.passed(Checkpoint::IntegrityVerified));
    assert!(outcome.original_removed);
    assert!(!source.exists());
    assert!(dir.path().join("out/photo.bmp").exists());
}

#[test]
fn test_failed_conversion_keeps_original() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input");
    let source = input.join("broken.png");
    write_corrupt(&source);

    let spec = BatchSpec::new(&input, tag("jpg"))
        .with_output_root(dir.path().join("out"))
        .delete_original(true);
    let result = image_engine().run(&spec, &NullReporter).unwrap();

    assert_eq!(result.failed, 1);
    assert!(source.exists());
}

#[test]
fn test_existing_destination_is_skipped_without_conversion() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input");
    write_png(&input.join("a.png"), 4, 4);
    std::fs::create_dir_all(dir.path().join("out")).unwrap();
    std::fs::write(dir.path().join("out/a.png"), "previous").unwrap();

    let mock = MockAdapter::new();
    let spec = BatchSpec::new(&input, tag("png")).with_output_root(dir.path().join("out"));
    let result = mock_engine(&mock).run(&spec, &NullReporter).unwrap();

    assert_counts(&result);
    assert_eq!(result.skipped, 1);
    assert_eq!(
        result.entries[0].status,
        FileStatus::Skipped(SkipReason::AlreadyExists)
    );
    assert_eq!(mock.calls(), 0);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("out/a.png")).unwrap(),
        "previous"
    );
}

#[test]
fn test_overwrite_replaces_existing_destination() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input");
    write_png(&input.join("a.png"), 4, 4);
    std::fs::create_dir_all(dir.path().join("out")).unwrap();
    std::fs::write(dir.path().join("out/a.png"), "previous").unwrap();

    let mock = MockAdapter::new();
    let spec = BatchSpec::new(&input, tag("png"))
        .with_output_root(dir.path().join("out"))
        .overwrite(true);
    let result = mock_engine(&mock).run(&spec, &NullReporter).unwrap();

    assert_eq!(result.successful, 1);
    assert_eq!(mock.calls(), 1);
    assert_eq!(
        std::fs::read(dir.path().join("out/a.png")).unwrap(),
        std::fs::read(input.join("a.png")).unwrap()
    );
}

#[test]
fn test_second_run_is_idempotent() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input");
    png_set(&input, 4);

    let mock = MockAdapter::new();
    let engine = mock_engine(&mock);
    let spec = BatchSpec::new(&input, tag("png")).with_output_root(dir.path().join("out"));

    let first = engine.run(&spec, &NullReporter).unwrap();
    assert_eq!(first.successful, 4);

    let second = engine.run(&spec, &NullReporter).unwrap();
    assert_counts(&second);
    assert_eq!(second.total, 4);
    assert_eq!(second.skipped, 4);
    assert!(second
        .entries
        .iter()
        .all(|e| e.status == FileStatus::Skipped(SkipReason::AlreadyExists)));
    assert_eq!(mock.calls(), 4);
}

#[test]
fn test_fewer_workers_than_jobs() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input");
    let sources = png_set(&input, 25);

    let mock = MockAdapter::new();
    let (reporter, events) = ChannelReporter::channel();
    let spec = BatchSpec::new(&input, tag("png"))
        .with_output_root(dir.path().join("out"))
        .with_workers(3);
    let result = mock_engine(&mock).run(&spec, &reporter).unwrap();

    assert_counts(&result);
    assert_eq!(result.successful, 25);
    assert_eq!(mock.calls(), 25);

    let seen: HashSet<_> = result.entries.iter().map(|e| e.source.clone()).collect();
    assert_eq!(seen.len(), sources.len());

    let completed: Vec<_> = events.try_iter().map(|e| e.completed).collect();
    assert_eq!(completed, (1..=25).collect::<Vec<_>>());
}

#[test]
fn test_single_worker() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input");
    png_set(&input, 5);

    let mock = MockAdapter::new();
    let spec = BatchSpec::new(&input, tag("png"))
        .with_output_root(dir.path().join("out"))
        .with_workers(1);
    let result = mock_engine(&mock).run(&spec, &NullReporter).unwrap();

    assert_counts(&result);
    assert_eq!(result.successful, 5);
}

#[test]
fn test_cancellation_stops_dispatch() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input");
    png_set(&input, 10);

    let mock = MockAdapter::gated();
    let spec = BatchSpec::new(&input, tag("png"))
        .with_output_root(dir.path().join("out"))
        .with_workers(2);
    let handle = mock_engine(&mock)
        .spawn(spec, Arc::new(NullReporter))
        .unwrap();

    assert!(wait_for(Duration::from_secs(10), || mock.calls() == 2));
    handle.cancel();
    mock.release();
    let result = handle.wait().unwrap();

    assert_counts(&result);
    assert!(result.cancelled);
    assert_eq!(result.total, 10);
    assert_eq!(result.successful, 2);
    assert_eq!(result.failed, 0);
    assert_eq!(result.skipped, 8);
    assert_eq!(
        result.skipped_by_reason().get(&SkipReason::Cancelled),
        Some(&8)
    );
    assert_eq!(mock.calls(), 2);
    for entry in result.entries.iter().filter(|e| e.status != FileStatus::Converted) {
        assert_eq!(entry.error_kind(), Some(ErrorKind::Cancelled));
        assert!(!entry.destination.as_ref().unwrap().exists());
    }
}

#[test]
fn test_retry_failed_subset() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input");
    write_png(&input.join("good.png"), 4, 4);
    write_corrupt(&input.join("bad.png"));

    let engine = image_engine();
    let spec = BatchSpec::new(&input, tag("gif")).with_output_root(dir.path().join("out"));
    let first = engine.run(&spec, &NullReporter).unwrap();
    assert_eq!((first.successful, first.failed), (1, 1));

    let retry = spec.retry_failed(&first).unwrap();
    write_png(&input.join("bad.png"), 4, 4);
    let second = engine.run(&retry, &NullReporter).unwrap();

    assert_counts(&second);
    assert_eq!(second.total, 1);
    assert_eq!(second.successful, 1);
    assert!(second.entries[0].source.ends_with("bad.png"));
    assert!(spec.retry_failed(&second).is_none());
}

#[test]
fn test_rejected_output_is_removed_and_retried() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input");
    write_png(&input.join("a.png"), 4, 4);
    let dest = dir.path().join("out/a.png");

    let mock = MockAdapter::corrupting();
    let engine = mock_engine(&mock);
    let spec = BatchSpec::new(&input, tag("png")).with_output_root(dir.path().join("out"));
    let first = engine.run(&spec, &NullReporter).unwrap();

    assert_eq!(first.failed, 1);
    assert!(!dest.exists());
    assert!(input.join("a.png").exists());

    mock.set_corrupt(false);
    let retry = spec.retry_failed(&first).unwrap();
    let second = engine.run(&retry, &NullReporter).unwrap();

    assert_counts(&second);
    assert_eq!(second.successful, 1);
    assert_eq!(second.skipped, 0);
    assert_eq!(mock.calls(), 2);
    assert!(dest.exists());
}

#[test]
fn test_nested_output_root_is_not_rescanned() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input");
    write_png(&input.join("a.png"), 4, 4);
    write_png(&input.join("sub/b.png"), 4, 4);

    let mock = MockAdapter::new();
    let engine = mock_engine(&mock);
    let spec = BatchSpec::new(&input, tag("png"))
        .with_output_root(input.join("converted"))
        .recursive(true);

    let first = engine.run(&spec, &NullReporter).unwrap();
    assert_eq!(first.successful, 2);
    assert!(input.join("converted/sub/b.png").exists());

    let second = engine.run(&spec, &NullReporter).unwrap();
    assert_eq!(second.total, 2);
    assert_eq!(second.skipped, 2);
}

#[test]
fn test_recursive_flag() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input");
    write_png(&input.join("top.png"), 4, 4);
    write_png(&input.join("deep/inner.png"), 4, 4);

    let mock = MockAdapter::new();
    let engine = mock_engine(&mock);
    let spec = BatchSpec::new(&input, tag("png")).with_output_root(dir.path().join("flat"));
    assert_eq!(engine.run(&spec, &NullReporter).unwrap().total, 1);

    let spec = BatchSpec::new(&input, tag("png"))
        .with_output_root(dir.path().join("tree"))
        .recursive(true);
    let result = engine.run(&spec, &NullReporter).unwrap();
    assert_eq!(result.total, 2);
    assert!(dir.path().join("tree/deep/inner.png").exists());
}

#[test]
fn test_colliding_destinations_are_numbered() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input");
    write_png(&input.join("a.png"), 4, 4);
    write_png(&input.join("a.bmp"), 4, 4);

    let spec = BatchSpec::new(&input, tag("jpg")).with_output_root(dir.path().join("out"));
    let result = image_engine().run(&spec, &NullReporter).unwrap();

    assert_eq!(result.successful, 2);
    let dest_of = |name: &str| {
        result
            .entries
            .iter()
            .find(|e| e.source.ends_with(name))
            .and_then(|e| e.destination.clone())
            .unwrap()
    };
    assert!(dest_of("a.bmp").ends_with("a.jpg"));
    assert!(dest_of("a.png").ends_with("a_1.jpg"));
}

#[test]
fn test_pattern_and_category_filters() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input");
    write_png(&input.join("keep_1.png"), 4, 4);
    write_png(&input.join("other.png"), 4, 4);
    std::fs::write(input.join("keep_notes.txt"), "text").unwrap();
    std::fs::write(input.join("empty.png"), "").unwrap();

    let mock = MockAdapter::new();
    let spec = BatchSpec::new(&input, tag("png"))
        .with_output_root(dir.path().join("out"))
        .with_pattern("keep_*");
    let result = mock_engine(&mock).run(&spec, &NullReporter).unwrap();

    assert_counts(&result);
    assert_eq!(result.total, 4);
    assert_eq!(result.successful, 1);
    let reasons = result.skipped_by_reason();
    assert_eq!(reasons.get(&SkipReason::PatternMismatch), Some(&2));
    assert_eq!(reasons.get(&SkipReason::CategoryMismatch), Some(&1));
}

#[test]
fn test_empty_files_are_skipped() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input");
    std::fs::create_dir_all(&input).unwrap();
    std::fs::write(input.join("empty.png"), "").unwrap();

    let mock = MockAdapter::new();
    let spec = BatchSpec::new(&input, tag("png")).with_output_root(dir.path().join("out"));
    let result = mock_engine(&mock).run(&spec, &NullReporter).unwrap();

    assert_eq!(result.skipped, 1);
    assert_eq!(
        result.entries[0].skip_reason(),
        Some(SkipReason::EmptyFile)
    );
    assert_eq!(mock.calls(), 0);
}

#[test]
fn test_contract_violations_are_fatal() {
    let dir = tempdir().unwrap();
    let engine = image_engine();

    let spec = BatchSpec::new(dir.path().join("missing"), tag("png"));
    assert_matches!(
        engine.run(&spec, &NullReporter),
        Err(BatchError::InputRootMissing(_))
    );
    assert_matches!(
        engine.spawn(spec, Arc::new(NullReporter)),
        Err(BatchError::InputRootMissing(_))
    );

    let spec = BatchSpec::new(dir.path(), tag("mp3"));
    assert_matches!(engine.run(&spec, &NullReporter), Err(BatchError::NoAdapter(_)));
}

#[test]
fn test_empty_directory() {
    let dir = tempdir().unwrap();
    let result = image_engine()
        .run(&BatchSpec::new(dir.path(), tag("png")), &NullReporter)
        .unwrap();
    assert_counts(&result);
    assert_eq!(result.total, 0);
    assert_eq!(result.success_rate(), 0.0);
}
