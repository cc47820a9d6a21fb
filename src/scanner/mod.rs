//! Input discovery for batch runs.
//!
//! Walks the input root, applies the file pattern and the classifier, and
//! sorts every regular file into either a conversion candidate or a skip
//! with a reason. Every file found is accounted for one way or the other.

mod pattern;

pub use pattern::FilePattern;

use crate::batch::SkipReason;
use fileforge_common::{FileCategory, FileDescriptor};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Prefix of the staging directories adapters create next to outputs.
const STAGING_PREFIX: &str = ".fileforge-";

/// What to look for.
#[derive(Debug, Clone)]
pub struct ScanOptions<'a> {
    pub root: &'a Path,
    pub recursive: bool,
    pub pattern: Option<&'a FilePattern>,
    /// Only files of this category become candidates.
    pub category: Option<FileCategory>,
    /// Subtree to leave out, typically an output root nested in the input.
    pub exclude: Option<&'a Path>,
}

/// One file found during a scan.
#[derive(Debug, Clone)]
pub enum ScanEntry {
    Candidate(FileDescriptor),
    Skipped { path: PathBuf, reason: SkipReason },
}

impl ScanEntry {
    pub fn path(&self) -> &Path {
        match self {
            Self::Candidate(descriptor) => &descriptor.path,
            Self::Skipped { path, .. } => path,
        }
    }
}

/// Scan `options.root`, returning entries in a stable, sorted order.
pub fn scan(options: &ScanOptions<'_>) -> Vec<ScanEntry> {
    let max_depth = if options.recursive { usize::MAX } else { 1 };
    let mut entries = Vec::new();

    let walker = WalkDir::new(options.root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let is_staging = entry.file_type().is_dir()
                && entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX);
            let is_excluded = options
                .exclude
                .is_some_and(|exclude| entry.path().starts_with(exclude));
            !is_staging && !is_excluded
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable directory entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        let scanned = classify_entry(path, options);
        if let ScanEntry::Skipped { reason, .. } = &scanned {
            debug!("Skipping {:?}: {}", path, reason);
        }
        entries.push(scanned);
    }

    entries
}

fn classify_entry(path: &Path, options: &ScanOptions<'_>) -> ScanEntry {
    let skip = |reason| ScanEntry::Skipped {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(pattern) = options.pattern {
        let relative = path.strip_prefix(options.root).unwrap_or(path);
        if !pattern.matches(relative) {
            return skip(SkipReason::PatternMismatch);
        }
    }

    let descriptor = match FileDescriptor::snapshot(path) {
        Ok(descriptor) => descriptor,
        Err(_) => return skip(SkipReason::Unreadable),
    };

    if !descriptor.category.is_known() {
        return skip(SkipReason::Unsupported);
    }
    if options
        .category
        .is_some_and(|category| category != descriptor.category)
    {
        return skip(SkipReason::CategoryMismatch);
    }
    if descriptor.size == 0 {
        return skip(SkipReason::EmptyFile);
    }
    if std::fs::File::open(path).is_err() {
        return skip(SkipReason::Unreadable);
    }

    ScanEntry::Candidate(descriptor)
}
