//! Declarative description of a bulk conversion.

use super::error::BatchError;
use super::result::{BatchResult, FileStatus};
use crate::scanner::FilePattern;
use fileforge_codecs::{AdapterRegistry, ConversionOptions};
use fileforge_common::paths::category_of_extension;
use fileforge_common::{FileCategory, FormatTag};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Suffix of the sibling output directory used when none is given.
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_converted";

/// Worker threads per available CPU when no count is configured.
const WORKERS_PER_CPU: usize = 2;

/// A bulk conversion request.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSpec {
    pub input_root: PathBuf,
    /// Defaults to `<input_root>_converted` next to the input root.
    pub output_root: Option<PathBuf>,
    pub output_suffix: String,
    /// Glob or comma-separated extension list, e.g. `*.png` or `jpg,png`.
    pub pattern: Option<String>,
    pub recursive: bool,
    pub target_format: FormatTag,
    /// Category of files to convert. Derived from the target when unset.
    pub category: Option<FileCategory>,
    pub options: ConversionOptions,
    pub delete_original: bool,
    pub workers: Option<usize>,
    pub max_input_bytes: Option<u64>,
    /// Restrict the batch to these sources; used for retries.
    pub only: Option<Vec<PathBuf>>,
}

impl BatchSpec {
    pub fn new(input_root: impl Into<PathBuf>, target_format: FormatTag) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: None,
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            pattern: None,
            recursive: false,
            target_format,
            category: None,
            options: ConversionOptions::default(),
            delete_original: false,
            workers: None,
            max_input_bytes: None,
            only: None,
        }
    }

    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = Some(root.into());
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_category(mut self, category: FileCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.options.overwrite = overwrite;
        self
    }

    pub fn delete_original(mut self, delete: bool) -> Self {
        self.delete_original = delete;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_max_input_bytes(mut self, bytes: Option<u64>) -> Self {
        self.max_input_bytes = bytes;
        self
    }

    /// Sibling of `input_root` named after it plus `suffix`.
    ///
    /// ```
    /// use fileforge::batch::BatchSpec;
    /// use std::path::Path;
    ///
    /// let out = BatchSpec::default_output_root(Path::new("/photos/2024"), "_converted");
    /// assert_eq!(out, Path::new("/photos/2024_converted"));
    /// ```
    pub fn default_output_root(input_root: &Path, suffix: &str) -> PathBuf {
        let name = input_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let dir = format!("{name}{suffix}");
        match input_root.parent() {
            Some(parent) => parent.join(dir),
            None => PathBuf::from(dir),
        }
    }

    pub fn output_root(&self) -> PathBuf {
        self.output_root
            .clone()
            .unwrap_or_else(|| Self::default_output_root(&self.input_root, &self.output_suffix))
    }

    /// The category files must have to be converted.
    pub fn effective_category(&self) -> FileCategory {
        self.category
            .unwrap_or_else(|| category_of_extension(self.target_format.as_str()))
    }

    /// Number of worker threads for `jobs` jobs.
    ///
    /// Never more than there are jobs, never fewer than one.
    pub fn worker_count(&self, jobs: usize) -> usize {
        self.workers
            .unwrap_or_else(|| num_cpus::get() * WORKERS_PER_CPU)
            .min(jobs)
            .max(1)
    }

    pub(crate) fn compile_pattern(&self) -> Result<Option<FilePattern>, BatchError> {
        self.pattern
            .as_deref()
            .map(|pattern| {
                FilePattern::new(pattern).map_err(|source| BatchError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Check everything that would make the whole batch meaningless.
    pub fn validate(&self, registry: &AdapterRegistry) -> Result<(), BatchError> {
        if !self.input_root.exists() {
            return Err(BatchError::InputRootMissing(self.input_root.clone()));
        }
        if !self.input_root.is_dir() {
            return Err(BatchError::InputRootNotDirectory(self.input_root.clone()));
        }
        if self.workers == Some(0) {
            return Err(BatchError::InvalidWorkers);
        }
        self.compile_pattern()?;
        self.options.validate()?;

        let category = self.effective_category();
        if !category.is_known() {
            return Err(BatchError::UnknownTargetCategory(self.target_format.clone()));
        }
        let adapter = registry
            .get(category)
            .ok_or(BatchError::NoAdapter(category))?;
        if !adapter.supports_output(&self.target_format) {
            return Err(BatchError::UnsupportedTarget {
                category,
                target: self.target_format.clone(),
            });
        }
        Ok(())
    }

    /// A spec that re-runs only the files that failed in `result`.
    ///
    /// Returns `None` when nothing failed.
    pub fn retry_failed(&self, result: &BatchResult) -> Option<BatchSpec> {
        let failed: Vec<PathBuf> = result
            .entries
            .iter()
            .filter(|e| e.status == FileStatus::Failed)
            .map(|e| e.source.clone())
            .collect();
        if failed.is_empty() {
            return None;
        }

        let mut spec = self.clone();
        spec.only = Some(failed);
        Some(spec)
    }
}
