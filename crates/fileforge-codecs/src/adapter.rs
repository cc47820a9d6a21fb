//! The codec adapter interface and the registry that selects adapters by
//! category.

use crate::{ConversionOptions, DocumentAdapter, ImageAdapter, MediaAdapter, Result, ToolSettings};
use fileforge_common::{FileCategory, FileDescriptor, FormatTag};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Structural facts about a file, read without a full decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaSummary {
    pub size: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Duration in seconds for audio and video.
    pub duration: Option<f64>,
    /// Page count for paged documents.
    pub pages: Option<u32>,
}

impl MediaSummary {
    /// Summary holding only the file size.
    pub fn basic(path: &Path) -> Result<Self> {
        let size = std::fs::metadata(path)?.len();
        Ok(Self {
            size,
            ..Default::default()
        })
    }

    /// Width and height, when both are known.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }
}

/// A pluggable converter for one file category.
///
/// Adapters are shared between worker threads and must not keep per-call
/// state. `convert` writes the complete output to `dest` or nothing at all.
pub trait CodecAdapter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Category this adapter is registered under.
    fn category(&self) -> FileCategory;

    /// Formats this adapter can read.
    fn input_formats(&self) -> &[&'static str];

    /// Formats this adapter can write.
    fn output_formats(&self) -> &[&'static str];

    fn supports_input(&self, format: &FormatTag) -> bool {
        self.input_formats().contains(&format.as_str())
    }

    fn supports_output(&self, format: &FormatTag) -> bool {
        self.output_formats().contains(&format.as_str())
    }

    /// Whether this specific pair can be converted. Adapters whose routes
    /// depend on the input format override this.
    fn supports_conversion(&self, from: &FormatTag, to: &FormatTag) -> bool {
        self.supports_input(from) && self.supports_output(to)
    }

    /// Convert `source` into `dest`, returning a snapshot of the output.
    fn convert(
        &self,
        source: &Path,
        dest: &Path,
        options: &ConversionOptions,
    ) -> Result<FileDescriptor>;

    /// Read structural facts about `path` for validation.
    fn inspect(&self, path: &Path) -> Result<MediaSummary> {
        MediaSummary::basic(path)
    }
}

/// Resolve the format an adapter should write.
///
/// An explicit `output_format` option wins over the destination extension.
pub fn target_format(dest: &Path, options: &ConversionOptions) -> Result<FormatTag> {
    options
        .output_format
        .clone()
        .or_else(|| FormatTag::from_path(dest))
        .ok_or_else(|| {
            crate::CodecError::InvalidInput(format!(
                "cannot determine output format for {}",
                dest.display()
            ))
        })
}

/// Adapters keyed by the category they handle.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<FileCategory, Arc<dyn CodecAdapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in adapter for every category.
    pub fn with_defaults(tools: &ToolSettings) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ImageAdapter::new()));
        registry.register(Arc::new(DocumentAdapter::new(tools.clone())));
        registry.register(Arc::new(MediaAdapter::audio(tools.clone())));
        registry.register(Arc::new(MediaAdapter::video(tools.clone())));
        registry
    }

    /// Register an adapter under its category, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn CodecAdapter>) -> &mut Self {
        self.adapters.insert(adapter.category(), adapter);
        self
    }

    /// Adapter for a category.
    pub fn get(&self, category: FileCategory) -> Option<Arc<dyn CodecAdapter>> {
        self.adapters.get(&category).cloned()
    }

    /// Registered adapters in category order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn CodecAdapter>> {
        self.adapters.values()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.adapters.values().map(|a| a.name()))
            .finish()
    }
}
