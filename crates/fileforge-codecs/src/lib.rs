//! # fileforge-codecs
//!
//! Codec adapters for fileforge.
//!
//! This crate provides:
//! - The [`CodecAdapter`] interface and an [`AdapterRegistry`] keyed by category
//! - [`ConversionOptions`] shared by every adapter
//! - Built-in adapters: [`ImageAdapter`] (pure Rust), [`MediaAdapter`]
//!   (ffmpeg), and [`DocumentAdapter`] (native text, LibreOffice, pandoc,
//!   pdftotext)
//! - External tool detection and bounded execution
//! - A staging [`Workspace`] so outputs appear atomically
//!
//! ## Features
//!
//! - `tracing` - Enable tracing support
//!
//! ## Example
//!
//! ```no_run
//! use fileforge_codecs::{AdapterRegistry, ConversionOptions, ToolSettings};
//! use fileforge_common::FileCategory;
//! use std::path::Path;
//!
//! let registry = AdapterRegistry::with_defaults(&ToolSettings::default());
//! let images = registry.get(FileCategory::Image).unwrap();
//! let output = images.convert(
//!     Path::new("/photos/cat.png"),
//!     Path::new("/photos/cat.webp"),
//!     &ConversionOptions::default(),
//! )?;
//! println!("wrote {} bytes", output.size);
//! # Ok::<(), fileforge_codecs::CodecError>(())
//! ```

pub mod adapter;
pub mod document;
mod error;
pub mod images;
pub mod media;
pub mod options;
pub mod tools;
pub mod workspace;

// Re-exports
pub use adapter::{target_format, AdapterRegistry, CodecAdapter, MediaSummary};
pub use document::DocumentAdapter;
pub use error::{CodecError, Result};
pub use images::ImageAdapter;
pub use media::MediaAdapter;
pub use options::ConversionOptions;
pub use tools::{check_tool, check_tools, require_tool, ToolInfo, ToolSettings};
pub use workspace::Workspace;
