//! Core type definitions for files moving through a conversion.
//!
//! All enums are serialized in lowercase so they read naturally in TOML
//! configuration and JSON batch reports.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Semantic category of a file, decided by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    /// Still images (raster formats).
    Image,
    /// Office documents, PDFs, and structured text.
    Document,
    /// Audio-only media.
    Audio,
    /// Video containers.
    Video,
    /// Anything fileforge does not know how to convert.
    Unknown,
}

impl FileCategory {
    /// Every category a codec adapter can be registered for.
    pub const KNOWN: [FileCategory; 4] = [
        FileCategory::Image,
        FileCategory::Document,
        FileCategory::Audio,
        FileCategory::Video,
    ];

    /// Returns `true` for every category except [`FileCategory::Unknown`].
    pub fn is_known(self) -> bool {
        self != FileCategory::Unknown
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Document => write!(f, "document"),
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for FileCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "image" | "images" => Ok(Self::Image),
            "document" | "documents" | "doc" => Ok(Self::Document),
            "audio" => Ok(Self::Audio),
            "video" | "videos" => Ok(Self::Video),
            "unknown" => Ok(Self::Unknown),
            other => Err(Error::InvalidFormat(other.to_string())),
        }
    }
}

/// A normalized, lowercase format tag such as `jpg`, `pdf` or `mkv`.
///
/// Aliases collapse to one spelling (`jpeg` becomes `jpg`, `tif` becomes
/// `tiff`), so tags can be compared directly.
///
/// ```
/// use fileforge_common::FormatTag;
///
/// let tag: FormatTag = ".JPEG".parse().unwrap();
/// assert_eq!(tag.as_str(), "jpg");
/// assert_eq!(tag, FormatTag::new("jpg").unwrap());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FormatTag(String);

impl FormatTag {
    /// Parse and normalize a format tag.
    pub fn new(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_start_matches('.').to_lowercase();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidFormat(raw.to_string()));
        }
        Ok(Self(crate::paths::canonical_extension(&trimmed).to_string()))
    }

    /// Tag used when neither the extension nor the header identifies a file.
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    /// Derive a tag from a path's extension, if it has a usable one.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| Self::new(ext).ok())
    }

    /// The normalized tag.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this is the placeholder produced by [`FormatTag::unknown`].
    pub fn is_unknown(&self) -> bool {
        self.0 == "unknown"
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FormatTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for FormatTag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<FormatTag> for String {
    fn from(tag: FormatTag) -> Self {
        tag.0
    }
}

/// Immutable snapshot of a file taken at enumeration time.
///
/// The snapshot goes stale if the file changes afterwards; use
/// [`FileDescriptor::has_changed`] to detect that before relying on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub path: PathBuf,
    pub size: u64,
    pub category: FileCategory,
    pub format: FormatTag,
    pub modified: Option<DateTime<Utc>>,
}

impl FileDescriptor {
    /// Snapshot the file at `path`, classifying it on the way.
    pub fn snapshot(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| Error::from_io(path, e))?;
        if !metadata.is_file() {
            return Err(Error::NotAFile(path.to_path_buf()));
        }

        let (category, format) = crate::classify_path(path);

        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            category,
            format,
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    /// File name for display, falling back to the full path.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Check whether the file on disk no longer matches this snapshot.
    pub fn has_changed(&self) -> Result<bool> {
        let metadata = std::fs::metadata(&self.path).map_err(|e| Error::from_io(&self.path, e))?;
        let modified = metadata.modified().ok().map(DateTime::<Utc>::from);
        Ok(metadata.len() != self.size || modified != self.modified)
    }
}
