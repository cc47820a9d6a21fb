//! Path utilities for detecting file categories by extension.
//!
//! These tables are the extension half of classification; the
//! [`classify`](crate::classify) module adds header sniffing for the few
//! extensions that are ambiguous on their own.

use crate::FileCategory;
use std::path::Path;

/// List of image file extensions (canonical spellings).
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "png", "gif", "bmp", "tiff", "webp", "ico", "ppm", "pgm", "pbm", "tga", "heic", "heif",
    "psd", "svg",
];

/// List of document file extensions (canonical spellings).
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp", "rtf", "txt", "md",
    "csv", "json", "xml", "yaml", "html",
];

/// List of audio file extensions (canonical spellings).
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "aac", "ogg", "wma", "m4a", "opus", "aiff", "au", "amr",
];

/// List of video file extensions (canonical spellings).
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v", "3gp", "ogv", "ts", "mts", "m2ts",
    "vob", "mpg",
];

/// Alternative spellings and the canonical extension they collapse to.
const ALIASES: &[(&str, &str)] = &[
    ("jpeg", "jpg"),
    ("jpe", "jpg"),
    ("tif", "tiff"),
    ("htm", "html"),
    ("yml", "yaml"),
    ("markdown", "md"),
    ("oga", "ogg"),
    ("aif", "aiff"),
    ("mpeg", "mpg"),
];

/// Extensions whose category cannot be trusted without reading the header.
const AMBIGUOUS_EXTENSIONS: &[&str] = &["ts"];

/// Collapse an already-lowercased extension to its canonical spelling.
pub fn canonical_extension(ext: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == ext)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(ext)
}

/// Category implied by an extension alone.
///
/// # Examples
///
/// ```
/// use fileforge_common::paths::category_of_extension;
/// use fileforge_common::FileCategory;
///
/// assert_eq!(category_of_extension("FLAC"), FileCategory::Audio);
/// assert_eq!(category_of_extension("jpeg"), FileCategory::Image);
/// assert_eq!(category_of_extension("exe"), FileCategory::Unknown);
/// ```
pub fn category_of_extension(ext: &str) -> FileCategory {
    let lower = ext.trim_start_matches('.').to_lowercase();
    let ext = canonical_extension(&lower);
    if IMAGE_EXTENSIONS.contains(&ext) {
        FileCategory::Image
    } else if DOCUMENT_EXTENSIONS.contains(&ext) {
        FileCategory::Document
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        FileCategory::Audio
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        FileCategory::Video
    } else {
        FileCategory::Unknown
    }
}

/// Whether an extension needs a header read before it can be classified.
pub fn is_ambiguous_extension(ext: &str) -> bool {
    AMBIGUOUS_EXTENSIONS.contains(&ext)
}

/// Check if a path has an image file extension.
pub fn is_image_file(path: &Path) -> bool {
    extension_category(path) == FileCategory::Image
}

/// Check if a path has a document file extension.
pub fn is_document_file(path: &Path) -> bool {
    extension_category(path) == FileCategory::Document
}

/// Check if a path has an audio file extension.
pub fn is_audio_file(path: &Path) -> bool {
    extension_category(path) == FileCategory::Audio
}

/// Check if a path has a video file extension.
pub fn is_video_file(path: &Path) -> bool {
    extension_category(path) == FileCategory::Video
}

fn extension_category(path: &Path) -> FileCategory {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(category_of_extension)
        .unwrap_or(FileCategory::Unknown)
}

/// Get the extensions belonging to a category.
///
/// # Examples
///
/// ```
/// use fileforge_common::paths::extensions_for;
/// use fileforge_common::FileCategory;
///
/// assert!(extensions_for(FileCategory::Video).contains(&"mkv"));
/// assert!(extensions_for(FileCategory::Unknown).is_empty());
/// ```
#[must_use]
pub fn extensions_for(category: FileCategory) -> &'static [&'static str] {
    match category {
        FileCategory::Image => IMAGE_EXTENSIONS,
        FileCategory::Document => DOCUMENT_EXTENSIONS,
        FileCategory::Audio => AUDIO_EXTENSIONS,
        FileCategory::Video => VIDEO_EXTENSIONS,
        FileCategory::Unknown => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file(Path::new("movie.mkv")));
        assert!(is_video_file(Path::new("movie.mp4")));
        assert!(is_video_file(Path::new("clip.3gp")));
        assert!(is_video_file(Path::new("movie.MKV")));
        assert!(is_video_file(Path::new("/path/to/movie.mpeg")));

        assert!(!is_video_file(Path::new("song.mp3")));
        assert!(!is_video_file(Path::new("no_extension")));
    }

    #[test]
    fn test_is_audio_file() {
        assert!(is_audio_file(Path::new("song.flac")));
        assert!(is_audio_file(Path::new("song.OGA")));
        assert!(is_audio_file(Path::new("voice.amr")));
        assert!(!is_audio_file(Path::new("movie.ogv")));
    }

    #[test]
    fn test_is_image_and_document_file() {
        assert!(is_image_file(Path::new("scan.TIF")));
        assert!(is_image_file(Path::new("poster.jpeg")));
        assert!(is_document_file(Path::new("report.pdf")));
        assert!(is_document_file(Path::new("page.htm")));
        assert!(is_document_file(Path::new("config.yml")));
        assert!(!is_document_file(Path::new("poster.png")));
    }

    #[test]
    fn test_categories_are_disjoint() {
        for a in FileCategory::KNOWN {
            for b in FileCategory::KNOWN {
                if a == b {
                    continue;
                }
                for ext in extensions_for(a) {
                    assert!(
                        !extensions_for(b).contains(ext),
                        "{ext} listed under both {a} and {b}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_canonical_extension() {
        assert_eq!(canonical_extension("jpeg"), "jpg");
        assert_eq!(canonical_extension("aif"), "aiff");
        assert_eq!(canonical_extension("png"), "png");
    }
}
