//! The FileClassifier: the single authority on a file's category.
//!
//! Classification never fails. Anything that cannot be identified comes
//! back as [`FileCategory::Unknown`] so callers can skip it uniformly.

use crate::paths::{category_of_extension, is_ambiguous_extension};
use crate::signature::{read_header, sniff, Signature};
use crate::{FileCategory, FormatTag};
use std::path::Path;

/// Classify a format tag, consulting `header` only for ambiguous tags.
///
/// ```
/// use fileforge_common::{classify, FileCategory, FormatTag};
///
/// let ts = FormatTag::new("ts").unwrap();
/// assert_eq!(classify(&ts, b"export const x = 1;"), FileCategory::Unknown);
/// assert_eq!(classify(&FormatTag::new("mkv").unwrap(), b""), FileCategory::Video);
/// ```
pub fn classify(format: &FormatTag, header: &[u8]) -> FileCategory {
    let category = category_of_extension(format.as_str());
    if !is_ambiguous_extension(format.as_str()) {
        return category;
    }

    match sniff(header) {
        Some(Signature::MpegTs | Signature::M2ts) => category,
        _ => FileCategory::Unknown,
    }
}

/// Classify a file on disk.
///
/// The extension decides in almost every case. The header is read when the
/// extension is ambiguous, or when there is no extension at all, in which
/// case the sniffed signature supplies both category and format.
pub fn classify_path(path: &Path) -> (FileCategory, FormatTag) {
    let Some(format) = FormatTag::from_path(path) else {
        return classify_by_header(path);
    };

    if !is_ambiguous_extension(format.as_str()) {
        return (category_of_extension(format.as_str()), format);
    }

    let header = read_header(path).unwrap_or_default();
    (classify(&format, &header), format)
}

fn classify_by_header(path: &Path) -> (FileCategory, FormatTag) {
    let sniffed = read_header(path).ok().and_then(|header| sniff(&header));
    match sniffed.and_then(|s| FormatTag::new(s.default_format()).ok().map(|f| (s, f))) {
        Some((signature, format)) => (signature.category(), format),
        None => (FileCategory::Unknown, FormatTag::unknown()),
    }
}
