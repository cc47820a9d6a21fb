//! Magic-byte sniffing for the formats fileforge converts.
//!
//! Only the first [`HEADER_LEN`] bytes of a file are ever read. The checks
//! are structural hints, not full parses: a header that matches can still
//! fail to decode later.

use crate::{Error, FileCategory, FormatTag, Result};
use std::io::Read;
use std::path::Path;

/// Number of leading bytes read for sniffing.
pub const HEADER_LEN: usize = 512;

const TS_PACKET: usize = 188;
const M2TS_PACKET: usize = 192;

/// A container or codec recognised from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    WebP,
    Ico,
    Pnm,
    Psd,
    Pdf,
    /// ZIP container, which covers OOXML and ODF documents.
    Zip,
    /// OLE2 compound file used by legacy Office formats.
    Ole2,
    Rtf,
    Mp3,
    Aac,
    Wav,
    Flac,
    Ogg,
    Aiff,
    Au,
    Amr,
    /// ISO base media (`ftyp` box): mp4, mov, m4a, 3gp, heic.
    IsoBmff,
    /// EBML header shared by Matroska and WebM.
    Matroska,
    Avi,
    Flv,
    MpegTs,
    /// MPEG-TS with the 4-byte timecode prefix used by Blu-ray (`m2ts`).
    M2ts,
    MpegPs,
    /// Advanced Systems Format: wma and wmv.
    Asf,
}

impl Signature {
    /// The format tag most commonly carried by this signature.
    pub fn default_format(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::WebP => "webp",
            Self::Ico => "ico",
            Self::Pnm => "ppm",
            Self::Psd => "psd",
            Self::Pdf => "pdf",
            Self::Zip => "docx",
            Self::Ole2 => "doc",
            Self::Rtf => "rtf",
            Self::Mp3 => "mp3",
            Self::Aac => "aac",
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::Ogg => "ogg",
            Self::Aiff => "aiff",
            Self::Au => "au",
            Self::Amr => "amr",
            Self::IsoBmff => "mp4",
            Self::Matroska => "mkv",
            Self::Avi => "avi",
            Self::Flv => "flv",
            Self::MpegTs => "ts",
            Self::M2ts => "m2ts",
            Self::MpegPs => "mpg",
            Self::Asf => "wmv",
        }
    }

    /// Category implied by [`Signature::default_format`].
    pub fn category(self) -> FileCategory {
        crate::paths::category_of_extension(self.default_format())
    }
}

/// Identify a header by its magic bytes.
///
/// # Examples
///
/// ```
/// use fileforge_common::signature::{sniff, Signature};
///
/// assert_eq!(sniff(b"%PDF-1.7\n"), Some(Signature::Pdf));
/// assert_eq!(sniff(b"\x89PNG\r\n\x1a\n...."), Some(Signature::Png));
/// assert_eq!(sniff(b"hello"), None);
/// ```
pub fn sniff(header: &[u8]) -> Option<Signature> {
    let starts = |magic: &[u8]| header.starts_with(magic);
    let at = |offset: usize, magic: &[u8]| {
        header
            .get(offset..offset + magic.len())
            .is_some_and(|window| window == magic)
    };

    let signature = if starts(b"\x89PNG\r\n\x1a\n") {
        Signature::Png
    } else if starts(&[0xFF, 0xD8, 0xFF]) {
        Signature::Jpeg
    } else if starts(b"GIF87a") || starts(b"GIF89a") {
        Signature::Gif
    } else if starts(b"BM") && header.len() >= 14 {
        Signature::Bmp
    } else if starts(b"II*\0") || starts(b"MM\0*") {
        Signature::Tiff
    } else if starts(b"RIFF") && at(8, b"WEBP") {
        Signature::WebP
    } else if starts(b"RIFF") && at(8, b"WAVE") {
        Signature::Wav
    } else if starts(b"RIFF") && at(8, b"AVI ") {
        Signature::Avi
    } else if starts(&[0, 0, 1, 0]) && header.len() >= 6 {
        Signature::Ico
    } else if is_pnm(header) {
        Signature::Pnm
    } else if starts(b"8BPS") {
        Signature::Psd
    } else if starts(b"%PDF-") {
        Signature::Pdf
    } else if starts(b"PK\x03\x04") {
        Signature::Zip
    } else if starts(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]) {
        Signature::Ole2
    } else if starts(b"{\\rtf") {
        Signature::Rtf
    } else if starts(b"ID3") {
        Signature::Mp3
    } else if starts(b"fLaC") {
        Signature::Flac
    } else if starts(b"OggS") {
        Signature::Ogg
    } else if starts(b"FORM") && (at(8, b"AIFF") || at(8, b"AIFC")) {
        Signature::Aiff
    } else if starts(b".snd") {
        Signature::Au
    } else if starts(b"#!AMR") {
        Signature::Amr
    } else if at(4, b"ftyp") || at(4, b"moov") || at(4, b"mdat") || at(4, b"wide") {
        Signature::IsoBmff
    } else if starts(&[0x1A, 0x45, 0xDF, 0xA3]) {
        Signature::Matroska
    } else if starts(b"FLV\x01") {
        Signature::Flv
    } else if starts(&[0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11]) {
        Signature::Asf
    } else if starts(&[0x00, 0x00, 0x01, 0xBA]) {
        Signature::MpegPs
    } else if has_ts_sync(header, 0, TS_PACKET) {
        Signature::MpegTs
    } else if has_ts_sync(header, 4, M2TS_PACKET) {
        Signature::M2ts
    } else if let Some(signature) = sniff_audio_frame(header) {
        signature
    } else {
        return None;
    };

    Some(signature)
}

/// Check whether `header` is plausible for `format`.
///
/// Text formats have no magic number; they are accepted when the header
/// is non-empty and contains no NUL bytes. Formats without any reliable
/// signature (`tga`) are accepted whenever the header is non-empty.
///
/// ```
/// use fileforge_common::signature::matches;
/// use fileforge_common::FormatTag;
///
/// let png = FormatTag::new("png").unwrap();
/// assert!(matches(&png, b"\x89PNG\r\n\x1a\n...."));
/// assert!(!matches(&png, b"this is not an image"));
///
/// let csv = FormatTag::new("csv").unwrap();
/// assert!(matches(&csv, b"name,size\nfoo,1\n"));
/// ```
pub fn matches(format: &FormatTag, header: &[u8]) -> bool {
    if header.is_empty() {
        return false;
    }

    let found = sniff(header);
    let is = |expected: &[Signature]| found.is_some_and(|s| expected.contains(&s));

    match format.as_str() {
        "jpg" => is(&[Signature::Jpeg]),
        "png" => is(&[Signature::Png]),
        "gif" => is(&[Signature::Gif]),
        "bmp" => is(&[Signature::Bmp]),
        "tiff" => is(&[Signature::Tiff]),
        "webp" => is(&[Signature::WebP]),
        "ico" => is(&[Signature::Ico]),
        "ppm" | "pgm" | "pbm" => is(&[Signature::Pnm]),
        "psd" => is(&[Signature::Psd]),
        "heic" | "heif" => is(&[Signature::IsoBmff]),
        "tga" => true,
        "svg" => is_text(header),

        "pdf" => is(&[Signature::Pdf]),
        "docx" | "xlsx" | "pptx" | "odt" | "ods" | "odp" => is(&[Signature::Zip]),
        "doc" | "xls" | "ppt" => is(&[Signature::Ole2]),
        "rtf" => is(&[Signature::Rtf]),
        "txt" | "md" | "csv" | "json" | "xml" | "yaml" | "html" => is_text(header),

        "mp3" => is(&[Signature::Mp3]),
        "aac" => is(&[Signature::Aac, Signature::IsoBmff]),
        "wav" => is(&[Signature::Wav]),
        "flac" => is(&[Signature::Flac]),
        "ogg" | "opus" | "ogv" => is(&[Signature::Ogg]),
        "aiff" => is(&[Signature::Aiff]),
        "au" => is(&[Signature::Au]),
        "amr" => is(&[Signature::Amr]),
        "m4a" | "mp4" | "m4v" | "mov" | "3gp" => is(&[Signature::IsoBmff]),
        "wma" | "wmv" => is(&[Signature::Asf]),

        "mkv" | "webm" => is(&[Signature::Matroska]),
        "avi" => is(&[Signature::Avi]),
        "flv" => is(&[Signature::Flv]),
        "ts" | "mts" => is(&[Signature::MpegTs, Signature::M2ts]),
        "m2ts" => is(&[Signature::M2ts, Signature::MpegTs]),
        "mpg" | "vob" => is(&[Signature::MpegPs]),
        _ => false,
    }
}

/// Read up to [`HEADER_LEN`] bytes from the start of a file.
pub fn read_header(path: &Path) -> Result<Vec<u8>> {
    let file = std::fs::File::open(path).map_err(|e| Error::from_io(path, e))?;
    let mut header = Vec::with_capacity(HEADER_LEN);
    file.take(HEADER_LEN as u64).read_to_end(&mut header)?;
    Ok(header)
}

/// Whether a header looks like text rather than binary data.
pub fn is_text(header: &[u8]) -> bool {
    !header.is_empty() && !header.contains(&0)
}

fn is_pnm(header: &[u8]) -> bool {
    header.len() >= 3
        && header[0] == b'P'
        && (b'1'..=b'6').contains(&header[1])
        && header[2].is_ascii_whitespace()
}

/// MPEG-TS packets start with 0x47 every `stride` bytes; two consecutive
/// sync bytes are required.
fn has_ts_sync(header: &[u8], offset: usize, stride: usize) -> bool {
    header.get(offset) == Some(&0x47) && header.get(offset + stride) == Some(&0x47)
}

fn sniff_audio_frame(header: &[u8]) -> Option<Signature> {
    let (&b0, &b1) = (header.first()?, header.get(1)?);
    if b0 != 0xFF {
        return None;
    }
    if b1 & 0xF6 == 0xF0 {
        Some(Signature::Aac)
    } else if b1 & 0xE0 == 0xE0 && b1 & 0x06 != 0 {
        Some(Signature::Mp3)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> FormatTag {
        FormatTag::new(s).unwrap()
    }

    fn ts_stream(prefix: usize, stride: usize, packets: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; prefix + stride * packets];
        for i in 0..packets {
            bytes[prefix + i * stride] = 0x47;
        }
        bytes
    }

    #[test]
    fn test_sniff_images() {
        assert_eq!(sniff(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10]), Some(Signature::Jpeg));
        assert_eq!(sniff(b"GIF89a\x01\x00"), Some(Signature::Gif));
        assert_eq!(sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(Signature::WebP));
        assert_eq!(sniff(b"P6\n2 2\n255\n"), Some(Signature::Pnm));
        assert_eq!(sniff(b"II*\0\x08\0\0\0"), Some(Signature::Tiff));
    }

    #[test]
    fn test_sniff_audio_and_video() {
        assert_eq!(sniff(b"ID3\x04\0\0"), Some(Signature::Mp3));
        assert_eq!(sniff(&[0xFF, 0xFB, 0x90, 0x64]), Some(Signature::Mp3));
        assert_eq!(sniff(&[0xFF, 0xF1, 0x50, 0x80]), Some(Signature::Aac));
        assert_eq!(sniff(b"RIFF\0\0\0\0WAVEfmt "), Some(Signature::Wav));
        assert_eq!(sniff(b"\0\0\0\x20ftypisom"), Some(Signature::IsoBmff));
        assert_eq!(sniff(&[0x1A, 0x45, 0xDF, 0xA3, 0x9F]), Some(Signature::Matroska));
        assert_eq!(sniff(&ts_stream(0, 188, 3)), Some(Signature::MpegTs));
        assert_eq!(sniff(&ts_stream(4, 192, 3)), Some(Signature::M2ts));
    }

    #[test]
    fn test_lone_sync_byte_is_not_ts() {
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[0] = 0x47;
        assert_eq!(sniff(&bytes), None);
        assert_eq!(sniff(b"GET / HTTP/1.1"), None);
    }

    #[test]
    fn test_matches_containers() {
        assert!(matches(&tag("docx"), b"PK\x03\x04\x14\0"));
        assert!(matches(&tag("mov"), b"\0\0\0\x14ftypqt  "));
        assert!(matches(&tag("webm"), &[0x1A, 0x45, 0xDF, 0xA3]));
        assert!(!matches(&tag("mp4"), b"RIFF\0\0\0\0AVI LIST"));
        assert!(!matches(&tag("exe"), b"MZ\x90\0"));
    }

    #[test]
    fn test_matches_text() {
        assert!(matches(&tag("json"), b"{\"a\": 1}"));
        assert!(matches(&tag("md"), b"# Title\n"));
        assert!(!matches(&tag("txt"), b"abc\0def"));
        assert!(!matches(&tag("txt"), b""));
    }

    #[test]
    fn test_read_header_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        std::fs::write(&path, vec![7u8; HEADER_LEN * 3]).unwrap();
        assert_eq!(read_header(&path).unwrap().len(), HEADER_LEN);

        assert!(matches!(
            read_header(&dir.path().join("nope")),
            Err(Error::NotFound(_))
        ));
    }
}
