//! Audio and video conversion through the ffmpeg CLI.

use crate::adapter::{target_format, CodecAdapter, MediaSummary};
use crate::tools::{get_tool_path, run_with_timeout, ToolSettings};
use crate::{CodecError, ConversionOptions, Result, Workspace};
use fileforge_common::{FileCategory, FileDescriptor, FormatTag};
use serde::Deserialize;
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

const AUDIO_INPUTS: &[&str] = &[
    "mp3", "wav", "flac", "aac", "ogg", "wma", "m4a", "opus", "aiff", "au", "amr",
];
const AUDIO_OUTPUTS: &[&str] = &["mp3", "wav", "flac", "aac", "ogg", "m4a", "opus", "aiff"];

const VIDEO_INPUTS: &[&str] = &[
    "mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v", "3gp", "ogv", "ts", "mts", "m2ts",
    "vob", "mpg",
];
const VIDEO_OUTPUTS: &[&str] = &["mp4", "avi", "mkv", "mov", "wmv", "webm", "3gp", "flv"];

/// Audio encoder for a target container, and whether it takes a bitrate.
fn audio_codec(format: &str) -> (&'static str, bool) {
    match format {
        "mp3" => ("libmp3lame", true),
        "aac" | "m4a" => ("aac", true),
        "ogg" => ("libvorbis", true),
        "opus" => ("libopus", true),
        "flac" => ("flac", false),
        "wav" => ("pcm_s16le", false),
        "aiff" => ("pcm_s16be", false),
        "webm" => ("libopus", true),
        "wmv" => ("wmav2", true),
        "avi" => ("libmp3lame", true),
        _ => ("aac", true),
    }
}

/// Video encoder for a target container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VideoCodec {
    X264,
    Vp9,
    Mpeg4,
    Wmv2,
}

impl VideoCodec {
    fn for_format(format: &str) -> Self {
        match format {
            "webm" => Self::Vp9,
            "avi" => Self::Mpeg4,
            "wmv" => Self::Wmv2,
            _ => Self::X264,
        }
    }

    fn ffmpeg_name(self) -> &'static str {
        match self {
            Self::X264 => "libx264",
            Self::Vp9 => "libvpx-vp9",
            Self::Mpeg4 => "mpeg4",
            Self::Wmv2 => "wmv2",
        }
    }
}

/// Map quality 1..=100 to an x264/VP9 CRF; 100 gives 18, 1 gives 51.
pub fn quality_to_crf(quality: Option<u8>) -> u8 {
    match quality {
        Some(q) => (51.0 - f64::from(q.clamp(1, 100)) * 0.33).round() as u8,
        None => 23,
    }
}

/// Map quality 1..=100 to an ffmpeg `-q:v` scale of 31 (worst) to 2 (best).
fn quality_to_qscale(quality: Option<u8>) -> u8 {
    match quality {
        Some(q) => (31.0 - f64::from(q.clamp(1, 100)) * 0.29).round() as u8,
        None => 4,
    }
}

/// Audio bitrate from explicit option or quality, 100 giving `320k`.
pub fn audio_bitrate(options: &ConversionOptions) -> Option<String> {
    if let Some(bitrate) = &options.bitrate {
        return Some(bitrate.clone());
    }
    options
        .quality
        .map(|q| format!("{}k", 64 + u32::from(q.clamp(1, 100)) * 256 / 100))
}

/// Audio or video adapter driving ffmpeg.
#[derive(Debug, Clone)]
pub struct MediaAdapter {
    category: FileCategory,
    tools: ToolSettings,
}

impl MediaAdapter {
    /// Adapter for audio files.
    pub fn audio(tools: ToolSettings) -> Self {
        Self {
            category: FileCategory::Audio,
            tools,
        }
    }

    /// Adapter for video files.
    pub fn video(tools: ToolSettings) -> Self {
        Self {
            category: FileCategory::Video,
            tools,
        }
    }

    /// Build the ffmpeg argument list for one conversion.
    pub fn ffmpeg_args(
        &self,
        source: &Path,
        output: &Path,
        target: &FormatTag,
        options: &ConversionOptions,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-loglevel", "error", "-y", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(source.as_os_str().to_owned());

        if self.category == FileCategory::Audio {
            push(&mut args, &["-vn"]);
        } else {
            let codec = VideoCodec::for_format(target.as_str());
            push(&mut args, &["-c:v", codec.ffmpeg_name()]);
            match codec {
                VideoCodec::X264 => {
                    let crf = quality_to_crf(options.quality).to_string();
                    push(&mut args, &["-crf", &crf, "-pix_fmt", "yuv420p"]);
                }
                VideoCodec::Vp9 => {
                    let crf = quality_to_crf(options.quality).to_string();
                    push(&mut args, &["-crf", &crf, "-b:v", "0"]);
                }
                VideoCodec::Mpeg4 | VideoCodec::Wmv2 => {
                    let q = quality_to_qscale(options.quality).to_string();
                    push(&mut args, &["-q:v", &q]);
                }
            }
            if let Some(filter) = scale_filter(options) {
                push(&mut args, &["-vf", &filter]);
            }
            if let Some(fps) = options.fps {
                push(&mut args, &["-r", &fps.to_string()]);
            }
        }

        if self.category == FileCategory::Video && options.remove_audio {
            push(&mut args, &["-an"]);
        } else {
            let (codec, lossy) = audio_codec(target.as_str());
            push(&mut args, &["-c:a", codec]);
            if lossy {
                if let Some(bitrate) = audio_bitrate(options) {
                    push(&mut args, &["-b:a", &bitrate]);
                }
            }
            if let Some(rate) = options.sample_rate {
                push(&mut args, &["-ar", &rate.to_string()]);
            }
            if let Some(channels) = options.channels {
                push(&mut args, &["-ac", &channels.to_string()]);
            }
        }

        args.push(output.as_os_str().to_owned());
        args
    }

    fn probe(&self, path: &Path) -> Result<MediaSummary> {
        let ffprobe = get_tool_path("ffprobe", self.tools.ffprobe.as_deref())?;
        let mut command = Command::new(ffprobe);
        command
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path);
        let output = run_with_timeout(command, "ffprobe", self.tools.timeout)?;
        let size = std::fs::metadata(path)?.len();
        parse_ffprobe(&output.stdout, size)
    }
}

impl CodecAdapter for MediaAdapter {
    fn name(&self) -> &str {
        match self.category {
            FileCategory::Audio => "ffmpeg-audio",
            _ => "ffmpeg-video",
        }
    }

    fn category(&self) -> FileCategory {
        self.category
    }

    fn input_formats(&self) -> &[&'static str] {
        match self.category {
            FileCategory::Audio => AUDIO_INPUTS,
            _ => VIDEO_INPUTS,
        }
    }

    fn output_formats(&self) -> &[&'static str] {
        match self.category {
            FileCategory::Audio => AUDIO_OUTPUTS,
            _ => VIDEO_OUTPUTS,
        }
    }

    fn convert(
        &self,
        source: &Path,
        dest: &Path,
        options: &ConversionOptions,
    ) -> Result<FileDescriptor> {
        let target = target_format(dest, options)?;
        if !self.supports_output(&target) {
            return Err(CodecError::Unsupported(format!("{} output {target}", self.category)));
        }
        let ffmpeg = get_tool_path("ffmpeg", self.tools.ffmpeg.as_deref())?;

        let workspace = Workspace::new(dest)?;
        let mut command = Command::new(ffmpeg);
        command.args(self.ffmpeg_args(source, workspace.output(), &target, options));

        #[cfg(feature = "tracing")]
        tracing::info!("Transcoding {:?} -> {}", source, target);

        run_with_timeout(command, "ffmpeg", self.tools.timeout)?;
        let finalized = workspace.finalize()?;
        Ok(FileDescriptor::snapshot(&finalized)?)
    }

    /// Uses ffprobe when installed; otherwise only the size is known and
    /// signature checks in the pipeline carry the validation.
    fn inspect(&self, path: &Path) -> Result<MediaSummary> {
        match self.probe(path) {
            Err(CodecError::ToolNotFound { .. }) => MediaSummary::basic(path),
            other => other,
        }
    }
}

fn push(args: &mut Vec<OsString>, items: &[&str]) {
    args.extend(items.iter().map(OsString::from));
}

fn scale_filter(options: &ConversionOptions) -> Option<String> {
    match (options.width, options.height) {
        (Some(w), Some(h)) => Some(format!(
            "scale='min({w},iw)':'min({h},ih)':force_original_aspect_ratio=decrease:force_divisible_by=2"
        )),
        (Some(w), None) => Some(format!("scale='min({w},iw)':-2")),
        (None, Some(h)) => Some(format!("scale=-2:'min({h},ih)'")),
        (None, None) => None,
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
}

fn parse_ffprobe(json: &[u8], size: u64) -> Result<MediaSummary> {
    let output: FfprobeOutput = serde_json::from_slice(json)
        .map_err(|e| CodecError::parse_error("ffprobe", e.to_string()))?;

    let video = output.streams.iter().find(|s| s.codec_type == "video");
    Ok(MediaSummary {
        size,
        width: video.and_then(|s| s.width),
        height: video.and_then(|s| s.height),
        duration: output.format.duration.and_then(|d| d.parse().ok()),
        pages: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(adapter: &MediaAdapter, target: &str, options: &ConversionOptions) -> Vec<String> {
        adapter
            .ffmpeg_args(
                Path::new("in.src"),
                Path::new("out.dst"),
                &FormatTag::new(target).unwrap(),
                options,
            )
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_audio_args() {
        let adapter = MediaAdapter::audio(ToolSettings::default());
        let options = ConversionOptions {
            quality: Some(100),
            sample_rate: Some(44100),
            ..Default::default()
        };
        let args = args_of(&adapter, "mp3", &options);
        let joined = args.join(" ");

        assert!(joined.contains("-i in.src -vn -c:a libmp3lame -b:a 320k -ar 44100"));
        assert_eq!(args.last().unwrap(), "out.dst");
    }

    #[test]
    fn test_lossless_audio_has_no_bitrate() {
        let adapter = MediaAdapter::audio(ToolSettings::default());
        let options = ConversionOptions {
            bitrate: Some("128k".into()),
            ..Default::default()
        };
        let args = args_of(&adapter, "flac", &options);
        assert!(!args.contains(&"-b:a".to_string()));
    }

    #[test]
    fn test_video_args() {
        let adapter = MediaAdapter::video(ToolSettings::default());
        let options = ConversionOptions {
            width: Some(1280),
            remove_audio: true,
            ..Default::default()
        };
        let joined = args_of(&adapter, "mp4", &options).join(" ");
        assert!(joined.contains("-c:v libx264 -crf 23"));
        assert!(joined.contains("-vf scale='min(1280,iw)':-2"));
        assert!(joined.contains("-an"));
        assert!(!joined.contains("-c:a"));

        let joined = args_of(&adapter, "webm", &ConversionOptions::default()).join(" ");
        assert!(joined.contains("-c:v libvpx-vp9"));
        assert!(joined.contains("-c:a libopus"));
    }

    #[test]
    fn test_quality_mappings() {
        assert_eq!(quality_to_crf(Some(100)), 18);
        assert_eq!(quality_to_crf(Some(1)), 51);
        assert_eq!(quality_to_crf(None), 23);
        assert_eq!(audio_bitrate(&ConversionOptions::default()), None);
    }

    #[test]
    fn test_parse_ffprobe() {
        let json = br#"{
            "format": {"filename": "a.mkv", "format_name": "matroska,webm", "duration": "12.500000"},
            "streams": [
                {"index": 0, "codec_type": "audio", "codec_name": "opus"},
                {"index": 1, "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080}
            ]
        }"#;
        let summary = parse_ffprobe(json, 42).unwrap();
        assert_eq!(summary.dimensions(), Some((1920, 1080)));
        assert_eq!(summary.duration, Some(12.5));
        assert_eq!(summary.size, 42);

        assert!(matches!(
            parse_ffprobe(b"not json", 0),
            Err(CodecError::ParseError { .. })
        ));
    }

    #[test]
    fn test_unsupported_output_is_rejected_before_running() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.wav");
        std::fs::write(&source, b"RIFF\0\0\0\0WAVE").unwrap();

        let adapter = MediaAdapter::audio(ToolSettings::default());
        let err = adapter
            .convert(&source, &dir.path().join("a.mp4"), &ConversionOptions::default())
            .unwrap_err();
        assert!(matches!(err, CodecError::Unsupported(_)));
    }
}
