//! Per-conversion options.
//!
//! Options are shared by all categories; each adapter reads the fields that
//! make sense for it and ignores the rest.

use crate::{CodecError, Result};
use fileforge_common::FormatTag;
use serde::{Deserialize, Serialize};

/// Options for a single conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    /// Encoder quality, 1 (smallest) to 100 (best).
    pub quality: Option<u8>,
    /// Maximum output width; aspect ratio is kept and images never upscale.
    pub width: Option<u32>,
    /// Maximum output height.
    pub height: Option<u32>,
    /// Target bitrate in ffmpeg notation, e.g. `192k`.
    pub bitrate: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub fps: Option<f32>,
    pub remove_audio: bool,
    pub delete_original: bool,
    pub overwrite: bool,
    pub output_format: Option<FormatTag>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Lossless compression effort, 0 (fastest) to 9 (smallest).
    pub compression_level: Option<u8>,
}

impl ConversionOptions {
    /// Build options from `key=value` style pairs.
    ///
    /// Unknown keys are ignored. A recognised key with a malformed value is
    /// an error.
    ///
    /// ```
    /// use fileforge_codecs::ConversionOptions;
    ///
    /// let opts = ConversionOptions::from_pairs([("quality", "80"), ("dpi", "300")]).unwrap();
    /// assert_eq!(opts.quality, Some(80));
    /// assert!(ConversionOptions::from_pairs([("quality", "loud")]).is_err());
    /// ```
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::default();
        for (key, value) in pairs {
            options.set(key.as_ref(), value.as_ref())?;
        }
        options.validate()?;
        Ok(options)
    }

    /// Set one option by name. Returns `false` if the key is not recognised.
    pub fn set(&mut self, key: &str, value: &str) -> Result<bool> {
        let key = key.trim().to_lowercase().replace('-', "_");
        let value = value.trim();
        match key.as_str() {
            "quality" => self.quality = Some(parse(&key, value)?),
            "width" => self.width = Some(parse(&key, value)?),
            "height" => self.height = Some(parse(&key, value)?),
            "bitrate" => self.bitrate = Some(parse_bitrate(value)?),
            "sample_rate" => self.sample_rate = Some(parse(&key, value)?),
            "channels" => self.channels = Some(parse(&key, value)?),
            "fps" => self.fps = Some(parse(&key, value)?),
            "remove_audio" => self.remove_audio = parse_bool(&key, value)?,
            "delete_original" => self.delete_original = parse_bool(&key, value)?,
            "overwrite" => self.overwrite = parse_bool(&key, value)?,
            "output_format" | "format" => {
                self.output_format = Some(
                    FormatTag::new(value).map_err(|e| CodecError::InvalidInput(e.to_string()))?,
                )
            }
            "password" => self.password = Some(value.to_string()),
            "compression_level" | "compression" => {
                self.compression_level = Some(parse(&key, value)?)
            }
            _ => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Ignoring unrecognised option {:?}", key);
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if let Some(q) = self.quality {
            if !(1..=100).contains(&q) {
                return Err(CodecError::InvalidInput(format!(
                    "quality must be between 1 and 100, got {q}"
                )));
            }
        }
        if let Some(level) = self.compression_level {
            if level > 9 {
                return Err(CodecError::InvalidInput(format!(
                    "compression_level must be between 0 and 9, got {level}"
                )));
            }
        }
        if self.width == Some(0) || self.height == Some(0) {
            return Err(CodecError::InvalidInput(
                "width and height must be positive".to_string(),
            ));
        }
        if self.channels == Some(0) || self.sample_rate == Some(0) {
            return Err(CodecError::InvalidInput(
                "channels and sample_rate must be positive".to_string(),
            ));
        }
        if let Some(fps) = self.fps {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(CodecError::InvalidInput(format!("invalid fps: {fps}")));
            }
        }
        Ok(())
    }

    /// Apply every field set in `other` on top of `self`.
    pub fn overlay(&mut self, other: &ConversionOptions) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field.clone(); })*
            };
        }
        take!(
            quality,
            width,
            height,
            bitrate,
            sample_rate,
            channels,
            fps,
            output_format,
            password,
            compression_level
        );
        self.remove_audio |= other.remove_audio;
        self.delete_original |= other.delete_original;
        self.overwrite |= other.overwrite;
    }

    /// Whether a resize was requested.
    pub fn has_bounds(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }

    /// Fit `(width, height)` inside the requested bounds.
    ///
    /// Aspect ratio is preserved, results are at least one pixel, and the
    /// size never grows.
    ///
    /// ```
    /// use fileforge_codecs::ConversionOptions;
    ///
    /// let opts = ConversionOptions { width: Some(100), ..Default::default() };
    /// assert_eq!(opts.fit_dimensions(400, 200), (100, 50));
    /// assert_eq!(opts.fit_dimensions(80, 60), (80, 60));
    /// ```
    pub fn fit_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        fit_within(width, height, self.width, self.height)
    }
}

/// Scale `(width, height)` down to fit `max_width` × `max_height`.
pub fn fit_within(
    width: u32,
    height: u32,
    max_width: Option<u32>,
    max_height: Option<u32>,
) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }

    let scale_w = max_width.map_or(1.0, |w| w as f64 / width as f64);
    let scale_h = max_height.map_or(1.0, |h| h as f64 / height as f64);
    let scale = scale_w.min(scale_h).min(1.0);
    if scale >= 1.0 {
        return (width, height);
    }

    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    (
        max_width.map_or(w, |m| w.min(m)),
        max_height.map_or(h, |m| h.min(m)),
    )
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CodecError::InvalidInput(format!("invalid value for {key}: {value:?}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "" | "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CodecError::InvalidInput(format!(
            "invalid value for {key}: {value:?}"
        ))),
    }
}

/// Accepts `192k`, `2M` or a bare number of bits per second.
fn parse_bitrate(value: &str) -> Result<String> {
    let lower = value.to_lowercase();
    let digits = lower.trim_end_matches(['k', 'm']);
    if digits.is_empty() || digits.parse::<u32>().is_err() || lower.len() - digits.len() > 1 {
        return Err(CodecError::InvalidInput(format!(
            "invalid value for bitrate: {value:?}"
        )));
    }
    Ok(lower)
}
