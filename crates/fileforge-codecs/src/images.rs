//! Raster image conversion with the pure-Rust `image` crate.

use crate::adapter::{target_format, CodecAdapter, MediaSummary};
use crate::{CodecError, ConversionOptions, Result, Workspace};
use fileforge_common::{FileCategory, FileDescriptor};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::imageops::FilterType as ResizeFilter;
use image::{DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const INPUTS: &[&str] = &[
    "jpg", "png", "gif", "bmp", "tiff", "webp", "ico", "ppm", "pgm", "pbm", "tga",
];
const OUTPUTS: &[&str] = &["jpg", "png", "gif", "bmp", "tiff", "webp", "ico"];

/// Default JPEG quality when none is requested.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Icons cannot exceed 256 pixels on either side.
const ICO_MAX: u32 = 256;

/// Image adapter backed by the `image` crate. Needs no external tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageAdapter;

impl ImageAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl CodecAdapter for ImageAdapter {
    fn name(&self) -> &str {
        "image"
    }

    fn category(&self) -> FileCategory {
        FileCategory::Image
    }

    fn input_formats(&self) -> &[&'static str] {
        INPUTS
    }

    fn output_formats(&self) -> &[&'static str] {
        OUTPUTS
    }

    fn convert(
        &self,
        source: &Path,
        dest: &Path,
        options: &ConversionOptions,
    ) -> Result<FileDescriptor> {
        let target = target_format(dest, options)?;
        let format = ImageFormat::from_extension(target.as_str())
            .filter(|_| self.supports_output(&target))
            .ok_or_else(|| CodecError::Unsupported(format!("image output {target}")))?;

        let image = ImageReader::open(source)?.with_guessed_format()?.decode()?;

        let (mut width, mut height) = options.fit_dimensions(image.width(), image.height());
        if format == ImageFormat::Ico {
            (width, height) = crate::options::fit_within(width, height, Some(ICO_MAX), Some(ICO_MAX));
        }
        let image = if (width, height) != (image.width(), image.height()) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                "Resizing {}x{} -> {}x{}",
                image.width(),
                image.height(),
                width,
                height
            );
            image.resize_exact(width, height, ResizeFilter::Lanczos3)
        } else {
            image
        };

        let workspace = Workspace::new(dest)?;
        write_image(&image, format, workspace.output(), options)?;
        let finalized = workspace.finalize()?;

        Ok(FileDescriptor::snapshot(&finalized)?)
    }

    fn inspect(&self, path: &Path) -> Result<MediaSummary> {
        let size = std::fs::metadata(path)?.len();
        let (width, height) = ImageReader::open(path)?
            .with_guessed_format()?
            .into_dimensions()?;

        Ok(MediaSummary {
            size,
            width: Some(width),
            height: Some(height),
            ..Default::default()
        })
    }
}

fn write_image(
    image: &DynamicImage,
    format: ImageFormat,
    path: &Path,
    options: &ConversionOptions,
) -> Result<()> {
    match format {
        ImageFormat::Jpeg => {
            let quality = options.quality.unwrap_or(DEFAULT_JPEG_QUALITY);
            let mut writer = BufWriter::new(File::create(path)?);
            let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
            DynamicImage::ImageRgb8(flatten_onto_white(image)).write_with_encoder(encoder)?;
            writer.flush()?;
        }
        ImageFormat::Png => {
            let compression = match options.compression_level {
                Some(0..=3) => CompressionType::Fast,
                Some(7..=9) => CompressionType::Best,
                _ => CompressionType::Default,
            };
            let mut writer = BufWriter::new(File::create(path)?);
            let encoder = PngEncoder::new_with_quality(&mut writer, compression, FilterType::Adaptive);
            normalize(image, false).write_with_encoder(encoder)?;
            writer.flush()?;
        }
        ImageFormat::Gif | ImageFormat::Ico | ImageFormat::WebP => {
            normalize(image, true).save_with_format(path, format)?;
        }
        _ => normalize(image, false).save_with_format(path, format)?,
    }
    Ok(())
}

/// Reduce to 8-bit RGB or RGBA, which every encoder here accepts.
fn normalize(image: &DynamicImage, force_alpha: bool) -> DynamicImage {
    if force_alpha || image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    }
}

/// JPEG has no alpha channel; composite transparent pixels over white.
fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let a = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}
