//! Saving captured frames to image files.

use crate::error::VideoError;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SnapshotFormat {
    Jpeg,
    #[default]
    Png,
    Webp,
    Tiff,
    Bmp,
}

impl SnapshotFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SnapshotFormat::Jpeg => "jpg",
            SnapshotFormat::Png => "png",
            SnapshotFormat::Webp => "webp",
            SnapshotFormat::Tiff => "tiff",
            SnapshotFormat::Bmp => "bmp",
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            SnapshotFormat::Jpeg => ImageFormat::Jpeg,
            SnapshotFormat::Png => ImageFormat::Png,
            SnapshotFormat::Webp => ImageFormat::WebP,
            SnapshotFormat::Tiff => ImageFormat::Tiff,
            SnapshotFormat::Bmp => ImageFormat::Bmp,
        }
    }
}

impl fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Error)]
#[error("Unknown image format '{0}' (expected jpg, png, webp, tiff or bmp)")]
pub struct ParseFormatError(String);

impl FromStr for SnapshotFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(SnapshotFormat::Jpeg),
            "png" => Ok(SnapshotFormat::Png),
            "webp" => Ok(SnapshotFormat::Webp),
            "tif" | "tiff" => Ok(SnapshotFormat::Tiff),
            "bmp" => Ok(SnapshotFormat::Bmp),
            _ => Err(ParseFormatError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotOptions {
    pub format: SnapshotFormat,
    /// JPEG quality, 1-100. Ignored by other formats.
    pub jpeg_quality: u8,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            format: SnapshotFormat::default(),
            jpeg_quality: 95,
        }
    }
}

impl SnapshotOptions {
    pub fn new(format: SnapshotFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }
}

/// Write `image` next to `path`, with the extension replaced by the format's.
/// Returns the path actually written.
pub fn save_image(
    image: &RgbImage,
    path: &Path,
    options: &SnapshotOptions,
) -> Result<PathBuf, VideoError> {
    let target = path.with_extension(options.format.extension());
    match options.format {
        SnapshotFormat::Jpeg => {
            let mut writer = BufWriter::new(File::create(&target)?);
            JpegEncoder::new_with_quality(&mut writer, options.jpeg_quality).encode_image(image)?;
            writer.flush()?;
        }
        format => image.save_with_format(&target, format.image_format())?,
    }
    debug!("Saved {}x{} frame to {}", image.width(), image.height(), target.display());
    Ok(target)
}
