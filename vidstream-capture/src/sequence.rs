//! Image sequence capture: numbered files, directories of images, or a single
//! still image played back as a video file.

use crate::backend::{CaptureBackend, CaptureHandle, CaptureProperty};
use crate::source::{ApiPreference, CaptureError, CaptureSource};
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Nominal frame rate reported for sequences, which carry no timing.
const DEFAULT_SEQUENCE_FPS: f64 = 30.0;

/// Opens file sources as image sequences.
///
/// Accepted locations:
/// - a printf-style pattern such as `frames/img_%03d.png`, numbered from 0 or 1
/// - a directory, whose image files are played in name order
/// - a single image file (a one-frame sequence)
#[derive(Debug, Clone)]
pub struct ImageSequenceBackend {
    fps: f64,
}

impl Default for ImageSequenceBackend {
    fn default() -> Self {
        Self {
            fps: DEFAULT_SEQUENCE_FPS,
        }
    }
}

impl ImageSequenceBackend {
    /// Set the nominal frame rate used for timestamps and millisecond seeks.
    pub fn with_fps(mut self, fps: f64) -> Self {
        if fps > 0.0 {
            self.fps = fps;
        }
        self
    }
}

impl CaptureBackend for ImageSequenceBackend {
    fn name(&self) -> &str {
        "image-sequence"
    }

    fn supports(&self, source: &CaptureSource) -> bool {
        match source {
            CaptureSource::File {
                api: ApiPreference::Images,
                ..
            } => true,
            CaptureSource::File {
                path,
                api: ApiPreference::Any,
            } => is_image_sequence(path),
            _ => false,
        }
    }

    fn open(&self, source: &CaptureSource) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        let CaptureSource::File { path, .. } = source else {
            return Err(CaptureError::NoBackend(source.to_string()));
        };
        Ok(Box::new(ImageSequenceCapture::open(path, self.fps)?))
    }
}

/// An open image sequence.
pub struct ImageSequenceCapture {
    frames: Vec<PathBuf>,
    next: usize,
    width: u32,
    height: u32,
    fps: f64,
    opened: bool,
}

impl ImageSequenceCapture {
    pub fn open(location: &Path, fps: f64) -> Result<Self, CaptureError> {
        let frames = resolve_frames(location)?;
        let first = frames.first().ok_or_else(|| {
            CaptureError::OpenFailed(format!("{}: no images found", location.display()))
        })?;
        let (width, height) = image::image_dimensions(first)?;

        info!(
            "Image sequence opened: {} frames, {}x{} @ {} fps",
            frames.len(),
            width,
            height,
            fps
        );

        Ok(Self {
            frames,
            next: 0,
            width,
            height,
            fps,
            opened: true,
        })
    }

    fn len(&self) -> usize {
        self.frames.len()
    }

    fn seek_to(&mut self, index: f64) {
        let index = index.round().clamp(0.0, self.len() as f64);
        self.next = index as usize;
        debug!("Sequence position set to frame {}", self.next);
    }
}

impl CaptureHandle for ImageSequenceCapture {
    fn is_opened(&self) -> bool {
        self.opened
    }

    fn read(&mut self, frame: &mut RgbImage) -> Result<bool, CaptureError> {
        if !self.opened || self.next >= self.len() {
            return Ok(false);
        }
        *frame = image::open(&self.frames[self.next])?.to_rgb8();
        self.next += 1;
        Ok(true)
    }

    fn get(&self, property: CaptureProperty) -> Option<f64> {
        let count = self.len() as f64;
        match property {
            CaptureProperty::FrameWidth => Some(self.width as f64),
            CaptureProperty::FrameHeight => Some(self.height as f64),
            CaptureProperty::FrameCount => Some(count),
            CaptureProperty::Fps => Some(self.fps),
            CaptureProperty::PosFrames => Some(self.next as f64),
            CaptureProperty::PosMsec => Some(self.next as f64 * 1000.0 / self.fps),
            CaptureProperty::PosAviRatio if count > 0.0 => Some(self.next as f64 / count),
            _ => None,
        }
    }

    fn set(&mut self, property: CaptureProperty, value: f64) -> Result<bool, CaptureError> {
        if !value.is_finite() {
            return Ok(false);
        }
        match property {
            CaptureProperty::PosFrames => self.seek_to(value),
            CaptureProperty::PosMsec => self.seek_to(value * self.fps / 1000.0),
            CaptureProperty::PosAviRatio => self.seek_to(value * self.len() as f64),
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn release(&mut self) {
        if self.opened {
            self.opened = false;
            self.frames.clear();
            debug!("Image sequence released");
        }
    }
}

/// Whether `location` names still images rather than a video container: a
/// numbered pattern, a directory or a file with an image extension.
pub(crate) fn is_image_sequence(location: &Path) -> bool {
    FramePattern::parse(&location.to_string_lossy()).is_some()
        || location.is_dir()
        || image::ImageFormat::from_path(location).is_ok()
}

fn resolve_frames(location: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let text = location.to_string_lossy();
    if let Some(pattern) = FramePattern::parse(&text) {
        return Ok(pattern.enumerate());
    }
    if location.is_dir() {
        let mut frames = Vec::new();
        for entry in std::fs::read_dir(location)? {
            let path = entry?.path();
            if path.is_file() && image::ImageFormat::from_path(&path).is_ok() {
                frames.push(path);
            }
        }
        frames.sort();
        return Ok(frames);
    }
    if location.is_file() {
        return Ok(vec![location.to_path_buf()]);
    }
    Err(CaptureError::DeviceNotFound(location.display().to_string()))
}

/// A printf-style `%d` / `%0Nd` numbered file pattern.
#[derive(Debug, PartialEq)]
struct FramePattern {
    prefix: String,
    suffix: String,
    width: usize,
    zero_pad: bool,
}

impl FramePattern {
    fn parse(text: &str) -> Option<Self> {
        let start = text.find('%')?;
        let rest = &text[start + 1..];
        let digits_len = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if rest[digits_len..].chars().next() != Some('d') {
            return None;
        }
        let digits = &rest[..digits_len];
        Some(Self {
            prefix: text[..start].to_string(),
            suffix: rest[digits_len + 1..].to_string(),
            width: digits.parse().unwrap_or(0),
            zero_pad: digits.starts_with('0'),
        })
    }

    fn path(&self, index: usize) -> PathBuf {
        let number = if self.zero_pad {
            format!("{:0width$}", index, width = self.width)
        } else {
            format!("{:width$}", index, width = self.width)
        };
        PathBuf::from(format!("{}{}{}", self.prefix, number, self.suffix))
    }

    fn enumerate(&self) -> Vec<PathBuf> {
        let Some(start) = (0..=1).find(|i| self.path(*i).is_file()) else {
            return Vec::new();
        };
        (start..)
            .map(|i| self.path(i))
            .take_while(|p| p.is_file())
            .collect()
    }
}
