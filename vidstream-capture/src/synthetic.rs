//! Synthetic test-pattern capture.
//!
//! Useful for demos without hardware and as a scriptable stand-in for real
//! devices in tests. File sources are finite; cameras and links stream until
//! released.

use crate::backend::{CaptureBackend, CaptureHandle, CaptureProperty};
use crate::source::{CaptureError, CaptureSource, SourceKind};
use image::{Rgb, RgbImage};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// Picture controls reported by synthetic cameras and links.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PictureSettings {
    pub brightness: Option<f64>,
    pub contrast: Option<f64>,
    pub saturation: Option<f64>,
    pub hue: Option<f64>,
    pub gain: Option<f64>,
    pub exposure: Option<f64>,
    pub focus: Option<f64>,
}

/// Backend producing generated frames for any source.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    width: u32,
    height: u32,
    file_frames: u64,
    fourcc: Option<u32>,
    fps: Option<f64>,
    picture: PictureSettings,
    unavailable_cameras: Vec<u32>,
    unavailable_paths: Vec<PathBuf>,
    open_error: Option<String>,
    live: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
}

impl SyntheticBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            file_frames: 10,
            fourcc: None,
            fps: None,
            picture: PictureSettings::default(),
            unavailable_cameras: Vec::new(),
            unavailable_paths: Vec::new(),
            open_error: None,
            live: Arc::new(AtomicUsize::new(0)),
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of frames a file source yields before end of stream.
    pub fn with_file_frames(mut self, frames: u64) -> Self {
        self.file_frames = frames;
        self
    }

    /// Codec code reported by file sources, e.g. `*b"avc1"`.
    pub fn with_fourcc(mut self, code: [u8; 4]) -> Self {
        self.fourcc = Some(u32::from_le_bytes(code));
        self
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }

    pub fn with_picture(mut self, picture: PictureSettings) -> Self {
        self.picture = picture;
        self
    }

    /// Make opening this camera index fail as if the device were busy or absent.
    pub fn with_unavailable_camera(mut self, index: u32) -> Self {
        self.unavailable_cameras.push(index);
        self
    }

    /// Make opening this file path fail as if it were missing.
    pub fn with_unavailable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.unavailable_paths.push(path.into());
        self
    }

    /// Make every open fail with a backend error.
    pub fn with_open_error(mut self, message: impl Into<String>) -> Self {
        self.open_error = Some(message.into());
        self
    }

    /// Handles opened and not yet released (shared across clones).
    pub fn live_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Handles ever opened (shared across clones).
    pub fn opened_handles(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Recover the zero-based index of the frame that produced `image`.
    ///
    /// The index is stamped into the red and green channels of the top-left
    /// pixel.
    pub fn frame_index_of(image: &RgbImage) -> Option<u64> {
        if image.width() == 0 || image.height() == 0 {
            return None;
        }
        let px = image.get_pixel(0, 0);
        Some(px[0] as u64 | (px[1] as u64) << 8)
    }
}

impl CaptureBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn supports(&self, source: &CaptureSource) -> bool {
        !source.is_none()
    }

    fn open(&self, source: &CaptureSource) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        if let Some(message) = &self.open_error {
            return Err(CaptureError::Backend(message.clone()));
        }
        let (kind, total) = match source {
            CaptureSource::Camera { index, .. } => {
                if self.unavailable_cameras.contains(index) {
                    return Err(CaptureError::DeviceNotFound(format!("camera {}", index)));
                }
                (SourceKind::Camera, None)
            }
            CaptureSource::File { path, .. } => {
                if self.unavailable_paths.contains(path) {
                    return Err(CaptureError::DeviceNotFound(path.display().to_string()));
                }
                (SourceKind::File, Some(self.file_frames))
            }
            CaptureSource::Link { uri, .. } => {
                if !uri.contains("://") {
                    return Err(CaptureError::OpenFailed(format!("malformed link '{}'", uri)));
                }
                (SourceKind::Link, None)
            }
            CaptureSource::None => return Err(CaptureError::NoBackend(source.to_string())),
        };

        self.live.fetch_add(1, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
        info!("Synthetic {} opened: {}x{}", source, self.width, self.height);

        Ok(Box::new(SyntheticCapture {
            kind,
            width: self.width,
            height: self.height,
            total,
            position: 0,
            fps: self.fps,
            fourcc: self.fourcc,
            picture: self.picture,
            live: Some(self.live.clone()),
        }))
    }
}

struct SyntheticCapture {
    kind: SourceKind,
    width: u32,
    height: u32,
    total: Option<u64>,
    position: u64,
    fps: Option<f64>,
    fourcc: Option<u32>,
    picture: PictureSettings,
    // Present until released.
    live: Option<Arc<AtomicUsize>>,
}

impl SyntheticCapture {
    fn is_file(&self) -> bool {
        self.kind == SourceKind::File
    }

    fn stream_only(&self, value: Option<f64>) -> Option<f64> {
        if self.is_file() { None } else { value }
    }

    fn file_only(&self, value: Option<f64>) -> Option<f64> {
        if self.is_file() { value } else { None }
    }
}

impl CaptureHandle for SyntheticCapture {
    fn is_opened(&self) -> bool {
        self.live.is_some()
    }

    fn read(&mut self, frame: &mut RgbImage) -> Result<bool, CaptureError> {
        if !self.is_opened() {
            return Ok(false);
        }
        if self.total.is_some_and(|total| self.position >= total) {
            return Ok(false);
        }
        let index = self.position;
        *frame = RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb([
                (x as u64 + index) as u8,
                (y as u64 + index) as u8,
                (index % 256) as u8,
            ])
        });
        if self.width > 0 && self.height > 0 {
            frame.put_pixel(0, 0, Rgb([index as u8, (index >> 8) as u8, 0]));
        }
        self.position += 1;
        Ok(true)
    }

    fn get(&self, property: CaptureProperty) -> Option<f64> {
        let p = &self.picture;
        match property {
            CaptureProperty::FrameWidth => Some(self.width as f64),
            CaptureProperty::FrameHeight => Some(self.height as f64),
            CaptureProperty::Fps => self.fps,
            CaptureProperty::FrameCount => self.total.map(|t| t as f64),
            CaptureProperty::FourCC => self.file_only(self.fourcc.map(f64::from)),
            CaptureProperty::PosFrames => self.file_only(Some(self.position as f64)),
            CaptureProperty::PosMsec => {
                self.file_only(Some(self.position as f64 * 1000.0 / self.fps.unwrap_or(30.0)))
            }
            CaptureProperty::PosAviRatio => match self.total {
                Some(total) if total > 0 => Some(self.position as f64 / total as f64),
                _ => None,
            },
            CaptureProperty::Brightness => self.stream_only(p.brightness),
            CaptureProperty::Contrast => self.stream_only(p.contrast),
            CaptureProperty::Saturation => self.stream_only(p.saturation),
            CaptureProperty::Hue => self.stream_only(p.hue),
            CaptureProperty::Gain => self.stream_only(p.gain),
            CaptureProperty::Exposure => self.stream_only(p.exposure),
            CaptureProperty::Focus => self.stream_only(p.focus),
        }
    }

    fn set(&mut self, property: CaptureProperty, value: f64) -> Result<bool, CaptureError> {
        if !value.is_finite() || value < 0.0 {
            return Ok(false);
        }
        match (property, self.total) {
            (CaptureProperty::PosFrames, Some(total)) => {
                self.position = (value.round() as u64).min(total);
                Ok(true)
            }
            (CaptureProperty::FrameWidth, None) if value >= 1.0 => {
                let width = value.round() as u32;
                self.height = (self.height as u64 * width as u64 / self.width.max(1) as u64) as u32;
                self.width = width;
                debug!("Synthetic frame size now {}x{}", self.width, self.height);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn release(&mut self) {
        if let Some(live) = self.live.take() {
            live.fetch_sub(1, Ordering::SeqCst);
            debug!("Synthetic capture released after {} frames", self.position);
        }
    }
}

impl Drop for SyntheticCapture {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_source_is_finite_and_ordered() {
        let backend = SyntheticBackend::new(4, 4).with_file_frames(3);
        let mut handle = backend.open(&CaptureSource::file("clip.mp4")).unwrap();
        let mut frame = RgbImage::new(0, 0);
        let mut seen = Vec::new();
        while handle.read(&mut frame).unwrap() {
            seen.push(SyntheticBackend::frame_index_of(&frame).unwrap());
        }
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(handle.get(CaptureProperty::FrameCount), Some(3.0));
    }

    #[test]
    fn test_camera_reports_picture_but_not_file_props() {
        let backend = SyntheticBackend::new(4, 4).with_fps(25.0).with_picture(PictureSettings {
            brightness: Some(0.5),
            ..Default::default()
        });
        let handle = backend.open(&CaptureSource::camera(0)).unwrap();
        assert_eq!(handle.get(CaptureProperty::Fps), Some(25.0));
        assert_eq!(handle.get(CaptureProperty::Brightness), Some(0.5));
        assert_eq!(handle.get(CaptureProperty::Contrast), None);
        assert_eq!(handle.get(CaptureProperty::FrameCount), None);
        assert_eq!(handle.get(CaptureProperty::PosFrames), None);
    }

    #[test]
    fn test_live_handle_accounting() {
        let backend = SyntheticBackend::new(2, 2);
        let mut a = backend.open(&CaptureSource::camera(0)).unwrap();
        let b = backend.open(&CaptureSource::file("x.avi")).unwrap();
        assert_eq!(backend.live_handles(), 2);
        a.release();
        a.release();
        assert_eq!(backend.live_handles(), 1);
        drop(b);
        assert_eq!(backend.live_handles(), 0);
        assert_eq!(backend.opened_handles(), 2);
    }

    #[test]
    fn test_unavailable_sources() {
        let backend = SyntheticBackend::new(2, 2)
            .with_unavailable_camera(1)
            .with_unavailable_path("gone.mp4");
        assert!(backend.open(&CaptureSource::camera(1)).err().unwrap().is_unavailable());
        assert!(backend.open(&CaptureSource::file("gone.mp4")).err().unwrap().is_unavailable());
        assert!(backend.open(&CaptureSource::link("not a link")).err().unwrap().is_unavailable());
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_camera_frame_width_keeps_aspect() {
        let backend = SyntheticBackend::new(1280, 720);
        let mut handle = backend.open(&CaptureSource::camera(0)).unwrap();
        assert!(handle.set(CaptureProperty::FrameWidth, 640.0).unwrap());
        assert_eq!(handle.get(CaptureProperty::FrameHeight), Some(360.0));
    }

    #[test]
    fn test_fourcc_round_trip_bytes() {
        let backend = SyntheticBackend::new(2, 2).with_fourcc(*b"avc1");
        let handle = backend.open(&CaptureSource::file("a.mp4")).unwrap();
        let code = handle.get(CaptureProperty::FourCC).unwrap() as u32;
        assert_eq!(code.to_le_bytes(), *b"avc1");
    }
}
