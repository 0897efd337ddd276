//! Video files, network streams and indexed cameras through OpenCV videoio.

use crate::backend::{CaptureBackend, CaptureHandle, CaptureProperty};
use crate::sequence::is_image_sequence;
use crate::source::{ApiPreference, CaptureError, CaptureSource};
use image::RgbImage;
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio;
use tracing::{debug, info, warn};

/// Decodes video containers (mp4, avi, mkv, ...) and network links, and
/// opens cameras when a capture API is named explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoCaptureBackend;

impl CaptureBackend for VideoCaptureBackend {
    fn name(&self) -> &str {
        "opencv"
    }

    fn supports(&self, source: &CaptureSource) -> bool {
        match source {
            CaptureSource::File { path, api } => match api {
                ApiPreference::FFMpeg | ApiPreference::DShow => true,
                ApiPreference::Any => !is_image_sequence(path),
                ApiPreference::Images => false,
            },
            CaptureSource::Link { api, .. } => {
                matches!(api, ApiPreference::Any | ApiPreference::FFMpeg)
            }
            CaptureSource::Camera { api, .. } => {
                matches!(api, ApiPreference::Any | ApiPreference::DShow)
            }
            CaptureSource::None => false,
        }
    }

    fn open(&self, source: &CaptureSource) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        Ok(Box::new(OpenCvCapture::open(source)?))
    }
}

/// An open OpenCV capture.
pub struct OpenCvCapture {
    capture: videoio::VideoCapture,
    mat: Mat,
    opened: bool,
    frames_read: u64,
}

impl OpenCvCapture {
    pub fn open(source: &CaptureSource) -> Result<Self, CaptureError> {
        let api = source.api().map(api_id).unwrap_or(videoio::CAP_ANY);
        let capture = match source {
            CaptureSource::Camera { index, .. } => {
                videoio::VideoCapture::new(*index as i32, api).map_err(backend_error)?
            }
            CaptureSource::File { path, .. } => {
                if !path.exists() {
                    return Err(CaptureError::DeviceNotFound(path.display().to_string()));
                }
                videoio::VideoCapture::from_file(&path.to_string_lossy(), api)
                    .map_err(backend_error)?
            }
            CaptureSource::Link { uri, .. } => {
                videoio::VideoCapture::from_file(uri, api).map_err(backend_error)?
            }
            CaptureSource::None => return Err(CaptureError::NoBackend(source.to_string())),
        };

        if !capture.is_opened().map_err(backend_error)? {
            return Err(CaptureError::OpenFailed(source.to_string()));
        }
        info!(
            "Opened {} with {}",
            source,
            capture.get_backend_name().unwrap_or_else(|_| "opencv".to_string())
        );

        Ok(Self {
            capture,
            mat: Mat::default(),
            opened: true,
            frames_read: 0,
        })
    }
}

impl CaptureHandle for OpenCvCapture {
    fn is_opened(&self) -> bool {
        self.opened
    }

    fn read(&mut self, frame: &mut RgbImage) -> Result<bool, CaptureError> {
        if !self.opened {
            return Ok(false);
        }
        if !self.capture.read(&mut self.mat).map_err(backend_error)? || self.mat.empty() {
            return Ok(false);
        }
        bgr_to_rgb(&self.mat, frame)?;
        self.frames_read += 1;
        Ok(true)
    }

    fn get(&self, property: CaptureProperty) -> Option<f64> {
        if !self.opened {
            return None;
        }
        let value = self.capture.get(property_id(property)).ok()?;
        reported(property, value)
    }

    fn set(&mut self, property: CaptureProperty, value: f64) -> Result<bool, CaptureError> {
        if !self.opened {
            return Ok(false);
        }
        self.capture
            .set(property_id(property), value)
            .map_err(backend_error)
    }

    fn release(&mut self) {
        if !self.opened {
            return;
        }
        self.opened = false;
        if let Err(e) = self.capture.release() {
            warn!("Failed to release capture: {}", e);
        }
        debug!("Capture released after {} frames", self.frames_read);
    }
}

impl Drop for OpenCvCapture {
    fn drop(&mut self) {
        self.release();
    }
}

fn backend_error(err: opencv::Error) -> CaptureError {
    CaptureError::Backend(err.to_string())
}

fn api_id(api: ApiPreference) -> i32 {
    match api {
        ApiPreference::Any => videoio::CAP_ANY,
        ApiPreference::DShow => videoio::CAP_DSHOW,
        ApiPreference::FFMpeg => videoio::CAP_FFMPEG,
        ApiPreference::Images => videoio::CAP_IMAGES,
    }
}

fn property_id(property: CaptureProperty) -> i32 {
    match property {
        CaptureProperty::FrameWidth => videoio::CAP_PROP_FRAME_WIDTH,
        CaptureProperty::FrameHeight => videoio::CAP_PROP_FRAME_HEIGHT,
        CaptureProperty::Fps => videoio::CAP_PROP_FPS,
        CaptureProperty::FrameCount => videoio::CAP_PROP_FRAME_COUNT,
        CaptureProperty::FourCC => videoio::CAP_PROP_FOURCC,
        CaptureProperty::PosMsec => videoio::CAP_PROP_POS_MSEC,
        CaptureProperty::PosFrames => videoio::CAP_PROP_POS_FRAMES,
        CaptureProperty::PosAviRatio => videoio::CAP_PROP_POS_AVI_RATIO,
        CaptureProperty::Brightness => videoio::CAP_PROP_BRIGHTNESS,
        CaptureProperty::Contrast => videoio::CAP_PROP_CONTRAST,
        CaptureProperty::Saturation => videoio::CAP_PROP_SATURATION,
        CaptureProperty::Hue => videoio::CAP_PROP_HUE,
        CaptureProperty::Gain => videoio::CAP_PROP_GAIN,
        CaptureProperty::Exposure => videoio::CAP_PROP_EXPOSURE,
        CaptureProperty::Focus => videoio::CAP_PROP_FOCUS,
    }
}

/// OpenCV answers 0 for properties a backend does not implement. Positions
/// are the exception, where 0 is the start of the stream.
fn reported(property: CaptureProperty, value: f64) -> Option<f64> {
    match property {
        CaptureProperty::PosMsec | CaptureProperty::PosFrames | CaptureProperty::PosAviRatio => {
            (value >= 0.0).then_some(value)
        }
        _ => (value.is_finite() && value != 0.0).then_some(value),
    }
}

/// Copy a BGR frame into `frame` as RGB.
fn bgr_to_rgb(mat: &Mat, frame: &mut RgbImage) -> Result<(), CaptureError> {
    if mat.channels() != 3 {
        return Err(CaptureError::CaptureFailed(format!(
            "expected 3 channels, got {}",
            mat.channels()
        )));
    }
    let (width, height) = (mat.cols() as u32, mat.rows() as u32);
    let data = mat.data_bytes().map_err(backend_error)?;

    let mut rgb = Vec::with_capacity(data.len());
    for chunk in data.chunks_exact(3) {
        rgb.extend_from_slice(&[chunk[2], chunk[1], chunk[0]]);
    }
    *frame = RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| CaptureError::CaptureFailed("frame size mismatch".to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_takes_containers_and_links() {
        let backend = VideoCaptureBackend;
        assert!(backend.supports(&CaptureSource::file("clip.mp4")));
        assert!(backend.supports(&CaptureSource::link("rtsp://10.0.0.2/stream")));
        assert!(backend.supports(&CaptureSource::camera(0).with_api(ApiPreference::DShow)));
        assert!(!backend.supports(&CaptureSource::file("frame_%03d.png")));
        assert!(!backend.supports(&CaptureSource::file("clip.mp4").with_api(ApiPreference::Images)));
        assert!(!backend.supports(&CaptureSource::link("http://host/live").with_api(ApiPreference::DShow)));
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = OpenCvCapture::open(&CaptureSource::file(dir.path().join("gone.mp4")))
            .err()
            .unwrap();
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_unsupported_properties_are_absent() {
        assert_eq!(reported(CaptureProperty::Focus, 0.0), None);
        assert_eq!(reported(CaptureProperty::Exposure, -6.0), Some(-6.0));
        assert_eq!(reported(CaptureProperty::PosFrames, 0.0), Some(0.0));
        assert_eq!(reported(CaptureProperty::PosMsec, -1.0), None);
        assert_eq!(reported(CaptureProperty::Fps, f64::NAN), None);
    }

    #[test]
    fn test_preference_maps_to_capture_api() {
        assert_eq!(api_id(ApiPreference::FFMpeg), videoio::CAP_FFMPEG);
        assert_eq!(api_id(ApiPreference::DShow), videoio::CAP_DSHOW);
        assert_eq!(property_id(CaptureProperty::PosFrames), videoio::CAP_PROP_POS_FRAMES);
        assert_eq!(property_id(CaptureProperty::FourCC), videoio::CAP_PROP_FOURCC);
    }

    #[test]
    fn test_bgr_frame_becomes_rgb() {
        use opencv::core::{CV_8UC3, Scalar};

        let mat = Mat::new_rows_cols_with_default(2, 3, CV_8UC3, Scalar::new(10.0, 20.0, 30.0, 0.0))
            .unwrap();
        let mut frame = RgbImage::new(0, 0);
        bgr_to_rgb(&mat, &mut frame).unwrap();
        assert_eq!(frame.dimensions(), (3, 2));
        assert_eq!(frame.get_pixel(2, 1).0, [30, 20, 10]);
    }
}
