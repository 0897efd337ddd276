//! Webcam capture using nokhwa.

use crate::backend::{CaptureBackend, CaptureHandle, CaptureProperty};
use crate::source::{ApiPreference, CaptureError, CaptureSource};
use image::RgbImage;
use nokhwa::Camera;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use tracing::{debug, info, warn};

/// Opens camera sources through the platform's native API.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebcamBackend;

impl WebcamBackend {
    /// List available webcam devices.
    pub fn list_devices() -> Result<Vec<String>, CaptureError> {
        let devices = nokhwa::query(nokhwa::utils::ApiBackend::Auto)
            .map_err(|e| CaptureError::DeviceNotFound(e.to_string()))?;

        Ok(devices
            .into_iter()
            .map(|info| format!("{}: {}", info.index(), info.human_name()))
            .collect())
    }
}

impl CaptureBackend for WebcamBackend {
    fn name(&self) -> &str {
        "webcam"
    }

    fn supports(&self, source: &CaptureSource) -> bool {
        matches!(
            source,
            CaptureSource::Camera {
                api: ApiPreference::Any,
                ..
            }
        )
    }

    fn open(&self, source: &CaptureSource) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        let CaptureSource::Camera { index, .. } = source else {
            return Err(CaptureError::NoBackend(source.to_string()));
        };
        Ok(Box::new(WebcamCapture::new(*index)?))
    }
}

/// Webcam capture handle.
pub struct WebcamCapture {
    camera: Camera,
    frame_count: u64,
    active: bool,
    resolution: (u32, u32),
}

impl WebcamCapture {
    /// Open a webcam by device index at its highest resolution.
    pub fn new(index: u32) -> Result<Self, CaptureError> {
        info!("Opening webcam {}", index);

        let camera_index = CameraIndex::Index(index);
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);

        let mut camera = Camera::new(camera_index, requested)
            .map_err(|e| CaptureError::OpenFailed(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| CaptureError::OpenFailed(e.to_string()))?;

        let resolution = camera.resolution();
        info!(
            "Webcam opened: {}x{} @ {:?} fps",
            resolution.width(),
            resolution.height(),
            camera.frame_rate()
        );

        Ok(Self {
            camera,
            frame_count: 0,
            active: true,
            resolution: (resolution.width(), resolution.height()),
        })
    }
}

impl CaptureHandle for WebcamCapture {
    fn is_opened(&self) -> bool {
        self.active
    }

    fn read(&mut self, frame: &mut RgbImage) -> Result<bool, CaptureError> {
        if !self.active {
            return Ok(false);
        }

        let buffer = self
            .camera
            .frame()
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

        let (width, height) = (decoded.width(), decoded.height());
        *frame = RgbImage::from_raw(width, height, decoded.into_raw())
            .ok_or_else(|| CaptureError::CaptureFailed("Failed to create RGB image".to_string()))?;

        self.frame_count += 1;
        debug!("Captured webcam frame {}", self.frame_count);
        Ok(true)
    }

    fn get(&self, property: CaptureProperty) -> Option<f64> {
        match property {
            CaptureProperty::FrameWidth => Some(self.resolution.0 as f64),
            CaptureProperty::FrameHeight => Some(self.resolution.1 as f64),
            CaptureProperty::Fps => Some(self.camera.frame_rate() as f64),
            _ => None,
        }
    }

    fn set(&mut self, property: CaptureProperty, value: f64) -> Result<bool, CaptureError> {
        if property != CaptureProperty::FrameWidth || value < 1.0 {
            return Ok(false);
        }
        let (width, height) = self.resolution;
        let new_width = value.round() as u32;
        let new_height = (height as u64 * new_width as u64 / width.max(1) as u64) as u32;
        match self.camera.set_resolution(Resolution::new(new_width, new_height)) {
            Ok(()) => {
                let resolution = self.camera.resolution();
                self.resolution = (resolution.width(), resolution.height());
                Ok(true)
            }
            Err(e) => {
                warn!("Webcam refused {}x{}: {}", new_width, new_height, e);
                Ok(false)
            }
        }
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Err(e) = self.camera.stop_stream() {
            warn!("Failed to stop webcam stream: {}", e);
        }
        info!("Webcam capture stopped after {} frames", self.frame_count);
    }
}

impl Drop for WebcamCapture {
    fn drop(&mut self) {
        self.release();
    }
}
