//! Common capture source types.

use image::RgbImage;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open source: {0}")]
    OpenFailed(String),

    #[error("No backend accepts {0}")]
    NoBackend(String),

    #[error("Failed to capture frame: {0}")]
    CaptureFailed(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// Whether the error means the source itself could not be reached
    /// (missing device, missing file, malformed link, no backend for it),
    /// as opposed to the backend failing while working with it.
    pub fn is_unavailable(&self) -> bool {
        match self {
            CaptureError::DeviceNotFound(_)
            | CaptureError::OpenFailed(_)
            | CaptureError::NoBackend(_) => true,
            CaptureError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Raw frame data from a capture source.
#[derive(Debug, Clone)]
pub struct FrameData {
    /// RGB image data.
    pub image: RgbImage,
    /// Frame timestamp in seconds (relative to stream start).
    pub timestamp: f64,
    /// Frame number, starting at 1 for the first frame of a session.
    pub frame_number: u64,
}

impl FrameData {
    /// Create a new frame.
    pub fn new(image: RgbImage, timestamp: f64, frame_number: u64) -> Self {
        Self {
            image,
            timestamp,
            frame_number,
        }
    }

    /// Get image dimensions (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// A frame with no pixels.
    pub fn is_empty(&self) -> bool {
        let (width, height) = self.dimensions();
        width == 0 || height == 0
    }
}

/// Which capture API a source should be opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApiPreference {
    /// Let the backend chain pick.
    #[default]
    Any,
    DShow,
    FFMpeg,
    /// Image sequences on disk.
    Images,
}

impl ApiPreference {
    pub const ALL: [ApiPreference; 4] = [
        ApiPreference::Any,
        ApiPreference::DShow,
        ApiPreference::FFMpeg,
        ApiPreference::Images,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApiPreference::Any => "Any",
            ApiPreference::DShow => "DShow",
            ApiPreference::FFMpeg => "FFMpeg",
            ApiPreference::Images => "Images",
        }
    }
}

impl fmt::Display for ApiPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown API preference '{0}' (expected any, dshow, ffmpeg or images)")]
pub struct ParseApiPreferenceError(String);

impl FromStr for ApiPreference {
    type Err = ParseApiPreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApiPreference::ALL
            .into_iter()
            .find(|api| api.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseApiPreferenceError(s.to_string()))
    }
}

/// Kind of a capture source, without its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Camera,
    File,
    Link,
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CaptureSource {
    Camera { index: u32, api: ApiPreference },
    File { path: PathBuf, api: ApiPreference },
    Link { uri: String, api: ApiPreference },
    #[default]
    None,
}

impl CaptureSource {
    /// Camera by device index, any API.
    pub fn camera(index: u32) -> Self {
        CaptureSource::Camera {
            index,
            api: ApiPreference::Any,
        }
    }

    /// File (or image sequence pattern) by path, any API.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        CaptureSource::File {
            path: path.into(),
            api: ApiPreference::Any,
        }
    }

    /// Network link by URI, any API.
    pub fn link(uri: impl Into<String>) -> Self {
        CaptureSource::Link {
            uri: uri.into(),
            api: ApiPreference::Any,
        }
    }

    /// Classify a free-form location: an existing path is a file, anything
    /// else is a link. Blank input yields `None`.
    pub fn from_location(location: &str, api: ApiPreference) -> Self {
        let location = location.trim();
        if location.is_empty() {
            return CaptureSource::None;
        }
        if Path::new(location).exists() {
            CaptureSource::File {
                path: PathBuf::from(location),
                api,
            }
        } else {
            CaptureSource::Link {
                uri: location.to_string(),
                api,
            }
        }
    }

    /// Replace the API preference (no-op for `None`).
    pub fn with_api(self, api: ApiPreference) -> Self {
        match self {
            CaptureSource::Camera { index, .. } => CaptureSource::Camera { index, api },
            CaptureSource::File { path, .. } => CaptureSource::File { path, api },
            CaptureSource::Link { uri, .. } => CaptureSource::Link { uri, api },
            CaptureSource::None => CaptureSource::None,
        }
    }

    pub fn api(&self) -> Option<ApiPreference> {
        match self {
            CaptureSource::Camera { api, .. }
            | CaptureSource::File { api, .. }
            | CaptureSource::Link { api, .. } => Some(*api),
            CaptureSource::None => None,
        }
    }

    pub fn kind(&self) -> Option<SourceKind> {
        match self {
            CaptureSource::Camera { .. } => Some(SourceKind::Camera),
            CaptureSource::File { .. } => Some(SourceKind::File),
            CaptureSource::Link { .. } => Some(SourceKind::Link),
            CaptureSource::None => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, CaptureSource::None)
    }
}

impl fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureSource::Camera { index, api } => write!(f, "camera {} ({})", index, api),
            CaptureSource::File { path, api } => write!(f, "file {} ({})", path.display(), api),
            CaptureSource::Link { uri, api } => write!(f, "link {} ({})", uri, api),
            CaptureSource::None => f.write_str("no source"),
        }
    }
}
