//! Vidstream Capture - Video capture sources and backends
//!
//! This crate describes *what* to capture ([`CaptureSource`]) and provides the
//! backends that turn a source into an open [`CaptureHandle`]:
//!
//! - Image sequences on disk (printf patterns, directories, single images)
//! - Synthetic test-pattern streams (for demos and tests)
//! - Webcams (via nokhwa, requires `webcam` feature)
//! - Video files and network links (via OpenCV videoio, requires `opencv`
//!   feature)
//!
//! ## Example
//!
//! ```ignore
//! use vidstream_capture::{BackendChain, CaptureBackend, CaptureSource};
//!
//! let backend = BackendChain::with_defaults();
//! let mut handle = backend.open(&CaptureSource::file("frames/img_%03d.png"))?;
//! let mut frame = image::RgbImage::new(0, 0);
//! while handle.read(&mut frame)? {
//!     // Process frame...
//! }
//! ```

mod backend;
mod sequence;
mod source;
mod synthetic;

#[cfg(feature = "opencv")]
mod video;
#[cfg(feature = "webcam")]
mod webcam;

pub use backend::{BackendChain, CaptureBackend, CaptureHandle, CaptureProperty};
pub use sequence::ImageSequenceBackend;
pub use source::{
    ApiPreference, CaptureError, CaptureSource, FrameData, ParseApiPreferenceError, SourceKind,
};
pub use synthetic::{PictureSettings, SyntheticBackend};

#[cfg(feature = "opencv")]
pub use video::{OpenCvCapture, VideoCaptureBackend};
#[cfg(feature = "webcam")]
pub use webcam::{WebcamBackend, WebcamCapture};
