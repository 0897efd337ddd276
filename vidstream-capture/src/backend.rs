//! Backend and handle traits shared by all capture implementations.

use crate::source::{CaptureError, CaptureSource};
use image::RgbImage;
use tracing::debug;

/// Properties a capture handle may report or accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureProperty {
    FrameWidth,
    FrameHeight,
    Fps,
    FrameCount,
    /// Packed four-character codec code.
    FourCC,
    /// Current position in milliseconds.
    PosMsec,
    /// Index of the next frame to be read.
    PosFrames,
    /// Current position as a ratio of the whole stream (0.0 - 1.0).
    PosAviRatio,
    Brightness,
    Contrast,
    Saturation,
    Hue,
    Gain,
    Exposure,
    Focus,
}

/// An open capture device, file or stream.
///
/// This is the lower-level interface driven by the playback loop. A handle is
/// read sequentially; properties the implementation does not know return
/// `None` rather than a placeholder value.
pub trait CaptureHandle: Send {
    /// Whether the handle can still produce frames.
    fn is_opened(&self) -> bool;

    /// Read the next frame into `frame`, reusing its buffer where possible.
    /// Returns `Ok(false)` when no frame is available (end of stream).
    fn read(&mut self, frame: &mut RgbImage) -> Result<bool, CaptureError>;

    /// Query a property, `None` if unsupported.
    fn get(&self, property: CaptureProperty) -> Option<f64>;

    /// Set a property. Returns `Ok(false)` if the property is not settable.
    fn set(&mut self, property: CaptureProperty, value: f64) -> Result<bool, CaptureError>;

    /// Release the underlying resource. Safe to call more than once.
    fn release(&mut self);
}

/// Something that can open capture sources.
pub trait CaptureBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Whether this backend handles the source with its API preference.
    fn supports(&self, source: &CaptureSource) -> bool;

    /// Open the source.
    fn open(&self, source: &CaptureSource) -> Result<Box<dyn CaptureHandle>, CaptureError>;
}

/// Ordered list of backends; the first one supporting a source opens it.
#[derive(Default)]
pub struct BackendChain {
    backends: Vec<Box<dyn CaptureBackend>>,
}

impl BackendChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// The backends compiled into this build: webcams (with the `webcam`
    /// feature), video files and links (with the `opencv` feature) and image
    /// sequences.
    pub fn with_defaults() -> Self {
        let chain = Self::new();
        #[cfg(feature = "webcam")]
        let chain = chain.with(crate::webcam::WebcamBackend::default());
        #[cfg(feature = "opencv")]
        let chain = chain.with(crate::video::VideoCaptureBackend::default());
        chain.with(crate::sequence::ImageSequenceBackend::default())
    }

    /// Append a backend.
    pub fn with(mut self, backend: impl CaptureBackend + 'static) -> Self {
        self.backends.push(Box::new(backend));
        self
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl CaptureBackend for BackendChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn supports(&self, source: &CaptureSource) -> bool {
        self.backends.iter().any(|b| b.supports(source))
    }

    fn open(&self, source: &CaptureSource) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        let backend = self
            .backends
            .iter()
            .find(|b| b.supports(source))
            .ok_or_else(|| CaptureError::NoBackend(source.to_string()))?;
        debug!("Opening {} with backend '{}'", source, backend.name());
        backend.open(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ApiPreference;
    use crate::sequence::ImageSequenceBackend;
    use crate::synthetic::SyntheticBackend;

    #[test]
    fn test_empty_chain_rejects_everything() {
        let chain = BackendChain::new();
        assert!(chain.is_empty());
        let err = chain.open(&CaptureSource::camera(0)).err().unwrap();
        assert!(matches!(err, CaptureError::NoBackend(_)));
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_chain_picks_first_supporting_backend() {
        let chain = BackendChain::new()
            .with(ImageSequenceBackend::default())
            .with(SyntheticBackend::new(8, 6));
        assert_eq!(chain.len(), 2);

        // Image sequences never take cameras, so the synthetic backend opens it.
        let handle = chain.open(&CaptureSource::camera(0)).unwrap();
        assert_eq!(handle.get(CaptureProperty::FrameWidth), Some(8.0));
    }

    #[test]
    fn test_default_chain_leaves_containers_to_video_backends() {
        let chain = BackendChain::with_defaults();
        assert!(chain.supports(&CaptureSource::file("frames/img_%03d.png")));
        assert_eq!(
            chain.supports(&CaptureSource::file("clip.mp4")),
            cfg!(feature = "opencv")
        );
    }

    #[test]
    fn test_preference_nobody_honours() {
        let chain = BackendChain::new().with(ImageSequenceBackend::default());
        let source = CaptureSource::file("clip.mp4").with_api(ApiPreference::FFMpeg);
        assert!(!chain.supports(&source));
        assert!(chain.open(&source).err().unwrap().is_unavailable());
    }
}
