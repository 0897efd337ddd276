//! Error types for playback operations.

use thiserror::Error;
use vidstream_capture::CaptureError;

/// Errors surfaced by the playback controller.
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("No capture source selected")]
    NoSource,

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Seeking is only supported for file sources")]
    NotSeekable,

    #[error("No active capture session")]
    NotPlaying,

    #[error("No frame has been captured yet")]
    NoFrame,

    #[error("Capture session failed: {0}")]
    Session(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CaptureError> for VideoError {
    fn from(err: CaptureError) -> Self {
        if err.is_unavailable() {
            VideoError::SourceUnavailable(err.to_string())
        } else {
            VideoError::Backend(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_error_mapping() {
        let err: VideoError = CaptureError::DeviceNotFound("camera 0".into()).into();
        assert!(matches!(err, VideoError::SourceUnavailable(_)));

        let err: VideoError = CaptureError::Backend("codec init".into()).into();
        assert!(matches!(err, VideoError::Backend(_)));

        let err: VideoError = CaptureError::CaptureFailed("read".into()).into();
        assert!(matches!(err, VideoError::Backend(_)));
    }
}
