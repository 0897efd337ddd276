//! Capture metadata and playback position read from an open handle.

use vidstream_capture::{CaptureHandle, CaptureProperty, SourceKind};

/// Codec and length of a file source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoFileInfo {
    pub frame_count: Option<u64>,
    /// Decoded four-character codec code, e.g. `AVC1`.
    pub fourcc: Option<String>,
}

/// Rate and picture controls of a camera or network stream.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VideoStreamInfo {
    pub fps: Option<f64>,
    pub brightness: Option<f64>,
    pub contrast: Option<f64>,
    pub saturation: Option<f64>,
    pub hue: Option<f64>,
    pub gain: Option<f64>,
    pub exposure: Option<f64>,
    pub focus: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceDetails {
    File(VideoFileInfo),
    Stream(VideoStreamInfo),
}

/// What the controller learned about a source when it opened.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureMetadata {
    pub kind: SourceKind,
    pub frame_width: Option<u32>,
    pub frame_height: Option<u32>,
    pub details: SourceDetails,
}

impl CaptureMetadata {
    pub(crate) fn probe(handle: &dyn CaptureHandle, kind: SourceKind) -> Self {
        let dimension = |p| handle.get(p).filter(|v| *v > 0.0).map(|v| v.round() as u32);
        let details = match kind {
            SourceKind::File => SourceDetails::File(VideoFileInfo {
                frame_count: handle
                    .get(CaptureProperty::FrameCount)
                    .filter(|v| *v >= 0.0)
                    .map(|v| v.round() as u64),
                fourcc: handle
                    .get(CaptureProperty::FourCC)
                    .map(|v| v as u32)
                    .filter(|code| *code != 0)
                    .map(decode_fourcc),
            }),
            SourceKind::Camera | SourceKind::Link => SourceDetails::Stream(VideoStreamInfo {
                fps: handle.get(CaptureProperty::Fps),
                brightness: handle.get(CaptureProperty::Brightness),
                contrast: handle.get(CaptureProperty::Contrast),
                saturation: handle.get(CaptureProperty::Saturation),
                hue: handle.get(CaptureProperty::Hue),
                gain: handle.get(CaptureProperty::Gain),
                exposure: handle.get(CaptureProperty::Exposure),
                focus: handle.get(CaptureProperty::Focus),
            }),
        };
        Self {
            kind,
            frame_width: dimension(CaptureProperty::FrameWidth),
            frame_height: dimension(CaptureProperty::FrameHeight),
            details,
        }
    }

    pub fn file_info(&self) -> Option<&VideoFileInfo> {
        match &self.details {
            SourceDetails::File(info) => Some(info),
            SourceDetails::Stream(_) => None,
        }
    }

    pub fn stream_info(&self) -> Option<&VideoStreamInfo> {
        match &self.details {
            SourceDetails::Stream(info) => Some(info),
            SourceDetails::File(_) => None,
        }
    }
}

/// Position within a file source.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackPosition {
    pub msec: Option<f64>,
    pub frames: Option<f64>,
    pub ratio: Option<f64>,
}

impl PlaybackPosition {
    pub(crate) fn probe(handle: &dyn CaptureHandle) -> Self {
        Self {
            msec: handle.get(CaptureProperty::PosMsec),
            frames: handle.get(CaptureProperty::PosFrames),
            ratio: handle.get(CaptureProperty::PosAviRatio),
        }
    }

    /// Time offset as `HH:MM:SS.mmm`.
    pub fn timecode(&self) -> Option<String> {
        let msec = self.msec.filter(|ms| ms.is_finite() && *ms >= 0.0)?;
        let total = msec.round() as u64;
        Some(format!(
            "{:02}:{:02}:{:02}.{:03}",
            total / 3_600_000,
            total / 60_000 % 60,
            total / 1000 % 60,
            total % 1000
        ))
    }
}

/// Unpack a four-character code (lowest byte first) and upper-case it.
pub fn decode_fourcc(code: u32) -> String {
    code.to_le_bytes()
        .iter()
        .map(|b| char::from(*b).to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidstream_capture::{CaptureBackend, CaptureSource, PictureSettings, SyntheticBackend};

    #[test]
    fn test_decode_fourcc() {
        assert_eq!(decode_fourcc(u32::from_le_bytes(*b"avc1")), "AVC1");
        assert_eq!(decode_fourcc(0x4745_504D), "MPEG");
    }

    #[test]
    fn test_timecode() {
        let position = PlaybackPosition {
            msec: Some(3_723_004.4),
            ..Default::default()
        };
        assert_eq!(position.timecode().as_deref(), Some("01:02:03.004"));
        assert_eq!(PlaybackPosition::default().timecode(), None);
    }

    #[test]
    fn test_file_probe() {
        let backend = SyntheticBackend::new(320, 240)
            .with_file_frames(10)
            .with_fourcc(*b"xvid");
        let handle = backend.open(&CaptureSource::file("clip.avi")).unwrap();
        let metadata = CaptureMetadata::probe(handle.as_ref(), SourceKind::File);
        assert_eq!(metadata.frame_width, Some(320));
        assert_eq!(metadata.frame_height, Some(240));
        let info = metadata.file_info().unwrap();
        assert_eq!(info.frame_count, Some(10));
        assert_eq!(info.fourcc.as_deref(), Some("XVID"));
        assert!(metadata.stream_info().is_none());
    }

    #[test]
    fn test_stream_probe_reports_missing_as_absent() {
        let backend = SyntheticBackend::new(64, 48).with_picture(PictureSettings {
            gain: Some(0.0),
            ..Default::default()
        });
        let handle = backend.open(&CaptureSource::camera(0)).unwrap();
        let metadata = CaptureMetadata::probe(handle.as_ref(), SourceKind::Camera);
        let info = metadata.stream_info().unwrap();
        assert_eq!(info.fps, None);
        assert_eq!(info.brightness, None);
        // a real zero stays a zero
        assert_eq!(info.gain, Some(0.0));
    }
}
