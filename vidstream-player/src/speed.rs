//! Playback speed presets expressed as frame intervals.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use vidstream_capture::SourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackSpeed {
    Half,
    #[default]
    Normal,
    OneAndHalf,
    Double,
}

impl PlaybackSpeed {
    /// Frame interval for this speed given the source's normal interval.
    pub fn interval_for(&self, normal_ms: u64) -> u64 {
        let ms = match self {
            PlaybackSpeed::Half => normal_ms.saturating_mul(2),
            PlaybackSpeed::Normal => normal_ms,
            PlaybackSpeed::OneAndHalf => (normal_ms as f64 / 1.5) as u64,
            PlaybackSpeed::Double => normal_ms / 2,
        };
        ms.max(1)
    }
}

impl fmt::Display for PlaybackSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlaybackSpeed::Half => "0.5x",
            PlaybackSpeed::Normal => "1x",
            PlaybackSpeed::OneAndHalf => "1.5x",
            PlaybackSpeed::Double => "2x",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
#[error("Unknown playback speed '{0}' (expected 0.5x, 1x, 1.5x or 2x)")]
pub struct ParseSpeedError(String);

impl FromStr for PlaybackSpeed {
    type Err = ParseSpeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0.5x" | "0.5" | "half" => Ok(PlaybackSpeed::Half),
            "1x" | "1" | "normal" => Ok(PlaybackSpeed::Normal),
            "1.5x" | "1.5" => Ok(PlaybackSpeed::OneAndHalf),
            "2x" | "2" | "double" => Ok(PlaybackSpeed::Double),
            _ => Err(ParseSpeedError(s.to_string())),
        }
    }
}

/// Normal frame interval for a freshly opened source.
///
/// Files always use `default_ms`; streams follow their reported frame rate
/// when it is known and positive.
pub fn normal_interval_ms(kind: SourceKind, fps: Option<f64>, default_ms: u64) -> u64 {
    match (kind, fps) {
        (SourceKind::Camera | SourceKind::Link, Some(fps)) if fps.is_finite() && fps > 0.0 => {
            ((1000.0 / fps) as u64).max(1)
        }
        _ => default_ms.max(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_from_normal_interval() {
        assert_eq!(PlaybackSpeed::Half.interval_for(33), 66);
        assert_eq!(PlaybackSpeed::Normal.interval_for(33), 33);
        assert_eq!(PlaybackSpeed::OneAndHalf.interval_for(33), 22);
        assert_eq!(PlaybackSpeed::Double.interval_for(33), 16);
        assert_eq!(PlaybackSpeed::Double.interval_for(1), 1);
    }

    #[test]
    fn test_parse_speed() {
        assert_eq!("2X".parse::<PlaybackSpeed>().unwrap(), PlaybackSpeed::Double);
        assert_eq!("half".parse::<PlaybackSpeed>().unwrap(), PlaybackSpeed::Half);
        assert!("3x".parse::<PlaybackSpeed>().is_err());
    }

    #[test]
    fn test_normal_interval() {
        assert_eq!(normal_interval_ms(SourceKind::File, Some(25.0), 33), 33);
        assert_eq!(normal_interval_ms(SourceKind::Camera, Some(25.0), 33), 40);
        assert_eq!(normal_interval_ms(SourceKind::Link, Some(0.0), 33), 33);
        assert_eq!(normal_interval_ms(SourceKind::Camera, None, 33), 33);
    }
}
