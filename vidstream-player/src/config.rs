//! Playback configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on how long a paused session sleeps between checks.
pub const MAX_PAUSE_POLL_MS: u64 = 50;

/// Tunables for [`crate::VideoStreamController`].
///
/// Deserializable so that front-ends can load it from a settings file; every
/// field falls back to its default when missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Frame interval used for file sources and for streams that do not
    /// report a frame rate.
    pub normal_frame_interval_ms: u64,
    /// Sleep between pause checks, capped at [`MAX_PAUSE_POLL_MS`].
    pub pause_poll_ms: u64,
    /// Frame width requested from cameras right after opening.
    pub camera_frame_width: Option<u32>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            normal_frame_interval_ms: 33,
            pause_poll_ms: MAX_PAUSE_POLL_MS,
            camera_frame_width: Some(640),
        }
    }
}

impl PlayerConfig {
    pub fn with_normal_frame_interval_ms(mut self, ms: u64) -> Self {
        self.normal_frame_interval_ms = ms;
        self
    }

    pub fn with_pause_poll_ms(mut self, ms: u64) -> Self {
        self.pause_poll_ms = ms;
        self
    }

    pub fn with_camera_frame_width(mut self, width: Option<u32>) -> Self {
        self.camera_frame_width = width;
        self
    }

    pub(crate) fn normal_frame_interval_ms(&self) -> u64 {
        self.normal_frame_interval_ms.max(1)
    }

    pub(crate) fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms.clamp(1, MAX_PAUSE_POLL_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_poll_is_capped() {
        let config = PlayerConfig::default().with_pause_poll_ms(500);
        assert_eq!(config.pause_poll(), Duration::from_millis(50));
        let config = PlayerConfig::default().with_pause_poll_ms(0);
        assert_eq!(config.pause_poll(), Duration::from_millis(1));
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let config: PlayerConfig =
            serde_json::from_str(r#"{ "normal_frame_interval_ms": 40 }"#).unwrap();
        assert_eq!(config.normal_frame_interval_ms, 40);
        assert_eq!(config.camera_frame_width, Some(640));

        let config: PlayerConfig =
            serde_json::from_str(r#"{ "camera_frame_width": null }"#).unwrap();
        assert_eq!(config.camera_frame_width, None);
    }
}
