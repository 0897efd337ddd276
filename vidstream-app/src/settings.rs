//! Optional JSON settings file.
//!
//! ```json
//! {
//!   "log_level": "debug",
//!   "api": "images",
//!   "player": { "normal_frame_interval_ms": 40, "camera_frame_width": 1280 },
//!   "synthetic": { "width": 320, "height": 240, "frames": 90 }
//! }
//! ```

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use vidstream_capture::{ApiPreference, SyntheticBackend};
use vidstream_player::PlayerConfig;

/// Generated source used with `--synthetic`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticSettings {
    pub width: u32,
    pub height: u32,
    /// Length of file sources; cameras and links never end.
    pub frames: u64,
    pub fps: Option<f64>,
}

impl Default for SyntheticSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            frames: 300,
            fps: Some(30.0),
        }
    }
}

impl SyntheticSettings {
    pub fn backend(&self) -> SyntheticBackend {
        let backend = SyntheticBackend::new(self.width, self.height).with_file_frames(self.frames);
        match self.fps {
            Some(fps) => backend.with_fps(fps),
            None => backend,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: Option<String>,
    pub api: Option<String>,
    pub player: PlayerConfig,
    pub synthetic: SyntheticSettings,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path).map_err(|source| AppError::SettingsRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| AppError::SettingsFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn api(&self) -> Result<Option<ApiPreference>, AppError> {
        Ok(self.api.as_deref().map(str::parse).transpose()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_settings_keep_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "api": "Images", "player": {{ "normal_frame_interval_ms": 40 }} }}"#
        )
        .unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.api().unwrap(), Some(ApiPreference::Images));
        assert_eq!(settings.player.normal_frame_interval_ms, 40);
        assert_eq!(
            settings.player.camera_frame_width,
            PlayerConfig::default().camera_frame_width
        );
        assert_eq!(settings.synthetic, SyntheticSettings::default());
        assert_eq!(settings.log_level, None);
    }

    #[test]
    fn test_bad_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            Settings::load(file.path()),
            Err(AppError::SettingsFormat { .. })
        ));

        let settings = Settings {
            api: Some("quicktime".into()),
            ..Settings::default()
        };
        assert!(matches!(settings.api(), Err(AppError::Api(_))));
    }

    #[test]
    fn test_missing_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Settings::load(&dir.path().join("absent.json")),
            Err(AppError::SettingsRead { .. })
        ));
    }
}
