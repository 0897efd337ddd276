use std::path::PathBuf;
use thiserror::Error;
use vidstream_capture::ParseApiPreferenceError;
use vidstream_player::VideoError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to read settings {path}: {source}")]
    SettingsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings {path}: {source}")]
    SettingsFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Api(#[from] ParseApiPreferenceError),

    #[error("No source selected (use --camera, --file, --link or --source)")]
    NoSource,

    #[error(transparent)]
    Video(#[from] VideoError),
}
