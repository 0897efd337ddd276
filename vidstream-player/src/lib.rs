//! Vidstream Player - live playback of capture sources
//!
//! The [`VideoStreamController`] owns at most one capture session. Each
//! session opens its source and reads frames on a dedicated thread; frames
//! travel back over a channel and only reach the [`DisplaySink`] when the
//! owning thread calls [`VideoStreamController::pump`]. The sink is therefore
//! only ever touched from the thread that owns the controller.
//!
//! ```ignore
//! let backend = Arc::new(BackendChain::with_defaults());
//! let mut player = VideoStreamController::new(backend, my_sink);
//! player.play(CaptureSource::file("frames/img_%03d.png"))?;
//! while player.state() != StreamState::Idle {
//!     player.pump_timeout(Duration::from_millis(100));
//! }
//! ```

mod config;
mod controller;
mod display;
mod error;
mod metadata;
mod selection;
mod session;
mod snapshot;
mod speed;
mod state;
mod status;

pub use config::PlayerConfig;
pub use controller::{PlayOutcome, VideoStreamController};
pub use display::{DisplaySink, Orientation};
pub use error::VideoError;
pub use metadata::{
    CaptureMetadata, PlaybackPosition, SourceDetails, VideoFileInfo, VideoStreamInfo, decode_fourcc,
};
pub use selection::SourceSelection;
pub use snapshot::{ParseFormatError, SnapshotFormat, SnapshotOptions, save_image};
pub use speed::{ParseSpeedError, PlaybackSpeed, normal_interval_ms};
pub use state::{Controls, StreamState};
pub use status::{Severity, StatusMessage, StatusNotifier};

// Re-export capture types used in this crate's API
pub use vidstream_capture::{ApiPreference, CaptureBackend, CaptureSource, FrameData, SourceKind};
