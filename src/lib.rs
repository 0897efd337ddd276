//! Vidstream - threaded playback of cameras, video files and network streams.
//!
//! - [`capture`]: sources, backends and the capture handle abstraction
//! - [`player`]: the playback controller and its display sink

pub use vidstream_capture as capture;
pub use vidstream_player as player;

pub use vidstream_player::{
    CaptureSource, DisplaySink, PlayOutcome, StreamState, VideoError, VideoStreamController,
};
