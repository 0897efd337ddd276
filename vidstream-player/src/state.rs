//! Stream state machine and the control availability derived from it.

use std::fmt;

/// Lifecycle of the controller's capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Starting,
    Playing,
    Paused,
    Stopping,
}

impl StreamState {
    /// A session exists and owns an open handle.
    pub fn is_active(&self) -> bool {
        matches!(self, StreamState::Playing | StreamState::Paused)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamState::Idle => "idle",
            StreamState::Starting => "starting",
            StreamState::Playing => "playing",
            StreamState::Paused => "paused",
            StreamState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Which transport controls a front-end should enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub play: bool,
    pub stop: bool,
    pub pause: bool,
    pub seek: bool,
}

impl Controls {
    pub(crate) fn for_state(state: StreamState, seekable: bool) -> Self {
        let active = state.is_active();
        Self {
            play: state == StreamState::Idle,
            stop: active || state == StreamState::Starting,
            pause: active,
            seek: active && seekable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_controls() {
        let controls = Controls::for_state(StreamState::Idle, true);
        assert!(controls.play);
        assert!(!controls.stop);
        assert!(!controls.seek);
    }

    #[test]
    fn test_playing_controls() {
        let controls = Controls::for_state(StreamState::Playing, false);
        assert!(!controls.play);
        assert!(controls.stop);
        assert!(controls.pause);
        assert!(!controls.seek);
        assert!(Controls::for_state(StreamState::Paused, true).seek);
    }

    #[test]
    fn test_starting_allows_only_stop() {
        let controls = Controls::for_state(StreamState::Starting, true);
        assert!(!controls.play);
        assert!(controls.stop);
        assert!(!controls.pause);
        assert!(!controls.seek);
    }
}
