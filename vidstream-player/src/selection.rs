//! The caller's pending source choice.

use std::path::PathBuf;
use vidstream_capture::{ApiPreference, CaptureSource};

/// Tracks which source the user picked last.
///
/// Picking a camera, a file or a link replaces any earlier pick, so there is
/// never more than one candidate and no precedence between them to resolve.
#[derive(Debug, Clone, Default)]
pub struct SourceSelection {
    pending: CaptureSource,
    api: ApiPreference,
}

impl SourceSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_camera(&mut self, index: u32) {
        self.pending = CaptureSource::camera(index);
    }

    /// Ignored when `path` is empty.
    pub fn select_file(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !path.as_os_str().is_empty() {
            self.pending = CaptureSource::file(path);
        }
    }

    /// Ignored when `uri` is blank.
    pub fn select_link(&mut self, uri: &str) {
        let uri = uri.trim();
        if !uri.is_empty() {
            self.pending = CaptureSource::link(uri);
        }
    }

    /// Pick a free-form location, classified as a file if it exists on disk
    /// and as a link otherwise. Ignored when blank.
    pub fn select_location(&mut self, location: &str) {
        let source = CaptureSource::from_location(location, self.api);
        if !source.is_none() {
            self.pending = source;
        }
    }

    pub fn set_api(&mut self, api: ApiPreference) {
        self.api = api;
    }

    pub fn api(&self) -> ApiPreference {
        self.api
    }

    pub fn clear(&mut self) {
        self.pending = CaptureSource::None;
    }

    /// Whether play can be offered.
    pub fn is_ready(&self) -> bool {
        !self.pending.is_none()
    }

    /// The chosen source with the current API preference applied.
    pub fn resolve(&self) -> CaptureSource {
        self.pending.clone().with_api(self.api)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_pick_wins() {
        let mut selection = SourceSelection::new();
        assert!(!selection.is_ready());

        selection.select_file("clip.mp4");
        selection.select_camera(1);
        assert_eq!(selection.resolve(), CaptureSource::camera(1));

        selection.select_link("rtsp://cam.local/live");
        assert_eq!(selection.resolve(), CaptureSource::link("rtsp://cam.local/live"));
    }

    #[test]
    fn test_blank_picks_are_ignored() {
        let mut selection = SourceSelection::new();
        selection.select_camera(0);
        selection.select_file("");
        selection.select_link("   ");
        selection.select_location("");
        assert_eq!(selection.resolve(), CaptureSource::camera(0));
    }

    #[test]
    fn test_api_applies_at_resolve_time() {
        let mut selection = SourceSelection::new();
        selection.select_file("frames/%04d.png");
        selection.set_api(ApiPreference::Images);
        assert_eq!(selection.resolve().api(), Some(ApiPreference::Images));

        selection.clear();
        assert!(selection.resolve().is_none());
    }
}
