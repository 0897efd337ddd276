//! The playback controller: session lifecycle, transport controls and
//! delivery of frames to the display sink on the owning thread.

use crate::config::PlayerConfig;
use crate::display::{DisplaySink, Orientation};
use crate::error::VideoError;
use crate::metadata::{CaptureMetadata, PlaybackPosition};
use crate::session::{self, SessionEvent, SessionSetup, SessionShared};
use crate::snapshot::{SnapshotOptions, save_image};
use crate::speed::PlaybackSpeed;
use crate::state::{Controls, StreamState};
use crate::status::StatusNotifier;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use vidstream_capture::{CaptureBackend, CaptureProperty, CaptureSource, FrameData, SourceKind};

/// Result of [`VideoStreamController::play`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// A new session is opening its source. The outcome arrives through
    /// [`VideoStreamController::pump`].
    Starting,
    /// A session was already active, so play acted as stop.
    Stopped,
}

/// Rate chosen while the source was still opening, applied once its normal
/// rate is known.
#[derive(Debug, Clone, Copy)]
enum RateRequest {
    Interval(u64),
    Speed(PlaybackSpeed),
}

struct ActiveSession {
    id: u64,
    source: CaptureSource,
    shared: Arc<SessionShared>,
    thread: Option<JoinHandle<()>>,
}

impl ActiveSession {
    fn kind(&self) -> Option<SourceKind> {
        self.source.kind()
    }

    fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Session {} thread panicked", self.id);
            }
        }
        // The thread releases on exit; this covers a thread that panicked.
        self.shared.release();
    }
}

/// Plays one capture source at a time into a [`DisplaySink`].
///
/// The controller must stay on the thread that owns the sink. Sources are
/// opened and read on a per-session background thread which reports back
/// through a queue; [`pump`] drains the queue and is the only place state
/// changes from the session and frames reach the sink.
///
/// [`pump`]: VideoStreamController::pump
pub struct VideoStreamController<S: DisplaySink> {
    backend: Arc<dyn CaptureBackend>,
    sink: S,
    config: PlayerConfig,
    notifier: Option<StatusNotifier>,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
    session: Option<ActiveSession>,
    next_session_id: u64,
    state: StreamState,
    metadata: Option<CaptureMetadata>,
    open_error: Option<VideoError>,
    position: Option<PlaybackPosition>,
    generation: u64,
    frame_interval_ms: u64,
    normal_interval_ms: u64,
    requested_rate: Option<RateRequest>,
    orientation: Orientation,
    // Newest frame that arrived while paused, shown on resume.
    held: Option<FrameData>,
    last_frame: Option<FrameData>,
    frames_delivered: u64,
}

impl<S: DisplaySink> VideoStreamController<S> {
    pub fn new(backend: Arc<dyn CaptureBackend>, sink: S) -> Self {
        let config = PlayerConfig::default();
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            backend,
            sink,
            frame_interval_ms: config.normal_frame_interval_ms(),
            normal_interval_ms: config.normal_frame_interval_ms(),
            config,
            notifier: None,
            events_tx,
            events_rx,
            session: None,
            next_session_id: 1,
            state: StreamState::Idle,
            metadata: None,
            open_error: None,
            position: None,
            generation: 0,
            requested_rate: None,
            orientation: Orientation::default(),
            held: None,
            last_frame: None,
            frames_delivered: 0,
        }
    }

    pub fn with_config(mut self, config: PlayerConfig) -> Self {
        self.frame_interval_ms = config.normal_frame_interval_ms();
        self.normal_interval_ms = config.normal_frame_interval_ms();
        self.config = config;
        self
    }

    /// Post user-facing errors and save results to this channel.
    pub fn with_notifier(mut self, notifier: StatusNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn controls(&self) -> Controls {
        let seekable = self.session.as_ref().and_then(|s| s.kind()) == Some(SourceKind::File);
        Controls::for_state(self.state, seekable)
    }

    /// Source of the active or opening session.
    pub fn source(&self) -> Option<&CaptureSource> {
        self.session.as_ref().map(|s| &s.source)
    }

    /// Metadata of the most recently opened source.
    pub fn metadata(&self) -> Option<&CaptureMetadata> {
        self.metadata.as_ref()
    }

    /// Take the error from the last open that failed, if it has not been
    /// taken yet.
    pub fn take_open_error(&mut self) -> Option<VideoError> {
        self.open_error.take()
    }

    /// Latest known position (file sources only).
    pub fn position(&self) -> Option<PlaybackPosition> {
        self.position
    }

    pub fn frame_interval_ms(&self) -> u64 {
        self.frame_interval_ms
    }

    /// Interval the current source plays at normal speed.
    pub fn normal_interval_ms(&self) -> u64 {
        self.normal_interval_ms
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// The last frame delivered, unrotated. Survives stop.
    pub fn last_frame(&self) -> Option<&FrameData> {
        self.last_frame.as_ref()
    }

    /// Frames shown on the sink since the controller was created.
    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Start playing `source`, or stop if a session is already active.
    ///
    /// Returns as soon as the session thread is spawned, in
    /// [`StreamState::Starting`]. The open runs on that thread; [`pump`]
    /// moves the controller to `Playing`, or back to `Idle` with a status
    /// error if the open fails. [`wait_for_open`] blocks for the outcome.
    ///
    /// [`pump`]: VideoStreamController::pump
    /// [`wait_for_open`]: VideoStreamController::wait_for_open
    pub fn play(&mut self, source: CaptureSource) -> Result<PlayOutcome, VideoError> {
        if source.is_none() {
            return Err(VideoError::NoSource);
        }
        if self.session.as_ref().is_some_and(ActiveSession::is_finished) {
            self.reap_finished();
        }
        if self.session.is_some() {
            self.stop();
            return Ok(PlayOutcome::Stopped);
        }

        self.discard_pending_events();
        self.start_session(source)?;
        Ok(PlayOutcome::Starting)
    }

    fn start_session(&mut self, source: CaptureSource) -> Result<(), VideoError> {
        let id = self.next_session_id;
        self.next_session_id += 1;

        let setup = SessionSetup {
            id,
            source: source.clone(),
            camera_frame_width: self.config.camera_frame_width,
            default_interval_ms: self.config.normal_frame_interval_ms(),
            pause_poll: self.config.pause_poll(),
        };
        let shared = Arc::new(SessionShared::new(self.config.normal_frame_interval_ms()));
        let backend = self.backend.clone();
        let events = self.events_tx.clone();
        let thread = {
            let shared = shared.clone();
            thread::Builder::new()
                .name(format!("vidstream-session-{}", id))
                .spawn(move || session::run(setup, backend, shared, events))?
        };

        info!("Starting {}", source);
        self.state = StreamState::Starting;
        self.metadata = None;
        self.open_error = None;
        self.position = None;
        self.generation = 0;
        self.requested_rate = None;
        self.session = Some(ActiveSession {
            id,
            source,
            shared,
            thread: Some(thread),
        });
        Ok(())
    }

    /// Pump until the opening session reports its outcome or `timeout`
    /// passes. Returns the source's metadata once it is playing.
    pub fn wait_for_open(&mut self, timeout: Duration) -> Result<CaptureMetadata, VideoError> {
        let deadline = Instant::now() + timeout;
        while self.state == StreamState::Starting {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events_rx.recv_timeout(remaining) {
                Ok(event) => self.handle_event(event),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return Err(VideoError::Session(format!(
                        "source did not open within {} ms",
                        timeout.as_millis()
                    )));
                }
            }
        }
        if let Some(e) = self.open_error.take() {
            return Err(e);
        }
        match (self.state.is_active(), &self.metadata) {
            (true, Some(metadata)) => Ok(metadata.clone()),
            _ => Err(VideoError::NotPlaying),
        }
    }

    /// Stop the active session and clear the display. Safe to call when idle.
    ///
    /// Blocks until the session thread has exited and released its handle,
    /// which includes waiting out an open still in progress. No frame from
    /// the session reaches the sink afterwards.
    pub fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            self.state = StreamState::Stopping;
            debug!("Stopping session {}", session.id);
            session.shared.cancel();
            session.join();
            info!("Stopped {}", session.source);
        }
        self.discard_pending_events();
        self.held = None;
        self.requested_rate = None;
        self.sink.clear();
        self.state = StreamState::Idle;
    }

    fn active_session(&self) -> Result<&ActiveSession, VideoError> {
        self.session
            .as_ref()
            .filter(|_| self.state.is_active())
            .ok_or(VideoError::NotPlaying)
    }

    /// Pause or resume without releasing the handle.
    ///
    /// Frames already read when the pause lands are held back; resuming
    /// shows only the newest of them and playback continues at the frame
    /// interval.
    pub fn set_paused(&mut self, paused: bool) -> Result<(), VideoError> {
        let session = self.active_session()?;
        let id = session.id;
        session.shared.set_paused(paused);
        if paused {
            self.state = StreamState::Paused;
            debug!("Paused session {}", id);
        } else {
            self.state = StreamState::Playing;
            debug!("Resumed session {}", id);
            if let Some(frame) = self.held.take() {
                self.present(frame);
            }
        }
        Ok(())
    }

    pub fn toggle_pause(&mut self) -> Result<(), VideoError> {
        self.set_paused(self.state != StreamState::Paused)
    }

    /// Move a file source to `frame_index`. The next frame shown comes from
    /// there; frames read before the seek are dropped.
    pub fn seek(&mut self, frame_index: f64) -> Result<(), VideoError> {
        let session = self.active_session()?;
        if session.kind() != Some(SourceKind::File) {
            return Err(VideoError::NotSeekable);
        }

        let (position, generation) = {
            let mut guarded = session.shared.lock();
            let handle = guarded.handle.as_mut().ok_or(VideoError::NotPlaying)?;
            if !handle.set(CaptureProperty::PosFrames, frame_index)? {
                return Err(VideoError::Backend(format!(
                    "{} does not accept a position",
                    session.source
                )));
            }
            let position = PlaybackPosition::probe(&**handle);
            guarded.generation += 1;
            (position, guarded.generation)
        };
        debug!("Session {} seeked to frame {}", session.id, frame_index);
        self.generation = generation;
        self.held = None;
        self.position = Some(position);
        Ok(())
    }

    /// Set the delay between frames. Applies to the wait in progress.
    pub fn set_frame_interval(&mut self, ms: u64) {
        self.frame_interval_ms = ms.max(1);
        if self.state == StreamState::Starting {
            self.requested_rate = Some(RateRequest::Interval(self.frame_interval_ms));
        }
        if let Some(session) = &self.session {
            session.shared.set_interval_ms(self.frame_interval_ms);
        }
        debug!("Frame interval set to {} ms", self.frame_interval_ms);
    }

    /// Set the interval from a preset relative to the source's normal rate.
    /// While the source is opening, the preset is applied once its rate is
    /// known.
    pub fn set_speed(&mut self, speed: PlaybackSpeed) {
        self.set_frame_interval(speed.interval_for(self.normal_interval_ms));
        if self.state == StreamState::Starting {
            self.requested_rate = Some(RateRequest::Speed(speed));
        }
    }

    pub fn rotate_clockwise(&mut self) {
        self.orientation = self.orientation.rotate_clockwise();
    }

    pub fn rotate_counter_clockwise(&mut self) {
        self.orientation = self.orientation.rotate_counter_clockwise();
    }

    /// Save the last delivered frame. The file extension is replaced to
    /// match the format; the written path is returned.
    pub fn save_snapshot(
        &self,
        path: &Path,
        options: &SnapshotOptions,
    ) -> Result<PathBuf, VideoError> {
        let frame = self.last_frame.as_ref().ok_or(VideoError::NoFrame)?;
        let result = save_image(&frame.image, path, options);
        if let Some(notifier) = &self.notifier {
            match &result {
                Ok(written) => notifier.success("Image saved", written.display().to_string()),
                Err(e) => notifier.error("Image not saved", format!("{}: {}", path.display(), e)),
            }
        }
        result
    }

    /// Apply every queued session event without blocking. Returns the
    /// number of events handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for the first event, then drain the rest.
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => {
                self.handle_event(event);
                1 + self.pump()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn is_current(&self, id: u64) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == id)
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Opened {
                session,
                metadata,
                normal_interval_ms,
            } => {
                let Some(active) = self.session.as_ref().filter(|s| s.id == session) else {
                    return;
                };
                info!(
                    "Playing {} ({}x{})",
                    active.source,
                    metadata.frame_width.unwrap_or(0),
                    metadata.frame_height.unwrap_or(0)
                );
                let interval = match self.requested_rate.take() {
                    Some(RateRequest::Interval(ms)) => ms,
                    Some(RateRequest::Speed(speed)) => speed.interval_for(normal_interval_ms),
                    None => normal_interval_ms,
                };
                active.shared.set_interval_ms(interval);
                self.normal_interval_ms = normal_interval_ms;
                self.frame_interval_ms = interval;
                self.metadata = Some(metadata);
                self.state = StreamState::Playing;
            }
            SessionEvent::OpenFailed { session, error: e } => {
                if !self.is_current(session) {
                    return;
                }
                let source = self.finish_session();
                error!("Failed to play {}: {}", source, e);
                if let Some(notifier) = &self.notifier {
                    notifier.error(format!("Cannot play {}", source), e.to_string());
                }
                self.open_error = Some(e);
            }
            SessionEvent::Frame {
                session,
                generation,
                frame,
                position,
            } => {
                if !self.is_current(session) {
                    return;
                }
                // Read before the latest seek.
                if generation < self.generation {
                    return;
                }
                if position.is_some() {
                    self.position = position;
                }
                if self.state == StreamState::Paused {
                    if self.held.replace(frame).is_some() {
                        debug!("Dropping an older frame held while paused");
                    }
                } else {
                    self.present(frame);
                }
            }
            SessionEvent::Ended { session } => {
                if !self.is_current(session) {
                    return;
                }
                let source = self.finish_session();
                info!("{} ended", source);
            }
        }
    }

    /// Join the session's exited thread and go back to idle. Returns the
    /// session's source for logging.
    fn finish_session(&mut self) -> CaptureSource {
        let source = match self.session.take() {
            Some(mut ended) => {
                ended.join();
                ended.source
            }
            None => CaptureSource::None,
        };
        if self.held.take().is_some() {
            warn!("Discarding the frame held while paused");
        }
        self.requested_rate = None;
        self.sink.clear();
        self.state = StreamState::Idle;
        source
    }

    /// Settle a session whose thread has already exited but whose last
    /// events are still queued. Its queued frames are dropped.
    fn reap_finished(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            if !matches!(event, SessionEvent::Frame { .. }) {
                self.handle_event(event);
            }
        }
        if self.session.is_some() {
            let source = self.finish_session();
            warn!("Session for {} exited without reporting", source);
        }
    }

    fn present(&mut self, frame: FrameData) {
        match self.orientation.apply(&frame.image) {
            Some(rotated) => self.sink.show(&FrameData::new(
                rotated,
                frame.timestamp,
                frame.frame_number,
            )),
            None => self.sink.show(&frame),
        }
        self.frames_delivered += 1;
        self.last_frame = Some(frame);
    }

    fn discard_pending_events(&mut self) {
        let mut discarded = 0;
        while self.events_rx.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("Discarded {} stale session events", discarded);
        }
    }
}

impl<S: DisplaySink> Drop for VideoStreamController<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidstream_capture::SyntheticBackend;

    const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

    #[derive(Default)]
    struct CountingSink {
        shown: usize,
        cleared: usize,
    }

    impl DisplaySink for CountingSink {
        fn show(&mut self, _frame: &FrameData) {
            self.shown += 1;
        }

        fn clear(&mut self) {
            self.cleared += 1;
        }
    }

    fn controller(backend: SyntheticBackend) -> VideoStreamController<CountingSink> {
        VideoStreamController::new(Arc::new(backend), CountingSink::default())
    }

    #[test]
    fn test_play_none_is_rejected() {
        let mut player = controller(SyntheticBackend::new(4, 4));
        assert!(matches!(player.play(CaptureSource::None), Err(VideoError::NoSource)));
        assert_eq!(player.state(), StreamState::Idle);
    }

    #[test]
    fn test_controls_follow_state() {
        let mut player = controller(SyntheticBackend::new(4, 4));
        assert!(player.controls().play);

        assert_eq!(player.play(CaptureSource::file("clip.mp4")).unwrap(), PlayOutcome::Starting);
        player.wait_for_open(OPEN_TIMEOUT).unwrap();
        let controls = player.controls();
        assert!(!controls.play);
        assert!(controls.stop);
        assert!(controls.seek);

        player.stop();
        assert!(player.controls().play);
        assert!(!player.controls().stop);
    }

    #[test]
    fn test_commands_need_a_session() {
        let mut player = controller(SyntheticBackend::new(4, 4));
        assert!(matches!(player.set_paused(true), Err(VideoError::NotPlaying)));
        assert!(matches!(player.seek(3.0), Err(VideoError::NotPlaying)));
        assert!(matches!(
            player.save_snapshot(Path::new("x.png"), &SnapshotOptions::default()),
            Err(VideoError::NoFrame)
        ));
    }

    #[test]
    fn test_seek_rejected_for_cameras() {
        let mut player = controller(SyntheticBackend::new(4, 4));
        player.play(CaptureSource::camera(0)).unwrap();
        player.wait_for_open(OPEN_TIMEOUT).unwrap();
        assert!(matches!(player.seek(3.0), Err(VideoError::NotSeekable)));
        player.stop();
    }

    #[test]
    fn test_stop_when_idle_still_clears() {
        let mut player = controller(SyntheticBackend::new(4, 4));
        player.stop();
        player.stop();
        assert_eq!(player.sink().cleared, 2);
        assert_eq!(player.state(), StreamState::Idle);
    }

    #[test]
    fn test_speed_uses_stream_rate() {
        let mut player = controller(SyntheticBackend::new(4, 4).with_fps(20.0));
        player.play(CaptureSource::camera(0)).unwrap();
        player.wait_for_open(OPEN_TIMEOUT).unwrap();
        assert_eq!(player.normal_interval_ms(), 50);
        assert_eq!(player.frame_interval_ms(), 50);
        player.set_speed(PlaybackSpeed::Double);
        assert_eq!(player.frame_interval_ms(), 25);
        player.stop();
    }

    #[test]
    fn test_speed_chosen_while_opening_uses_stream_rate() {
        let mut player = controller(SyntheticBackend::new(4, 4).with_fps(20.0));
        player.play(CaptureSource::camera(0)).unwrap();
        player.set_speed(PlaybackSpeed::Half);
        player.wait_for_open(OPEN_TIMEOUT).unwrap();
        assert_eq!(player.normal_interval_ms(), 50);
        assert_eq!(player.frame_interval_ms(), 100);
        player.stop();
    }

    #[test]
    fn test_open_failure_is_notified() {
        let (notifier, status) = StatusNotifier::channel();
        let mut player =
            controller(SyntheticBackend::new(4, 4).with_open_error("codec exploded"))
                .with_notifier(notifier);
        assert_eq!(player.play(CaptureSource::file("clip.mp4")).unwrap(), PlayOutcome::Starting);
        let err = player.wait_for_open(OPEN_TIMEOUT).unwrap_err();
        assert!(matches!(err, VideoError::Backend(_)));
        assert_eq!(player.state(), StreamState::Idle);
        assert!(player.source().is_none());
        let message = status.try_recv().unwrap();
        assert_eq!(message.severity, crate::status::Severity::Error);
        assert!(message.message.contains("codec exploded"));
    }
}
