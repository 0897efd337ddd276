//! Player application state and main loop with builder pattern.

use crate::commands::PlayerCommand;
use crate::error::AppError;
use crate::sink::LogSink;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use vidstream_player::{
    CaptureBackend, CaptureMetadata, PlayOutcome, PlaybackSpeed, PlayerConfig, Severity,
    SnapshotOptions, SourceDetails, SourceSelection, StatusMessage, StatusNotifier, StreamState,
    VideoStreamController,
};

/// How long one loop turn waits for frames before checking commands.
const PUMP_TIMEOUT: Duration = Duration::from_millis(20);

type Player = VideoStreamController<LogSink>;

/// Logging configuration.
pub struct LoggingConfig {
    pub level: String,
    pub enable_tracy: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_tracy: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Builder for configuring and running the player.
pub struct PlayerApp {
    backend: Arc<dyn CaptureBackend>,
    selection: SourceSelection,
    config: PlayerConfig,
    logging: LoggingConfig,
    frame_interval_ms: Option<u64>,
    speed: Option<PlaybackSpeed>,
    quarter_turns: u32,
    log_every: u64,
    commands: Option<Receiver<PlayerCommand>>,
    // The command-line source is still opening; its failure is fatal.
    initial_open: bool,
}

impl PlayerApp {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            selection: SourceSelection::new(),
            config: PlayerConfig::default(),
            logging: LoggingConfig::default(),
            frame_interval_ms: None,
            speed: None,
            quarter_turns: 0,
            log_every: 30,
            commands: None,
            initial_open: false,
        }
    }

    /// Set the source played on start.
    pub fn with_selection(mut self, selection: SourceSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Fixed frame interval, overriding the source's normal rate.
    pub fn with_frame_interval(mut self, ms: u64) -> Self {
        self.frame_interval_ms = Some(ms);
        self
    }

    pub fn with_speed(mut self, speed: PlaybackSpeed) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Rotate the display by `quarter_turns` clockwise.
    pub fn with_rotation(mut self, quarter_turns: u32) -> Self {
        self.quarter_turns = quarter_turns % 4;
        self
    }

    /// Log one frame in every `every` at info level.
    pub fn with_log_every(mut self, every: u64) -> Self {
        self.log_every = every;
        self
    }

    /// Accept runtime commands. While the receiver is connected the app
    /// stays up after the stream ends.
    pub fn with_commands(mut self, commands: Receiver<PlayerCommand>) -> Self {
        self.commands = Some(commands);
        self
    }

    /// Initialize logging and play until the stream ends or a quit command
    /// arrives. Returns the number of frames shown.
    pub fn run(self) -> Result<u64, AppError> {
        self.init_logging();
        self.run_player()
    }

    fn run_player(mut self) -> Result<u64, AppError> {
        if !self.selection.is_ready() {
            return Err(AppError::NoSource);
        }

        let (notifier, status) = StatusNotifier::channel();
        let mut player = VideoStreamController::new(self.backend.clone(), LogSink::new(self.log_every))
            .with_config(self.config.clone())
            .with_notifier(notifier);
        for _ in 0..self.quarter_turns {
            player.rotate_clockwise();
        }

        let started = self.start(&mut player);
        log_status(&status);
        started?;
        self.initial_open = true;

        let mut commands = self.commands.take();
        let mut flow = Flow::Continue;
        let mut observed = player.state();
        while flow == Flow::Continue {
            player.pump_timeout(PUMP_TIMEOUT);
            log_status(&status);

            if observed == StreamState::Starting && player.state() != StreamState::Starting {
                if let Some(e) = player.take_open_error() {
                    if self.initial_open {
                        return Err(e.into());
                    }
                } else if let Some(metadata) = player.metadata() {
                    log_metadata(metadata);
                }
                self.initial_open = false;
            }

            if let Some(receiver) = &commands {
                loop {
                    match receiver.try_recv() {
                        Ok(command) => {
                            flow = self.apply(&mut player, command);
                            log_status(&status);
                            if flow == Flow::Quit {
                                break;
                            }
                        }
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            debug!("Command input closed");
                            commands = None;
                            break;
                        }
                    }
                }
            }

            observed = player.state();
            if commands.is_none() && observed == StreamState::Idle {
                flow = Flow::Quit;
            }
        }

        player.stop();
        log_status(&status);
        let shown = player.sink().shown();
        info!("Shown {} frames", shown);
        Ok(shown)
    }

    /// Play the current selection, or stop if a session is active. The
    /// open finishes in the background; its outcome shows up in the loop.
    fn start(&self, player: &mut Player) -> Result<(), AppError> {
        if player.play(self.selection.resolve())? == PlayOutcome::Starting {
            if let Some(ms) = self.frame_interval_ms {
                player.set_frame_interval(ms);
            } else if let Some(speed) = self.speed {
                player.set_speed(speed);
            }
        }
        Ok(())
    }

    fn apply(&mut self, player: &mut Player, command: PlayerCommand) -> Flow {
        let result = match command {
            PlayerCommand::Open(location) => {
                self.selection.select_location(&location);
                info!("Selected {}", self.selection.resolve());
                Ok(())
            }
            PlayerCommand::Camera(index) => {
                self.selection.select_camera(index);
                info!("Selected {}", self.selection.resolve());
                Ok(())
            }
            PlayerCommand::Play => {
                self.initial_open = false;
                // Failures reach the log as status messages.
                if let Err(e) = self.start(player) {
                    debug!("Play failed: {}", e);
                }
                Ok(())
            }
            PlayerCommand::Stop => {
                self.initial_open = false;
                player.stop();
                Ok(())
            }
            PlayerCommand::Pause => player.set_paused(true),
            PlayerCommand::Resume => player.set_paused(false),
            PlayerCommand::Seek(frame) => player.seek(frame),
            PlayerCommand::Interval(ms) => {
                self.frame_interval_ms = Some(ms);
                player.set_frame_interval(ms);
                Ok(())
            }
            PlayerCommand::Speed(speed) => {
                self.frame_interval_ms = None;
                self.speed = Some(speed);
                player.set_speed(speed);
                Ok(())
            }
            PlayerCommand::Rotate { clockwise } => {
                if clockwise {
                    player.rotate_clockwise();
                } else {
                    player.rotate_counter_clockwise();
                }
                info!("Display rotated to {} degrees", player.orientation().degrees());
                Ok(())
            }
            PlayerCommand::Snapshot(path, format) => {
                if let Err(e) = player.save_snapshot(&path, &SnapshotOptions::new(format)) {
                    debug!("Snapshot failed: {}", e);
                }
                Ok(())
            }
            PlayerCommand::Info => {
                log_info(player);
                Ok(())
            }
            PlayerCommand::Quit => return Flow::Quit,
        };

        if let Err(e) = result {
            warn!("{}", e);
        }
        Flow::Continue
    }

    fn init_logging(&self) {
        #[cfg(feature = "tracy")]
        {
            if self.logging.enable_tracy {
                use tracing_subscriber::Layer;
                use tracing_subscriber::layer::SubscriberExt;
                use tracing_subscriber::util::SubscriberInitExt;
                tracing_subscriber::registry()
                    .with(tracing_tracy::TracyLayer::default())
                    .with(
                        tracing_subscriber::fmt::layer().with_filter(
                            tracing_subscriber::EnvFilter::try_from_default_env()
                                .unwrap_or_else(|_| self.logging.level.clone().into()),
                        ),
                    )
                    .init();
                return;
            }
        }

        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&self.logging.level)),
            )
            .with_target(false)
            .init();
    }
}

/// Forward queued status messages to the log.
fn log_status(status: &Receiver<StatusMessage>) {
    for message in status.try_iter() {
        match message.severity {
            Severity::Informational | Severity::Success => {
                info!("{}: {}", message.title, message.message)
            }
            Severity::Warning => warn!("{}: {}", message.title, message.message),
            Severity::Error => error!("{}: {}", message.title, message.message),
        }
    }
}

fn log_metadata(metadata: &CaptureMetadata) {
    match &metadata.details {
        SourceDetails::File(file) => info!(
            "File: {} frames, codec {}",
            file.frame_count.map_or("?".to_string(), |n| n.to_string()),
            file.fourcc.as_deref().unwrap_or("?")
        ),
        SourceDetails::Stream(stream) => {
            info!(
                "Stream: {} fps",
                stream.fps.map_or("?".to_string(), |fps| format!("{:.1}", fps))
            );
            let controls = [
                ("brightness", stream.brightness),
                ("contrast", stream.contrast),
                ("saturation", stream.saturation),
                ("hue", stream.hue),
                ("gain", stream.gain),
                ("exposure", stream.exposure),
                ("focus", stream.focus),
            ];
            for (name, value) in controls {
                if let Some(value) = value {
                    debug!("  {} = {}", name, value);
                }
            }
        }
    }
}

fn log_info(player: &Player) {
    info!(
        "State {}, interval {} ms (normal {} ms), {} frames shown",
        player.state(),
        player.frame_interval_ms(),
        player.normal_interval_ms(),
        player.frames_delivered()
    );
    if let Some(source) = player.source() {
        info!("Source {}", source);
    }
    if let Some(metadata) = player.metadata() {
        log_metadata(metadata);
    }
    if let Some(timecode) = player.position().and_then(|p| p.timecode()) {
        info!("Position {}", timecode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use vidstream_capture::{CaptureError, CaptureHandle, CaptureSource, SyntheticBackend};

    struct SlowOpen(SyntheticBackend);

    impl CaptureBackend for SlowOpen {
        fn name(&self) -> &str {
            "slow"
        }

        fn supports(&self, source: &CaptureSource) -> bool {
            self.0.supports(source)
        }

        fn open(&self, source: &CaptureSource) -> Result<Box<dyn CaptureHandle>, CaptureError> {
            thread::sleep(Duration::from_millis(150));
            self.0.open(source)
        }
    }

    fn app(backend: &SyntheticBackend) -> PlayerApp {
        PlayerApp::new(Arc::new(backend.clone()))
            .with_config(PlayerConfig::default().with_normal_frame_interval_ms(1))
    }

    #[test]
    fn test_plays_file_to_the_end() {
        let backend = SyntheticBackend::new(16, 16).with_file_frames(5);
        let mut selection = SourceSelection::new();
        selection.select_file("clip.avi");

        let shown = app(&backend).with_selection(selection).run_player().unwrap();
        assert_eq!(shown, 5);
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_requires_a_source() {
        let backend = SyntheticBackend::new(16, 16);
        assert!(matches!(app(&backend).run_player(), Err(AppError::NoSource)));
    }

    #[test]
    fn test_unavailable_camera_fails() {
        let backend = SyntheticBackend::new(16, 16).with_unavailable_camera(2);
        let mut selection = SourceSelection::new();
        selection.select_camera(2);

        let result = app(&backend).with_selection(selection).run_player();
        assert!(matches!(result, Err(AppError::Video(_))));
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_quit_ends_endless_camera() {
        let backend = SyntheticBackend::new(16, 16);
        let mut selection = SourceSelection::new();
        selection.select_camera(0);

        let (sender, receiver) = mpsc::channel();
        sender.send(PlayerCommand::Speed(PlaybackSpeed::Double)).unwrap();
        sender.send(PlayerCommand::Rotate { clockwise: true }).unwrap();
        sender.send(PlayerCommand::Quit).unwrap();

        app(&backend)
            .with_selection(selection)
            .with_commands(receiver)
            .run_player()
            .unwrap();
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_failed_reopen_is_not_fatal() {
        let backend = SyntheticBackend::new(16, 16)
            .with_file_frames(2)
            .with_unavailable_camera(4);
        let mut selection = SourceSelection::new();
        selection.select_file("clip.avi");

        let (sender, receiver) = mpsc::channel();
        sender.send(PlayerCommand::Camera(4)).unwrap();
        sender.send(PlayerCommand::Stop).unwrap();
        sender.send(PlayerCommand::Play).unwrap();
        drop(sender);

        let shown = app(&backend)
            .with_selection(selection)
            .with_commands(receiver)
            .run_player()
            .unwrap();
        assert!(shown <= 2);
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_commands_are_handled_while_opening() {
        let backend = SyntheticBackend::new(16, 16);
        let mut selection = SourceSelection::new();
        selection.select_camera(0);

        let (sender, receiver) = mpsc::channel();
        sender.send(PlayerCommand::Info).unwrap();
        sender.send(PlayerCommand::Quit).unwrap();

        let shown = PlayerApp::new(Arc::new(SlowOpen(backend.clone())))
            .with_selection(selection)
            .with_commands(receiver)
            .run_player()
            .unwrap();
        assert_eq!(shown, 0);
        assert_eq!(backend.opened_handles(), 1);
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_closed_commands_exit_after_stream_ends() {
        let backend = SyntheticBackend::new(16, 16).with_file_frames(3);
        let mut selection = SourceSelection::new();
        selection.select_file("clip.avi");

        let (sender, receiver) = mpsc::channel();
        sender.send(PlayerCommand::Info).unwrap();
        drop(sender);

        let shown = app(&backend)
            .with_selection(selection)
            .with_commands(receiver)
            .run_player()
            .unwrap();
        assert_eq!(shown, 3);
    }
}
