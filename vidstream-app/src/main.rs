//! Vidstream Player
//!
//! Plays a camera, a video file or image sequence, or a network link and
//! reports frames through the log. While running, commands typed on stdin
//! control playback:
//!
//! - `play`, `stop`, `pause`, `resume`, `quit`
//! - `open LOCATION`, `camera N`
//! - `seek FRAME`, `interval MS`, `speed 0.5x|1x|1.5x|2x`
//! - `rotate cw|ccw`, `snap PATH [jpg|png|webp|tiff|bmp]`, `info`

mod app;
mod commands;
mod error;
mod settings;
mod sink;

use app::{LoggingConfig, PlayerApp};
use clap::Parser;
use error::AppError;
use settings::Settings;
use std::path::PathBuf;
use std::sync::Arc;
use vidstream_capture::{ApiPreference, BackendChain, CaptureBackend};
use vidstream_player::{PlaybackSpeed, SourceSelection};

/// Vidstream - capture source player
#[derive(Parser, Debug)]
#[command(name = "vidstream")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Camera index to play
    #[arg(short, long, group = "input")]
    camera: Option<u32>,

    /// Video file, image sequence pattern or directory to play
    #[arg(short, long, group = "input")]
    file: Option<PathBuf>,

    /// Network stream URI to play
    #[arg(short, long, group = "input")]
    link: Option<String>,

    /// File path or link, classified by whether it exists on disk
    #[arg(short, long, group = "input")]
    source: Option<String>,

    /// Backend preference (any, dshow, ffmpeg, images)
    #[arg(long)]
    api: Option<ApiPreference>,

    /// Fixed delay between frames in milliseconds
    #[arg(short, long)]
    interval: Option<u64>,

    /// Playback speed preset (0.5x, 1x, 1.5x, 2x)
    #[arg(long, conflicts_with = "interval")]
    speed: Option<PlaybackSpeed>,

    /// Display rotation in quarter turns clockwise
    #[arg(short, long, default_value_t = 0)]
    rotate: u32,

    /// Play generated frames instead of real devices
    #[arg(long)]
    synthetic: bool,

    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,

    /// Log every Nth frame at info level (0 to disable)
    #[arg(long, default_value_t = 30)]
    log_every: u64,

    /// Ignore commands on stdin
    #[arg(long)]
    no_commands: bool,

    /// Enable the Tracy profiler layer
    #[cfg(feature = "tracy")]
    #[arg(long)]
    tracy: bool,

    /// List cameras and exit
    #[cfg(feature = "webcam")]
    #[arg(long)]
    list_cameras: bool,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), AppError> {
    let settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    #[cfg(feature = "webcam")]
    if args.list_cameras {
        let devices = vidstream_capture::WebcamBackend::list_devices()
            .map_err(vidstream_player::VideoError::from)?;
        for device in devices {
            println!("{}", device);
        }
        return Ok(());
    }

    let mut selection = SourceSelection::new();
    if let Some(api) = args.api.or(settings.api()?) {
        selection.set_api(api);
    }
    if let Some(index) = args.camera {
        selection.select_camera(index);
    } else if let Some(path) = &args.file {
        selection.select_file(path.clone());
    } else if let Some(uri) = &args.link {
        selection.select_link(uri);
    } else if let Some(location) = &args.source {
        selection.select_location(location);
    }

    let backend: Arc<dyn CaptureBackend> = if args.synthetic {
        Arc::new(settings.synthetic.backend())
    } else {
        Arc::new(BackendChain::with_defaults())
    };

    let logging = LoggingConfig {
        level: args
            .log_level
            .or(settings.log_level)
            .unwrap_or_else(|| LoggingConfig::default().level),
        #[cfg(feature = "tracy")]
        enable_tracy: args.tracy,
        #[cfg(not(feature = "tracy"))]
        enable_tracy: false,
    };

    let mut app = PlayerApp::new(backend)
        .with_selection(selection)
        .with_config(settings.player)
        .with_logging(logging)
        .with_rotation(args.rotate)
        .with_log_every(args.log_every);
    if let Some(ms) = args.interval {
        app = app.with_frame_interval(ms);
    }
    if let Some(speed) = args.speed {
        app = app.with_speed(speed);
    }
    if !args.no_commands {
        app = app.with_commands(commands::spawn_stdin_reader());
    }

    app.run().map(|_| ())
}
