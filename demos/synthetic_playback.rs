//! Plays a generated camera for a few seconds, exercising pause, speed and
//! rotation.
//!
//! ```bash
//! RUST_LOG=debug cargo run --example synthetic_playback
//! ```

use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use vidstream::capture::SyntheticBackend;
use vidstream::player::{FrameData, PlaybackSpeed, StatusNotifier};
use vidstream::{CaptureSource, DisplaySink, StreamState, VideoStreamController};

#[derive(Default)]
struct CountingSink {
    frames: u64,
}

impl DisplaySink for CountingSink {
    fn show(&mut self, frame: &FrameData) {
        self.frames += 1;
        if self.frames % 15 == 0 {
            let (width, height) = frame.dimensions();
            info!("Frame {} ({}x{}) at {:.2}s", frame.frame_number, width, height, frame.timestamp);
        }
    }

    fn clear(&mut self) {
        info!("Display cleared");
    }
}

fn pump_for(player: &mut VideoStreamController<CountingSink>, duration: Duration) {
    let until = Instant::now() + duration;
    while Instant::now() < until && player.state() != StreamState::Idle {
        player.pump_timeout(Duration::from_millis(10));
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let backend = Arc::new(SyntheticBackend::new(1280, 720).with_fps(30.0));
    let (notifier, status) = StatusNotifier::channel();
    let mut player =
        VideoStreamController::new(backend, CountingSink::default()).with_notifier(notifier);

    player.play(CaptureSource::camera(0))?;
    let metadata = player.wait_for_open(Duration::from_secs(5))?;
    info!("Opened {}x{}", metadata.frame_width.unwrap_or(0), metadata.frame_height.unwrap_or(0));
    pump_for(&mut player, Duration::from_secs(1));

    player.set_paused(true)?;
    info!("Paused");
    pump_for(&mut player, Duration::from_millis(500));
    player.set_paused(false)?;

    player.set_speed(PlaybackSpeed::Double);
    player.rotate_clockwise();
    info!("Interval now {} ms", player.frame_interval_ms());
    pump_for(&mut player, Duration::from_secs(1));

    player.stop();
    for message in status.try_iter() {
        info!("{}: {}", message.title, message.message);
    }
    info!("Shown {} frames", player.sink().frames);
    Ok(())
}
