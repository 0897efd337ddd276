//! Writes a short numbered image sequence to a temporary directory and plays
//! it through the default backends.
//!
//! ```bash
//! cargo run --example image_sequence
//! ```

use image::{Rgb, RgbImage};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use vidstream::capture::BackendChain;
use vidstream::player::FrameData;
use vidstream::{CaptureSource, DisplaySink, StreamState, VideoStreamController};

struct PrintSink;

impl DisplaySink for PrintSink {
    fn show(&mut self, frame: &FrameData) {
        info!("Frame {} at {:.3}s", frame.frame_number, frame.timestamp);
    }

    fn clear(&mut self) {}
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let dir = std::env::temp_dir().join("vidstream-sequence");
    std::fs::create_dir_all(&dir)?;
    for i in 0..12u8 {
        let shade = i * 20;
        RgbImage::from_pixel(64, 48, Rgb([shade, 255 - shade, 128])).save(dir.join(format!("img_{:03}.png", i)))?;
    }

    let mut player = VideoStreamController::new(Arc::new(BackendChain::with_defaults()), PrintSink);
    player.play(CaptureSource::file(dir.join("img_%03d.png")))?;
    let metadata = player.wait_for_open(Duration::from_secs(5))?;
    info!("Opened {:?}", metadata);
    while player.state() != StreamState::Idle {
        player.pump_timeout(Duration::from_millis(50));
    }

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}
