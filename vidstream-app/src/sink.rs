use tracing::{debug, info, trace};
use vidstream_player::{DisplaySink, FrameData};

/// Display sink for a terminal: reports frames through the log.
#[derive(Debug, Default)]
pub struct LogSink {
    every: u64,
    shown: u64,
    size: Option<(u32, u32)>,
}

impl LogSink {
    /// Log one frame in every `every` at info level; 0 logs size changes only.
    pub fn new(every: u64) -> Self {
        Self {
            every,
            ..Self::default()
        }
    }

    pub fn shown(&self) -> u64 {
        self.shown
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }
}

impl DisplaySink for LogSink {
    fn show(&mut self, frame: &FrameData) {
        self.shown += 1;
        let size = frame.dimensions();
        if self.size != Some(size) {
            info!("Displaying {}x{} frames", size.0, size.1);
            self.size = Some(size);
        }
        if self.every > 0 && self.shown % self.every == 0 {
            info!("Frame {} at {:.3}s", frame.frame_number, frame.timestamp);
        } else {
            trace!("Frame {} at {:.3}s", frame.frame_number, frame.timestamp);
        }
    }

    fn clear(&mut self) {
        if self.size.take().is_some() {
            debug!("Display cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_counts_and_clears() {
        let mut sink = LogSink::new(2);
        sink.show(&FrameData::new(RgbImage::new(4, 3), 0.0, 1));
        sink.show(&FrameData::new(RgbImage::new(4, 3), 0.033, 2));
        assert_eq!(sink.shown(), 2);
        assert_eq!(sink.size(), Some((4, 3)));

        sink.clear();
        assert_eq!(sink.size(), None);
        assert_eq!(sink.shown(), 2);
    }
}
