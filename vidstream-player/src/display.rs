//! Display sink interface and frame orientation.

use image::RgbImage;
use image::imageops;
use vidstream_capture::FrameData;

/// Presents frames. Only ever called from the thread that owns the
/// controller, never from a capture thread.
pub trait DisplaySink {
    /// Show a frame, replacing the previous one.
    fn show(&mut self, frame: &FrameData);

    /// Remove whatever is displayed.
    fn clear(&mut self);
}

/// Quarter-turn rotation applied to frames before they are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    #[default]
    Up,
    Right,
    Down,
    Left,
}

impl Orientation {
    pub fn rotate_clockwise(self) -> Self {
        match self {
            Orientation::Up => Orientation::Right,
            Orientation::Right => Orientation::Down,
            Orientation::Down => Orientation::Left,
            Orientation::Left => Orientation::Up,
        }
    }

    pub fn rotate_counter_clockwise(self) -> Self {
        match self {
            Orientation::Up => Orientation::Left,
            Orientation::Left => Orientation::Down,
            Orientation::Down => Orientation::Right,
            Orientation::Right => Orientation::Up,
        }
    }

    /// Clockwise rotation in degrees.
    pub fn degrees(self) -> u32 {
        match self {
            Orientation::Up => 0,
            Orientation::Right => 90,
            Orientation::Down => 180,
            Orientation::Left => 270,
        }
    }

    pub(crate) fn apply(self, image: &RgbImage) -> Option<RgbImage> {
        match self {
            Orientation::Up => None,
            Orientation::Right => Some(imageops::rotate90(image)),
            Orientation::Down => Some(imageops::rotate180(image)),
            Orientation::Left => Some(imageops::rotate270(image)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_rotation_cycle() {
        let mut o = Orientation::Up;
        for expected in [90, 180, 270, 0] {
            o = o.rotate_clockwise();
            assert_eq!(o.degrees(), expected);
        }
        assert_eq!(Orientation::Up.rotate_counter_clockwise(), Orientation::Left);
    }

    #[test]
    fn test_apply_swaps_dimensions() {
        let mut image = RgbImage::new(4, 2);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        assert!(Orientation::Up.apply(&image).is_none());

        let rotated = Orientation::Right.apply(&image).unwrap();
        assert_eq!(rotated.dimensions(), (2, 4));
        // top-left moves to top-right on a clockwise turn
        assert_eq!(rotated.get_pixel(1, 0), &Rgb([255, 0, 0]));
    }
}
