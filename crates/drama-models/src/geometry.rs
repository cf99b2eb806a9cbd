//! Crop geometry primitives.

use serde::{Deserialize, Serialize};

/// A detected face region in pixel space of the analyzed frame.
///
/// Produced per sampled frame and consumed immediately; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    /// Center X of the face, in pixels.
    pub center_x: f64,
    /// Center Y of the face, in pixels.
    pub center_y: f64,
    /// Face width in pixels.
    pub width: f64,
    /// Face height in pixels.
    pub height: f64,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f64,
}

/// A top-left-anchored crop window, always fully contained within the frame
/// it was derived for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropWindow {
    /// Build a crop window from a desired (possibly out-of-bounds) top-left
    /// position, clamping so the box stays inside the frame.
    ///
    /// `width`/`height` must not exceed the frame dimensions.
    pub fn clamped(
        desired_x: i64,
        desired_y: i64,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        let max_x = frame_width.saturating_sub(width) as i64;
        let max_y = frame_height.saturating_sub(height) as i64;

        Self {
            x: desired_x.clamp(0, max_x) as u32,
            y: desired_y.clamp(0, max_y) as u32,
            width,
            height,
        }
    }

    /// Whether the window is fully contained within the given frame.
    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.x + self.width <= frame_width && self.y + self.height <= frame_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_negative_position() {
        let w = CropWindow::clamped(-100, -50, 608, 1080, 1920, 1080);
        assert_eq!((w.x, w.y), (0, 0));
        assert!(w.fits_within(1920, 1080));
    }

    #[test]
    fn test_clamped_overflow_position() {
        let w = CropWindow::clamped(5000, 5000, 608, 1080, 1920, 1080);
        assert_eq!(w.x, 1920 - 608);
        assert_eq!(w.y, 0);
        assert!(w.fits_within(1920, 1080));
    }

    #[test]
    fn test_clamped_in_bounds_unchanged() {
        let w = CropWindow::clamped(400, 0, 608, 1080, 1920, 1080);
        assert_eq!(w.x, 400);
        assert!(w.fits_within(1920, 1080));
    }
}
