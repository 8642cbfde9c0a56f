//! Decoded frames and fixed screen regions.
//!
//! - `Frame`: one decoded RGB image tagged with its 1-based frame index.
//! - `Roi`: a rectangle in frame pixel coordinates, `y0..y1` by `x0..x1` (half-open).
//!
//! Region extraction never clamps. A rectangle that is empty or reaches past the frame
//! yields no sub-image, and the caller treats that as "nothing to recognize".

use image::{imageops, RgbImage};
use serde::{Deserialize, Serialize};

/// Rectangle in frame coordinates. Rows `y0..y1`, columns `x0..x1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub y0: u32,
    pub y1: u32,
    pub x0: u32,
    pub x1: u32,
}

impl Roi {
    pub const fn new(y0: u32, y1: u32, x0: u32, x1: u32) -> Self {
        Self { y0, y1, x0, x1 }
    }

    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// True when the whole rectangle lies inside a `width` x `height` frame.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x1 <= width && self.y1 <= height
    }
}

impl std::fmt::Display for Roi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "y {}..{}, x {}..{}", self.y0, self.y1, self.x0, self.x1)
    }
}

/// One decoded frame.
pub struct Frame {
    /// Monotonic 1-based index assigned by the source.
    pub index: u64,
    image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    /// Build a frame from packed RGB24 bytes. Returns `None` when the buffer length does
    /// not match the dimensions.
    pub fn from_rgb(index: u64, width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, pixels).map(|image| Self { index, image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Cut the sub-image covered by `roi`.
    pub fn crop(&self, roi: &Roi) -> Option<RgbImage> {
        if roi.is_empty() || !roi.fits_within(self.width(), self.height()) {
            return None;
        }
        Some(imageops::crop_imm(&self.image, roi.x0, roi.y0, roi.width(), roi.height()).to_image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient_frame(width: u32, height: u32) -> Frame {
        let image = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 0]));
        Frame::new(1, image)
    }

    #[test]
    fn crop_returns_requested_rectangle() {
        let frame = gradient_frame(64, 48);
        let sub = frame.crop(&Roi::new(10, 20, 5, 35)).expect("in bounds");
        assert_eq!(sub.dimensions(), (30, 10));
        assert_eq!(sub.get_pixel(0, 0), &Rgb([5, 10, 0]));
        assert_eq!(sub.get_pixel(29, 9), &Rgb([34, 19, 0]));
    }

    #[test]
    fn crop_rejects_out_of_bounds_and_empty() {
        let frame = gradient_frame(64, 48);
        assert!(frame.crop(&Roi::new(40, 50, 0, 10)).is_none());
        assert!(frame.crop(&Roi::new(0, 10, 60, 65)).is_none());
        assert!(frame.crop(&Roi::new(10, 10, 0, 10)).is_none());
        assert!(frame.crop(&Roi::new(12, 10, 0, 10)).is_none());
    }

    #[test]
    fn crop_accepts_full_frame() {
        let frame = gradient_frame(16, 8);
        let sub = frame.crop(&Roi::new(0, 8, 0, 16)).expect("full frame");
        assert_eq!(sub.dimensions(), (16, 8));
    }

    #[test]
    fn from_rgb_checks_buffer_length() {
        assert!(Frame::from_rgb(1, 4, 4, vec![0; 48]).is_some());
        assert!(Frame::from_rgb(1, 4, 4, vec![0; 47]).is_none());
    }
}
