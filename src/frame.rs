//! Decoded video frames.

use image::RgbImage;

/// Pixel dimensions of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Center of the frame in pixels.
    pub fn center(&self) -> (f32, f32) {
        (self.width as f32 / 2.0, self.height as f32 / 2.0)
    }
}

/// One immutable RGB frame and its position in the stream.
///
/// Sequence numbers increase monotonically per source. A frame is moved from
/// stage to stage and never shared mutably.
#[derive(Debug, Clone)]
pub struct Frame {
    seq: u64,
    image: RgbImage,
}

impl Frame {
    pub fn new(seq: u64, image: RgbImage) -> Self {
        Self { seq, image }
    }

    /// Black frame, handy for sources that carry no pixels.
    pub fn blank(seq: u64, width: u32, height: u32) -> Self {
        Self::new(seq, RgbImage::new(width, height))
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.width(), self.height())
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}
