//! Per-frame detections: the detector contract, backends, and the
//! confidence/class filter applied before tracking.

mod builder;
mod detector;
mod filter;
mod http;

pub use builder::DetectionBuilder;
pub use detector::{Detector, IntoDetections};
pub use filter::{DetectionFilter, FilterConfig};
pub use http::{DetectorConfig, HttpDetector, RemoteDetection};

#[cfg(feature = "burn-backend")]
mod burn_backend;

#[cfg(feature = "burn-backend")]
pub use burn_backend::{BurnDetector, BurnDetectorError, BurnModel, RawDetection};

use crate::tracker::Rect;

/// One detected object on one frame. Has no identity across frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Bounding box in frame pixels
    pub bbox: Rect,
    /// Detector confidence in [0, 1]
    pub confidence: f32,
    /// Detector class index
    pub class_id: u32,
}

impl Detection {
    /// Create a detection from corner coordinates.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class_id: u32) -> Self {
        Self {
            bbox: Rect::from_tlbr(x1, y1, x2, y2),
            confidence,
            class_id,
        }
    }

    pub fn from_rect(bbox: Rect, confidence: f32, class_id: u32) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
        }
    }
}
