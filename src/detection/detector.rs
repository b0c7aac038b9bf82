//! Trait for object detection inference backends.

use crate::detection::Detection;
use crate::frame::Frame;

/// Trait for object detection inference backends.
///
/// Called once per frame on the pipeline thread, so its latency gates the
/// whole loop.
///
/// # Example
///
/// ```ignore
/// use rover_track::{Detection, Detector, Frame};
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl Detector for MyDetector {
///     type Error = std::io::Error;
///
///     fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
///         Ok(vec![])
///     }
/// }
/// ```
pub trait Detector {
    /// Error type for detection failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Run inference on a frame; boxes are in that frame's pixel coordinates.
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>, Self::Error>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    type Error = D::Error;

    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
        (**self).infer(frame)
    }
}

/// Helper trait for converting model-specific outputs to `Detection`.
pub trait IntoDetections {
    /// Convert the output into a vector of detections.
    fn into_detections(self) -> Vec<Detection>;
}

impl IntoDetections for Vec<Detection> {
    fn into_detections(self) -> Vec<Detection> {
        self
    }
}
