//! In-process detector running a Burn model.
//!
//! Frames are resized to the model input, normalised to [0, 1] in CHW
//! order, and output boxes are scaled back to frame pixels.
//!
//! ```ignore
//! use rover_track::detection::{BurnDetector, BurnModel, RawDetection};
//! use burn::backend::NdArray;
//!
//! struct MyYoloModel { /* ... */ }
//!
//! impl BurnModel<NdArray> for MyYoloModel {
//!     fn forward(&self, input: burn::tensor::Tensor<NdArray, 4>) -> Vec<RawDetection> {
//!         // Run inference
//!     }
//! }
//!
//! let detector = BurnDetector::new(MyYoloModel::load("model.bin"), Default::default());
//! ```

use burn::prelude::*;
use burn::tensor::Tensor;
use image::imageops::{self, FilterType};
use thiserror::Error;

use super::{Detection, DetectionBuilder, Detector};
use crate::frame::Frame;

#[derive(Error, Debug, Clone)]
pub enum BurnDetectorError {
    #[error("model expects {expected} input channels, frames have 3")]
    UnsupportedChannels { expected: u32 },

    #[error("frame has zero size")]
    EmptyFrame,
}

/// Raw detection output from the model, in model input coordinates.
#[derive(Debug, Clone)]
pub struct RawDetection {
    /// Bounding box: [x1, y1, x2, y2] or [cx, cy, w, h] depending on model
    pub bbox: [f32; 4],
    pub score: f32,
    pub class_id: Option<u32>,
}

/// Trait for Burn-based detection models.
pub trait BurnModel<B: Backend>: Send + Sync {
    /// Run forward pass on a `[batch, channels, height, width]` tensor.
    fn forward(&self, input: Tensor<B, 4>) -> Vec<RawDetection>;

    /// Expected input size (channels, height, width).
    fn input_size(&self) -> (u32, u32, u32) {
        (3, 640, 640)
    }

    /// Whether bbox output is in XYWH format (vs TLBR).
    fn bbox_is_xywh(&self) -> bool {
        true
    }
}

pub struct BurnDetector<B: Backend, M: BurnModel<B>> {
    model: M,
    device: B::Device,
    conf_threshold: f32,
}

impl<B: Backend, M: BurnModel<B>> BurnDetector<B, M> {
    pub fn new(model: M, device: B::Device) -> Self {
        Self {
            model,
            device,
            conf_threshold: 0.25,
        }
    }

    /// Drop raw outputs below this score before they leave the backend.
    pub fn with_conf_threshold(mut self, threshold: f32) -> Self {
        self.conf_threshold = threshold;
        self
    }

    pub fn preprocess(&self, frame: &Frame) -> Result<Tensor<B, 4>, BurnDetectorError> {
        let (channels, target_h, target_w) = self.model.input_size();
        if channels != 3 {
            return Err(BurnDetectorError::UnsupportedChannels { expected: channels });
        }
        if frame.width() == 0 || frame.height() == 0 {
            return Err(BurnDetectorError::EmptyFrame);
        }

        let resized = imageops::resize(frame.image(), target_w, target_h, FilterType::Triangle);
        let plane = (target_w * target_h) as usize;
        let mut data = vec![0f32; plane * 3];
        for (i, pixel) in resized.pixels().enumerate() {
            for c in 0..3 {
                data[c * plane + i] = f32::from(pixel[c]) / 255.0;
            }
        }

        Ok(Tensor::<B, 1>::from_floats(data.as_slice(), &self.device).reshape([
            1,
            3,
            target_h as usize,
            target_w as usize,
        ]))
    }

    fn postprocess(&self, raw: Vec<RawDetection>, frame: &Frame) -> Vec<Detection> {
        let (_, model_h, model_w) = self.model.input_size();
        let sx = frame.width() as f32 / model_w as f32;
        let sy = frame.height() as f32 / model_h as f32;

        raw.into_iter()
            .filter(|d| d.score >= self.conf_threshold)
            .map(|d| {
                let builder = DetectionBuilder::new()
                    .confidence(d.score)
                    .class_id(d.class_id.unwrap_or(0));
                let [a, b, c, e] = d.bbox;
                let builder = if self.model.bbox_is_xywh() {
                    builder.xywh(a, b, c, e)
                } else {
                    builder.tlbr(a, b, c, e)
                };
                builder.scale(sx, sy).build()
            })
            .collect()
    }
}

impl<B: Backend, M: BurnModel<B>> Detector for BurnDetector<B, M> {
    type Error = BurnDetectorError;

    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
        let tensor = self.preprocess(frame)?;
        let raw = self.model.forward(tensor);
        Ok(self.postprocess(raw, frame))
    }
}
