//! Remote detector: POSTs each frame as JPEG to an inference server and
//! reads back a JSON list of boxes.
//!
//! The server may answer with a bare array or with `{"detections": [...]}`:
//!
//! ```text
//! [{"x1": 10, "y1": 20, "x2": 50, "y2": 80, "confidence": 0.91, "class_id": 39}]
//! ```

use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use serde::Deserialize;
use tracing::trace;

use super::{Detection, DetectionBuilder, Detector, IntoDetections};
use crate::error::{ConfigError, DetectorError};
use crate::frame::Frame;

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Inference endpoint, e.g. `http://127.0.0.1:8000/detect`
    pub endpoint: String,
    pub timeout: Duration,
    /// JPEG quality of the uploaded frame (1-100)
    pub jpeg_quality: u8,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/detect".to_string(),
            timeout: Duration::from_secs(2),
            jpeg_quality: 85,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ConfigError::Url(self.endpoint.clone()));
        }
        if self.jpeg_quality == 0 {
            return Err(ConfigError::Zero {
                name: "jpeg_quality",
            });
        }
        Ok(())
    }
}

/// One box as returned by the inference server, in frame pixels.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    #[serde(alias = "score", alias = "conf")]
    pub confidence: f32,
    #[serde(alias = "class", alias = "cls")]
    pub class_id: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Bare(Vec<RemoteDetection>),
    Wrapped { detections: Vec<RemoteDetection> },
}

impl IntoDetections for Vec<RemoteDetection> {
    fn into_detections(self) -> Vec<Detection> {
        self.into_iter()
            .map(|d| {
                DetectionBuilder::new()
                    .tlbr(d.x1, d.y1, d.x2, d.y2)
                    .confidence(d.confidence)
                    .class_id(d.class_id)
                    .build()
            })
            .collect()
    }
}

pub struct HttpDetector {
    agent: ureq::Agent,
    config: DetectorConfig,
}

impl HttpDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self { agent, config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, DetectorError> {
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.config.jpeg_quality).write_image(
            frame.image().as_raw(),
            frame.width(),
            frame.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(jpeg)
    }
}

/// Parse an inference server reply.
pub(crate) fn parse_response(body: impl std::io::Read) -> Result<Vec<Detection>, DetectorError> {
    let detections = match serde_json::from_reader(body)? {
        InferenceResponse::Bare(list) => list,
        InferenceResponse::Wrapped { detections } => detections,
    };
    Ok(detections.into_detections())
}

impl Detector for HttpDetector {
    type Error = DetectorError;

    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
        let jpeg = self.encode(frame)?;
        let response = self
            .agent
            .post(&self.config.endpoint)
            .set("Content-Type", "image/jpeg")
            .query("frame", &frame.seq().to_string())
            .send_bytes(&jpeg)
            .map_err(|source| DetectorError::Request {
                url: self.config.endpoint.clone(),
                source: Box::new(source),
            })?;

        let detections = parse_response(response.into_reader())?;
        trace!(
            frame = frame.seq(),
            "inference returned {} detections",
            detections.len()
        );
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_list() {
        let body = br#"[{"x1": 10, "y1": 20, "x2": 50, "y2": 80, "confidence": 0.91, "class_id": 39}]"#;
        let dets = parse_response(&body[..]).unwrap();
        assert_eq!(dets, vec![Detection::new(10.0, 20.0, 50.0, 80.0, 0.91, 39)]);
    }

    #[test]
    fn test_parse_wrapped_with_aliases() {
        let body = br#"{"detections": [{"x1": 0, "y1": 0, "x2": 4, "y2": 4, "score": 0.5, "cls": 2}]}"#;
        let dets = parse_response(&body[..]).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 2);
        assert_eq!(dets[0].confidence, 0.5);
    }

    #[test]
    fn test_parse_malformed() {
        let body = br#"{"boxes": 3}"#;
        assert!(matches!(
            parse_response(&body[..]),
            Err(DetectorError::Response(_))
        ));
    }

    #[test]
    fn test_encode_frame() {
        let detector = HttpDetector::new(DetectorConfig::default());
        let jpeg = detector.encode(&Frame::blank(0, 32, 24)).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_validate_endpoint() {
        let config = DetectorConfig {
            endpoint: "localhost:8000".into(),
            ..DetectorConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Url(_))));
    }
}
