//! Error types for each stage of the rover pipeline.

use thiserror::Error;

/// Errors reading frames from the video source. Fatal to a pipeline run.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to open stream {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("stream read failed: {0}")]
    Read(#[from] std::io::Error),

    #[error("stream ended")]
    EndOfStream,

    #[error("{count} consecutive frames failed to decode, last error: {source}")]
    Decode {
        count: u32,
        #[source]
        source: image::ImageError,
    },
}

/// Errors from a detector backend. Recovered per frame.
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("inference request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("failed to encode frame for inference: {0}")]
    Encode(#[from] image::ImageError),

    #[error("malformed inference response: {0}")]
    Response(#[from] serde_json::Error),

    #[error("io error reading inference response: {0}")]
    Io(#[from] std::io::Error),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Errors from the association algorithm. Recovered per frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssociationError {
    #[error("innovation covariance is singular")]
    SingularCovariance,
}

/// Errors sending a command to the vehicle. Logged and dropped.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("transport rejected command: {0}")]
    Rejected(String),
}

/// Invalid configuration values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be within [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f32 },

    #[error("{name} must be non-negative, got {value}")]
    Negative { name: &'static str, value: f32 },

    #[error("{name} must be at least 1")]
    Zero { name: &'static str },

    #[error("invalid url {0:?}")]
    Url(String),
}
