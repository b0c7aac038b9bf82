//! Camera-rover object following.
//!
//! Frames are pulled from an MJPEG stream, run through a detector, filtered,
//! and associated into tracks with a stable identity. The confirmed track of
//! the target class is steered towards the frame centre with discrete
//! commands sent to the vehicle over HTTP.
//!
//! ```ignore
//! use rover_track::{ByteAssociator, HttpDetector, MjpegSource, Pipeline, RoverConfig};
//! use rover_track::dispatch::command_bus;
//! use rover_track::presentation::latest_slot;
//!
//! let config = RoverConfig::for_device("192.168.1.1");
//! let (commands, bus) = command_bus(config.bus_capacity);
//! let (frames, preview) = latest_slot();
//! let pipeline = Pipeline::new(
//!     &config,
//!     MjpegSource::connect(&config.stream)?,
//!     HttpDetector::new(config.detector.clone()),
//!     ByteAssociator::new(config.association.clone()),
//!     commands,
//!     frames,
//! );
//! let exit = pipeline.run();
//! ```

pub mod capture;
pub mod config;
pub mod control;
pub mod detection;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod presentation;
pub mod tracker;

pub use capture::{FrameSource, MjpegSource, StreamConfig};
pub use config::RoverConfig;
pub use control::{ActuationCommand, CenteringController, ControlConfig, compute_command};
pub use detection::{Detection, DetectionFilter, Detector, FilterConfig, HttpDetector};
pub use dispatch::{CommandDispatcher, CommandTransport, HttpTransport};
pub use error::{AssociationError, CaptureError, ConfigError, DetectorError, DispatchError};
pub use frame::{Frame, FrameGeometry};
pub use pipeline::{Pipeline, PipelineExit, StopSignal};
pub use tracker::{
    Associator, ByteAssociator, Rect, Track, TrackId, TrackManager, TrackManagerConfig, TrackState,
};
