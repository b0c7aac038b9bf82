//! Track lifecycle management and the built-in association algorithm.

mod association;
mod byte_associator;
mod kalman_filter;
mod manager;
mod matching;
mod rect;
mod track;
mod track_state;

pub use association::{Association, Associator, TrackSnapshot};
pub use byte_associator::{AssociationConfig, ByteAssociator};
pub use kalman_filter::{KalmanFilter, MotionState};
pub use manager::{TrackManager, TrackManagerConfig};
pub use matching::{AssignmentResult, linear_assignment};
pub use rect::Rect;
pub use track::{Track, TrackId};
pub use track_state::TrackState;
