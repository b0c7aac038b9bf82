//! Contract between `TrackManager` and the association algorithm.
//!
//! The manager owns identities and lifecycle; an `Associator` only decides
//! which detection belongs to which existing track and where each track's box
//! is estimated to be on the current frame.

use std::collections::HashMap;

use crate::detection::Detection;
use crate::frame::FrameGeometry;
use crate::tracker::rect::Rect;
use crate::tracker::track::{Track, TrackId};

/// Read-only view of an active track handed to the associator.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSnapshot {
    pub track_id: TrackId,
    pub bbox: Rect,
    pub class_id: u32,
    pub confirmed: bool,
    pub time_since_update: u32,
}

impl From<&Track> for TrackSnapshot {
    fn from(track: &Track) -> Self {
        Self {
            track_id: track.track_id,
            bbox: track.bbox,
            class_id: track.class_id,
            confirmed: track.is_confirmed(),
            time_since_update: track.time_since_update,
        }
    }
}

/// Outcome of associating one frame's detections with the active tracks.
#[derive(Debug, Clone, Default)]
pub struct Association {
    /// (track id, index into the detection slice)
    pub matches: Vec<(TrackId, usize)>,
    pub unmatched_tracks: Vec<TrackId>,
    /// Indices of detections that should start new tracks
    pub unmatched_detections: Vec<usize>,
    /// Box estimate per track for this frame, if the associator has one
    pub estimates: HashMap<TrackId, Rect>,
}

/// Data-association black box consumed by `TrackManager`.
///
/// Implement this trait to plug in any matching algorithm (IoU, appearance
/// embeddings, ...). Identities stay with the manager.
pub trait Associator {
    /// Error type for association failures.
    type Error: std::error::Error + Send + Sync + 'static;

    fn associate(
        &mut self,
        tracks: &[TrackSnapshot],
        detections: &[Detection],
        geometry: FrameGeometry,
    ) -> Result<Association, Self::Error>;
}

impl<A: Associator + ?Sized> Associator for Box<A> {
    type Error = A::Error;

    fn associate(
        &mut self,
        tracks: &[TrackSnapshot],
        detections: &[Detection],
        geometry: FrameGeometry,
    ) -> Result<Association, Self::Error> {
        (**self).associate(tracks, detections, geometry)
    }
}
