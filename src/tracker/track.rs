//! A single tracked object and its hit/miss counters.

use crate::detection::Detection;
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackState;

/// Track identity, unique among the tracks of one `TrackManager`.
pub type TrackId = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Stable identity for the lifetime of the track
    pub track_id: TrackId,
    /// Current box, clipped to the last frame the track was updated against
    pub bbox: Rect,
    /// Class of the detection that created the track
    pub class_id: u32,
    /// Confidence of the last matched detection
    pub confidence: f32,
    pub state: TrackState,
    /// Consecutive matches while tentative, total matches afterwards
    pub hits: u32,
    /// Consecutive frames without a match
    pub time_since_update: u32,
    /// Frames since creation
    pub age: u32,
}

impl Track {
    /// Start a tentative track from an unmatched detection.
    ///
    /// The creation frame counts as the first match, so `n_init <= 1`
    /// confirms immediately.
    pub fn new(track_id: TrackId, detection: &Detection, bbox: Rect, n_init: u32) -> Self {
        let state = if n_init <= 1 {
            TrackState::Confirmed
        } else {
            TrackState::Tentative
        };
        Self {
            track_id,
            bbox,
            class_id: detection.class_id,
            confidence: detection.confidence,
            state,
            hits: 1,
            time_since_update: 0,
            age: 0,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    pub fn is_deleted(&self) -> bool {
        self.state == TrackState::Deleted
    }

    /// Record a match with `detection`, moving the track to `bbox`.
    pub fn register_hit(&mut self, detection: &Detection, bbox: Rect, n_init: u32) {
        self.bbox = bbox;
        self.confidence = detection.confidence;
        self.hits = self.hits.saturating_add(1);
        self.time_since_update = 0;
        self.age = self.age.saturating_add(1);

        if self.state == TrackState::Tentative && self.hits >= n_init {
            self.state = TrackState::Confirmed;
        }
    }

    /// Record a frame without a match.
    ///
    /// Tentative tracks die on their first miss; confirmed tracks after
    /// `max_age` consecutive misses.
    pub fn register_miss(&mut self, predicted: Option<Rect>, max_age: u32) {
        if let Some(bbox) = predicted {
            self.bbox = bbox;
        }
        self.time_since_update = self.time_since_update.saturating_add(1);
        self.age = self.age.saturating_add(1);

        match self.state {
            TrackState::Tentative => self.state = TrackState::Deleted,
            TrackState::Confirmed if self.time_since_update >= max_age => {
                self.state = TrackState::Deleted
            }
            _ => {}
        }
    }
}
