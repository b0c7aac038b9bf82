//! ByteTrack-style association: Kalman-predicted boxes matched to detections
//! by IoU in several rounds.
//!
//! 1. Confirmed tracks against high-score detections (IoU fused with score).
//! 2. Still-unmatched confirmed tracks against low-score detections.
//! 3. Tentative tracks against the high-score detections left over.
//!
//! High-score detections nobody claimed become new tracks; low-score
//! leftovers are dropped.

use std::collections::HashMap;

use ndarray::Array2;

use crate::detection::Detection;
use crate::error::{AssociationError, ConfigError};
use crate::frame::FrameGeometry;
use crate::tracker::association::{Association, Associator, TrackSnapshot};
use crate::tracker::kalman_filter::{KalmanFilter, MotionState};
use crate::tracker::matching::{self, AssignmentResult};
use crate::tracker::rect::Rect;
use crate::tracker::track::TrackId;

/// Configuration for the `ByteAssociator`.
///
/// The low-score round only ever sees detections the upstream filter let
/// through. With the default filter threshold equal to `high_thresh` it
/// receives nothing; lower the filter threshold towards `low_thresh` to let
/// weak detections keep confirmed tracks alive.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationConfig {
    /// Detections at or above this confidence take part in the first round
    pub high_thresh: f32,
    /// Detections below this confidence are ignored entirely
    pub low_thresh: f32,
    /// Max fused cost for a first-round match
    pub match_thresh: f32,
    /// Max IoU cost for a low-score rescue match
    pub low_match_thresh: f32,
    /// Max fused cost for matching a tentative track
    pub tentative_match_thresh: f32,
    /// Only match detections of the same class as the track
    pub class_gating: bool,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            high_thresh: 0.5,
            low_thresh: 0.1,
            match_thresh: 0.8,
            low_match_thresh: 0.5,
            tentative_match_thresh: 0.7,
            class_gating: true,
        }
    }
}

impl AssociationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("high_thresh", self.high_thresh),
            ("low_thresh", self.low_thresh),
            ("match_thresh", self.match_thresh),
            ("low_match_thresh", self.low_match_thresh),
            ("tentative_match_thresh", self.tentative_match_thresh),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { name, value });
            }
        }
        Ok(())
    }
}

pub struct ByteAssociator {
    config: AssociationConfig,
    kalman_filter: KalmanFilter,
    motion: HashMap<TrackId, MotionState>,
}

impl ByteAssociator {
    pub fn new(config: AssociationConfig) -> Self {
        Self {
            config,
            kalman_filter: KalmanFilter::default(),
            motion: HashMap::new(),
        }
    }

    pub fn config(&self) -> &AssociationConfig {
        &self.config
    }

    /// Number of tracks with filter state.
    pub fn tracked_count(&self) -> usize {
        self.motion.len()
    }

    /// Match `track_idx` against `det_idx`, returning global indices.
    fn assign_round(
        &self,
        tracks: &[TrackSnapshot],
        track_idx: &[usize],
        detections: &[Detection],
        det_idx: &[usize],
        thresh: f32,
        fuse: bool,
    ) -> AssignmentResult {
        let track_rects: Vec<Rect> = track_idx
            .iter()
            .map(|&i| self.predicted_rect(&tracks[i]))
            .collect();
        let dets: Vec<&Detection> = det_idx.iter().map(|&j| &detections[j]).collect();
        let det_rects: Vec<Rect> = dets.iter().map(|d| d.bbox).collect();

        let mut dists: Array2<f32> = matching::iou_distance(&track_rects, &det_rects);
        if fuse {
            matching::fuse_score(&mut dists, &dets);
        }
        if self.config.class_gating {
            let classes: Vec<u32> = track_idx.iter().map(|&i| tracks[i].class_id).collect();
            matching::gate_classes(&mut dists, &classes, &dets);
        }

        let local = matching::linear_assignment(&dists, thresh);
        AssignmentResult {
            matches: local
                .matches
                .into_iter()
                .map(|(t, d)| (track_idx[t], det_idx[d]))
                .collect(),
            unmatched_tracks: local
                .unmatched_tracks
                .into_iter()
                .map(|t| track_idx[t])
                .collect(),
            unmatched_detections: local
                .unmatched_detections
                .into_iter()
                .map(|d| det_idx[d])
                .collect(),
        }
    }

    fn predicted_rect(&self, track: &TrackSnapshot) -> Rect {
        self.motion
            .get(&track.track_id)
            .map(MotionState::rect)
            .unwrap_or(track.bbox)
    }
}

impl Default for ByteAssociator {
    fn default() -> Self {
        Self::new(AssociationConfig::default())
    }
}

impl Associator for ByteAssociator {
    type Error = AssociationError;

    fn associate(
        &mut self,
        tracks: &[TrackSnapshot],
        detections: &[Detection],
        _geometry: FrameGeometry,
    ) -> Result<Association, Self::Error> {
        // Step 1: forget deleted tracks, predict the rest
        self.motion
            .retain(|id, _| tracks.iter().any(|t| t.track_id == *id));
        for track in tracks {
            let state = match self.motion.get(&track.track_id) {
                Some(state) => {
                    let mut state = state.clone();
                    if track.time_since_update > 0 {
                        state.mean[7] = 0.0;
                    }
                    state
                }
                None => self.kalman_filter.initiate(track.bbox.to_xyah()),
            };
            let predicted = self.kalman_filter.predict(&state);
            self.motion.insert(track.track_id, predicted);
        }

        // Step 2: split detections by score
        let mut high = Vec::new();
        let mut low = Vec::new();
        for (j, det) in detections.iter().enumerate() {
            if det.confidence >= self.config.high_thresh {
                high.push(j);
            } else if det.confidence >= self.config.low_thresh {
                low.push(j);
            }
        }

        let (confirmed, tentative): (Vec<usize>, Vec<usize>) =
            (0..tracks.len()).partition(|&i| tracks[i].confirmed);

        // Step 3: first association, confirmed tracks with high score detections
        let first = self.assign_round(
            tracks,
            &confirmed,
            detections,
            &high,
            self.config.match_thresh,
            true,
        );

        // Step 4: second association, leftover confirmed tracks with low score detections
        let second = self.assign_round(
            tracks,
            &first.unmatched_tracks,
            detections,
            &low,
            self.config.low_match_thresh,
            false,
        );

        // Step 5: tentative tracks, usually with only one beginning frame
        let third = self.assign_round(
            tracks,
            &tentative,
            detections,
            &first.unmatched_detections,
            self.config.tentative_match_thresh,
            true,
        );

        let mut association = Association {
            unmatched_detections: third.unmatched_detections,
            ..Default::default()
        };

        for (i, j) in first
            .matches
            .into_iter()
            .chain(second.matches)
            .chain(third.matches)
        {
            let id = tracks[i].track_id;
            let Some(state) = self.motion.get(&id) else {
                continue;
            };
            let corrected = self
                .kalman_filter
                .update(state, detections[j].bbox.to_xyah())?;
            association.estimates.insert(id, corrected.rect());
            self.motion.insert(id, corrected);
            association.matches.push((id, j));
        }

        for i in second
            .unmatched_tracks
            .into_iter()
            .chain(third.unmatched_tracks)
        {
            let id = tracks[i].track_id;
            if let Some(state) = self.motion.get(&id) {
                association.estimates.insert(id, state.rect());
            }
            association.unmatched_tracks.push(id);
        }

        association.matches.sort_unstable();
        association.unmatched_tracks.sort_unstable();
        association.unmatched_detections.sort_unstable();
        Ok(association)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GEOMETRY: FrameGeometry = FrameGeometry::new(640, 480);

    fn snapshot(id: TrackId, bbox: Rect, confirmed: bool) -> TrackSnapshot {
        TrackSnapshot {
            track_id: id,
            bbox,
            class_id: 39,
            confirmed,
            time_since_update: 0,
        }
    }

    #[test]
    fn test_no_tracks_all_detections_unmatched() {
        let mut assoc = ByteAssociator::default();
        let dets = vec![
            Detection::new(10.0, 10.0, 50.0, 50.0, 0.9, 39),
            Detection::new(200.0, 200.0, 250.0, 260.0, 0.8, 39),
        ];
        let res = assoc.associate(&[], &dets, GEOMETRY).unwrap();
        assert!(res.matches.is_empty());
        assert_eq!(res.unmatched_detections, vec![0, 1]);
    }

    #[test]
    fn test_overlapping_detection_matches_track() {
        let mut assoc = ByteAssociator::default();
        let tracks = vec![snapshot(7, Rect::from_tlbr(100.0, 100.0, 200.0, 200.0), true)];
        let dets = vec![Detection::new(104.0, 102.0, 204.0, 202.0, 0.9, 39)];
        let res = assoc.associate(&tracks, &dets, GEOMETRY).unwrap();
        assert_eq!(res.matches, vec![(7, 0)]);
        assert!(res.unmatched_detections.is_empty());
        assert!(res.estimates.contains_key(&7));
    }

    #[test]
    fn test_class_gating_blocks_other_classes() {
        let mut assoc = ByteAssociator::default();
        let tracks = vec![snapshot(1, Rect::from_tlbr(100.0, 100.0, 200.0, 200.0), true)];
        let dets = vec![Detection::new(100.0, 100.0, 200.0, 200.0, 0.9, 0)];
        let res = assoc.associate(&tracks, &dets, GEOMETRY).unwrap();
        assert!(res.matches.is_empty());
        assert_eq!(res.unmatched_tracks, vec![1]);
        assert_eq!(res.unmatched_detections, vec![0]);
    }

    #[test]
    fn test_low_score_detection_rescues_confirmed_track() {
        let mut assoc = ByteAssociator::default();
        let tracks = vec![snapshot(3, Rect::from_tlbr(100.0, 100.0, 200.0, 200.0), true)];
        let dets = vec![Detection::new(101.0, 101.0, 201.0, 201.0, 0.3, 39)];
        let res = assoc.associate(&tracks, &dets, GEOMETRY).unwrap();
        assert_eq!(res.matches, vec![(3, 0)]);

        // a low score detection never starts a track of its own
        let res = assoc.associate(&[], &dets, GEOMETRY).unwrap();
        assert!(res.unmatched_detections.is_empty());
    }

    #[test]
    fn test_forgets_removed_tracks() {
        let mut assoc = ByteAssociator::default();
        let tracks = vec![
            snapshot(1, Rect::from_tlbr(0.0, 0.0, 50.0, 50.0), true),
            snapshot(2, Rect::from_tlbr(300.0, 300.0, 350.0, 350.0), false),
        ];
        assoc.associate(&tracks, &[], GEOMETRY).unwrap();
        assert_eq!(assoc.tracked_count(), 2);
        assoc.associate(&tracks[..1], &[], GEOMETRY).unwrap();
        assert_eq!(assoc.tracked_count(), 1);
    }
}
