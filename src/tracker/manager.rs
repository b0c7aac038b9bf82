//! Track lifecycle on top of an `Associator`: birth from unmatched detections,
//! confirmation after consecutive hits, deletion after consecutive misses.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::detection::Detection;
use crate::error::ConfigError;
use crate::frame::FrameGeometry;
use crate::tracker::association::{Association, Associator, TrackSnapshot};
use crate::tracker::track::{Track, TrackId};

/// Lifecycle thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackManagerConfig {
    /// Consecutive matches (creation included) before a track is confirmed
    pub n_init: u32,
    /// Consecutive misses before a confirmed track is deleted. Zero deletes
    /// a confirmed track on its first miss.
    pub max_age: u32,
}

impl Default for TrackManagerConfig {
    fn default() -> Self {
        Self {
            n_init: 3,
            max_age: 5,
        }
    }
}

impl TrackManagerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_init == 0 {
            return Err(ConfigError::Zero { name: "n_init" });
        }
        Ok(())
    }
}

/// Owns the active track set. Only its own `update` mutates it.
pub struct TrackManager<A> {
    config: TrackManagerConfig,
    associator: A,
    tracks: Vec<Track>,
    next_id: TrackId,
    frame_count: u64,
}

impl<A: Associator> TrackManager<A> {
    pub fn new(config: TrackManagerConfig, associator: A) -> Self {
        Self {
            config,
            associator,
            tracks: Vec::new(),
            next_id: 1,
            frame_count: 0,
        }
    }

    /// Advance one frame and return the confirmed tracks.
    ///
    /// An association failure is not fatal: the frame counts as having no
    /// detections and nothing is returned for it.
    pub fn update(&mut self, detections: &[Detection], geometry: FrameGeometry) -> Vec<Track> {
        self.frame_count += 1;

        let snapshots: Vec<TrackSnapshot> = self.tracks.iter().map(TrackSnapshot::from).collect();
        match self.associator.associate(&snapshots, detections, geometry) {
            Ok(association) => {
                self.apply(association, detections, geometry);
                self.confirmed()
            }
            Err(err) => {
                warn!(frame = self.frame_count, "association failed, treating frame as empty: {err}");
                self.miss_all();
                Vec::new()
            }
        }
    }

    /// Advance one frame without observations (e.g. the detector failed).
    pub fn skip_frame(&mut self) {
        self.frame_count += 1;
        self.miss_all();
    }

    /// Confirmed tracks, in creation order.
    pub fn confirmed(&self) -> Vec<Track> {
        self.tracks
            .iter()
            .filter(|t| t.is_confirmed())
            .cloned()
            .collect()
    }

    /// Every active track, tentative ones included.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn config(&self) -> &TrackManagerConfig {
        &self.config
    }

    fn apply(&mut self, association: Association, detections: &[Detection], geometry: FrameGeometry) {
        let Association {
            matches,
            unmatched_detections,
            estimates,
            ..
        } = association;

        let mut matched_tracks = HashSet::new();
        let mut used_detections = HashSet::new();

        for (track_id, det_idx) in matches {
            let Some(detection) = detections.get(det_idx) else {
                warn!(track_id, det_idx, "associator matched an unknown detection");
                continue;
            };
            if used_detections.contains(&det_idx) || matched_tracks.contains(&track_id) {
                warn!(track_id, det_idx, "associator reported a duplicate match");
                continue;
            }
            let Some(track) = self.tracks.iter_mut().find(|t| t.track_id == track_id) else {
                warn!(track_id, "associator matched an unknown track");
                continue;
            };
            used_detections.insert(det_idx);
            matched_tracks.insert(track_id);
            let bbox = estimates
                .get(&track_id)
                .copied()
                .unwrap_or(detection.bbox)
                .clip(geometry.width, geometry.height);
            let was_confirmed = track.is_confirmed();
            track.register_hit(detection, bbox, self.config.n_init);
            if !was_confirmed && track.is_confirmed() {
                debug!(track_id, class_id = track.class_id, "track confirmed");
            }
        }

        // Anything not matched this frame is a miss, whether the associator
        // listed it or not.
        for track in self
            .tracks
            .iter_mut()
            .filter(|t| !matched_tracks.contains(&t.track_id))
        {
            let predicted = estimates
                .get(&track.track_id)
                .map(|r| r.clip(geometry.width, geometry.height));
            track.register_miss(predicted, self.config.max_age);
        }

        for det_idx in unmatched_detections {
            let Some(detection) = detections.get(det_idx) else {
                continue;
            };
            if !used_detections.insert(det_idx) {
                continue;
            }
            let track_id = self.next_id;
            self.next_id += 1;
            let bbox = detection.bbox.clip(geometry.width, geometry.height);
            self.tracks
                .push(Track::new(track_id, detection, bbox, self.config.n_init));
            debug!(track_id, class_id = detection.class_id, "track created");
        }

        self.prune_deleted();
    }

    fn miss_all(&mut self) {
        for track in &mut self.tracks {
            track.register_miss(None, self.config.max_age);
        }
        self.prune_deleted();
    }

    fn prune_deleted(&mut self) {
        self.tracks.retain(|t| {
            if t.is_deleted() {
                debug!(track_id = t.track_id, age = t.age, "track deleted");
            }
            !t.is_deleted()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssociationError;
    use crate::tracker::ByteAssociator;

    const GEOMETRY: FrameGeometry = FrameGeometry::new(640, 480);

    struct FailingAssociator;

    impl Associator for FailingAssociator {
        type Error = AssociationError;

        fn associate(
            &mut self,
            _tracks: &[TrackSnapshot],
            _detections: &[Detection],
            _geometry: FrameGeometry,
        ) -> Result<Association, Self::Error> {
            Err(AssociationError::SingularCovariance)
        }
    }

    /// Matches every track to the detection with the same index.
    struct ByIndex;

    impl Associator for ByIndex {
        type Error = AssociationError;

        fn associate(
            &mut self,
            tracks: &[TrackSnapshot],
            detections: &[Detection],
            _geometry: FrameGeometry,
        ) -> Result<Association, Self::Error> {
            let n = tracks.len().min(detections.len());
            Ok(Association {
                matches: (0..n).map(|i| (tracks[i].track_id, i)).collect(),
                unmatched_tracks: tracks[n..].iter().map(|t| t.track_id).collect(),
                unmatched_detections: (n..detections.len()).collect(),
                ..Default::default()
            })
        }
    }

    fn bottle() -> Detection {
        Detection::new(300.0, 200.0, 340.0, 280.0, 0.9, 39)
    }

    #[test]
    fn test_association_failure_returns_empty() {
        let mut manager = TrackManager::new(TrackManagerConfig::default(), FailingAssociator);
        assert!(manager.update(&[bottle()], GEOMETRY).is_empty());
        assert!(manager.tracks().is_empty());
    }

    #[test]
    fn test_ids_are_unique_and_stable() {
        let config = TrackManagerConfig { n_init: 1, max_age: 5 };
        let mut manager = TrackManager::new(config, ByIndex);
        let dets = vec![bottle(), Detection::new(10.0, 10.0, 40.0, 40.0, 0.8, 39)];

        let first = manager.update(&dets, GEOMETRY);
        let second = manager.update(&dets, GEOMETRY);
        let ids: Vec<_> = first.iter().map(|t| t.track_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(second.iter().map(|t| t.track_id).collect::<Vec<_>>(), ids);
    }

    #[test]
    fn test_new_boxes_are_clipped_to_frame() {
        let config = TrackManagerConfig { n_init: 1, max_age: 5 };
        let mut manager = TrackManager::new(config, ByIndex);
        let tracks = manager.update(&[Detection::new(600.0, 440.0, 700.0, 520.0, 0.9, 39)], GEOMETRY);
        assert!(tracks[0].bbox.is_within(640, 480));
    }

    #[test]
    fn test_zero_max_age_is_valid() {
        let config = TrackManagerConfig { n_init: 1, max_age: 0 };
        assert_eq!(config.validate(), Ok(()));
        let config = TrackManagerConfig { n_init: 0, max_age: 0 };
        assert_eq!(config.validate(), Err(ConfigError::Zero { name: "n_init" }));
    }

    #[test]
    fn test_zero_max_age_deletes_on_first_miss() {
        let config = TrackManagerConfig { n_init: 1, max_age: 0 };
        let mut manager = TrackManager::new(config, ByIndex);
        assert_eq!(manager.update(&[bottle()], GEOMETRY).len(), 1);
        assert!(manager.update(&[], GEOMETRY).is_empty());
        assert!(manager.tracks().is_empty());
    }

    #[test]
    fn test_skip_frame_ages_tracks() {
        let config = TrackManagerConfig { n_init: 1, max_age: 2 };
        let mut manager = TrackManager::new(config, ByteAssociator::default());
        manager.update(&[bottle()], GEOMETRY);
        manager.skip_frame();
        assert_eq!(manager.tracks().len(), 1);
        manager.skip_frame();
        assert!(manager.tracks().is_empty());
    }
}
