//! Dead-zone centering controller.
//!
//! Maps the selected target's box centre against the frame centre to a
//! single motion command. The vertical axis is corrected before the
//! horizontal one, so a target that is both high and to the right yields
//! `Forward` until it is vertically centred.

use std::cmp::Ordering;
use std::time::{Duration, Instant};

use crate::control::command::ActuationCommand;
use crate::control::settle::SettleTimer;
use crate::error::ConfigError;
use crate::frame::FrameGeometry;
use crate::pipeline::StopSignal;
use crate::tracker::{Rect, Track, TrackId};

/// How to choose between several confirmed tracks of the target class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Closest box centre to the frame centre, then lowest id
    #[default]
    NearestCenter,
    LowestId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlConfig {
    /// Class the vehicle steers towards
    pub target_class: u32,
    /// Half-width of the centred band, in pixels
    pub dead_zone_px: f32,
    /// Hold-off after a motion command before the next evaluation
    pub settle_delay: Duration,
    pub tie_break: TieBreak,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            target_class: 39,
            dead_zone_px: 10.0,
            settle_delay: Duration::from_millis(50),
            tie_break: TieBreak::NearestCenter,
        }
    }
}

impl ControlConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dead_zone_px.is_nan() || self.dead_zone_px < 0.0 {
            return Err(ConfigError::Negative {
                name: "dead_zone_px",
                value: self.dead_zone_px,
            });
        }
        Ok(())
    }
}

/// Command that moves `target` towards the frame centre.
pub fn compute_command(
    target: &Rect,
    frame_width: u32,
    frame_height: u32,
    dead_zone_px: f32,
) -> ActuationCommand {
    let (tx, ty) = target.center();
    let (cx, cy) = FrameGeometry::new(frame_width, frame_height).center();

    if ty < cy - dead_zone_px {
        ActuationCommand::Forward
    } else if ty > cy + dead_zone_px {
        ActuationCommand::Backward
    } else if tx < cx - dead_zone_px {
        ActuationCommand::TurnLeft
    } else if tx > cx + dead_zone_px {
        ActuationCommand::TurnRight
    } else {
        ActuationCommand::Stop
    }
}

/// Pick the confirmed track of `target_class` to steer towards.
pub fn select_target(
    tracks: &[Track],
    target_class: u32,
    geometry: FrameGeometry,
    tie_break: TieBreak,
) -> Option<&Track> {
    let candidates = tracks
        .iter()
        .filter(|t| t.is_confirmed() && t.class_id == target_class);

    match tie_break {
        TieBreak::LowestId => candidates.min_by_key(|t| t.track_id),
        TieBreak::NearestCenter => {
            let (cx, cy) = geometry.center();
            let distance = |t: &Track| {
                let (x, y) = t.bbox.center();
                (x - cx).powi(2) + (y - cy).powi(2)
            };
            candidates.min_by(|a, b| match distance(a).total_cmp(&distance(b)) {
                Ordering::Equal => a.track_id.cmp(&b.track_id),
                ord => ord,
            })
        }
    }
}

/// The controller's choice for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub track_id: TrackId,
    pub command: ActuationCommand,
}

pub struct CenteringController {
    config: ControlConfig,
    settle: SettleTimer,
}

impl CenteringController {
    pub fn new(config: ControlConfig) -> Self {
        Self {
            config,
            settle: SettleTimer::new(),
        }
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// `None` when no confirmed track of the target class exists.
    pub fn decide(&self, tracks: &[Track], geometry: FrameGeometry) -> Option<Decision> {
        let target = select_target(
            tracks,
            self.config.target_class,
            geometry,
            self.config.tie_break,
        )?;
        Some(Decision {
            track_id: target.track_id,
            command: compute_command(
                &target.bbox,
                geometry.width,
                geometry.height,
                self.config.dead_zone_px,
            ),
        })
    }

    /// Record that `command` left for the vehicle. Movement starts the
    /// settling delay.
    pub fn command_sent(&mut self, command: ActuationCommand, now: Instant) {
        if command.is_motion() && command != ActuationCommand::Stop {
            self.settle.arm(now, self.config.settle_delay);
        }
    }

    pub fn is_settling(&self, now: Instant) -> bool {
        self.settle.is_settling(now)
    }

    /// Wait out the settling delay. Returns `false` if stopped meanwhile.
    pub fn wait_settled(&mut self, stop: &StopSignal) -> bool {
        self.settle.wait(stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Detection;

    fn box_at(cx: f32, cy: f32) -> Rect {
        Rect::new(cx - 20.0, cy - 30.0, 40.0, 60.0)
    }

    fn confirmed(id: TrackId, cx: f32, cy: f32, class_id: u32) -> Track {
        let det = Detection::from_rect(box_at(cx, cy), 0.9, class_id);
        Track::new(id, &det, det.bbox, 1)
    }

    #[test]
    fn test_centered_target_stops() {
        assert_eq!(
            compute_command(&box_at(320.0, 240.0), 640, 480, 10.0),
            ActuationCommand::Stop
        );
    }

    #[test]
    fn test_high_target_moves_forward() {
        assert_eq!(
            compute_command(&box_at(320.0, 100.0), 640, 480, 10.0),
            ActuationCommand::Forward
        );
        assert_eq!(
            compute_command(&box_at(320.0, 400.0), 640, 480, 10.0),
            ActuationCommand::Backward
        );
    }

    #[test]
    fn test_right_target_turns_right() {
        assert_eq!(
            compute_command(&box_at(500.0, 240.0), 640, 480, 10.0),
            ActuationCommand::TurnRight
        );
        assert_eq!(
            compute_command(&box_at(100.0, 240.0), 640, 480, 10.0),
            ActuationCommand::TurnLeft
        );
    }

    #[test]
    fn test_vertical_before_horizontal() {
        assert_eq!(
            compute_command(&box_at(600.0, 20.0), 640, 480, 10.0),
            ActuationCommand::Forward
        );
    }

    #[test]
    fn test_dead_zone_edges_are_centred() {
        assert_eq!(
            compute_command(&box_at(330.0, 230.0), 640, 480, 10.0),
            ActuationCommand::Stop
        );
        assert_eq!(
            compute_command(&box_at(331.0, 240.0), 640, 480, 10.0),
            ActuationCommand::TurnRight
        );
    }

    #[test]
    fn test_select_target_ignores_other_classes_and_tentative() {
        let geometry = FrameGeometry::new(640, 480);
        let tentative = {
            let det = Detection::from_rect(box_at(320.0, 240.0), 0.9, 39);
            Track::new(1, &det, det.bbox, 3)
        };
        let tracks = vec![tentative, confirmed(2, 320.0, 240.0, 0)];
        assert!(select_target(&tracks, 39, geometry, TieBreak::NearestCenter).is_none());
    }

    #[test]
    fn test_tie_break_rules() {
        let geometry = FrameGeometry::new(640, 480);
        let tracks = vec![
            confirmed(4, 330.0, 250.0, 39),
            confirmed(2, 100.0, 100.0, 39),
            confirmed(7, 310.0, 230.0, 39),
        ];
        let nearest = select_target(&tracks, 39, geometry, TieBreak::NearestCenter).unwrap();
        // 4 and 7 are equidistant
        assert_eq!(nearest.track_id, 4);
        let lowest = select_target(&tracks, 39, geometry, TieBreak::LowestId).unwrap();
        assert_eq!(lowest.track_id, 2);
    }

    #[test]
    fn test_decide_is_repeatable() {
        let controller = CenteringController::new(ControlConfig::default());
        let tracks = vec![confirmed(1, 500.0, 240.0, 39)];
        let geometry = FrameGeometry::new(640, 480);
        let first = controller.decide(&tracks, geometry);
        assert_eq!(
            first,
            Some(Decision {
                track_id: 1,
                command: ActuationCommand::TurnRight
            })
        );
        assert_eq!(controller.decide(&tracks, geometry), first);
        assert_eq!(controller.decide(&[], geometry), None);
    }

    #[test]
    fn test_only_movement_arms_settling() {
        let mut controller = CenteringController::new(ControlConfig::default());
        let now = Instant::now();
        controller.command_sent(ActuationCommand::Stop, now);
        assert!(!controller.is_settling(now));
        controller.command_sent(ActuationCommand::Forward, now);
        assert!(controller.is_settling(now));
        assert!(!controller.is_settling(now + Duration::from_millis(60)));
    }
}
