//! Box and label overlays for confirmed tracks.

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect as PixelRect;

use crate::control::{ActuationCommand, Decision};
use crate::frame::Frame;
use crate::presentation::font::{GLYPH_WIDTH, glyph};
use crate::tracker::{Rect, Track, TrackId};

const PALETTE: [Rgb<u8>; 10] = [
    Rgb([255, 64, 64]),
    Rgb([64, 255, 64]),
    Rgb([64, 64, 255]),
    Rgb([255, 255, 64]),
    Rgb([255, 64, 255]),
    Rgb([64, 255, 255]),
    Rgb([255, 128, 0]),
    Rgb([128, 0, 255]),
    Rgb([255, 128, 192]),
    Rgb([128, 255, 128]),
];

const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const GLYPH_SCALE: i32 = 2;
const GLYPH_ADVANCE: i32 = (GLYPH_WIDTH + 1) * GLYPH_SCALE;
const LABEL_HEIGHT: i32 = 20;

/// Class index to display name, one name per line of a names file.
#[derive(Debug, Clone, Default)]
pub struct ClassNames {
    names: Vec<String>,
}

impl ClassNames {
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    pub fn parse(text: &str) -> Self {
        Self {
            names: text.trim().lines().map(|l| l.trim().to_string()).collect(),
        }
    }

    /// Display name, or the numeric id when the class is unknown.
    pub fn name(&self, class_id: u32) -> Cow<'_, str> {
        match self.names.get(class_id as usize) {
            Some(name) if !name.is_empty() => Cow::Borrowed(name),
            _ => Cow::Owned(class_id.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Drawing metadata for one confirmed track.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub track_id: TrackId,
    pub class_id: u32,
    /// `"<class>-<id>"`
    pub label: String,
    pub bbox: Rect,
    pub color: Rgb<u8>,
    /// Whether the controller is steering towards this track
    pub is_target: bool,
}

/// A frame ready for display.
#[derive(Debug, Clone)]
pub struct AnnotatedFrame {
    pub seq: u64,
    pub image: RgbImage,
    pub overlays: Vec<Overlay>,
    /// Command the controller chose on this frame, if any
    pub command: Option<ActuationCommand>,
}

#[derive(Debug, Clone, Default)]
pub struct Annotator {
    names: ClassNames,
}

impl Annotator {
    pub fn new(names: ClassNames) -> Self {
        Self { names }
    }

    pub fn class_names(&self) -> &ClassNames {
        &self.names
    }

    pub fn color(&self, class_id: u32) -> Rgb<u8> {
        PALETTE[class_id as usize % PALETTE.len()]
    }

    pub fn overlays(&self, tracks: &[Track], target: Option<TrackId>) -> Vec<Overlay> {
        tracks
            .iter()
            .map(|t| Overlay {
                track_id: t.track_id,
                class_id: t.class_id,
                label: format!("{}-{}", self.names.name(t.class_id), t.track_id),
                bbox: t.bbox,
                color: self.color(t.class_id),
                is_target: Some(t.track_id) == target,
            })
            .collect()
    }

    /// Draw overlays onto the frame and package it for display.
    pub fn annotate(&self, frame: Frame, tracks: &[Track], decision: Option<Decision>) -> AnnotatedFrame {
        let seq = frame.seq();
        let mut image = frame.into_image();
        let overlays = self.overlays(tracks, decision.map(|d| d.track_id));
        for overlay in &overlays {
            draw_overlay(&mut image, overlay);
        }
        AnnotatedFrame {
            seq,
            image,
            overlays,
            command: decision.map(|d| d.command),
        }
    }
}

fn draw_overlay(image: &mut RgbImage, overlay: &Overlay) {
    let [x1, y1, x2, y2] = overlay.bbox.to_tlbr();
    let (x1, y1) = (x1 as i32, y1 as i32);
    let width = ((x2 as i32) - x1).max(1) as u32;
    let height = ((y2 as i32) - y1).max(1) as u32;

    let thickness = if overlay.is_target { 3 } else { 2 };
    for offset in 0..thickness {
        let rect = PixelRect::at(x1 - offset, y1 - offset)
            .of_size(width + 2 * offset as u32, height + 2 * offset as u32);
        draw_hollow_rect_mut(image, rect, overlay.color);
    }

    // label bar above the box, or inside it at the top edge
    let bar_top = if y1 >= LABEL_HEIGHT { y1 - LABEL_HEIGHT } else { y1 };
    let bar_width = (overlay.label.chars().count() as i32 * GLYPH_ADVANCE + 6) as u32;
    draw_filled_rect_mut(
        image,
        PixelRect::at(x1 - 1, bar_top).of_size(bar_width, LABEL_HEIGHT as u32),
        overlay.color,
    );
    draw_text(image, &overlay.label, x1 + 3, bar_top + 3, TEXT_COLOR);
}

/// Render `text` with the built-in 5x7 glyphs at `GLYPH_SCALE`.
fn draw_text(image: &mut RgbImage, text: &str, x: i32, y: i32, color: Rgb<u8>) {
    for (i, ch) in text.chars().enumerate() {
        let origin_x = x + i as i32 * GLYPH_ADVANCE;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                    continue;
                }
                for dy in 0..GLYPH_SCALE {
                    for dx in 0..GLYPH_SCALE {
                        let px = origin_x + col * GLYPH_SCALE + dx;
                        let py = y + row as i32 * GLYPH_SCALE + dy;
                        if px >= 0 && py >= 0 && (px as u32) < image.width() && (py as u32) < image.height() {
                            image.put_pixel(px as u32, py as u32, color);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Detection;

    fn track(id: TrackId, class_id: u32, rect: Rect) -> Track {
        let det = Detection::from_rect(rect, 0.9, class_id);
        Track::new(id, &det, det.bbox, 1)
    }

    #[test]
    fn test_class_names_fallback() {
        let names = ClassNames::parse("person\nbicycle\n\nbottle\n");
        assert_eq!(names.len(), 4);
        assert_eq!(names.name(3), "bottle");
        assert_eq!(names.name(2), "2");
        assert_eq!(names.name(99), "99");
    }

    #[test]
    fn test_overlay_labels_and_target() {
        let annotator = Annotator::new(ClassNames::parse("person\nbottle"));
        let tracks = vec![
            track(3, 1, Rect::new(10.0, 30.0, 20.0, 20.0)),
            track(5, 0, Rect::new(100.0, 100.0, 20.0, 20.0)),
        ];
        let overlays = annotator.overlays(&tracks, Some(5));
        assert_eq!(overlays[0].label, "bottle-3");
        assert_eq!(overlays[1].label, "person-5");
        assert!(!overlays[0].is_target);
        assert!(overlays[1].is_target);
        assert_eq!(overlays[0].color, annotator.color(1));
    }

    #[test]
    fn test_annotate_draws_box() {
        let annotator = Annotator::default();
        let tracks = vec![track(1, 0, Rect::new(40.0, 40.0, 30.0, 30.0))];
        let frame = Frame::blank(7, 128, 96);
        let decision = Decision {
            track_id: 1,
            command: ActuationCommand::TurnLeft,
        };
        let annotated = annotator.annotate(frame, &tracks, Some(decision));

        assert_eq!(annotated.seq, 7);
        assert_eq!(annotated.command, Some(ActuationCommand::TurnLeft));
        assert_eq!(*annotated.image.get_pixel(55, 40), annotator.color(0));
        assert_eq!(*annotated.image.get_pixel(55, 55), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_annotate_clips_at_frame_edge() {
        let annotator = Annotator::default();
        let tracks = vec![track(12, 4, Rect::new(-10.0, -5.0, 300.0, 300.0))];
        let annotated = annotator.annotate(Frame::blank(0, 64, 48), &tracks, None);
        assert_eq!(annotated.overlays.len(), 1);
        assert_eq!(annotated.command, None);
    }
}
