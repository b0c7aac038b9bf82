//! Cost matrices and linear assignment for detection-to-track association.

use ndarray::Array2;

use crate::detection::Detection;
use crate::tracker::rect::Rect;

/// Cost assigned to pairs that must never match.
pub const FORBIDDEN_COST: f32 = 1.0;

/// Compute IoU distance matrix between tracks and detections.
pub fn iou_distance(track_boxes: &[Rect], det_boxes: &[Rect]) -> Array2<f32> {
    let mut dists = Array2::zeros((track_boxes.len(), det_boxes.len()));
    for (i, t) in track_boxes.iter().enumerate() {
        for (j, d) in det_boxes.iter().enumerate() {
            dists[[i, j]] = 1.0 - t.iou(d);
        }
    }
    dists
}

/// Rows/columns are indices into the cost matrix that was solved.
#[derive(Debug, Clone, Default)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

pub fn linear_assignment(cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    // lapjv needs a square matrix
    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), 1e6);
    for i in 0..num_rows {
        for j in 0..num_cols {
            padded[[i, j]] = cost_matrix[[i, j]] as f64;
        }
    }

    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut unmatched_detections_mask = vec![true; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row_idx, &col_idx) in row_to_col.iter().enumerate().take(num_rows) {
                if col_idx < num_cols && cost_matrix[[row_idx, col_idx]] <= thresh {
                    matches.push((row_idx, col_idx));
                    unmatched_detections_mask[col_idx] = false;
                } else {
                    unmatched_tracks.push(row_idx);
                }
            }
        }
        Err(_) => {
            tracing::warn!("linear assignment failed, leaving all pairs unmatched");
            unmatched_tracks = (0..num_rows).collect();
        }
    }

    let unmatched_detections = unmatched_detections_mask
        .iter()
        .enumerate()
        .filter_map(|(i, &u)| u.then_some(i))
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}

/// Weight IoU similarity by detection confidence.
pub fn fuse_score(cost_matrix: &mut Array2<f32>, detections: &[&Detection]) {
    let (rows, cols) = cost_matrix.dim();
    for i in 0..rows {
        for j in 0..cols {
            let iou_sim = 1.0 - cost_matrix[[i, j]];
            cost_matrix[[i, j]] = 1.0 - iou_sim * detections[j].confidence;
        }
    }
}

/// Forbid pairs whose class ids differ.
pub fn gate_classes(cost_matrix: &mut Array2<f32>, track_classes: &[u32], detections: &[&Detection]) {
    for (i, &class_id) in track_classes.iter().enumerate() {
        for (j, det) in detections.iter().enumerate() {
            if det.class_id != class_id {
                cost_matrix[[i, j]] = FORBIDDEN_COST;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_assignment_respects_threshold() {
        let costs = ndarray::array![[0.1, 0.9], [0.95, 0.2]];
        let res = linear_assignment(&costs, 0.5);
        assert_eq!(res.matches, vec![(0, 0), (1, 1)]);

        let res = linear_assignment(&costs, 0.15);
        assert_eq!(res.matches, vec![(0, 0)]);
        assert_eq!(res.unmatched_tracks, vec![1]);
        assert_eq!(res.unmatched_detections, vec![1]);
    }

    #[test]
    fn test_linear_assignment_rectangular() {
        let costs = ndarray::array![[0.3, 0.1, 0.8]];
        let res = linear_assignment(&costs, 0.5);
        assert_eq!(res.matches, vec![(0, 1)]);
        assert_eq!(res.unmatched_detections, vec![0, 2]);
    }

    #[test]
    fn test_empty_inputs() {
        let res = linear_assignment(&Array2::zeros((0, 3)), 0.5);
        assert!(res.matches.is_empty());
        assert_eq!(res.unmatched_detections, vec![0, 1, 2]);

        let res = linear_assignment(&Array2::zeros((2, 0)), 0.5);
        assert_eq!(res.unmatched_tracks, vec![0, 1]);
    }

    #[test]
    fn test_gate_and_fuse() {
        let a = Detection::new(0.0, 0.0, 10.0, 10.0, 0.5, 1);
        let b = Detection::new(0.0, 0.0, 10.0, 10.0, 1.0, 2);
        let dets = vec![&a, &b];
        let mut costs = iou_distance(&[Rect::new(0.0, 0.0, 10.0, 10.0)], &[a.bbox, b.bbox]);
        fuse_score(&mut costs, &dets);
        assert!((costs[[0, 0]] - 0.5).abs() < 1e-6);
        assert!(costs[[0, 1]].abs() < 1e-6);

        gate_classes(&mut costs, &[1], &dets);
        assert_eq!(costs[[0, 1]], FORBIDDEN_COST);
    }
}
