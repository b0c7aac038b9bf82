//! Constant-velocity Kalman filter over XYAH box state, using ndarray for the
//! 8-dim state and nalgebra for the 4x4 innovation inverse.

use ndarray::{Array1, Array2};

use crate::error::AssociationError;

/// Filter state of a single box: 8-dim mean and 8x8 covariance.
#[derive(Debug, Clone)]
pub struct MotionState {
    pub mean: Array1<f64>,
    pub covariance: Array2<f64>,
}

impl MotionState {
    /// Box implied by the current mean.
    pub fn rect(&self) -> crate::tracker::Rect {
        crate::tracker::Rect::from_xyah(
            self.mean[0] as f32,
            self.mean[1] as f32,
            self.mean[2] as f32,
            self.mean[3] as f32,
        )
    }
}

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    std_weight_position: f64,
    std_weight_velocity: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        let ndim = 4;
        let mut motion_mat = Array2::eye(2 * ndim);
        for i in 0..ndim {
            motion_mat[[i, ndim + i]] = 1.0;
        }

        let mut update_mat = Array2::zeros((ndim, 2 * ndim));
        for i in 0..ndim {
            update_mat[[i, i]] = 1.0;
        }

        Self {
            motion_mat,
            update_mat,
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
        }
    }

    /// Start a new state from an XYAH measurement with zero velocity.
    pub fn initiate(&self, measurement: [f32; 4]) -> MotionState {
        let mut mean = Array1::zeros(8);
        for i in 0..4 {
            mean[i] = measurement[i] as f64;
        }

        let h = mean[3];
        let std = [
            2.0 * self.std_weight_position * h,
            2.0 * self.std_weight_position * h,
            1e-2,
            2.0 * self.std_weight_position * h,
            10.0 * self.std_weight_velocity * h,
            10.0 * self.std_weight_velocity * h,
            1e-5,
            10.0 * self.std_weight_velocity * h,
        ];

        MotionState {
            mean,
            covariance: diagonal(&std),
        }
    }

    pub fn predict(&self, state: &MotionState) -> MotionState {
        let h = state.mean[3];
        let std = [
            self.std_weight_position * h,
            self.std_weight_position * h,
            1e-2,
            self.std_weight_position * h,
            self.std_weight_velocity * h,
            self.std_weight_velocity * h,
            1e-5,
            self.std_weight_velocity * h,
        ];

        let mean = self.motion_mat.dot(&state.mean);
        let covariance = self
            .motion_mat
            .dot(&state.covariance)
            .dot(&self.motion_mat.t())
            + diagonal(&std);

        MotionState { mean, covariance }
    }

    fn project(&self, state: &MotionState) -> (Array1<f64>, Array2<f64>) {
        let h = state.mean[3];
        let std = [
            self.std_weight_position * h,
            self.std_weight_position * h,
            1e-1,
            self.std_weight_position * h,
        ];

        let mean_proj = self.update_mat.dot(&state.mean);
        let covariance_proj = self
            .update_mat
            .dot(&state.covariance)
            .dot(&self.update_mat.t())
            + diagonal(&std);

        (mean_proj, covariance_proj)
    }

    /// Correct `state` with an XYAH measurement.
    pub fn update(
        &self,
        state: &MotionState,
        measurement: [f32; 4],
    ) -> Result<MotionState, AssociationError> {
        let (projected_mean, projected_cov) = self.project(state);

        let measurement_arr = Array1::from_iter(measurement.iter().map(|&v| v as f64));
        let innovation = measurement_arr - projected_mean;

        // K = P * H^T * S^-1, with H = [I 0] so P * H^T is the first 4 columns of P.
        let s_inv = invert_4x4(&projected_cov)?;
        let pht = state.covariance.dot(&self.update_mat.t());
        let kalman_gain = pht.dot(&s_inv);

        let mean = &state.mean + &kalman_gain.dot(&innovation);
        let covariance =
            &state.covariance - &kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());

        Ok(MotionState { mean, covariance })
    }
}

fn diagonal(std: &[f64]) -> Array2<f64> {
    let mut cov = Array2::zeros((std.len(), std.len()));
    for (i, s) in std.iter().enumerate() {
        cov[[i, i]] = s * s;
    }
    cov
}

/// Invert a 4x4 matrix with nalgebra (pure Rust, no LAPACK).
fn invert_4x4(m: &Array2<f64>) -> Result<Array2<f64>, AssociationError> {
    let mut nm = nalgebra::Matrix4::zeros();
    for i in 0..4 {
        for j in 0..4 {
            nm[(i, j)] = m[[i, j]];
        }
    }
    let inv = nm
        .try_inverse()
        .ok_or(AssociationError::SingularCovariance)?;
    let mut res = Array2::zeros((4, 4));
    for i in 0..4 {
        for j in 0..4 {
            res[[i, j]] = inv[(i, j)];
        }
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initiate() {
        let kf = KalmanFilter::new();
        let state = kf.initiate([100.0, 200.0, 0.5, 50.0]);
        assert_eq!(state.mean[0], 100.0);
        assert_eq!(state.mean[4], 0.0);
    }

    #[test]
    fn test_update_moves_toward_measurement() {
        let kf = KalmanFilter::new();
        let state = kf.predict(&kf.initiate([100.0, 100.0, 1.0, 50.0]));
        let updated = kf.update(&state, [110.0, 100.0, 1.0, 50.0]).unwrap();
        assert!(updated.mean[0] > 100.0 && updated.mean[0] < 110.0);
        // velocity picks up the motion
        assert!(updated.mean[4] > 0.0);
    }

    #[test]
    fn test_singular_projection_is_an_error() {
        let kf = KalmanFilter::new();
        // zero height zeroes every position-dependent variance
        let mut state = kf.initiate([0.0, 0.0, 0.0, 0.0]);
        state.covariance.fill(0.0);
        let res = kf.update(&state, [0.0, 0.0, 0.0, 0.0]);
        assert!(matches!(res, Err(AssociationError::SingularCovariance)));
    }
}
