//! Gaussian beliefs over the CTRV state
//!
//! The filter's belief is a single Gaussian: a mean over
//! `[px, py, v, yaw, yaw_rate]` and its covariance.

use nalgebra::{RealField, SMatrix};

use super::spaces::{Innovation, StateCovariance, StateVector};

/// Index of the x position in the CTRV state.
pub const PX: usize = 0;
/// Index of the y position in the CTRV state.
pub const PY: usize = 1;
/// Index of the speed magnitude in the CTRV state.
pub const SPEED: usize = 2;
/// Index of the heading angle in the CTRV state.
pub const YAW: usize = 3;
/// Index of the yaw rate in the CTRV state.
pub const YAW_RATE: usize = 4;

/// Dimension of the CTRV state.
pub const STATE_DIM: usize = 5;

/// Mean and covariance of a state estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct Belief<T: RealField, const N: usize> {
    /// State estimate mean
    pub mean: StateVector<T, N>,
    /// State estimate covariance
    pub covariance: StateCovariance<T, N>,
}

impl<T: RealField + Copy, const N: usize> Copy for Belief<T, N> {}

impl<T: RealField + Copy, const N: usize> Belief<T, N> {
    #[inline]
    pub fn new(mean: StateVector<T, N>, covariance: StateCovariance<T, N>) -> Self {
        Self { mean, covariance }
    }

    /// Returns the trace of the covariance matrix (sum of variances).
    #[inline]
    pub fn uncertainty(&self) -> T {
        self.covariance.trace()
    }

    /// Returns true if neither mean nor covariance contain NaN or infinity.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.mean.is_finite() && self.covariance.is_finite()
    }
}

impl<T: RealField + Copy> Belief<T, STATE_DIM> {
    /// Planar position `(px, py)`.
    #[inline]
    pub fn position(&self) -> (T, T) {
        (*self.mean.index(PX), *self.mean.index(PY))
    }

    #[inline]
    pub fn speed(&self) -> T {
        *self.mean.index(SPEED)
    }

    /// Heading in radians, within (-π, π].
    #[inline]
    pub fn yaw(&self) -> T {
        *self.mean.index(YAW)
    }

    #[inline]
    pub fn yaw_rate(&self) -> T {
        *self.mean.index(YAW_RATE)
    }

    /// Cartesian velocity `(v·cos(yaw), v·sin(yaw))`.
    #[inline]
    pub fn velocity(&self) -> (T, T) {
        let v = self.speed();
        let yaw = self.yaw();
        (v * yaw.cos(), v * yaw.sin())
    }
}

/// Normalized innovation squared `yᵀ S⁻¹ y`.
///
/// `s_inv` must be the inverse of the innovation covariance that produced `y`.
#[inline]
pub fn normalized_innovation_squared<T: RealField + Copy, const M: usize>(
    innovation: &Innovation<T, M>,
    s_inv: &SMatrix<T, M, M>,
) -> T {
    let y = innovation.as_svector();
    (y.transpose() * s_inv * y)[(0, 0)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_components() {
        let belief = Belief::new(
            StateVector::from_array([1.0_f64, 2.0, 3.0, 0.0, 0.1]),
            StateCovariance::identity(),
        );
        assert_eq!(belief.position(), (1.0, 2.0));
        assert_eq!(belief.speed(), 3.0);
        assert_eq!(belief.yaw_rate(), 0.1);
        assert!((belief.uncertainty() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_velocity_follows_heading() {
        let belief = Belief::new(
            StateVector::from_array([0.0_f64, 0.0, 2.0, core::f64::consts::FRAC_PI_2, 0.0]),
            StateCovariance::identity(),
        );
        let (vx, vy) = belief.velocity();
        assert!(vx.abs() < 1e-12);
        assert!((vy - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_nis_of_unit_covariance_is_squared_norm() {
        let y = Innovation::from_array([3.0_f64, 4.0]);
        let s_inv = nalgebra::Matrix2::identity();
        assert!((normalized_innovation_squared(&y, &s_inv) - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_nis_scales_with_covariance() {
        let y = Innovation::from_array([2.0_f64, 0.0, 0.0]);
        let s_inv = nalgebra::Matrix3::from_diagonal(&nalgebra::vector![0.25, 1.0, 1.0]);
        assert!((normalized_innovation_squared(&y, &s_inv) - 1.0).abs() < 1e-12);
    }
}
