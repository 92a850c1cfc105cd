//! Transition (motion) models for target dynamics
//!
//! Describes how the tracked object evolves over time when process noise is
//! carried explicitly as extra state components (the augmented state).

use nalgebra::{RealField, SVector};

use crate::types::angle::normalize_angle;
use crate::types::gaussian::{Belief, STATE_DIM, YAW};
use crate::types::spaces::{AugmentedCovariance, AugmentedVector, StateVector};
use crate::{FusionError, Result};

/// Dimension of the CTRV state augmented with its two noise variables.
pub const AUGMENTED_DIM: usize = 7;

/// Number of sigma points for the augmented CTRV state (2·n_aug + 1).
pub const SIGMA_COUNT: usize = 2 * AUGMENTED_DIM + 1;

/// Trait for nonlinear process models with augmented process noise.
///
/// The state of dimension `N` is extended to dimension `A` with zero-mean
/// noise variables; the model propagates augmented points and returns plain
/// states:
/// x_{k+1} = f(x_k, ν_k, Δt)
pub trait ProcessModel<T: RealField, const N: usize, const A: usize> {
    /// Builds the augmented mean (state followed by zeros) and the augmented
    /// covariance (state covariance and noise variances on the block diagonal).
    fn augment(&self, belief: &Belief<T, N>) -> (AugmentedVector<T, A>, AugmentedCovariance<T, A>);

    /// Propagates one augmented point over `dt` seconds.
    fn propagate(&self, point: &AugmentedVector<T, A>, dt: T) -> StateVector<T, N>;

    /// Normalizes a difference of two states (e.g. wraps angle components).
    fn normalize_residual(&self, residual: SVector<T, N>) -> SVector<T, N> {
        residual
    }

    /// Normalizes a state estimate (e.g. wraps angle components).
    fn normalize_state(&self, state: SVector<T, N>) -> SVector<T, N> {
        state
    }
}

// ============================================================================
// Constant Turn Rate and Velocity
// ============================================================================

/// Constant turn rate and velocity (CTRV) model in 2D.
///
/// State: [px, py, v, yaw, yaw_rate], augmented with
/// [ν_a, ν_yawdd] (longitudinal and yaw acceleration noise).
///
/// Between updates the object keeps its speed and its yaw rate:
/// - px' = px + (v/ψ̇)[sin(ψ + ψ̇Δt) - sin(ψ)] + ½Δt²cos(ψ)ν_a
/// - py' = py + (v/ψ̇)[cos(ψ) - cos(ψ + ψ̇Δt)] + ½Δt²sin(ψ)ν_a
/// - v' = v + Δt·ν_a
/// - ψ' = ψ + ψ̇Δt + ½Δt²ν_yawdd
/// - ψ̇' = ψ̇ + Δt·ν_yawdd
///
/// For |ψ̇| ≤ [`CtrvModel::STRAIGHT_LINE_YAW_RATE`] the position terms fall
/// back to straight-line motion.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CtrvModel<T: RealField> {
    /// Longitudinal acceleration noise standard deviation (m/s²)
    pub std_a: T,
    /// Yaw acceleration noise standard deviation (rad/s²)
    pub std_yawdd: T,
}

impl<T: RealField + Copy> CtrvModel<T> {
    /// Yaw rates at or below this magnitude (rad/s) use the straight-line branch.
    pub const STRAIGHT_LINE_YAW_RATE: f64 = 0.001;

    /// Creates a new CTRV model.
    ///
    /// # Errors
    /// [`FusionError::InvalidNoise`] if a standard deviation is not positive and finite.
    pub fn new(std_a: T, std_yawdd: T) -> Result<Self> {
        let model = Self { std_a, std_yawdd };
        model.validate()?;
        Ok(model)
    }

    /// Checks that both noise standard deviations are positive and finite.
    pub fn validate(&self) -> Result<()> {
        check_std_dev(self.std_a, "std_a")?;
        check_std_dev(self.std_yawdd, "std_yawdd")
    }
}

impl<T: RealField + Copy> Default for CtrvModel<T> {
    fn default() -> Self {
        Self {
            std_a: nalgebra::convert(1.41),
            std_yawdd: nalgebra::convert(0.5),
        }
    }
}

impl<T: RealField + Copy> ProcessModel<T, STATE_DIM, AUGMENTED_DIM> for CtrvModel<T> {
    fn augment(
        &self,
        belief: &Belief<T, STATE_DIM>,
    ) -> (AugmentedVector<T, AUGMENTED_DIM>, AugmentedCovariance<T, AUGMENTED_DIM>) {
        let mut mean = SVector::<T, AUGMENTED_DIM>::zeros();
        mean.fixed_rows_mut::<STATE_DIM>(0)
            .copy_from(belief.mean.as_svector());

        let mut cov = nalgebra::SMatrix::<T, AUGMENTED_DIM, AUGMENTED_DIM>::zeros();
        cov.fixed_view_mut::<STATE_DIM, STATE_DIM>(0, 0)
            .copy_from(belief.covariance.as_matrix());
        cov[(STATE_DIM, STATE_DIM)] = self.std_a * self.std_a;
        cov[(STATE_DIM + 1, STATE_DIM + 1)] = self.std_yawdd * self.std_yawdd;

        (
            AugmentedVector::from_svector(mean),
            AugmentedCovariance::from_matrix(cov),
        )
    }

    fn propagate(
        &self,
        point: &AugmentedVector<T, AUGMENTED_DIM>,
        dt: T,
    ) -> StateVector<T, STATE_DIM> {
        let p = point.as_svector();
        let (px, py, v, yaw, yaw_rate) = (p[0], p[1], p[2], p[3], p[4]);
        let (nu_a, nu_yawdd) = (p[5], p[6]);

        let half_dt_sq = dt * dt / (T::one() + T::one());
        let (sin_yaw, cos_yaw) = yaw.sin_cos();
        let threshold: T = nalgebra::convert(Self::STRAIGHT_LINE_YAW_RATE);

        let (mut px_new, mut py_new) = if yaw_rate.abs() > threshold {
            let yaw_end = yaw + yaw_rate * dt;
            let radius = v / yaw_rate;
            (
                px + radius * (yaw_end.sin() - sin_yaw),
                py + radius * (cos_yaw - yaw_end.cos()),
            )
        } else {
            (px + v * cos_yaw * dt, py + v * sin_yaw * dt)
        };

        px_new += half_dt_sq * cos_yaw * nu_a;
        py_new += half_dt_sq * sin_yaw * nu_a;

        StateVector::from_array([
            px_new,
            py_new,
            v + dt * nu_a,
            yaw + yaw_rate * dt + half_dt_sq * nu_yawdd,
            yaw_rate + dt * nu_yawdd,
        ])
    }

    fn normalize_residual(&self, mut residual: SVector<T, STATE_DIM>) -> SVector<T, STATE_DIM> {
        residual[YAW] = normalize_angle(residual[YAW]);
        residual
    }

    fn normalize_state(&self, mut state: SVector<T, STATE_DIM>) -> SVector<T, STATE_DIM> {
        state[YAW] = normalize_angle(state[YAW]);
        state
    }
}

/// Noise standard deviations must be strictly positive and finite.
pub(crate) fn check_std_dev<T: RealField + Copy>(value: T, parameter: &'static str) -> Result<()> {
    if value.is_finite() && value > T::zero() {
        Ok(())
    } else {
        Err(FusionError::InvalidNoise { parameter })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::spaces::StateCovariance;

    fn point(state: [f64; 5], nu_a: f64, nu_yawdd: f64) -> AugmentedVector<f64, AUGMENTED_DIM> {
        AugmentedVector::from_array([
            state[0], state[1], state[2], state[3], state[4], nu_a, nu_yawdd,
        ])
    }

    #[test]
    fn test_straight_line_closed_form() {
        let model = CtrvModel::<f64>::default();
        let (px, py, v, yaw) = (1.0, -2.0, 4.0, 0.7);
        let dt = 0.5;

        let next = model.propagate(&point([px, py, v, yaw, 0.0], 0.0, 0.0), dt);

        assert!((next.index(0) - (px + v * yaw.cos() * dt)).abs() < 1e-12);
        assert!((next.index(1) - (py + v * yaw.sin() * dt)).abs() < 1e-12);
        assert!((next.index(2) - v).abs() < 1e-12);
        assert!((next.index(3) - yaw).abs() < 1e-12);
        assert!(next.index(4).abs() < 1e-12);
    }

    #[test]
    fn test_turning_branch_approaches_straight_line() {
        let model = CtrvModel::<f64>::default();
        let (px, py, v, yaw) = (1.0, -2.0, 4.0, 0.7);
        let dt = 0.5;

        // Just above the branch threshold
        let turning = model.propagate(&point([px, py, v, yaw, 0.0011], 0.0, 0.0), dt);
        let straight = model.propagate(&point([px, py, v, yaw, 0.0], 0.0, 0.0), dt);

        assert!((turning.index(0) - straight.index(0)).abs() < 1e-3);
        assert!((turning.index(1) - straight.index(1)).abs() < 1e-3);
    }

    #[test]
    fn test_quarter_turn() {
        use core::f64::consts::FRAC_PI_2;

        let model = CtrvModel::<f64>::default();
        // East at 10 m/s, turning left at π/2 rad/s for 1 s
        let next = model.propagate(&point([0.0, 0.0, 10.0, 0.0, FRAC_PI_2], 0.0, 0.0), 1.0);

        let r = 10.0 / FRAC_PI_2;
        assert!((next.index(0) - r).abs() < 1e-9, "x: {}", next.index(0));
        assert!((next.index(1) - r).abs() < 1e-9, "y: {}", next.index(1));
        assert!((next.index(3) - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_noise_terms() {
        let model = CtrvModel::<f64>::default();
        let dt = 2.0;
        let next = model.propagate(&point([0.0, 0.0, 1.0, 0.0, 0.0], 0.5, 0.1), dt);

        // ½Δt²·ν_a along the heading
        assert!((next.index(0) - (1.0 * dt + 0.5 * dt * dt * 0.5)).abs() < 1e-12);
        assert!(next.index(1).abs() < 1e-12);
        assert!((next.index(2) - (1.0 + dt * 0.5)).abs() < 1e-12);
        assert!((next.index(3) - 0.5 * dt * dt * 0.1).abs() < 1e-12);
        assert!((next.index(4) - dt * 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_augment_layout() {
        let model = CtrvModel::new(2.0_f64, 0.5).unwrap();
        let belief = Belief::new(
            StateVector::from_array([1.0, 2.0, 3.0, 0.4, 0.05]),
            StateCovariance::identity(),
        );

        let (mean, cov) = model.augment(&belief);

        assert!((mean.index(2) - 3.0).abs() < 1e-12);
        assert_eq!(*mean.index(5), 0.0);
        assert_eq!(*mean.index(6), 0.0);
        assert!((cov.as_matrix()[(4, 4)] - 1.0).abs() < 1e-12);
        assert!((cov.as_matrix()[(5, 5)] - 4.0).abs() < 1e-12);
        assert!((cov.as_matrix()[(6, 6)] - 0.25).abs() < 1e-12);
        assert_eq!(cov.as_matrix()[(0, 5)], 0.0);
        assert_eq!(cov.as_matrix()[(6, 4)], 0.0);
    }

    #[test]
    fn test_invalid_noise_rejected() {
        assert_eq!(
            CtrvModel::new(0.0_f64, 0.5),
            Err(FusionError::InvalidNoise { parameter: "std_a" })
        );
        assert_eq!(
            CtrvModel::new(1.0_f64, -0.5),
            Err(FusionError::InvalidNoise {
                parameter: "std_yawdd"
            })
        );
        assert!(CtrvModel::new(f64::NAN, 0.5).is_err());
    }

    #[test]
    fn test_heading_residual_wrapped() {
        let model = CtrvModel::<f64>::default();
        let residual = nalgebra::vector![0.0, 0.0, 0.0, 6.2, 0.0];
        let wrapped = model.normalize_residual(residual);
        assert!((wrapped[3] - (6.2 - 2.0 * core::f64::consts::PI)).abs() < 1e-12);
    }
}
