//! Augmented Unscented Kalman Filter (UKF)
//!
//! The UKF uses the unscented transform to propagate mean and covariance through
//! nonlinear functions without requiring Jacobian computation. Process noise is
//! not added after the fact: it is appended to the state (the augmented state)
//! and pushed through the motion model together with it.
//!
//! # Algorithm
//!
//! Prediction:
//! 1. Augment the belief with the process noise variables
//! 2. Generate 2·n_aug + 1 sigma points from the augmented belief
//! 3. Propagate every point through the process model
//! 4. Recover the predicted mean and covariance
//!
//! Update (for any [`ObservationModel`]):
//! 1. Map the predicted sigma points into measurement space
//! 2. Recover the predicted measurement, its covariance S and the
//!    state/measurement cross-covariance T
//! 3. K = T·S⁻¹, x += K·(z − ẑ), P −= K·S·Kᵀ
//!
//! # Sigma Point Selection
//!
//! - χ₀ = μ
//! - χᵢ = μ + √(λ + n)·Lᵢ for i = 1...n
//! - χᵢ₊ₙ = μ − √(λ + n)·Lᵢ for i = 1...n
//!
//! where `L` is the lower Cholesky factor of the covariance, with weights
//! w₀ = λ/(λ + n) and wᵢ = 1/(2(λ + n)).
//!
//! # Storage
//!
//! Sigma point sets are `D × S` stack matrices; no step of the filter allocates.

use nalgebra::{RealField, SMatrix, SVector};

use crate::models::{ObservationModel, ProcessModel};
use crate::types::gaussian::{normalized_innovation_squared, Belief};
use crate::types::spaces::{
    AugmentedVector, Covariance, Innovation, InnovationCovariance, Measurement, StateCovariance,
    StateVector, Vector,
};
use crate::types::transforms::KalmanGain;
use crate::{FusionError, Result};

// ============================================================================
// Spread Parameter
// ============================================================================

/// Choice of the sigma point spread parameter λ.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpreadParameter<T> {
    /// λ = 3 − n_aug, the usual choice for an augmented state
    Augmented,
    /// λ = 3 − n_x, computed from the unaugmented state dimension while the
    /// points and weights still use n_aug
    StateDimension,
    /// Explicit λ
    Fixed(T),
}

impl<T> Default for SpreadParameter<T> {
    fn default() -> Self {
        SpreadParameter::Augmented
    }
}

impl<T: RealField + Copy> SpreadParameter<T> {
    /// Computes λ for a state of dimension `n_state` augmented to `n_aug`.
    pub fn lambda(&self, n_state: usize, n_aug: usize) -> T {
        let three: T = nalgebra::convert(3.0);
        match self {
            SpreadParameter::Augmented => three - nalgebra::convert::<f64, T>(n_aug as f64),
            SpreadParameter::StateDimension => three - nalgebra::convert::<f64, T>(n_state as f64),
            SpreadParameter::Fixed(lambda) => *lambda,
        }
    }
}

// ============================================================================
// Weights
// ============================================================================

/// Weights of a symmetric set of `S = 2n + 1` sigma points.
///
/// The same weights are used for the mean and the covariance. w₀ is negative
/// whenever λ < 0; the weights still sum to one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmaWeights<T: RealField, const S: usize> {
    weights: SVector<T, S>,
    lambda: T,
}

impl<T: RealField + Copy, const S: usize> SigmaWeights<T, S> {
    const ODD_COUNT: () = assert!(S % 2 == 1, "a symmetric sigma point set has an odd size");

    /// Dimension `n` of the distribution the points sample.
    pub const DIMENSION: usize = (S - 1) / 2;

    /// Builds the weights for spread λ.
    ///
    /// # Errors
    /// [`FusionError::InvalidSpread`] unless λ + n is positive and finite.
    pub fn new(lambda: T) -> Result<Self> {
        #[allow(clippy::let_unit_value)]
        let () = Self::ODD_COUNT;

        let n: T = nalgebra::convert(Self::DIMENSION as f64);
        let spread = lambda + n;
        if !spread.is_finite() || spread <= T::zero() {
            return Err(FusionError::InvalidSpread);
        }

        let two = T::one() + T::one();
        let mut weights = SVector::<T, S>::repeat(T::one() / (two * spread));
        weights[0] = lambda / spread;

        Ok(Self { weights, lambda })
    }

    #[inline]
    pub fn lambda(&self) -> T {
        self.lambda
    }

    /// Scaling of the covariance square root, √(λ + n).
    #[inline]
    pub fn gamma(&self) -> T {
        let n: T = nalgebra::convert(Self::DIMENSION as f64);
        (self.lambda + n).sqrt()
    }

    #[inline]
    pub fn get(&self, index: usize) -> T {
        self.weights[index]
    }

    #[inline]
    pub fn as_svector(&self) -> &SVector<T, S> {
        &self.weights
    }

    #[inline]
    pub fn sum(&self) -> T {
        self.weights.sum()
    }
}

// ============================================================================
// Sigma Points
// ============================================================================

/// An ordered set of `S` sigma points of dimension `D`, one per column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmaPoints<T: RealField, const D: usize, const S: usize> {
    points: SMatrix<T, D, S>,
}

impl<T: RealField + Copy, const D: usize, const S: usize> SigmaPoints<T, D, S> {
    const SYMMETRIC_SET: () = assert!(S == 2 * D + 1, "sigma point count must be 2·D + 1");

    /// Generates the symmetric sigma point set of a Gaussian.
    ///
    /// Column 0 is the mean, columns 1..=D add the scaled Cholesky columns and
    /// columns D+1..=2D subtract them.
    ///
    /// # Errors
    /// [`FusionError::NotPositiveDefinite`] if the Cholesky decomposition fails.
    pub fn generate<Space>(
        mean: &Vector<T, D, Space>,
        covariance: &Covariance<T, D, Space>,
        weights: &SigmaWeights<T, S>,
    ) -> Result<Self> {
        #[allow(clippy::let_unit_value)]
        let () = Self::SYMMETRIC_SET;

        let sqrt_p = covariance
            .cholesky()
            .ok_or(FusionError::NotPositiveDefinite)?;
        let scaled_sqrt_p = sqrt_p.scale(weights.gamma());

        let mu = mean.as_svector();
        let mut points = SMatrix::<T, D, S>::zeros();
        points.set_column(0, mu);
        for i in 0..D {
            let offset = scaled_sqrt_p.column(i);
            points.set_column(i + 1, &(mu + offset));
            points.set_column(i + 1 + D, &(mu - offset));
        }

        Ok(Self { points })
    }

    /// Wraps an existing point matrix.
    #[inline]
    pub fn from_matrix(points: SMatrix<T, D, S>) -> Self {
        Self { points }
    }

    #[inline]
    pub fn as_matrix(&self) -> &SMatrix<T, D, S> {
        &self.points
    }

    #[inline]
    pub fn point(&self, index: usize) -> SVector<T, D> {
        self.points.column(index).into_owned()
    }

    /// Applies `f` to every point.
    pub fn map<const E: usize, F>(&self, mut f: F) -> SigmaPoints<T, E, S>
    where
        F: FnMut(&SVector<T, D>) -> SVector<T, E>,
    {
        let mut points = SMatrix::<T, E, S>::zeros();
        for i in 0..S {
            points.set_column(i, &f(&self.point(i)));
        }
        SigmaPoints { points }
    }

    /// Weighted mean Σ wᵢ·χᵢ.
    #[inline]
    pub fn mean(&self, weights: &SigmaWeights<T, S>) -> SVector<T, D> {
        self.points * weights.as_svector()
    }

    /// Weighted covariance Σ wᵢ·r(χᵢ − μ)·r(χᵢ − μ)ᵀ, where `normalize` is
    /// applied to every residual before it is used.
    pub fn covariance<F>(
        &self,
        weights: &SigmaWeights<T, S>,
        mean: &SVector<T, D>,
        normalize: F,
    ) -> SMatrix<T, D, D>
    where
        F: Fn(SVector<T, D>) -> SVector<T, D>,
    {
        let mut cov = SMatrix::<T, D, D>::zeros();
        for (i, point) in self.points.column_iter().enumerate() {
            let diff = normalize(point - mean);
            cov += (diff * diff.transpose()).scale(weights.get(i));
        }
        cov
    }

    /// Weighted cross-covariance Σ wᵢ·r(χᵢ − μ)·q(ζᵢ − ν)ᵀ with a second point
    /// set `other` produced from this one.
    pub fn cross_covariance<const E: usize, F, G>(
        &self,
        other: &SigmaPoints<T, E, S>,
        weights: &SigmaWeights<T, S>,
        mean: &SVector<T, D>,
        other_mean: &SVector<T, E>,
        normalize: F,
        normalize_other: G,
    ) -> SMatrix<T, D, E>
    where
        F: Fn(SVector<T, D>) -> SVector<T, D>,
        G: Fn(SVector<T, E>) -> SVector<T, E>,
    {
        let mut cross_cov = SMatrix::<T, D, E>::zeros();
        for i in 0..S {
            let diff = normalize(self.points.column(i) - mean);
            let other_diff = normalize_other(other.points.column(i) - other_mean);
            cross_cov += (diff * other_diff.transpose()).scale(weights.get(i));
        }
        cross_cov
    }
}

// ============================================================================
// Step Results
// ============================================================================

/// Output of the prediction step: the predicted belief together with the
/// propagated sigma points the update step reuses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction<T: RealField, const N: usize, const S: usize> {
    pub belief: Belief<T, N>,
    pub sigma_points: SigmaPoints<T, N, S>,
}

/// Predicted measurement statistics for one sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementPrediction<T: RealField, const N: usize, const M: usize, const S: usize> {
    /// Predicted state sigma points mapped into measurement space
    pub sigma_points: SigmaPoints<T, M, S>,
    /// Predicted measurement ẑ
    pub mean: Measurement<T, M>,
    /// Innovation covariance S, including the sensor noise
    pub covariance: InnovationCovariance<T, M>,
    /// State/measurement cross-covariance T
    pub cross_covariance: SMatrix<T, N, M>,
}

/// Output of the update step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction<T: RealField, const N: usize, const M: usize> {
    /// Posterior belief
    pub belief: Belief<T, N>,
    /// Normalized residual z − ẑ
    pub innovation: Innovation<T, M>,
    pub innovation_covariance: InnovationCovariance<T, M>,
    pub kalman_gain: KalmanGain<T, N, M>,
    /// Normalized innovation squared yᵀ·S⁻¹·y
    pub nis: T,
}

// ============================================================================
// Unscented Kalman Filter
// ============================================================================

/// An augmented Unscented Kalman Filter.
///
/// # Type Parameters
///
/// - `T`: Scalar type
/// - `P`: Process model (must implement [`ProcessModel`])
/// - `N`: State dimension
/// - `A`: Augmented state dimension
/// - `S`: Number of sigma points, 2·A + 1
#[derive(Debug, Clone)]
pub struct UnscentedKalmanFilter<T: RealField, P, const N: usize, const A: usize, const S: usize> {
    /// Nonlinear process (motion) model
    pub transition: P,
    weights: SigmaWeights<T, S>,
    covariance_floor: T,
}

impl<T, P, const N: usize, const A: usize, const S: usize> UnscentedKalmanFilter<T, P, N, A, S>
where
    T: RealField + Copy,
    P: ProcessModel<T, N, A>,
{
    /// Creates a new filter.
    ///
    /// `covariance_floor` is the smallest diagonal jitter used when a
    /// covariance has to be pushed back to positive definiteness.
    ///
    /// # Errors
    /// [`FusionError::InvalidSpread`] if λ + n_aug is not positive.
    pub fn new(transition: P, spread: SpreadParameter<T>, covariance_floor: T) -> Result<Self> {
        let weights = SigmaWeights::new(spread.lambda(N, A))?;
        Ok(Self {
            transition,
            weights,
            covariance_floor,
        })
    }

    #[inline]
    pub fn weights(&self) -> &SigmaWeights<T, S> {
        &self.weights
    }

    /// Generates the sigma points of the noise-augmented belief.
    pub fn augmented_sigma_points(&self, belief: &Belief<T, N>) -> Result<SigmaPoints<T, A, S>> {
        let (mean, covariance) = self.transition.augment(belief);
        SigmaPoints::generate(&mean, &covariance, &self.weights)
    }

    /// Performs the prediction step over `dt` seconds.
    ///
    /// # Errors
    /// - [`FusionError::NotPositiveDefinite`] if the augmented covariance has no Cholesky factor
    /// - [`FusionError::NumericalInstability`] if the prediction is not finite
    /// - [`FusionError::NotPositiveDefinite`] if the predicted covariance is
    ///   indefinite beyond rounding
    pub fn predict(&self, belief: &Belief<T, N>, dt: T) -> Result<Prediction<T, N, S>> {
        let augmented = self.augmented_sigma_points(belief)?;

        let sigma_points = augmented.map(|point| {
            self.transition
                .propagate(&AugmentedVector::from_svector(*point), dt)
                .into_svector()
        });

        let mean = self.transition.normalize_state(sigma_points.mean(&self.weights));
        let cov = sigma_points.covariance(&self.weights, &mean, |r| {
            self.transition.normalize_residual(r)
        });

        let belief = self.finish(mean, cov)?;
        tracing::trace!(trace = ?belief.uncertainty(), "unscented prediction");

        Ok(Prediction {
            belief,
            sigma_points,
        })
    }

    /// Maps the predicted sigma points through `model` and recovers the
    /// predicted measurement, innovation covariance and cross-covariance.
    pub fn predict_measurement<O, const M: usize>(
        &self,
        prediction: &Prediction<T, N, S>,
        model: &O,
    ) -> MeasurementPrediction<T, N, M, S>
    where
        O: ObservationModel<T, N, M>,
    {
        let sigma_points = prediction
            .sigma_points
            .map(|x| model.observe(&StateVector::from_svector(*x)).into_svector());

        let mean = sigma_points.mean(&self.weights);
        let covariance = sigma_points.covariance(&self.weights, &mean, |r| model.normalize_residual(r))
            + model.measurement_noise().as_matrix();

        let cross_covariance = prediction.sigma_points.cross_covariance(
            &sigma_points,
            &self.weights,
            prediction.belief.mean.as_svector(),
            &mean,
            |r| self.transition.normalize_residual(r),
            |r| model.normalize_residual(r),
        );

        MeasurementPrediction {
            sigma_points,
            mean: Measurement::from_svector(mean),
            covariance: InnovationCovariance::from_matrix(covariance),
            cross_covariance,
        }
    }

    /// Performs the update step with a measurement from `model`'s sensor.
    ///
    /// # Errors
    /// - [`FusionError::SingularMatrix`] if the innovation covariance cannot be inverted
    /// - [`FusionError::NumericalInstability`] if the posterior is not finite
    /// - [`FusionError::NotPositiveDefinite`] if the posterior covariance is
    ///   indefinite beyond rounding
    pub fn update<O, const M: usize>(
        &self,
        prediction: &Prediction<T, N, S>,
        model: &O,
        measurement: &Measurement<T, M>,
    ) -> Result<Correction<T, N, M>>
    where
        O: ObservationModel<T, N, M>,
    {
        let predicted = self.predict_measurement(prediction, model);

        let s_inv = predicted
            .covariance
            .try_inverse()
            .filter(|inv| inv.iter().all(|x| x.is_finite()))
            .ok_or(FusionError::SingularMatrix)?;

        let kalman_gain = KalmanGain::from_cross_covariance(&predicted.cross_covariance, &s_inv);

        let innovation = Innovation::from_svector(
            model.normalize_residual(measurement.as_svector() - predicted.mean.as_svector()),
        );
        let nis = normalized_innovation_squared(&innovation, &s_inv);

        let mean = self.transition.normalize_state(
            prediction.belief.mean.as_svector() + kalman_gain.correct(&innovation).as_svector(),
        );
        let cov = prediction.belief.covariance.as_matrix()
            - kalman_gain.covariance_reduction(&predicted.covariance);

        let belief = self.finish(mean, cov)?;
        if !nis.is_finite() {
            return Err(FusionError::NumericalInstability);
        }
        tracing::trace!(sensor = %model.sensor(), nis = ?nis, "unscented update");

        Ok(Correction {
            belief,
            innovation,
            innovation_covariance: predicted.covariance,
            kalman_gain,
            nis,
        })
    }

    /// Validates a freshly computed mean and covariance and restores the
    /// covariance to a symmetric positive definite matrix.
    fn finish(&self, mean: SVector<T, N>, cov: SMatrix<T, N, N>) -> Result<Belief<T, N>> {
        let mean = StateVector::from_svector(mean);
        let cov = StateCovariance::from_matrix(cov);
        if !mean.is_finite() || !cov.is_finite() {
            return Err(FusionError::NumericalInstability);
        }

        let (cov, jittered) = cov
            .regularized(self.covariance_floor)
            .ok_or(FusionError::NotPositiveDefinite)?;
        if jittered {
            tracing::warn!("covariance lost positive definiteness to rounding, added diagonal jitter");
        }

        Ok(Belief::new(mean, cov))
    }
}
