//! Vector space markers and typed vectors
//!
//! Typed vectors and covariances that cannot be accidentally mixed across
//! the spaces the filter works in: the 5-dimensional CTRV state, the
//! 7-dimensional noise-augmented state, sensor measurements and innovations.

use ::core::marker::PhantomData;
use ::core::ops::{Add, Sub};
use nalgebra::{RealField, SMatrix, SVector, Scalar};

// ============================================================================
// Vector Space Markers
// ============================================================================

/// Marker type for state space vectors: [px, py, v, yaw, yaw_rate]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSpace;

/// Marker type for the state extended with process noise variables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AugmentedSpace;

/// Marker type for measurement space vectors (sensor observations)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementSpace;

/// Marker type for innovation vectors (measurement - predicted measurement)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnovationSpace;

// ============================================================================
// Typed Vector
// ============================================================================

/// A vector parameterized by scalar type, dimension, and mathematical space.
///
/// # Type Parameters
///
/// - `T`: The scalar type (typically `f32` or `f64`)
/// - `N`: The dimension of the vector (const generic)
/// - `Space`: A marker type indicating which space this vector belongs to
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Vector<T: Scalar, const N: usize, Space> {
    inner: SVector<T, N>,
    _marker: PhantomData<Space>,
}

impl<T: Scalar, const N: usize, Space> Vector<T, N, Space> {
    /// Creates a new vector from raw components.
    #[inline]
    pub fn from_array(data: [T; N]) -> Self {
        Self {
            inner: SVector::from(data),
            _marker: PhantomData,
        }
    }

    /// Creates a new vector from an nalgebra SVector.
    #[inline]
    pub fn from_svector(inner: SVector<T, N>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn as_svector(&self) -> &SVector<T, N> {
        &self.inner
    }

    #[inline]
    pub fn into_svector(self) -> SVector<T, N> {
        self.inner
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.inner.as_slice()
    }

    /// Access element at index.
    ///
    /// # Panics
    /// Panics if index is out of bounds.
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn index(&self, index: usize) -> &T {
        &self.inner[index]
    }
}

impl<T: Scalar + Copy, const N: usize, Space: Clone> Copy for Vector<T, N, Space> {}

impl<T: RealField + Copy, const N: usize, Space> Vector<T, N, Space> {
    #[inline]
    pub fn zeros() -> Self {
        Self::from_svector(SVector::zeros())
    }

    /// Returns true if every component is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.inner.iter().all(|x| x.is_finite())
    }
}

// ============================================================================
// Type Aliases
// ============================================================================

/// A state vector in state space.
pub type StateVector<T, const N: usize> = Vector<T, N, StateSpace>;

/// A state vector extended with process noise components.
pub type AugmentedVector<T, const N: usize> = Vector<T, N, AugmentedSpace>;

/// A measurement vector in measurement space.
pub type Measurement<T, const M: usize> = Vector<T, M, MeasurementSpace>;

/// An innovation vector (measurement residual) in innovation space.
pub type Innovation<T, const M: usize> = Vector<T, M, InnovationSpace>;

impl<T: RealField + Copy, const N: usize, Space> Add for Vector<T, N, Space> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::from_svector(self.inner + rhs.inner)
    }
}

impl<T: RealField + Copy, const N: usize, Space> Sub for Vector<T, N, Space> {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::from_svector(self.inner - rhs.inner)
    }
}

// ============================================================================
// Covariance Matrix
// ============================================================================

/// A covariance matrix bound to a specific vector space.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Covariance<T: Scalar, const N: usize, Space> {
    inner: SMatrix<T, N, N>,
    _marker: PhantomData<Space>,
}

impl<T: Scalar, const N: usize, Space> Covariance<T, N, Space> {
    /// Creates a covariance matrix from a raw matrix.
    ///
    /// The caller should ensure the matrix is symmetric and positive semi-definite.
    #[inline]
    pub fn from_matrix(inner: SMatrix<T, N, N>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn as_matrix(&self) -> &SMatrix<T, N, N> {
        &self.inner
    }

    #[inline]
    pub fn into_matrix(self) -> SMatrix<T, N, N> {
        self.inner
    }
}

impl<T: Scalar + Copy, const N: usize, Space: Clone> Copy for Covariance<T, N, Space> where
    SMatrix<T, N, N>: Copy
{
}

impl<T: RealField + Copy, const N: usize, Space> Covariance<T, N, Space> {
    #[inline]
    pub fn zeros() -> Self {
        Self::from_matrix(SMatrix::zeros())
    }

    #[inline]
    pub fn identity() -> Self {
        Self::from_matrix(SMatrix::identity())
    }

    /// Creates a diagonal covariance matrix.
    #[inline]
    pub fn from_diagonal(diag: &SVector<T, N>) -> Self {
        Self::from_matrix(SMatrix::from_diagonal(diag))
    }

    /// Creates a diagonal covariance from standard deviations (variances are their squares).
    #[inline]
    pub fn from_std_devs(std_devs: [T; N]) -> Self {
        let diag = SVector::<T, N>::from(std_devs).map(|s| s * s);
        Self::from_diagonal(&diag)
    }

    /// Computes the trace of the covariance matrix.
    #[inline]
    pub fn trace(&self) -> T {
        self.inner.trace()
    }

    /// Attempts to compute the inverse of the covariance matrix.
    #[inline]
    pub fn try_inverse(&self) -> Option<SMatrix<T, N, N>> {
        self.inner.try_inverse()
    }

    /// Computes the lower triangular Cholesky factor `L` with `P = L * L^T`.
    ///
    /// Returns `None` if the matrix is not positive definite, including the
    /// semi-definite case where a pivot vanishes.
    pub fn cholesky(&self) -> Option<SMatrix<T, N, N>> {
        let l = nalgebra::Cholesky::new(self.inner)?.l();
        let pivots_positive = (0..N).all(|i| l[(i, i)] > T::zero());
        if pivots_positive && l.iter().all(|x| x.is_finite()) {
            Some(l)
        } else {
            None
        }
    }

    /// Returns `(P + P^T) / 2`.
    #[inline]
    pub fn symmetrized(&self) -> Self {
        let half = T::one() / (T::one() + T::one());
        Self::from_matrix((self.inner + self.inner.transpose()) * half)
    }

    /// Returns true if a Cholesky factorization exists.
    #[inline]
    pub fn is_positive_definite(&self) -> bool {
        self.cholesky().is_some()
    }

    /// Symmetrizes the matrix and repairs rounding-level loss of positive
    /// definiteness.
    ///
    /// A diagonal jitter starting at `floor` grows tenfold while it stays below
    /// the rounding tolerance `max(floor, τ·|trace|)`, with τ = max(1e-9, 100·ε)
    /// for the scalar's machine epsilon ε; the tolerance itself is tried last.
    /// Success therefore means the smallest eigenvalue was above −tolerance.
    ///
    /// Returns the repaired covariance and whether jitter was added, or `None`
    /// if the matrix is indefinite beyond the tolerance or not finite.
    pub fn regularized(&self, floor: T) -> Option<(Self, bool)> {
        const MAX_JITTER_STEPS: usize = 16;
        let symmetric = self.symmetrized();
        if symmetric.is_positive_definite() {
            return Some((symmetric, false));
        }
        if !symmetric.is_finite() {
            return None;
        }

        let ten: T = nalgebra::convert(10.0);
        let relative = T::default_epsilon() * nalgebra::convert::<f64, T>(100.0);
        let relative = relative.max(nalgebra::convert(1e-9));
        let tolerance = floor.max(relative * symmetric.trace().abs());

        let mut jitter = floor;
        for _ in 0..MAX_JITTER_STEPS {
            if jitter >= tolerance {
                break;
            }
            let candidate =
                Self::from_matrix(symmetric.inner + SMatrix::<T, N, N>::identity() * jitter);
            if candidate.is_positive_definite() {
                return Some((candidate, true));
            }
            jitter *= ten;
        }

        let candidate =
            Self::from_matrix(symmetric.inner + SMatrix::<T, N, N>::identity() * tolerance);
        candidate
            .is_positive_definite()
            .then_some((candidate, true))
    }

    /// Returns true if every entry is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.inner.iter().all(|x| x.is_finite())
    }
}

impl<T: RealField + Copy, const N: usize, Space> Add for Covariance<T, N, Space> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::from_matrix(self.inner + rhs.inner)
    }
}

/// Covariance matrix in state space.
pub type StateCovariance<T, const N: usize> = Covariance<T, N, StateSpace>;

/// Covariance matrix of the noise-augmented state.
pub type AugmentedCovariance<T, const N: usize> = Covariance<T, N, AugmentedSpace>;

/// Covariance matrix in measurement space (sensor noise R).
pub type MeasurementCovariance<T, const M: usize> = Covariance<T, M, MeasurementSpace>;

/// Innovation covariance S = Σ wᵢ (Zᵢ - z̄)(Zᵢ - z̄)ᵀ + R.
pub type InnovationCovariance<T, const M: usize> = Covariance<T, M, InnovationSpace>;
