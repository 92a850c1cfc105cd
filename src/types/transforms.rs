//! Typed transformation matrices
//!
//! Matrices that map vectors between spaces, with the source and target
//! spaces encoded in the type. The unscented update only needs one of them:
//! the Kalman gain, mapping innovations back into state space.

use ::core::marker::PhantomData;
use nalgebra::{RealField, SMatrix, Scalar};

use super::spaces::{InnovationCovariance, InnovationSpace, Innovation, StateSpace, StateVector};

// ============================================================================
// Transform Matrix
// ============================================================================

/// A transformation matrix that maps vectors from one space to another.
///
/// # Type Parameters
///
/// - `T`: Scalar type
/// - `ROWS`: Number of rows (dimension of target space)
/// - `COLS`: Number of columns (dimension of source space)
/// - `To`: Target space marker
/// - `From`: Source space marker
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Transform<T: Scalar, const ROWS: usize, const COLS: usize, To, From> {
    inner: SMatrix<T, ROWS, COLS>,
    _marker: PhantomData<(To, From)>,
}

impl<T: Scalar, const ROWS: usize, const COLS: usize, To, From> Transform<T, ROWS, COLS, To, From> {
    #[inline]
    pub fn from_matrix(inner: SMatrix<T, ROWS, COLS>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn as_matrix(&self) -> &SMatrix<T, ROWS, COLS> {
        &self.inner
    }
}

impl<T: Scalar + Copy, const ROWS: usize, const COLS: usize, To: Clone, From: Clone> Copy
    for Transform<T, ROWS, COLS, To, From>
where
    SMatrix<T, ROWS, COLS>: Copy,
{
}

/// Kalman gain: InnovationSpace -> StateSpace
pub type KalmanGain<T, const N: usize, const M: usize> =
    Transform<T, N, M, StateSpace, InnovationSpace>;

impl<T: RealField + Copy, const N: usize, const M: usize> KalmanGain<T, N, M> {
    /// Computes the unscented Kalman gain `K = T * S^{-1}` from the
    /// state/measurement cross-covariance and the inverted innovation covariance.
    #[inline]
    pub fn from_cross_covariance(cross_cov: &SMatrix<T, N, M>, s_inv: &SMatrix<T, M, M>) -> Self {
        Self::from_matrix(cross_cov * s_inv)
    }

    /// Applies the Kalman gain to an innovation vector.
    #[inline]
    pub fn correct(&self, innovation: &Innovation<T, M>) -> StateVector<T, N> {
        StateVector::from_svector(self.inner * innovation.as_svector())
    }

    /// Covariance reduction `K * S * K^T` produced by this gain.
    #[inline]
    pub fn covariance_reduction(&self, s: &InnovationCovariance<T, M>) -> SMatrix<T, N, N> {
        self.inner * s.as_matrix() * self.inner.transpose()
    }
}
