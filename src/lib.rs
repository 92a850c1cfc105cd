//! CTRV-Fusion: unscented sensor fusion for a single maneuvering object
//!
//! Estimates position, speed, heading and yaw rate of one object by fusing
//! two asynchronous sensor streams with an augmented Unscented Kalman Filter
//! over a constant-turn-rate-and-velocity (CTRV) motion model.
//!
//! # Features
//!
//! - **Type Safety**: state, augmented, measurement and innovation vectors live
//!   in distinct typed spaces
//! - **Stack Only**: sigma points and all intermediate matrices are fixed-size
//! - **no_std Support**: the filter core works in embedded environments
//!
//! # Example
//!
//! ```
//! use ctrv_fusion::prelude::*;
//!
//! let mut filter = FusionFilter::new(FusionConfig::<f64>::default()).unwrap();
//!
//! filter
//!     .process_measurement(&MeasurementRecord::new(SensorKind::Position, &[10.0, 5.0], 0))
//!     .unwrap();
//! filter
//!     .process_measurement(&MeasurementRecord::new(
//!         SensorKind::RangeBearing,
//!         &[11.2, 0.46, 0.4],
//!         50_000,
//!     ))
//!     .unwrap();
//!
//! let mean = filter.mean().unwrap();
//! assert!(mean.index(0).is_finite());
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

pub mod types;
pub mod models;
pub mod filters;
pub mod utils;

pub mod prelude {
    pub use crate::types::angle::*;
    pub use crate::types::gaussian::*;
    pub use crate::types::measurement::*;
    pub use crate::types::phase::*;
    pub use crate::types::spaces::*;
    pub use crate::models::*;
    pub use crate::filters::fusion::*;
    pub use crate::filters::ukf::*;
    pub use crate::utils::*;
    pub use crate::{FusionError, Result};
}

use types::measurement::SensorKind;

/// Error types for the library
#[derive(Debug, Clone, PartialEq)]
pub enum FusionError {
    /// A noise standard deviation was zero, negative or not finite
    InvalidNoise {
        /// Name of the offending parameter
        parameter: &'static str,
    },
    /// The sigma point spread λ + n_aug is not strictly positive
    InvalidSpread,
    /// Payload length does not match the declared sensor type
    PayloadLength {
        sensor: SensorKind,
        expected: usize,
        found: usize,
    },
    /// Record timestamp precedes the filter's reference time
    OutOfOrder { reference_us: u64, timestamp_us: u64 },
    /// Covariance lost positive definiteness (Cholesky decomposition failed)
    NotPositiveDefinite,
    /// Matrix is singular and cannot be inverted
    SingularMatrix,
    /// Numerical computation produced non-finite values
    NumericalInstability,
}

#[cfg(feature = "std")]
impl std::error::Error for FusionError {}

impl ::core::fmt::Display for FusionError {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        match self {
            FusionError::InvalidNoise { parameter } => {
                write!(f, "Noise parameter `{}` must be positive and finite", parameter)
            }
            FusionError::InvalidSpread => write!(f, "Sigma point spread must be positive"),
            FusionError::PayloadLength {
                sensor,
                expected,
                found,
            } => write!(
                f,
                "{} payload must have {} values, got {}",
                sensor, expected, found
            ),
            FusionError::OutOfOrder {
                reference_us,
                timestamp_us,
            } => write!(
                f,
                "Record at {}us precedes reference time {}us",
                timestamp_us, reference_us
            ),
            FusionError::NotPositiveDefinite => write!(f, "Covariance is not positive definite"),
            FusionError::SingularMatrix => write!(f, "Matrix is singular"),
            FusionError::NumericalInstability => write!(f, "Numerical instability detected"),
        }
    }
}

pub type Result<T> = ::core::result::Result<T, FusionError>;
