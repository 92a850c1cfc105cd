//! Observation (sensor) models
//!
//! Describes how each sensor's measurements relate to the CTRV state, and how
//! a first measurement is turned back into an initial state.

use nalgebra::{RealField, SVector};

use crate::types::angle::normalize_angle;
use crate::types::gaussian::{PX, PY, SPEED, STATE_DIM, YAW};
use crate::types::measurement::SensorKind;
use crate::types::spaces::{Measurement, MeasurementCovariance, StateVector};
use crate::Result;

use super::transition::check_std_dev;

/// Trait for nonlinear observation models used by the unscented update.
///
/// Describes the measurement process:
/// z = h(x) + v
///
/// where v is zero-mean Gaussian measurement noise with covariance R.
pub trait ObservationModel<T: RealField, const N: usize, const M: usize> {
    /// The sensor this model describes.
    fn sensor(&self) -> SensorKind;

    /// Maps a state to the measurement the sensor would report.
    fn observe(&self, state: &StateVector<T, N>) -> Measurement<T, M>;

    /// Returns the measurement noise covariance R.
    fn measurement_noise(&self) -> MeasurementCovariance<T, M>;

    /// Normalizes a difference of two measurements (e.g. wraps bearings).
    fn normalize_residual(&self, residual: SVector<T, M>) -> SVector<T, M> {
        residual
    }

    /// Builds a state from a single measurement, leaving unobservable
    /// components at zero.
    fn initial_state(&self, measurement: &Measurement<T, M>) -> StateVector<T, N>;
}

// ============================================================================
// Position Sensor
// ============================================================================

/// Position-only sensor (lidar-like).
///
/// Observes [px, py] from state [px, py, v, yaw, yaw_rate].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PositionSensor<T: RealField> {
    /// X position noise standard deviation (m)
    pub std_px: T,
    /// Y position noise standard deviation (m)
    pub std_py: T,
}

impl<T: RealField + Copy> PositionSensor<T> {
    /// Creates a position sensor.
    ///
    /// # Errors
    /// [`crate::FusionError::InvalidNoise`] if a standard deviation is not positive and finite.
    pub fn new(std_px: T, std_py: T) -> Result<Self> {
        let sensor = Self { std_px, std_py };
        sensor.validate()?;
        Ok(sensor)
    }

    pub fn validate(&self) -> Result<()> {
        check_std_dev(self.std_px, "std_px")?;
        check_std_dev(self.std_py, "std_py")
    }
}

impl<T: RealField + Copy> Default for PositionSensor<T> {
    /// Manufacturer noise figures: 0.15 m on both axes.
    fn default() -> Self {
        Self {
            std_px: nalgebra::convert(0.15),
            std_py: nalgebra::convert(0.15),
        }
    }
}

impl<T: RealField + Copy> ObservationModel<T, STATE_DIM, 2> for PositionSensor<T> {
    fn sensor(&self) -> SensorKind {
        SensorKind::Position
    }

    fn observe(&self, state: &StateVector<T, STATE_DIM>) -> Measurement<T, 2> {
        Measurement::from_array([*state.index(PX), *state.index(PY)])
    }

    fn measurement_noise(&self) -> MeasurementCovariance<T, 2> {
        MeasurementCovariance::from_std_devs([self.std_px, self.std_py])
    }

    fn initial_state(&self, measurement: &Measurement<T, 2>) -> StateVector<T, STATE_DIM> {
        let zero = T::zero();
        StateVector::from_array([
            *measurement.index(0),
            *measurement.index(1),
            zero,
            zero,
            zero,
        ])
    }
}

// ============================================================================
// Range/Bearing Sensor
// ============================================================================

/// Range, bearing and range-rate sensor (radar-like), located at the origin.
///
/// Observes [rho, phi, rho_dot]:
/// - rho = √(px² + py²)
/// - phi = atan2(py, px)
/// - rho_dot = (px·cos(yaw)·v + py·sin(yaw)·v) / rho
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeBearingSensor<T: RealField> {
    /// Range noise standard deviation (m)
    pub std_range: T,
    /// Bearing noise standard deviation (rad)
    pub std_bearing: T,
    /// Range-rate noise standard deviation (m/s)
    pub std_range_rate: T,
}

impl<T: RealField + Copy> RangeBearingSensor<T> {
    /// Below this range (m) the range-rate is reported as zero.
    pub const MIN_RANGE: f64 = 1e-6;

    /// Creates a range/bearing sensor.
    ///
    /// # Errors
    /// [`crate::FusionError::InvalidNoise`] if a standard deviation is not positive and finite.
    pub fn new(std_range: T, std_bearing: T, std_range_rate: T) -> Result<Self> {
        let sensor = Self {
            std_range,
            std_bearing,
            std_range_rate,
        };
        sensor.validate()?;
        Ok(sensor)
    }

    pub fn validate(&self) -> Result<()> {
        check_std_dev(self.std_range, "std_range")?;
        check_std_dev(self.std_bearing, "std_bearing")?;
        check_std_dev(self.std_range_rate, "std_range_rate")
    }
}

impl<T: RealField + Copy> Default for RangeBearingSensor<T> {
    /// Manufacturer noise figures: 0.3 m, 0.03 rad, 0.3 m/s.
    fn default() -> Self {
        Self {
            std_range: nalgebra::convert(0.3),
            std_bearing: nalgebra::convert(0.03),
            std_range_rate: nalgebra::convert(0.3),
        }
    }
}

impl<T: RealField + Copy> ObservationModel<T, STATE_DIM, 3> for RangeBearingSensor<T> {
    fn sensor(&self) -> SensorKind {
        SensorKind::RangeBearing
    }

    fn observe(&self, state: &StateVector<T, STATE_DIM>) -> Measurement<T, 3> {
        let px = *state.index(PX);
        let py = *state.index(PY);
        let v = *state.index(SPEED);
        let (sin_yaw, cos_yaw) = state.index(YAW).sin_cos();

        let range = (px * px + py * py).sqrt();
        let bearing = py.atan2(px);
        let min_range: T = nalgebra::convert(Self::MIN_RANGE);
        let range_rate = if range > min_range {
            (px * cos_yaw * v + py * sin_yaw * v) / range
        } else {
            T::zero()
        };

        Measurement::from_array([range, bearing, range_rate])
    }

    fn measurement_noise(&self) -> MeasurementCovariance<T, 3> {
        MeasurementCovariance::from_std_devs([self.std_range, self.std_bearing, self.std_range_rate])
    }

    fn normalize_residual(&self, mut residual: SVector<T, 3>) -> SVector<T, 3> {
        residual[1] = normalize_angle(residual[1]);
        residual
    }

    fn initial_state(&self, measurement: &Measurement<T, 3>) -> StateVector<T, STATE_DIM> {
        let range = *measurement.index(0);
        let (sin_phi, cos_phi) = measurement.index(1).sin_cos();
        let range_rate = *measurement.index(2);

        let vx = range_rate * cos_phi;
        let vy = range_rate * sin_phi;
        let zero = T::zero();

        StateVector::from_array([
            range * cos_phi,
            range * sin_phi,
            (vx * vx + vy * vy).sqrt(),
            zero,
            zero,
        ])
    }
}
