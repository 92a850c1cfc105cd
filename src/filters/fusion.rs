//! Two-sensor fusion filter
//!
//! [`FusionFilter`] owns the belief over a single object and consumes
//! timestamped records from a position sensor and a range/bearing sensor in
//! arrival order.
//!
//! # Per-record flow
//!
//! 1. The first record initializes the belief from that sensor's payload.
//! 2. Every later record predicts the belief forward to its timestamp with
//!    the augmented UKF and, if its sensor is enabled, corrects it.
//!
//! Each call is all-or-nothing: on any error the belief, the reference time
//! and the stored NIS values are exactly what they were before the call.
//!
//! # Example
//!
//! ```
//! use ctrv_fusion::prelude::*;
//!
//! let config = FusionConfig {
//!     use_range_bearing: false,
//!     ..FusionConfig::<f64>::default()
//! };
//! let mut filter = FusionFilter::new(config).unwrap();
//!
//! for (k, x) in [0.0, 0.5, 1.0, 1.5].iter().enumerate() {
//!     let values = [*x, 0.0];
//!     let record = MeasurementRecord::new(SensorKind::Position, &values, k as u64 * 100_000);
//!     filter.process_measurement(&record).unwrap();
//! }
//!
//! assert_eq!(filter.reference_time_us(), Some(300_000));
//! assert!(filter.nis(SensorKind::Position).is_some());
//! ```

use nalgebra::{RealField, SVector};

use super::ukf::{SpreadParameter, UnscentedKalmanFilter};
use crate::models::{
    CtrvModel, ObservationModel, PositionSensor, RangeBearingSensor, AUGMENTED_DIM, SIGMA_COUNT,
};
use crate::types::gaussian::{Belief, STATE_DIM};
use crate::types::measurement::{MeasurementRecord, SensorKind};
use crate::types::phase::FilterPhase;
use crate::types::spaces::{Measurement, StateCovariance, StateVector};
use crate::{FusionError, Result};

/// The augmented UKF specialized to the CTRV state.
pub type CtrvUnscentedFilter<T> =
    UnscentedKalmanFilter<T, CtrvModel<T>, STATE_DIM, AUGMENTED_DIM, SIGMA_COUNT>;

const MICROS_PER_SECOND: f64 = 1e6;

// ============================================================================
// Configuration
// ============================================================================

/// Construction-time parameters of a [`FusionFilter`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FusionConfig<T: RealField> {
    /// Process noise of the motion model
    pub process_noise: CtrvModel<T>,
    /// Noise of the position sensor
    pub position_sensor: PositionSensor<T>,
    /// Noise of the range/bearing sensor
    pub range_bearing_sensor: RangeBearingSensor<T>,
    /// Apply position records as updates
    pub use_position: bool,
    /// Apply range/bearing records as updates
    pub use_range_bearing: bool,
    /// Sigma point spread λ
    pub spread: SpreadParameter<T>,
    /// Diagonal of the covariance assigned on initialization
    pub initial_covariance: [T; STATE_DIM],
    /// Smallest diagonal jitter used to restore positive definiteness
    pub covariance_floor: T,
}

impl<T: RealField + Copy> Default for FusionConfig<T> {
    fn default() -> Self {
        Self {
            process_noise: CtrvModel::default(),
            position_sensor: PositionSensor::default(),
            range_bearing_sensor: RangeBearingSensor::default(),
            use_position: true,
            use_range_bearing: true,
            spread: SpreadParameter::Augmented,
            initial_covariance: [T::one(); STATE_DIM],
            covariance_floor: nalgebra::convert(1e-9),
        }
    }
}

impl<T: RealField + Copy> FusionConfig<T> {
    /// Checks every noise figure, the initial covariance and the floor.
    ///
    /// The spread λ is checked when the sigma weights are built.
    pub fn validate(&self) -> Result<()> {
        self.process_noise.validate()?;
        self.position_sensor.validate()?;
        self.range_bearing_sensor.validate()?;

        if !self
            .initial_covariance
            .iter()
            .all(|v| v.is_finite() && *v > T::zero())
        {
            return Err(FusionError::InvalidNoise {
                parameter: "initial_covariance",
            });
        }
        if !self.covariance_floor.is_finite() || self.covariance_floor <= T::zero() {
            return Err(FusionError::InvalidNoise {
                parameter: "covariance_floor",
            });
        }
        Ok(())
    }

    fn initial_covariance(&self) -> StateCovariance<T, STATE_DIM> {
        StateCovariance::from_diagonal(&SVector::from(self.initial_covariance))
    }
}

// ============================================================================
// Fusion Filter
// ============================================================================

/// Single-object state estimator fusing position and range/bearing records.
#[derive(Debug, Clone)]
pub struct FusionFilter<T: RealField> {
    config: FusionConfig<T>,
    ukf: CtrvUnscentedFilter<T>,
    phase: FilterPhase<T>,
    position_nis: Option<T>,
    range_bearing_nis: Option<T>,
}

impl<T: RealField + Copy> FusionFilter<T> {
    /// Creates an uninitialized filter.
    ///
    /// # Errors
    /// - [`FusionError::InvalidNoise`] for a non-positive noise figure, initial
    ///   variance or covariance floor
    /// - [`FusionError::InvalidSpread`] if λ + n_aug is not positive
    pub fn new(config: FusionConfig<T>) -> Result<Self> {
        config.validate()?;
        let ukf = UnscentedKalmanFilter::new(
            config.process_noise,
            config.spread,
            config.covariance_floor,
        )?;

        tracing::debug!(
            lambda = ?ukf.weights().lambda(),
            use_position = config.use_position,
            use_range_bearing = config.use_range_bearing,
            "fusion filter created"
        );

        Ok(Self {
            config,
            ukf,
            phase: FilterPhase::Uninitialized,
            position_nis: None,
            range_bearing_nis: None,
        })
    }

    /// Consumes one record.
    ///
    /// The first record initializes the belief, whether or not its sensor is
    /// enabled. Later records predict to their timestamp and then update with
    /// the record if its sensor is enabled.
    ///
    /// # Errors
    /// - [`FusionError::PayloadLength`] if the payload does not fit the sensor
    /// - [`FusionError::OutOfOrder`] if the record is older than the belief
    /// - [`FusionError::NotPositiveDefinite`], [`FusionError::SingularMatrix`]
    ///   or [`FusionError::NumericalInstability`] from the UKF steps
    ///
    /// The filter is unchanged whenever an error is returned.
    pub fn process_measurement(&mut self, record: &MeasurementRecord<'_, T>) -> Result<()> {
        if let Err(err) = record.validate() {
            tracing::warn!(%err, timestamp_us = record.timestamp_us, "rejected record");
            return Err(err);
        }

        let (belief, reference_us) = match self.phase {
            FilterPhase::Uninitialized => return self.initialize(record),
            FilterPhase::Running {
                belief,
                reference_us,
            } => (belief, reference_us),
        };

        if record.timestamp_us < reference_us {
            let err = FusionError::OutOfOrder {
                reference_us,
                timestamp_us: record.timestamp_us,
            };
            tracing::warn!(%err, "rejected record");
            return Err(err);
        }

        let dt = elapsed_seconds::<T>(reference_us, record.timestamp_us)?;
        let prediction = self.ukf.predict(&belief, dt)?;

        let (posterior, nis) = match record.sensor {
            SensorKind::Position if self.config.use_position => {
                let z = Measurement::from_array(record.values::<2>()?);
                let correction = self.ukf.update(&prediction, &self.config.position_sensor, &z)?;
                (correction.belief, Some(correction.nis))
            }
            SensorKind::RangeBearing if self.config.use_range_bearing => {
                let z = Measurement::from_array(record.values::<3>()?);
                let correction =
                    self.ukf
                        .update(&prediction, &self.config.range_bearing_sensor, &z)?;
                (correction.belief, Some(correction.nis))
            }
            sensor => {
                tracing::trace!(%sensor, "sensor disabled, prediction only");
                (prediction.belief, None)
            }
        };

        self.phase = FilterPhase::Running {
            belief: posterior,
            reference_us: record.timestamp_us,
        };
        if let Some(nis) = nis {
            tracing::debug!(sensor = %record.sensor, nis = ?nis, "measurement applied");
            match record.sensor {
                SensorKind::Position => self.position_nis = Some(nis),
                SensorKind::RangeBearing => self.range_bearing_nis = Some(nis),
            }
        }

        Ok(())
    }

    fn initialize(&mut self, record: &MeasurementRecord<'_, T>) -> Result<()> {
        let belief = self.initial_belief(record)?;
        tracing::debug!(
            sensor = %record.sensor,
            timestamp_us = record.timestamp_us,
            "filter initialized"
        );
        self.phase = FilterPhase::Running {
            belief,
            reference_us: record.timestamp_us,
        };
        Ok(())
    }

    /// Builds the belief a record initializes the filter with: the sensor's
    /// inverse mapping for the mean and the configured initial covariance.
    ///
    /// # Errors
    /// - [`FusionError::PayloadLength`] if the payload does not fit the sensor
    /// - [`FusionError::NumericalInstability`] if the payload is not finite
    pub fn initial_belief(&self, record: &MeasurementRecord<'_, T>) -> Result<Belief<T, STATE_DIM>> {
        let mean: StateVector<T, STATE_DIM> = match record.sensor {
            SensorKind::Position => self
                .config
                .position_sensor
                .initial_state(&Measurement::from_array(record.values::<2>()?)),
            SensorKind::RangeBearing => self
                .config
                .range_bearing_sensor
                .initial_state(&Measurement::from_array(record.values::<3>()?)),
        };

        if !mean.is_finite() {
            return Err(FusionError::NumericalInstability);
        }
        Ok(Belief::new(mean, self.config.initial_covariance()))
    }

    #[inline]
    pub fn phase(&self) -> &FilterPhase<T> {
        &self.phase
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.phase.is_running()
    }

    #[inline]
    pub fn belief(&self) -> Option<&Belief<T, STATE_DIM>> {
        self.phase.belief()
    }

    /// Current state mean `[px, py, v, yaw, yaw_rate]`.
    #[inline]
    pub fn mean(&self) -> Option<&StateVector<T, STATE_DIM>> {
        self.belief().map(|b| &b.mean)
    }

    #[inline]
    pub fn covariance(&self) -> Option<&StateCovariance<T, STATE_DIM>> {
        self.belief().map(|b| &b.covariance)
    }

    /// Timestamp of the last accepted record, in microseconds.
    #[inline]
    pub fn reference_time_us(&self) -> Option<u64> {
        self.phase.reference_us()
    }

    /// NIS of the most recent update by `sensor`.
    #[inline]
    pub fn nis(&self, sensor: SensorKind) -> Option<T> {
        match sensor {
            SensorKind::Position => self.position_nis,
            SensorKind::RangeBearing => self.range_bearing_nis,
        }
    }

    #[inline]
    pub fn config(&self) -> &FusionConfig<T> {
        &self.config
    }

    /// The underlying UKF, for running its steps by hand.
    #[inline]
    pub fn unscented(&self) -> &CtrvUnscentedFilter<T> {
        &self.ukf
    }
}

/// Seconds between two microsecond timestamps, `later >= earlier`.
fn elapsed_seconds<T: RealField + Copy>(earlier: u64, later: u64) -> Result<T> {
    let micros = T::from_u64(later - earlier).ok_or(FusionError::NumericalInstability)?;
    Ok(micros / nalgebra::convert(MICROS_PER_SECOND))
}
