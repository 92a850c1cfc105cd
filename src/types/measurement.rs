//! Measurement records consumed by the fusion filter
//!
//! A record is the fixed-shape envelope produced by whatever ingests sensor
//! data: a sensor tag, a borrowed numeric payload and a timestamp in
//! microseconds.

use core::fmt;

use crate::{FusionError, Result};

/// The sensor that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SensorKind {
    /// Position-only sensor (lidar-like): payload `[x, y]`
    Position,
    /// Range/bearing/range-rate sensor (radar-like): payload `[rho, phi, rho_dot]`
    RangeBearing,
}

impl SensorKind {
    /// Number of payload values this sensor reports.
    #[inline]
    pub const fn dimension(self) -> usize {
        match self {
            SensorKind::Position => 2,
            SensorKind::RangeBearing => 3,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Position => write!(f, "position"),
            SensorKind::RangeBearing => write!(f, "range/bearing"),
        }
    }
}

/// One sensor reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementRecord<'a, T> {
    /// Which sensor reported
    pub sensor: SensorKind,
    /// Raw values, 2 for [`SensorKind::Position`] and 3 for [`SensorKind::RangeBearing`]
    pub payload: &'a [T],
    /// Acquisition time in microseconds; must be non-decreasing across records
    pub timestamp_us: u64,
}

impl<'a, T: Copy> MeasurementRecord<'a, T> {
    #[inline]
    pub fn new(sensor: SensorKind, payload: &'a [T], timestamp_us: u64) -> Self {
        Self {
            sensor,
            payload,
            timestamp_us,
        }
    }

    /// Copies the payload into a fixed-size array after checking its length
    /// against both the declared sensor and the expected dimension `M`.
    pub fn values<const M: usize>(&self) -> Result<[T; M]> {
        let expected = self.sensor.dimension();
        if self.payload.len() != expected || expected != M {
            return Err(FusionError::PayloadLength {
                sensor: self.sensor,
                expected,
                found: self.payload.len(),
            });
        }

        let mut out = [self.payload[0]; M];
        out.copy_from_slice(self.payload);
        Ok(out)
    }

    /// Checks the payload length against the declared sensor.
    pub fn validate(&self) -> Result<()> {
        let expected = self.sensor.dimension();
        if self.payload.len() == expected {
            Ok(())
        } else {
            Err(FusionError::PayloadLength {
                sensor: self.sensor,
                expected,
                found: self.payload.len(),
            })
        }
    }
}
