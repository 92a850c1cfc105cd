//! Filter consistency monitoring
//!
//! A consistent filter produces NIS values distributed as χ² with as many
//! degrees of freedom as the measurement has components. Counting how often
//! the NIS exceeds the 95 % critical value gives a quick tuning check: about
//! 5 % of the samples should land above it.

use nalgebra::RealField;

use crate::types::measurement::SensorKind;

/// 95 % critical value of the χ² distribution for 1 to 3 degrees of freedom.
pub fn chi_square_95(degrees_of_freedom: usize) -> Option<f64> {
    match degrees_of_freedom {
        1 => Some(3.841),
        2 => Some(5.991),
        3 => Some(7.815),
        _ => None,
    }
}

/// Running NIS statistics for one sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct NisMonitor<T: RealField> {
    threshold: T,
    samples: usize,
    exceedances: usize,
    sum: T,
}

impl<T: RealField + Copy> NisMonitor<T> {
    /// Creates a monitor counting samples above `threshold`.
    pub fn new(threshold: T) -> Self {
        Self {
            threshold,
            samples: 0,
            exceedances: 0,
            sum: T::zero(),
        }
    }

    /// Creates a monitor with the 95 % critical value matching the sensor's
    /// measurement dimension.
    pub fn for_sensor(sensor: SensorKind) -> Self {
        // Both sensors have 2 or 3 components
        let critical = chi_square_95(sensor.dimension()).unwrap_or(7.815);
        Self::new(nalgebra::convert(critical))
    }

    #[inline]
    pub fn threshold(&self) -> T {
        self.threshold
    }

    /// Adds one NIS sample. Non-finite samples are ignored.
    pub fn record(&mut self, nis: T) {
        if !nis.is_finite() {
            tracing::warn!(nis = ?nis, "ignoring non-finite NIS sample");
            return;
        }
        self.samples += 1;
        self.sum += nis;
        if nis > self.threshold {
            self.exceedances += 1;
        }
    }

    #[inline]
    pub fn samples(&self) -> usize {
        self.samples
    }

    #[inline]
    pub fn exceedances(&self) -> usize {
        self.exceedances
    }

    /// Share of samples above the threshold, `None` before the first sample.
    pub fn exceedance_fraction(&self) -> Option<T> {
        if self.samples == 0 {
            return None;
        }
        Some(T::from_usize(self.exceedances)? / T::from_usize(self.samples)?)
    }

    /// Average NIS, which should approach the degrees of freedom.
    pub fn mean(&self) -> Option<T> {
        if self.samples == 0 {
            return None;
        }
        Some(self.sum / T::from_usize(self.samples)?)
    }

    /// True when the exceedance fraction is at most `max_fraction`.
    /// An empty monitor is considered consistent.
    pub fn is_consistent(&self, max_fraction: T) -> bool {
        self.exceedance_fraction()
            .map_or(true, |fraction| fraction <= max_fraction)
    }

    pub fn reset(&mut self) {
        self.samples = 0;
        self.exceedances = 0;
        self.sum = T::zero();
    }
}
