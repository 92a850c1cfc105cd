//! Angle wrapping for heading and bearing residuals
//!
//! Every angle difference the filter forms (heading residuals of state sigma
//! points, bearing residuals of range/bearing measurements) is mapped into the
//! half-open interval (-π, π] before it enters a covariance or an innovation.

use nalgebra::RealField;

/// Wraps an angle into (-π, π].
///
/// Non-finite inputs are returned unchanged.
#[inline]
pub fn normalize_angle<T: RealField + Copy>(angle: T) -> T {
    if !angle.is_finite() {
        return angle;
    }

    let pi = T::pi();
    let two_pi = T::two_pi();

    // k = ceil((a - π) / 2π) is the unique integer with a - 2πk in (-π, π]
    let turns = ((angle - pi) / two_pi).ceil();
    let mut wrapped = angle - turns * two_pi;

    // Rounding can land exactly one period off at the interval edges
    if wrapped > pi {
        wrapped -= two_pi;
    } else if wrapped <= -pi {
        wrapped += two_pi;
    }
    wrapped
}

/// Smallest signed difference `a - b`, wrapped into (-π, π].
#[inline]
pub fn angle_difference<T: RealField + Copy>(a: T, b: T) -> T {
    normalize_angle(a - b)
}
