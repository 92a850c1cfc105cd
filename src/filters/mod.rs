//! Filters
//!
//! - [`ukf::UnscentedKalmanFilter`]: augmented Unscented Kalman Filter, generic
//!   over process and observation models
//! - [`fusion::FusionFilter`]: the stateful two-sensor CTRV filter built on it

pub mod fusion;
pub mod ukf;
