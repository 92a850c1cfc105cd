//! Core types: typed vector spaces, beliefs, measurement records and the filter lifecycle

pub mod angle;
pub mod gaussian;
pub mod measurement;
pub mod phase;
pub mod spaces;
pub mod transforms;
