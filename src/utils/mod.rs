//! Utility functions for filter diagnostics
//!
//! Consistency checks of the innovation statistics.

mod consistency;

pub use consistency::*;
