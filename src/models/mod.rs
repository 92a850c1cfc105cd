//! Model traits for the fusion filter
//!
//! This module defines how the tracked object moves (process models) and how
//! each sensor sees it (observation models).

mod transition;
mod observation;

pub use transition::*;
pub use observation::*;
