// ============================================================================
// Filter Lifecycle
// ============================================================================

use nalgebra::RealField;

use super::gaussian::{Belief, STATE_DIM};

/// Lifecycle of the fusion filter.
///
/// A filter starts `Uninitialized` and moves to `Running` on the first record
/// it accepts. The transition is one-way; there is no way back.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterPhase<T: RealField> {
    /// No record processed yet; there is no belief to query.
    Uninitialized,
    /// Holding a belief valid at `reference_us`.
    Running {
        belief: Belief<T, STATE_DIM>,
        reference_us: u64,
    },
}

impl<T: RealField + Copy> FilterPhase<T> {
    #[inline]
    pub fn is_running(&self) -> bool {
        matches!(self, FilterPhase::Running { .. })
    }

    #[inline]
    pub fn belief(&self) -> Option<&Belief<T, STATE_DIM>> {
        match self {
            FilterPhase::Uninitialized => None,
            FilterPhase::Running { belief, .. } => Some(belief),
        }
    }

    /// Timestamp (microseconds) the current belief refers to.
    #[inline]
    pub fn reference_us(&self) -> Option<u64> {
        match self {
            FilterPhase::Uninitialized => None,
            FilterPhase::Running { reference_us, .. } => Some(*reference_us),
        }
    }
}

