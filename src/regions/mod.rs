//! Labeled decision regions of a forest
//!
//! Regions come from one of two constructions: [`exact::enumerate_regions`]
//! covers every leaf combination the ensemble can realize, while
//! [`approx::build_instance_regions`] builds one region around each training
//! point.
use crate::bounds::Bounds;
use crate::constraint_system::ConstraintSystem;

pub mod approx;
pub mod exact;

pub use approx::build_instance_regions;
pub use exact::enumerate_regions;

/// Axis-aligned box on which the forest predicts `label`.
#[derive(Clone, Debug)]
pub struct Region {
    bounds: Bounds,
    system: ConstraintSystem,
    label: usize,
    /// Class each tree outputs inside the region, when known.
    outcomes: Option<Vec<usize>>,
}

impl Region {
    pub fn new(bounds: Bounds, system: ConstraintSystem, label: usize) -> Self {
        Self {
            bounds,
            system,
            label,
            outcomes: None,
        }
    }

    #[must_use]
    pub fn with_outcomes(mut self, outcomes: Vec<usize>) -> Self {
        self.outcomes = Some(outcomes);
        self
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn system(&self) -> &ConstraintSystem {
        &self.system
    }

    pub fn label(&self) -> usize {
        self.label
    }

    pub fn outcomes(&self) -> Option<&[usize]> {
        self.outcomes.as_deref()
    }
}

/// Outcome of an exact enumeration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegionStats {
    pub feasible: usize,
    /// Leaf combinations discarded as empty.
    pub vacuous: usize,
}
