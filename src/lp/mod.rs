//! Solver oracles consumed by the attack
//!
//! The attack never depends on a concrete solver: region feasibility and the
//! L-infinity search go through a [`LinearOracle`], the L2 search through a
//! [`QuadraticOracle`]. [`GoodLpOracle`] and [`BoxProjectionOracle`] are the
//! defaults.
use crate::inequality::{Equality, Inequality};
use crate::RBAFloat;
use ndarray::{Array1, ArrayView1, ArrayView2};

mod backend;
mod projection;

pub use backend::GoodLpOracle;
pub use projection::BoxProjectionOracle;

#[derive(Clone, Debug, PartialEq)]
pub enum OracleSolution {
    Optimal(Array1<RBAFloat>),
    Infeasible,
    /// The problem is infeasible by a margin within the solver's numerical
    /// accuracy.
    InfeasibleInaccurate,
    Unbounded,
    Failed(String),
}

impl OracleSolution {
    pub fn is_optimal(&self) -> bool {
        matches!(self, Self::Optimal(_))
    }
}

/// Minimizes `c^T x` subject to `A x <= b` and optionally `C x = d`.
pub trait LinearOracle: Send + Sync {
    fn solve(
        &self,
        objective: ArrayView1<RBAFloat>,
        inequalities: &Inequality,
        equalities: Option<&Equality>,
    ) -> OracleSolution;
}

/// Minimizes `x^T P x / 2 + q^T x` subject to `A x <= b` and optionally `C x = d`.
pub trait QuadraticOracle: Send + Sync {
    fn solve(
        &self,
        quadratic: ArrayView2<RBAFloat>,
        linear: ArrayView1<RBAFloat>,
        inequalities: &Inequality,
        equalities: Option<&Equality>,
    ) -> OracleSolution;
}
