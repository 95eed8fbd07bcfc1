#![allow(non_snake_case)]
//! Explicit linear-system form of axis-aligned regions
use crate::bounds::Bounds;
use crate::config::AttackConfig;
use crate::error::AttackError;
use crate::inequality::{Equality, Inequality};
use crate::lp::{LinearOracle, OracleSolution};
use crate::util::axis_of_row;
use crate::RBAFloat;
use log::trace;
use ndarray::{Array1, Array2, ArrayView1};

/// `G x <= h` together with optional equality rows `C x = d`.
///
/// Systems produced from `Bounds` have exactly one `+1` or `-1` entry per
/// row; dimensions whose bounds coincide are stored as a single equality row
/// instead of two opposed inequalities.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintSystem {
    inequalities: Inequality,
    equalities: Option<Equality>,
}

/// Verdict of a zero-objective feasibility test.
#[derive(Clone, Debug, PartialEq)]
pub enum Feasibility {
    Feasible,
    Infeasible,
    /// The oracle did not settle the question.
    Unknown(String),
}

impl ConstraintSystem {
    /// # Panics
    /// If the inequality and equality rows disagree on the number of variables.
    pub fn new(inequalities: Inequality, equalities: Option<Equality>) -> Self {
        if let Some(eq) = &equalities {
            assert_eq!(eq.num_dims(), inequalities.num_dims());
        }
        Self {
            inequalities,
            equalities,
        }
    }

    pub fn inequalities(&self) -> &Inequality {
        &self.inequalities
    }

    pub fn equalities(&self) -> Option<&Equality> {
        self.equalities.as_ref()
    }

    pub fn num_dims(&self) -> usize {
        self.inequalities.num_dims()
    }

    /// Whether any dimension is pinned to a single value.
    pub fn is_degenerate(&self) -> bool {
        self.equalities.is_some()
    }

    /// Whether `x` satisfies the inequalities up to the constraint tolerance
    /// and the equalities up to the equality tolerances.
    pub fn is_satisfied_by(&self, x: &ArrayView1<RBAFloat>, config: &AttackConfig) -> bool {
        self.inequalities.is_member(x, config.constraint_tol)
            && self
                .equalities
                .as_ref()
                .map_or(true, |eq| eq.is_member(x, config))
    }

    /// Rebuilds the interval list the system was built from.
    ///
    /// # Errors
    /// Fails if a row is not axis-aligned.
    pub fn to_bounds(&self) -> Result<Bounds, AttackError> {
        union_constraints([self], self.num_dims())
    }

    /// Tests for a solution with a zero-objective LP.
    pub fn feasibility(&self, oracle: &dyn LinearOracle) -> Feasibility {
        let objective = Array1::zeros(self.num_dims());
        let solution = oracle.solve(
            objective.view(),
            &self.inequalities.finite_rows(),
            self.equalities.as_ref(),
        );
        match solution {
            OracleSolution::Optimal(_) | OracleSolution::Unbounded => Feasibility::Feasible,
            OracleSolution::Infeasible => Feasibility::Infeasible,
            OracleSolution::InfeasibleInaccurate => {
                Feasibility::Unknown("inaccurate infeasibility".to_string())
            }
            OracleSolution::Failed(reason) => Feasibility::Unknown(reason),
        }
    }
}

/// Splits an interval list into equality rows for pinned dimensions and
/// inequality rows for the rest.
///
/// A pinned dimension (upper bound `isclose` to lower bound) becomes
/// `x_i = upper`. Every other dimension becomes `x_i <= upper` and
/// `-x_i <= -lower`, infinite bounds included.
pub fn constraint_list_to_matrix(bounds: &Bounds, config: &AttackConfig) -> ConstraintSystem {
    let ndim = bounds.ndim();
    let (mut G, mut h) = (vec![], vec![]);
    let (mut C, mut d) = (vec![], vec![]);

    for dim in 0..ndim {
        let upper = bounds.upper_bound(dim);
        let neg_lower = bounds.neg_lower()[dim];
        if config.is_close(upper, -neg_lower) {
            C.push(unit_row(ndim, dim, 1.));
            d.push(upper);
        } else {
            G.push(unit_row(ndim, dim, 1.));
            h.push(upper);
            G.push(unit_row(ndim, dim, -1.));
            h.push(neg_lower);
        }
    }

    let inequalities = Inequality::new(stack_rows(&G, ndim), Array1::from_vec(h));
    let equalities = if C.is_empty() {
        None
    } else {
        Some(Equality::new(stack_rows(&C, ndim), Array1::from_vec(d)))
    };
    ConstraintSystem::new(inequalities, equalities)
}

/// Intersects axis-aligned systems into one interval list, keeping the
/// smallest bound per feature and direction.
///
/// Equality rows count as both an upper and a lower bound.
///
/// # Errors
/// `MalformedConstraint` if any row is not a single `+1` or `-1` entry or a
/// system has the wrong number of variables.
pub fn union_constraints<'a, I>(systems: I, ndim: usize) -> Result<Bounds, AttackError>
where
    I: IntoIterator<Item = &'a ConstraintSystem>,
{
    let mut packed = Array1::from_elem(2 * ndim, RBAFloat::INFINITY);
    for (sys_idx, system) in systems.into_iter().enumerate() {
        if system.num_dims() != ndim {
            return Err(AttackError::malformed(format!(
                "system {} has {} variables, expected {}",
                sys_idx,
                system.num_dims(),
                ndim
            )));
        }
        let equality_rows = system.equalities.iter().flat_map(|eq| eq.rows());
        for (row_idx, (row, b)) in system.inequalities.rows().enumerate() {
            let slot = match unit_axis(row) {
                Some((dim, true)) => dim,
                Some((dim, false)) => ndim + dim,
                None => {
                    return Err(AttackError::malformed(format!(
                        "row {} of system {} is not axis-aligned: {}",
                        row_idx, sys_idx, row
                    )))
                }
            };
            packed[slot] = packed[slot].min(b);
        }
        for (row_idx, (row, d)) in equality_rows.enumerate() {
            let (dim, value) = match unit_axis(row) {
                Some((dim, true)) => (dim, d),
                Some((dim, false)) => (dim, -d),
                None => {
                    return Err(AttackError::malformed(format!(
                        "equality row {} of system {} is not axis-aligned: {}",
                        row_idx, sys_idx, row
                    )))
                }
            };
            packed[dim] = packed[dim].min(value);
            packed[ndim + dim] = packed[ndim + dim].min(-value);
        }
    }
    trace!("union of constraints: {}", packed);
    Bounds::from_packed(packed)
}

/// Dimension of a `+1`/`-1` row and whether the entry is positive.
fn unit_axis(row: ArrayView1<RBAFloat>) -> Option<(usize, bool)> {
    match axis_of_row(row) {
        Some((dim, coeff)) if (coeff - 1.).abs() < RBAFloat::EPSILON => Some((dim, true)),
        Some((dim, coeff)) if (coeff + 1.).abs() < RBAFloat::EPSILON => Some((dim, false)),
        _ => None,
    }
}

fn unit_row(ndim: usize, dim: usize, value: RBAFloat) -> Array1<RBAFloat> {
    let mut row = Array1::zeros(ndim);
    row[dim] = value;
    row
}

fn stack_rows(rows: &[Array1<RBAFloat>], ndim: usize) -> Array2<RBAFloat> {
    let mut out = Array2::zeros((rows.len(), ndim));
    out.rows_mut()
        .into_iter()
        .zip(rows)
        .for_each(|(mut dst, src)| dst.assign(src));
    out
}
