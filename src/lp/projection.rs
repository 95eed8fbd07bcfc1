use crate::inequality::{Equality, Inequality};
use crate::lp::{OracleSolution, QuadraticOracle};
use crate::util::axis_of_row;
use crate::RBAFloat;
use ndarray::{Array1, ArrayView1, ArrayView2};

/// Exact solver for separable quadratics over boxes.
///
/// With a diagonal `P` and only axis-aligned rows, the program decomposes into
/// one-dimensional problems whose minimizer is the unconstrained optimum
/// clamped to the feasible interval. Other problem shapes are reported as
/// `Failed`.
#[derive(Clone, Copy, Debug)]
pub struct BoxProjectionOracle {
    /// Largest gap between a dimension's lower and upper bound that is
    /// reported as `InfeasibleInaccurate` rather than `Infeasible`.
    pub near_miss: RBAFloat,
}

impl Default for BoxProjectionOracle {
    fn default() -> Self {
        Self { near_miss: 1e-5 }
    }
}

impl QuadraticOracle for BoxProjectionOracle {
    fn solve(
        &self,
        quadratic: ArrayView2<RBAFloat>,
        linear: ArrayView1<RBAFloat>,
        inequalities: &Inequality,
        equalities: Option<&Equality>,
    ) -> OracleSolution {
        let ndim = linear.len();
        if quadratic.dim() != (ndim, ndim) {
            return OracleSolution::Failed("quadratic term has the wrong shape".to_string());
        }
        let separable = quadratic
            .indexed_iter()
            .all(|((i, j), &v)| if i == j { v > 0. } else { v == 0. });
        if !separable {
            return OracleSolution::Failed(
                "quadratic term is not a positive diagonal".to_string(),
            );
        }

        let mut lower = Array1::from_elem(ndim, RBAFloat::NEG_INFINITY);
        let mut upper = Array1::from_elem(ndim, RBAFloat::INFINITY);
        for (row, b) in inequalities.rows() {
            match axis_of_row(row) {
                Some((dim, coeff)) if coeff > 0. => upper[dim] = upper[dim].min(b / coeff),
                Some((dim, coeff)) => lower[dim] = lower[dim].max(b / coeff),
                None => {
                    return OracleSolution::Failed(
                        "inequality row is not axis-aligned".to_string(),
                    )
                }
            }
        }
        let mut fixed: Vec<Option<RBAFloat>> = vec![None; ndim];
        for (row, d) in equalities.into_iter().flat_map(|eq| eq.rows()) {
            match axis_of_row(row) {
                Some((dim, coeff)) => {
                    let value = d / coeff;
                    match fixed[dim] {
                        Some(prev) if (prev - value).abs() > self.near_miss => {
                            return OracleSolution::Infeasible
                        }
                        Some(_) => {}
                        None => fixed[dim] = Some(value),
                    }
                }
                None => {
                    return OracleSolution::Failed(
                        "equality row is not axis-aligned".to_string(),
                    )
                }
            }
        }

        let mut inaccurate = false;
        let mut solution = Array1::zeros(ndim);
        for dim in 0..ndim {
            let (lb, ub) = (lower[dim], upper[dim]);
            let value = fixed[dim].unwrap_or_else(|| {
                let target = -linear[dim] / quadratic[[dim, dim]];
                if lb > ub {
                    (lb + ub) / 2.
                } else {
                    target.clamp(lb, ub)
                }
            });
            let gap = (lb - value).max(value - ub).max(lb - ub);
            if gap > self.near_miss {
                return OracleSolution::Infeasible;
            }
            inaccurate |= gap > 0.;
            solution[dim] = value;
        }
        if inaccurate {
            OracleSolution::InfeasibleInaccurate
        } else {
            OracleSolution::Optimal(solution)
        }
    }
}
