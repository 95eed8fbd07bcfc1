#![allow(non_snake_case)]
use crate::inequality::{Equality, Inequality};
use crate::lp::{LinearOracle, OracleSolution};
use crate::util::LinearExpression;
use crate::RBAFloat;
use good_lp::{variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel};
use log::trace;
use ndarray::{Array1, ArrayView1};

cfg_if::cfg_if! {
    if #[cfg(feature = "lp_highs")] {
        use good_lp::solvers::highs::highs as lp_backend;
    } else if #[cfg(feature = "lp_coincbc")] {
        use good_lp::solvers::coin_cbc::coin_cbc as lp_backend;
    } else if #[cfg(feature = "lp_minilp")] {
        use good_lp::solvers::minilp::minilp as lp_backend;
    } else {
        compile_error!("Must enable one of \"lp_{{minilp,highs,coincbc}}\"");
    }
}

/// Linear oracle backed by `good_lp`, using the backend chosen at compile time.
#[derive(Clone, Copy, Debug, Default)]
pub struct GoodLpOracle;

impl LinearOracle for GoodLpOracle {
    /// Minimizes the expression `c` given `Ax <= b` and `Cx = d`, with all
    /// variables free.
    fn solve(
        &self,
        c: ArrayView1<RBAFloat>,
        A: &Inequality,
        eq: Option<&Equality>,
    ) -> OracleSolution {
        #[cfg(any(feature = "lp_highs", feature = "lp_coincbc"))]
        let _shh = (shh::stdout().ok(), shh::stderr().ok());

        let mut problem = ProblemVariables::new();
        let vars = problem.add_vector(variable(), c.len());
        let c_expression = LinearExpression::new(&vars, c.iter());
        let mut unsolved = problem.minimise(c_expression).using(lp_backend);

        A.rows().for_each(|(coeffs, ub)| {
            let expr = LinearExpression::new(&vars, coeffs.iter());
            unsolved.add_constraint(good_lp::constraint::leq(
                Expression::from_other_affine(expr),
                ub,
            ));
        });
        eq.into_iter().flat_map(|C| C.rows()).for_each(|(coeffs, d)| {
            let expr = LinearExpression::new(&vars, coeffs.iter());
            unsolved.add_constraint(good_lp::constraint::eq(
                Expression::from_other_affine(expr),
                d,
            ));
        });

        match unsolved.solve() {
            Ok(raw_soln) => {
                let param: Array1<RBAFloat> = vars.iter().map(|&v| raw_soln.value(v)).collect();
                trace!("lp solution {}", param);
                OracleSolution::Optimal(param)
            }
            Err(ResolutionError::Infeasible) => OracleSolution::Infeasible,
            Err(ResolutionError::Unbounded) => OracleSolution::Unbounded,
            Err(e) => OracleSolution::Failed(e.to_string()),
        }
    }
}
