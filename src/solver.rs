//! Closest point of a region to a sample, and the smallest label-changing
//! perturbation over a set of candidate regions
use crate::config::AttackConfig;
use crate::constraint_system::ConstraintSystem;
use crate::error::AttackError;
use crate::inequality::Inequality;
use crate::lp::{LinearOracle, OracleSolution, QuadraticOracle};
use crate::regions::Region;
use crate::tree::Forest;
use crate::util::{l2_norm, linf_norm};
use crate::RBAFloat;
use log::{debug, warn};
use ndarray::{s, Array1, Array2, ArrayView1};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Norm in which perturbations are measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Norm {
    L2,
    LInf,
}

impl Norm {
    /// Accepts the order of the norm, `2` or infinity.
    ///
    /// # Errors
    /// `InvalidConfig` for any other order.
    pub fn from_order(order: RBAFloat) -> Result<Self, AttackError> {
        if order == 2. {
            Ok(Self::L2)
        } else if order == RBAFloat::INFINITY {
            Ok(Self::LInf)
        } else {
            Err(AttackError::InvalidConfig {
                detail: format!("unsupported norm order {}", order),
            })
        }
    }

    pub fn magnitude(self, v: ArrayView1<RBAFloat>) -> RBAFloat {
        match self {
            Self::L2 => l2_norm(v),
            Self::LInf => linf_norm(v),
        }
    }
}

/// A region to search, together with a point known to lie in it.
#[derive(Clone, Copy, Debug)]
pub struct Candidate<'a> {
    pub region: &'a Region,
    /// Training point the region was built from, used when the solver's
    /// answer is not usable.
    pub anchor: Option<ArrayView1<'a, RBAFloat>>,
}

impl<'a> Candidate<'a> {
    pub fn new(region: &'a Region) -> Self {
        Self {
            region,
            anchor: None,
        }
    }

    pub fn anchored(region: &'a Region, anchor: ArrayView1<'a, RBAFloat>) -> Self {
        Self {
            region,
            anchor: Some(anchor),
        }
    }
}

pub struct PerturbationSolver<'a> {
    forest: &'a Forest,
    norm: Norm,
    lp: &'a dyn LinearOracle,
    qp: &'a dyn QuadraticOracle,
    config: &'a AttackConfig,
}

impl<'a> PerturbationSolver<'a> {
    pub fn new(
        forest: &'a Forest,
        norm: Norm,
        lp: &'a dyn LinearOracle,
        qp: &'a dyn QuadraticOracle,
        config: &'a AttackConfig,
    ) -> Self {
        Self {
            forest,
            norm,
            lp,
            qp,
            config,
        }
    }

    pub fn norm(&self) -> Norm {
        self.norm
    }

    /// Point of `system` closest to `x`, with every finite inequality bound
    /// pulled in by the constraint tolerance.
    pub fn closest_point(&self, x: ArrayView1<RBAFloat>, system: &ConstraintSystem) -> OracleSolution {
        let tol = self.config.constraint_tol;
        let inequalities = system.inequalities().finite_rows().tightened(tol);
        let ndim = x.len();
        match self.norm {
            Norm::L2 => {
                // ||z - x||^2 = z^T z - 2 x^T z + const
                let quadratic = Array2::eye(ndim) * 2.;
                let linear = x.mapv(|v| -2. * v);
                self.qp.solve(
                    quadratic.view(),
                    linear.view(),
                    &inequalities,
                    system.equalities(),
                )
            }
            Norm::LInf => {
                // variables are (z, t); minimize t with |z_i - x_i| <= t
                let mut lifted = inequalities.with_zero_columns(1);
                let mut coeffs = Array2::zeros((2 * ndim, ndim + 1));
                let mut rhs = Array1::zeros(2 * ndim);
                for (dim, &value) in x.iter().enumerate() {
                    coeffs[[2 * dim, dim]] = 1.;
                    coeffs[[2 * dim, ndim]] = -1.;
                    rhs[2 * dim] = value - tol;
                    coeffs[[2 * dim + 1, dim]] = -1.;
                    coeffs[[2 * dim + 1, ndim]] = -1.;
                    rhs[2 * dim + 1] = -value - tol;
                }
                lifted.add_eqns(&Inequality::new(coeffs, rhs));
                let equalities = system.equalities().map(|eq| eq.with_zero_columns(1));
                let mut objective = Array1::zeros(ndim + 1);
                objective[ndim] = 1.;
                match self
                    .lp
                    .solve(objective.view(), &lifted, equalities.as_ref())
                {
                    OracleSolution::Optimal(sol) => {
                        OracleSolution::Optimal(sol.slice(s![..ndim]).to_owned())
                    }
                    other => other,
                }
            }
        }
    }

    /// Smallest perturbation `delta` over `candidates` such that the forest
    /// does not predict `label` at `x + delta`.
    ///
    /// A solver answer that leaves the prediction unchanged, or one that is
    /// infeasible only within numerical accuracy, falls back to the
    /// candidate's anchor. Without an anchor the candidate is skipped, as is
    /// any candidate the solver fails on. Candidates whose region already
    /// carries `label` are ignored. Ties keep the earliest candidate.
    ///
    /// # Errors
    /// `NoUsableRegion` if every candidate was skipped.
    pub fn solve<'b, I>(
        &self,
        x: ArrayView1<RBAFloat>,
        label: usize,
        candidates: I,
    ) -> Result<Array1<RBAFloat>, AttackError>
    where
        I: IntoIterator<Item = Candidate<'b>>,
    {
        let mut searched = 0;
        let mut skipped = 0;
        let mut perturbations = vec![];
        for candidate in candidates {
            if candidate.region.label() == label {
                continue;
            }
            searched += 1;
            let fallback = || candidate.anchor.map(|anchor| anchor.to_owned());
            let point = match self.closest_point(x, candidate.region.system()) {
                OracleSolution::Optimal(z) => {
                    if self.forest.predict(&z.view()) == label {
                        debug!("solution keeps label {}, using anchor", label);
                        fallback()
                    } else {
                        Some(z)
                    }
                }
                OracleSolution::InfeasibleInaccurate => {
                    debug!("solver reported inaccurate infeasibility, using anchor");
                    fallback()
                }
                other => {
                    warn!("skipping region with label {}: {:?}", candidate.region.label(), other);
                    None
                }
            };
            match point {
                Some(z) => {
                    let delta = &z - &x;
                    perturbations.push((self.norm.magnitude(delta.view()), delta));
                }
                None => skipped += 1,
            }
        }
        perturbations
            .into_iter()
            .min_by_key(|(size, _)| OrderedFloat(*size))
            .map(|(_, delta)| delta)
            .ok_or(AttackError::NoUsableRegion { searched, skipped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::Bounds;
    use crate::constraint_system::constraint_list_to_matrix;
    use crate::inequality::Equality;
    use crate::lp::{BoxProjectionOracle, GoodLpOracle};
    use crate::tree::Tree;
    use ndarray::{array, ArrayView2};

    /// Answers every program with the same outcome.
    struct FixedOracle(OracleSolution);

    impl LinearOracle for FixedOracle {
        fn solve(
            &self,
            _objective: ArrayView1<RBAFloat>,
            _inequalities: &Inequality,
            _equalities: Option<&Equality>,
        ) -> OracleSolution {
            self.0.clone()
        }
    }

    impl QuadraticOracle for FixedOracle {
        fn solve(
            &self,
            _quadratic: ArrayView2<RBAFloat>,
            _linear: ArrayView1<RBAFloat>,
            _inequalities: &Inequality,
            _equalities: Option<&Equality>,
        ) -> OracleSolution {
            self.0.clone()
        }
    }

    fn region(lower: Array1<RBAFloat>, upper: Array1<RBAFloat>, label: usize) -> Region {
        let bounds = Bounds::new(lower.view(), upper.view());
        let system = constraint_list_to_matrix(&bounds, &AttackConfig::default());
        Region::new(bounds, system, label)
    }

    fn stump_forest(n_trees: usize) -> Forest {
        Forest::new(vec![Tree::stump(0, 0.5, 0, 1, 2); n_trees], 2, 2).unwrap()
    }

    #[test]
    fn test_norm_from_order() {
        assert_eq!(Norm::from_order(2.).unwrap(), Norm::L2);
        assert_eq!(Norm::from_order(RBAFloat::INFINITY).unwrap(), Norm::LInf);
        assert!(Norm::from_order(1.).is_err());
        assert_eq!(Norm::LInf.magnitude(array![1., -3.].view()), 3.);
    }

    #[test]
    fn test_linf_crosses_threshold() {
        let forest = stump_forest(3);
        let config = AttackConfig::default();
        let inf = RBAFloat::INFINITY;
        let right = region(array![0.5, -inf], array![inf, inf], 1);
        let projection = BoxProjectionOracle::default();
        let solver = PerturbationSolver::new(
            &forest,
            Norm::LInf,
            &GoodLpOracle,
            &projection,
            &config,
        );
        let x = array![0., 2.];
        let delta = solver.solve(x.view(), 0, [Candidate::new(&right)]).unwrap();
        assert!((delta[0] - 0.5 - config.constraint_tol).abs() < 1e-9);
        assert!(delta[1].abs() <= 0.5 + 2. * config.constraint_tol);
        assert_eq!(forest.predict(&(&x + &delta).view()), 1);
    }

    #[test]
    fn test_l2_projects_onto_region() {
        let forest = stump_forest(1);
        let config = AttackConfig::default();
        let inf = RBAFloat::INFINITY;
        let right = region(array![0.5, -inf], array![inf, inf], 1);
        let projection = BoxProjectionOracle::default();
        let solver = PerturbationSolver::new(
            &forest,
            Norm::L2,
            &GoodLpOracle,
            &projection,
            &config,
        );
        let delta = solver
            .solve(array![0., 3.].view(), 0, [Candidate::new(&right)])
            .unwrap();
        assert!((delta[0] - 0.5 - config.constraint_tol).abs() < 1e-12);
        assert_eq!(delta[1], 0.);
    }

    #[test]
    fn test_pinned_region_without_anchor_is_skipped() {
        let forest = stump_forest(1);
        let config = AttackConfig::default();
        let inf = RBAFloat::INFINITY;
        // routed left at exactly the threshold
        let pinned = region(array![0.5, -inf], array![0.5, inf], 1);
        let projection = BoxProjectionOracle::default();
        let solver = PerturbationSolver::new(
            &forest,
            Norm::L2,
            &GoodLpOracle,
            &projection,
            &config,
        );
        let x = array![0., 0.];
        assert!(matches!(
            solver.solve(x.view(), 0, [Candidate::new(&pinned)]),
            Err(AttackError::NoUsableRegion {
                searched: 1,
                skipped: 1
            })
        ));
        let anchor = array![0.75, 1.];
        let delta = solver
            .solve(x.view(), 0, [Candidate::anchored(&pinned, anchor.view())])
            .unwrap();
        assert_eq!(delta, anchor);
    }

    #[test]
    fn test_inaccurate_uses_anchor_and_failure_skips() {
        let forest = stump_forest(1);
        let config = AttackConfig::default();
        let inf = RBAFloat::INFINITY;
        let right = region(array![0.5, -inf], array![inf, inf], 1);
        let anchor = array![2., 2.];
        let x = array![1., 1.];

        let inaccurate = FixedOracle(OracleSolution::InfeasibleInaccurate);
        let solver = PerturbationSolver::new(&forest, Norm::L2, &inaccurate, &inaccurate, &config);
        let delta = solver
            .solve(x.view(), 0, [Candidate::anchored(&right, anchor.view())])
            .unwrap();
        assert_eq!(delta, array![1., 1.]);

        let failed = FixedOracle(OracleSolution::Failed("numerical trouble".to_string()));
        let solver = PerturbationSolver::new(&forest, Norm::LInf, &failed, &failed, &config);
        assert!(matches!(
            solver.solve(x.view(), 0, [Candidate::anchored(&right, anchor.view())]),
            Err(AttackError::NoUsableRegion {
                searched: 1,
                skipped: 1
            })
        ));
    }

    #[test]
    fn test_smallest_wins_and_same_label_ignored() {
        let forest = stump_forest(1);
        let config = AttackConfig::default();
        let inf = RBAFloat::INFINITY;
        let far = region(array![3., -inf], array![inf, inf], 1);
        let near = region(array![1., -inf], array![inf, inf], 1);
        let also_near = region(array![1., -inf], array![inf, inf], 1);
        let same = region(array![-inf, -inf], array![0.5, inf], 0);
        let projection = BoxProjectionOracle::default();
        let solver = PerturbationSolver::new(
            &forest,
            Norm::L2,
            &GoodLpOracle,
            &projection,
            &config,
        );
        let anchor = array![9., 9.];
        let candidates = [
            Candidate::new(&same),
            Candidate::new(&far),
            Candidate::new(&near),
            Candidate::anchored(&also_near, anchor.view()),
        ];
        let delta = solver.solve(array![0., 0.].view(), 0, candidates).unwrap();
        assert!((delta[0] - 1. - config.constraint_tol).abs() < 1e-12);
    }
}
