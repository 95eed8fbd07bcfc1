use super::{Region, RegionStats};
use crate::config::AttackConfig;
use crate::constraint_system::{
    constraint_list_to_matrix, union_constraints, ConstraintSystem, Feasibility,
};
use crate::error::AttackError;
use crate::extract::leaf_regions;
use crate::lp::LinearOracle;
use crate::tree::{majority_vote, Forest};
use itertools::Itertools;
use log::{debug, info, trace};

/// Enumerates every ensemble-level decision region of `forest`.
///
/// Each tuple of per-tree classes is labeled with the forest's vote. For each
/// tuple, every combination of one matching leaf per tree is intersected and
/// kept if the LP oracle finds it feasible. Oracle answers other than a
/// solution discard the combination.
///
/// The enumeration is exponential in the number of trees and is meant for
/// small ensembles.
///
/// # Errors
/// `MalformedConstraint` if a leaf system is not axis-aligned; nothing is
/// returned in that case.
pub fn enumerate_regions(
    forest: &Forest,
    oracle: &dyn LinearOracle,
    config: &AttackConfig,
) -> Result<(Vec<Region>, RegionStats), AttackError> {
    let n_features = forest.n_features();
    let n_classes = forest.n_classes();

    // leaf systems indexed by [tree][class]
    let leaf_systems: Vec<Vec<Vec<ConstraintSystem>>> = forest
        .trees()
        .iter()
        .map(|tree| {
            let mut by_class = vec![vec![]; n_classes];
            for leaf in leaf_regions(tree, n_features) {
                by_class[leaf.class].push(constraint_list_to_matrix(&leaf.bounds, config));
            }
            by_class
        })
        .collect();

    let mut regions = vec![];
    let mut stats = RegionStats::default();
    for outcomes in itertools::repeat_n(0..n_classes, forest.n_trees()).multi_cartesian_product() {
        let label = majority_vote(outcomes.iter().copied(), n_classes);
        let per_tree_leaves = outcomes
            .iter()
            .zip(&leaf_systems)
            .map(|(&class, by_class)| by_class[class].iter());
        for combination in per_tree_leaves.multi_cartesian_product() {
            let bounds = union_constraints(combination.iter().copied(), n_features)?;
            if !bounds.is_consistent() {
                stats.vacuous += 1;
                continue;
            }
            let system = constraint_list_to_matrix(&bounds, config);
            match system.feasibility(oracle) {
                Feasibility::Feasible => {
                    trace!("region {:?} (label {}): {}", outcomes, label, bounds);
                    stats.feasible += 1;
                    regions.push(Region::new(bounds, system, label).with_outcomes(outcomes.clone()));
                }
                Feasibility::Infeasible => stats.vacuous += 1,
                Feasibility::Unknown(reason) => {
                    debug!("discarding region {:?}: {}", outcomes, reason);
                    stats.vacuous += 1;
                }
            }
        }
    }
    info!("number of regions: {}", stats.feasible);
    info!("number of vacuous regions: {}", stats.vacuous);
    Ok((regions, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inequality::{Equality, Inequality};
    use crate::lp::{GoodLpOracle, OracleSolution};
    use crate::test_util::*;
    use crate::tree::Tree;
    use crate::RBAFloat;
    use ndarray::ArrayView1;
    use proptest::prelude::*;

    struct FailingOracle;

    impl LinearOracle for FailingOracle {
        fn solve(
            &self,
            _objective: ArrayView1<RBAFloat>,
            _inequalities: &Inequality,
            _equalities: Option<&Equality>,
        ) -> OracleSolution {
            OracleSolution::Failed("solver crashed".to_string())
        }
    }

    fn stump_forest() -> Forest {
        let stump = Tree::stump(0, 0.5, 0, 1, 2);
        Forest::new(vec![stump.clone(), stump.clone(), stump], 2, 1).unwrap()
    }

    #[test]
    fn test_identical_stumps() {
        let (regions, stats) =
            enumerate_regions(&stump_forest(), &GoodLpOracle, &AttackConfig::default()).unwrap();
        // all-left, all-right, and the six mixed tuples pinned to the threshold
        assert_eq!(stats, RegionStats { feasible: 8, vacuous: 0 });
        assert_eq!(regions.len(), 8);
        let open: Vec<_> = regions
            .iter()
            .filter(|r| !r.system().is_degenerate())
            .map(|r| (r.outcomes().unwrap().to_vec(), r.label()))
            .collect();
        assert_eq!(open, vec![(vec![0, 0, 0], 0), (vec![1, 1, 1], 1)]);
        assert_eq!(regions[1].outcomes(), Some(&[0, 0, 1][..]));
        assert_eq!(regions[1].label(), 0);
        assert_eq!(regions[3].outcomes(), Some(&[0, 1, 1][..]));
        assert_eq!(regions[3].label(), 1);
    }

    #[test]
    fn test_disjoint_leaves_are_vacuous() {
        let forest = Forest::new(
            vec![Tree::stump(0, 0., 0, 1, 2), Tree::stump(0, 1., 0, 1, 2)],
            2,
            1,
        )
        .unwrap();
        let (regions, stats) =
            enumerate_regions(&forest, &GoodLpOracle, &AttackConfig::default()).unwrap();
        // (1, 0) is x > 0 and x <= 1; (0, 1) is x <= 0 and x > 1
        assert_eq!(stats, RegionStats { feasible: 3, vacuous: 1 });
        assert!(regions.iter().all(|r| r.outcomes() != Some(&[0, 1][..])));
    }

    #[test]
    fn test_oracle_failures_discard_combinations() {
        let (regions, stats) =
            enumerate_regions(&stump_forest(), &FailingOracle, &AttackConfig::default()).unwrap();
        assert!(regions.is_empty());
        assert_eq!(stats, RegionStats { feasible: 0, vacuous: 8 });
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]
        #[test]
        fn test_interior_points_follow_outcomes(forest in forest(3, 2, 2, 2)) {
            let (regions, _) =
                enumerate_regions(&forest, &GoodLpOracle, &AttackConfig::default()).unwrap();
            for region in regions.iter().filter(|r| !r.system().is_degenerate()) {
                if let Some(point) = region.bounds().interior_point(1e-3) {
                    prop_assert_eq!(
                        forest.tree_votes(&point.view()),
                        region.outcomes().unwrap().to_vec()
                    );
                    prop_assert_eq!(forest.predict(&point.view()), region.label());
                }
            }
        }
    }
}
