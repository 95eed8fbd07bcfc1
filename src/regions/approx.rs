use super::Region;
use crate::bounds::Bounds;
use crate::config::AttackConfig;
use crate::constraint_system::constraint_list_to_matrix;
use crate::error::AttackError;
use crate::extract::instance_bounds_batch;
use crate::tree::Forest;
use crate::RBAFloat;
use log::debug;
use ndarray::{ArrayView2, Axis};

/// One region per row of `points`: the intersection of the leaf boxes the
/// point reaches in every tree, labeled with the forest's prediction there.
///
/// Rows should already be rounded to `f32` precision so that each point lies
/// in the region built from its own decision paths.
///
/// # Errors
/// `DimensionMismatch` if the rows do not have the forest's feature count,
/// `MalformedConstraint` if a point falls outside its own region.
pub fn build_instance_regions(
    forest: &Forest,
    points: &ArrayView2<RBAFloat>,
    config: &AttackConfig,
) -> Result<Vec<Region>, AttackError> {
    let n_features = forest.n_features();
    if points.ncols() != n_features {
        return Err(AttackError::DimensionMismatch {
            expected: n_features,
            found: points.ncols(),
        });
    }
    let per_tree: Vec<Vec<Bounds>> = forest
        .trees()
        .iter()
        .map(|tree| instance_bounds_batch(tree, points))
        .collect();

    let regions = points
        .axis_iter(Axis(0))
        .enumerate()
        .map(|(idx, x)| {
            let bounds = per_tree
                .iter()
                .fold(Bounds::trivial(n_features), |acc, tree_bounds| {
                    acc.intersect(&tree_bounds[idx])
                });
            let system = constraint_list_to_matrix(&bounds, config);
            if !system.is_satisfied_by(&x, config) {
                return Err(AttackError::malformed(format!(
                    "training point {} lies outside its own region",
                    idx
                )));
            }
            Ok(Region::new(bounds, system, forest.predict(&x)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    debug!("built {} instance regions", regions.len());
    Ok(regions)
}
