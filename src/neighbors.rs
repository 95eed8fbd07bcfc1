//! Proximity queries over training points
use crate::RBAFloat;
use ndarray::{Array2, ArrayView1, Axis};
use ordered_float::OrderedFloat;

/// Orders indexed points by their distance to a query.
pub trait NeighborSearch: Send + Sync {
    /// Indices of all indexed points, nearest first.
    fn query(&self, point: ArrayView1<RBAFloat>) -> Vec<usize>;
}

/// Exhaustive Euclidean search; ties keep index order.
#[derive(Clone, Debug)]
pub struct BruteForceNeighbors {
    points: Array2<RBAFloat>,
}

impl BruteForceNeighbors {
    pub fn new(points: Array2<RBAFloat>) -> Self {
        Self { points }
    }
}

impl NeighborSearch for BruteForceNeighbors {
    fn query(&self, point: ArrayView1<RBAFloat>) -> Vec<usize> {
        let mut order: Vec<(OrderedFloat<RBAFloat>, usize)> = self
            .points
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(idx, row)| {
                let diff = &row - &point;
                (OrderedFloat(diff.dot(&diff)), idx)
            })
            .collect();
        order.sort_unstable();
        order.into_iter().map(|(_, idx)| idx).collect()
    }
}
