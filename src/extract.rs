//! Axis-aligned boxes implied by root-to-leaf paths of a decision tree
use crate::bounds::Bounds;
use crate::tree::{Tree, TreeNode};
use crate::RBAFloat;
use log::trace;
use ndarray::{ArrayView1, ArrayView2, Axis};

/// Box of one leaf together with the class the leaf votes for.
#[derive(Clone, Debug, PartialEq)]
pub struct LeafRegion {
    pub leaf: usize,
    pub class: usize,
    pub bounds: Bounds,
}

/// Boxes of every leaf of `tree`, in depth-first order.
pub fn leaf_regions(tree: &Tree, n_features: usize) -> Vec<LeafRegion> {
    let mut leaves = vec![];
    let mut stack = vec![(0, Bounds::trivial(n_features))];
    while let Some((node_id, bounds)) = stack.pop() {
        match *tree.node(node_id) {
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                let mut right_bounds = bounds.clone();
                right_bounds.tighten_lower(feature, threshold);
                let mut left_bounds = bounds;
                left_bounds.tighten_upper(feature, threshold);
                // right first so the left subtree is popped first
                stack.push((right, right_bounds));
                stack.push((left, left_bounds));
            }
            TreeNode::Leaf { .. } => {
                let class = tree.leaf_class(node_id).unwrap_or_default();
                trace!("leaf {} (class {}): {:?}", node_id, class, bounds.as_packed());
                leaves.push(LeafRegion {
                    leaf: node_id,
                    class,
                    bounds,
                });
            }
        }
    }
    leaves
}

/// Box of the leaf `x` is routed to, tightened along its own decision path.
pub fn instance_bounds(tree: &Tree, x: &ArrayView1<RBAFloat>) -> Bounds {
    let mut bounds = Bounds::trivial(x.len());
    let mut current = 0;
    while let Some(next) = tree.route(current, x) {
        if let TreeNode::Split {
            feature,
            threshold,
            left,
            ..
        } = *tree.node(current)
        {
            if next == left {
                bounds.tighten_upper(feature, threshold);
            } else {
                bounds.tighten_lower(feature, threshold);
            }
        }
        current = next;
    }
    bounds
}

/// `instance_bounds` for every row of `xs`.
pub fn instance_bounds_batch(tree: &Tree, xs: &ArrayView2<RBAFloat>) -> Vec<Bounds> {
    xs.axis_iter(Axis(0))
        .map(|x| instance_bounds(tree, &x))
        .collect()
}
