#![allow(dead_code)]
use ndarray::Array2;
use rand::Rng;
use rba_rs::{Forest, Tree, TreeNode};

/// Depth-two tree whose left-most and inner-right leaves vote for class 0.
pub fn depth_two_tree(root: (usize, f64), left: (usize, f64), right: (usize, f64)) -> Tree {
    let split = |(feature, threshold): (usize, f64), left, right| TreeNode::Split {
        feature,
        threshold,
        left,
        right,
    };
    let leaf = |class: usize| TreeNode::Leaf {
        value: if class == 0 { vec![3., 1.] } else { vec![1., 3.] },
    };
    Tree::new(vec![
        split(root, 1, 4),
        split(left, 2, 3),
        leaf(0),
        leaf(1),
        split(right, 5, 6),
        leaf(0),
        leaf(1),
    ])
    .unwrap()
}

/// Three trees over two features voting class 0 near (-1, -1) and class 1
/// near (1, 1).
pub fn diagonal_forest() -> Forest {
    Forest::new(
        vec![
            depth_two_tree((0, 0.), (1, 0.5), (1, -0.5)),
            depth_two_tree((1, 0.), (0, 0.5), (0, -0.5)),
            depth_two_tree((0, 0.25), (1, 0.25), (1, -0.25)),
        ],
        2,
        2,
    )
    .unwrap()
}

pub fn uniform_points<R: Rng>(n: usize, n_features: usize, rng: &mut R) -> Array2<f64> {
    Array2::from_shape_fn((n, n_features), |_| rng.gen_range(-1.0..1.0))
}
