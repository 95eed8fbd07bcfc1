#![cfg(test)]
use crate::bounds::Bounds;
use crate::tree::{Forest, Tree, TreeNode};
use crate::RBAFloat;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;
use proptest::arbitrary::functor::ArbitraryF1;
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::sample::SizeRange;

prop_compose! {
    pub fn array1(len: usize)(v in Vec::lift1_with(-10. .. 10., SizeRange::new(len..=len))) -> Array1<RBAFloat> {
        Array1::from_vec(v)
    }
}

prop_compose! {
    pub fn array2(rows: usize, cols: usize)(v in Vec::lift1_with(array1(cols), SizeRange::new(rows..=rows))) -> Array2<RBAFloat> {
        assert!(rows > 0);
        ndarray::stack(Axis(0), &v.iter().map(|x| x.view()).collect::<Vec<ArrayView1<RBAFloat>>>()).unwrap()
    }
}

/// One dimension of a box: regular, pinned, or open on one or both sides.
fn interval() -> impl Strategy<Value = (RBAFloat, RBAFloat)> {
    let inf = RBAFloat::INFINITY;
    prop_oneof![
        3 => (-10. .. 10., 0.1 .. 10.).prop_map(|(lower, width)| (lower, lower + width)),
        1 => (-10. .. 10.).prop_map(|v| (v, v)),
        1 => (-10. .. 10.).prop_map(move |v| (-inf, v)),
        1 => (-10. .. 10.).prop_map(move |v| (v, inf)),
        1 => Just((-inf, inf)),
    ]
}

prop_compose! {
    pub fn bounds1(len: usize)(dims in vec(interval(), len)) -> Bounds {
        let (lower, upper): (Vec<_>, Vec<_>) = dims.into_iter().unzip();
        Bounds::new(Array1::from_vec(lower).view(), Array1::from_vec(upper).view())
    }
}

/// Complete tree of `depth` splits per path, nodes numbered in preorder,
/// thresholds on a grid of 0.25.
fn build_full_tree(
    depth: usize,
    splits: &mut impl Iterator<Item = (usize, i32)>,
    leaves: &mut impl Iterator<Item = Vec<u8>>,
    nodes: &mut Vec<TreeNode>,
) -> usize {
    let id = nodes.len();
    if depth == 0 {
        let value = leaves.next().unwrap().into_iter().map(RBAFloat::from).collect();
        nodes.push(TreeNode::Leaf { value });
        return id;
    }
    let (feature, step) = splits.next().unwrap();
    nodes.push(TreeNode::Leaf { value: vec![] });
    let left = build_full_tree(depth - 1, splits, leaves, nodes);
    let right = build_full_tree(depth - 1, splits, leaves, nodes);
    nodes[id] = TreeNode::Split {
        feature,
        threshold: RBAFloat::from(step) * 0.25,
        left,
        right,
    };
    id
}

prop_compose! {
    pub fn full_tree(depth: usize, n_features: usize, n_classes: usize)
        (splits in vec((0..n_features, -8_i32..8), (1 << depth) - 1),
         leaves in vec(vec(0_u8..5, n_classes), 1 << depth)) -> Tree {
        let mut nodes = vec![];
        build_full_tree(depth, &mut splits.into_iter(), &mut leaves.into_iter(), &mut nodes);
        Tree::new(nodes).unwrap()
    }
}

prop_compose! {
    pub fn forest(n_trees: usize, depth: usize, n_features: usize, n_classes: usize)
        (trees in vec(full_tree(depth, n_features, n_classes), n_trees)) -> Forest {
        Forest::new(trees, n_classes, n_features).unwrap()
    }
}
