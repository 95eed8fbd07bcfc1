//! Read-only decision trees and the majority-vote forest built from them
use crate::error::AttackError;
use crate::util::to_f32_precision;
use crate::RBAFloat;
use ndarray::{ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Samples with `x[feature] <= threshold` go to `left`, the rest to `right`.
    Split {
        feature: usize,
        threshold: RBAFloat,
        left: usize,
        right: usize,
    },
    /// Per-class training weight that reached this leaf.
    Leaf { value: Vec<RBAFloat> },
}

/// A decision tree rooted at node 0.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    /// # Errors
    /// Fails if a child index is out of range or does not come after its parent.
    pub fn new(nodes: Vec<TreeNode>) -> Result<Self, AttackError> {
        let tree = Self { nodes };
        tree.check_structure()?;
        Ok(tree)
    }

    /// A depth-one tree splitting on `feature` at `threshold`.
    pub fn stump(
        feature: usize,
        threshold: RBAFloat,
        left_class: usize,
        right_class: usize,
        n_classes: usize,
    ) -> Self {
        let one_hot = |class: usize| {
            (0..n_classes)
                .map(|c| if c == class { 1. } else { 0. })
                .collect()
        };
        Self {
            nodes: vec![
                TreeNode::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf {
                    value: one_hot(left_class),
                },
                TreeNode::Leaf {
                    value: one_hot(right_class),
                },
            ],
        }
    }

    fn check_structure(&self) -> Result<(), AttackError> {
        if self.nodes.is_empty() {
            return Err(AttackError::InvalidForest {
                detail: "tree has no nodes".to_string(),
            });
        }
        for (id, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split { left, right, .. } => {
                    if [*left, *right]
                        .iter()
                        .any(|&child| child <= id || child >= self.nodes.len())
                    {
                        return Err(AttackError::InvalidForest {
                            detail: format!("node {} has an invalid child", id),
                        });
                    }
                }
                TreeNode::Leaf { value } if value.is_empty() => {
                    return Err(AttackError::InvalidForest {
                        detail: format!("leaf {} has no class values", id),
                    });
                }
                TreeNode::Leaf { .. } => {}
            }
        }
        Ok(())
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: usize) -> &TreeNode {
        &self.nodes[id]
    }

    /// Majority class of a leaf (lowest index on ties), `None` for split nodes.
    pub fn leaf_class(&self, id: usize) -> Option<usize> {
        match &self.nodes[id] {
            TreeNode::Leaf { value } => Some(argmax_first(value)),
            TreeNode::Split { .. } => None,
        }
    }

    /// Child a sample is routed to at split node `id`, or `None` at a leaf.
    ///
    /// The feature value is compared at single precision.
    pub fn route(&self, id: usize, x: &ArrayView1<RBAFloat>) -> Option<usize> {
        match self.nodes[id] {
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => Some(if to_f32_precision(x[feature]) <= threshold {
                left
            } else {
                right
            }),
            TreeNode::Leaf { .. } => None,
        }
    }

    /// Node ids from the root to the leaf `x` lands in, inclusive.
    pub fn decision_path(&self, x: &ArrayView1<RBAFloat>) -> Vec<usize> {
        let mut path = vec![0];
        let mut current = 0;
        while let Some(next) = self.route(current, x) {
            path.push(next);
            current = next;
        }
        path
    }

    /// Id of the leaf `x` lands in.
    pub fn apply(&self, x: &ArrayView1<RBAFloat>) -> usize {
        let mut current = 0;
        while let Some(next) = self.route(current, x) {
            current = next;
        }
        current
    }

    pub fn predict(&self, x: &ArrayView1<RBAFloat>) -> usize {
        argmax_first(match &self.nodes[self.apply(x)] {
            TreeNode::Leaf { value } => value,
            TreeNode::Split { .. } => unreachable!(),
        })
    }

    /// Highest feature index used by any split, if any.
    fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                TreeNode::Split { feature, .. } => Some(*feature),
                TreeNode::Leaf { .. } => None,
            })
            .max()
    }
}

/// Ensemble of decision trees voting by majority.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Forest {
    trees: Vec<Tree>,
    n_classes: usize,
    n_features: usize,
}

impl Forest {
    /// # Errors
    /// Fails on an empty ensemble, a tree that is structurally invalid, a split
    /// on a feature outside `n_features`, or a leaf whose class values do not
    /// match `n_classes`.
    pub fn new(trees: Vec<Tree>, n_classes: usize, n_features: usize) -> Result<Self, AttackError> {
        let forest = Self {
            trees,
            n_classes,
            n_features,
        };
        forest.validate()?;
        Ok(forest)
    }

    /// Loads an exported ensemble.
    ///
    /// # Errors
    pub fn from_json(json: &str) -> Result<Self, AttackError> {
        let forest: Self = serde_json::from_str(json)?;
        forest.validate()?;
        Ok(forest)
    }

    /// # Errors
    pub fn to_json(&self) -> Result<String, AttackError> {
        Ok(serde_json::to_string(self)?)
    }

    fn validate(&self) -> Result<(), AttackError> {
        let invalid = |detail: String| Err(AttackError::InvalidForest { detail });
        if self.trees.is_empty() {
            return invalid("forest has no trees".to_string());
        }
        if self.n_classes == 0 || self.n_features == 0 {
            return invalid("forest needs at least one class and one feature".to_string());
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.check_structure()?;
            if let Some(feature) = tree.max_feature() {
                if feature >= self.n_features {
                    return invalid(format!("tree {} splits on feature {}", idx, feature));
                }
            }
            let bad_leaf = tree.nodes.iter().any(|node| {
                matches!(node, TreeNode::Leaf { value } if value.len() != self.n_classes)
            });
            if bad_leaf {
                return invalid(format!(
                    "tree {} has a leaf without {} class values",
                    idx, self.n_classes
                ));
            }
        }
        Ok(())
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Class predicted by each tree.
    pub fn tree_votes(&self, x: &ArrayView1<RBAFloat>) -> Vec<usize> {
        self.trees.iter().map(|tree| tree.predict(x)).collect()
    }

    pub fn predict(&self, x: &ArrayView1<RBAFloat>) -> usize {
        majority_vote(self.tree_votes(x), self.n_classes)
    }

    pub fn predict_batch(&self, xs: &ArrayView2<RBAFloat>) -> Vec<usize> {
        xs.axis_iter(Axis(0)).map(|x| self.predict(&x)).collect()
    }
}

/// Most frequent class among `votes`, lowest class index on ties.
pub fn majority_vote<I: IntoIterator<Item = usize>>(votes: I, n_classes: usize) -> usize {
    let mut counts = vec![0_usize; n_classes];
    votes.into_iter().for_each(|class| counts[class] += 1);
    counts
        .iter()
        .enumerate()
        .max_by_key(|&(class, &count)| (count, Reverse(class)))
        .map_or(0, |(class, _)| class)
}

fn argmax_first(values: &[RBAFloat]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, RBAFloat::NEG_INFINITY), |(best, best_val), (idx, &v)| {
            if v > best_val {
                (idx, v)
            } else {
                (best, best_val)
            }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn depth_two_tree() -> Tree {
        Tree::new(vec![
            TreeNode::Split {
                feature: 0,
                threshold: 0.5,
                left: 1,
                right: 4,
            },
            TreeNode::Split {
                feature: 1,
                threshold: -1.,
                left: 2,
                right: 3,
            },
            TreeNode::Leaf {
                value: vec![5., 1.],
            },
            TreeNode::Leaf {
                value: vec![2., 2.],
            },
            TreeNode::Leaf {
                value: vec![0., 3.],
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_majority_vote_ties_go_to_lowest_class() {
        assert_eq!(majority_vote(vec![1, 0], 2), 0);
        assert_eq!(majority_vote(vec![2, 1, 2, 1], 3), 1);
        assert_eq!(majority_vote(vec![2, 2, 0], 3), 2);
        assert_eq!(majority_vote(vec![], 3), 0);
    }

    #[test]
    fn test_leaf_class_ties_go_to_lowest_class() {
        let tree = depth_two_tree();
        assert_eq!(tree.leaf_class(2), Some(0));
        assert_eq!(tree.leaf_class(3), Some(0));
        assert_eq!(tree.leaf_class(4), Some(1));
        assert_eq!(tree.leaf_class(0), None);
    }

    #[test]
    fn test_decision_path() {
        let tree = depth_two_tree();
        assert_eq!(tree.decision_path(&array![0., 0.].view()), vec![0, 1, 3]);
        assert_eq!(tree.decision_path(&array![0.7, 0.].view()), vec![0, 4]);
        assert_eq!(tree.apply(&array![0.5, -1.].view()), 2);
    }

    #[test]
    fn test_routing_uses_single_precision() {
        // 0.5 + 1e-9 rounds to 0.5 in f32 and therefore goes left
        let tree = Tree::stump(0, 0.5, 0, 1, 2);
        assert_eq!(tree.predict(&array![0.5 + 1e-9].view()), 0);
        assert_eq!(tree.predict(&array![0.5 + 1e-6].view()), 1);
    }

    #[test]
    fn test_forest_predict() {
        let forest = Forest::new(
            vec![
                Tree::stump(0, 0.5, 0, 1, 2),
                Tree::stump(0, 0.2, 0, 1, 2),
                Tree::stump(1, 0.0, 1, 0, 2),
            ],
            2,
            2,
        )
        .unwrap();
        assert_eq!(forest.tree_votes(&array![0.3, 1.].view()), vec![0, 1, 0]);
        assert_eq!(forest.predict(&array![0.3, 1.].view()), 0);
        assert_eq!(forest.predict(&array![0.3, -1.].view()), 1);
        assert_eq!(
            forest.predict_batch(&array![[0.3, 1.], [0.3, -1.]].view()),
            vec![0, 1]
        );
    }

    #[test]
    fn test_forest_validation() {
        assert!(Forest::new(vec![], 2, 1).is_err());
        assert!(Forest::new(vec![Tree::stump(3, 0., 0, 1, 2)], 2, 2).is_err());
        assert!(Forest::new(vec![Tree::stump(0, 0., 0, 1, 3)], 2, 2).is_err());
        assert!(Tree::new(vec![TreeNode::Split {
            feature: 0,
            threshold: 0.,
            left: 0,
            right: 1
        }])
        .is_err());
    }

    #[test]
    fn test_json_loading() {
        let json = r#"{
            "n_classes": 2,
            "n_features": 1,
            "trees": [{"nodes": [
                {"kind": "split", "feature": 0, "threshold": 0.5, "left": 1, "right": 2},
                {"kind": "leaf", "value": [1.0, 0.0]},
                {"kind": "leaf", "value": [0.0, 1.0]}
            ]}]
        }"#;
        let forest = Forest::from_json(json).unwrap();
        assert_eq!(forest.trees()[0], Tree::stump(0, 0.5, 0, 1, 2));
        assert!(Forest::from_json(r#"{"n_classes": 2, "n_features": 1, "trees": []}"#).is_err());
    }
}
