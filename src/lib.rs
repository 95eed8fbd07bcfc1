//! Minimum-norm adversarial perturbations for decision tree ensembles.
//!
//! The feature space of a majority-vote forest is partitioned into
//! axis-aligned regions on which the vote is constant. An attack finds, for a
//! sample, the closest point of any region that carries a different label,
//! measured in the L2 or L-infinity norm.
//!
//! [`AttackBuilder::build_exact`] enumerates every region of the forest.
//! [`AttackBuilder::build_approximate`] instead builds one region around each
//! training point and searches only those.
//!
//! ```no_run
//! use ndarray::array;
//! use rba_rs::{AttackBuilder, Forest, Norm, Tree};
//!
//! let forest = Forest::new(vec![Tree::stump(0, 0.5, 0, 1, 2); 3], 2, 1)?;
//! let attack = AttackBuilder::new(forest, Norm::LInf).build_exact()?;
//! let delta = attack.perturb(array![[0.]].view(), &[0])?.into_array()?;
//! # Ok::<(), rba_rs::AttackError>(())
//! ```
#![allow(clippy::must_use_candidate)]
extern crate good_lp;
extern crate ndarray;

pub mod attack;
pub mod bounds;
pub mod config;
pub mod constraint_system;
mod dispatch;
pub mod error;
pub mod extract;
pub mod inequality;
pub mod lp;
pub mod neighbors;
pub mod regions;
pub mod solver;
pub mod tree;
pub mod util;

#[cfg(test)]
mod test_util;

pub use attack::{AttackBuilder, PerturbationBatch, RegionAttack, SampleOutcome, SearchBudget};
pub use bounds::Bounds;
pub use config::AttackConfig;
pub use error::AttackError;
pub use regions::{Region, RegionStats};
pub use solver::Norm;
pub use tree::{Forest, Tree, TreeNode};

pub type RBAFloat = f64;
