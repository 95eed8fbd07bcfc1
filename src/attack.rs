//! Region-based attack: construction and batched perturbation search
use crate::config::AttackConfig;
use crate::dispatch::map_indices;
use crate::error::AttackError;
use crate::lp::{BoxProjectionOracle, GoodLpOracle, LinearOracle, QuadraticOracle};
use crate::neighbors::{BruteForceNeighbors, NeighborSearch};
use crate::regions::{build_instance_regions, enumerate_regions, Region, RegionStats};
use crate::solver::{Candidate, Norm, PerturbationSolver};
use crate::tree::Forest;
use crate::util::to_f32_precision;
use crate::RBAFloat;
use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How many training regions the approximate attack searches per sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum SearchBudget {
    All,
    /// The regions of the `k` nearest training points with a different label.
    Nearest(usize),
}

impl SearchBudget {
    /// Reads a search count where `-1` means every region.
    ///
    /// # Errors
    /// `InvalidSearchBudget` for zero or any other negative count.
    pub fn from_n_searches(n_searches: i64) -> Result<Self, AttackError> {
        match n_searches {
            -1 => Ok(Self::All),
            n if n > 0 => usize::try_from(n)
                .map(Self::Nearest)
                .map_err(|_| AttackError::InvalidSearchBudget),
            _ => Err(AttackError::InvalidSearchBudget),
        }
    }

    fn validate(self) -> Result<Self, AttackError> {
        match self {
            Self::Nearest(0) => Err(AttackError::InvalidSearchBudget),
            budget => Ok(budget),
        }
    }
}

enum CandidateSearch {
    All,
    Nearest {
        budget: usize,
        index: Box<dyn NeighborSearch>,
    },
}

enum RegionIndex {
    Exact {
        regions: Vec<Region>,
        stats: RegionStats,
    },
    Approximate {
        regions: Vec<Region>,
        /// Training points, rounded, one per region.
        anchors: Array2<RBAFloat>,
        search: CandidateSearch,
    },
}

/// Configures and constructs a [`RegionAttack`].
pub struct AttackBuilder {
    forest: Forest,
    norm: Norm,
    config: AttackConfig,
    lp: Box<dyn LinearOracle>,
    qp: Box<dyn QuadraticOracle>,
}

impl AttackBuilder {
    pub fn new(forest: Forest, norm: Norm) -> Self {
        Self {
            forest,
            norm,
            config: AttackConfig::default(),
            lp: Box::new(GoodLpOracle),
            qp: Box::new(BoxProjectionOracle::default()),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: AttackConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_lp_oracle<O: LinearOracle + 'static>(mut self, oracle: O) -> Self {
        self.lp = Box::new(oracle);
        self
    }

    #[must_use]
    pub fn with_qp_oracle<O: QuadraticOracle + 'static>(mut self, oracle: O) -> Self {
        self.qp = Box::new(oracle);
        self
    }

    /// Enumerates every decision region of the forest.
    ///
    /// # Errors
    /// `InvalidConfig` or `MalformedConstraint`.
    pub fn build_exact(self) -> Result<RegionAttack, AttackError> {
        self.config.validate()?;
        let (regions, stats) = enumerate_regions(&self.forest, self.lp.as_ref(), &self.config)?;
        Ok(self.finish(RegionIndex::Exact { regions, stats }))
    }

    /// Builds one region per training point and searches them nearest first,
    /// using a brute-force Euclidean index.
    ///
    /// # Errors
    /// See [`AttackBuilder::build_approximate_with_index`].
    pub fn build_approximate(
        self,
        train_x: ArrayView2<RBAFloat>,
        train_y: &[usize],
        budget: SearchBudget,
    ) -> Result<RegionAttack, AttackError> {
        let index = BruteForceNeighbors::new(train_x.mapv(to_f32_precision));
        self.build_approximate_with_index(train_x, train_y, budget, Box::new(index))
    }

    /// Like [`AttackBuilder::build_approximate`], ordering training points
    /// with `index`. The index must return positions into `train_x`.
    ///
    /// # Errors
    /// `InvalidSearchBudget` for `Nearest(0)`, `InvalidConfig`,
    /// `DimensionMismatch` or `LengthMismatch` for ill-shaped training data,
    /// and `MalformedConstraint` if a training point misses its own region.
    pub fn build_approximate_with_index(
        self,
        train_x: ArrayView2<RBAFloat>,
        train_y: &[usize],
        budget: SearchBudget,
        index: Box<dyn NeighborSearch>,
    ) -> Result<RegionAttack, AttackError> {
        let budget = budget.validate()?;
        self.config.validate()?;
        check_shape(&self.forest, &train_x, train_y)?;

        let anchors = train_x.mapv(to_f32_precision);
        let regions = build_instance_regions(&self.forest, &anchors.view(), &self.config)?;
        if !regions.is_empty() {
            let correct = regions
                .iter()
                .zip(train_y)
                .filter(|(region, &label)| region.label() == label)
                .count();
            #[allow(clippy::cast_precision_loss)]
            let accuracy = correct as RBAFloat / regions.len() as RBAFloat;
            info!("training accuracy of the forest: {:.4}", accuracy);
        }
        info!("number of instance regions: {}", regions.len());

        let search = match budget {
            SearchBudget::All => CandidateSearch::All,
            SearchBudget::Nearest(k) => CandidateSearch::Nearest { budget: k, index },
        };
        Ok(self.finish(RegionIndex::Approximate {
            regions,
            anchors,
            search,
        }))
    }

    fn finish(self, index: RegionIndex) -> RegionAttack {
        RegionAttack {
            forest: self.forest,
            norm: self.norm,
            config: self.config,
            lp: self.lp,
            qp: self.qp,
            index,
        }
    }
}

/// A forest together with its precomputed decision regions.
pub struct RegionAttack {
    forest: Forest,
    norm: Norm,
    config: AttackConfig,
    lp: Box<dyn LinearOracle>,
    qp: Box<dyn QuadraticOracle>,
    index: RegionIndex,
}

impl fmt::Debug for RegionAttack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionAttack")
            .field("norm", &self.norm)
            .field("n_trees", &self.forest.n_trees())
            .field("n_regions", &self.regions().len())
            .field("config", &self.config)
            .finish()
    }
}

impl RegionAttack {
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn norm(&self) -> Norm {
        self.norm
    }

    pub fn config(&self) -> &AttackConfig {
        &self.config
    }

    pub fn regions(&self) -> &[Region] {
        match &self.index {
            RegionIndex::Exact { regions, .. } | RegionIndex::Approximate { regions, .. } => {
                regions
            }
        }
    }

    /// Enumeration counts, for an exact attack.
    pub fn stats(&self) -> Option<RegionStats> {
        match &self.index {
            RegionIndex::Exact { stats, .. } => Some(*stats),
            RegionIndex::Approximate { .. } => None,
        }
    }

    /// Computes a label-changing perturbation for every row of `points`.
    ///
    /// Points are rounded to `f32` precision first. A sample the forest
    /// already misclassifies gets a zero perturbation. Samples fail
    /// independently; see [`PerturbationBatch`].
    ///
    /// # Errors
    /// `DimensionMismatch` or `LengthMismatch` if the inputs are ill-shaped,
    /// `ThreadPool` if the worker pool cannot be built.
    pub fn perturb(
        &self,
        points: ArrayView2<RBAFloat>,
        labels: &[usize],
    ) -> Result<PerturbationBatch, AttackError> {
        check_shape(&self.forest, &points, labels)?;
        let rounded = points.mapv(to_f32_precision);
        let predictions = self.forest.predict_batch(&rounded.view());
        let solver = PerturbationSolver::new(
            &self.forest,
            self.norm,
            self.lp.as_ref(),
            self.qp.as_ref(),
            &self.config,
        );

        let outcomes = map_indices(labels.len(), self.config.n_jobs, |idx| {
            let label = labels[idx];
            if predictions[idx] != label {
                return SampleOutcome::AlreadyMisclassified;
            }
            match self.search(&solver, rounded.row(idx), label) {
                Ok(delta) => SampleOutcome::Perturbed(delta),
                Err(e) => {
                    debug!("sample {} failed: {}", idx, e);
                    SampleOutcome::Failed(e)
                }
            }
        })?;

        let batch = PerturbationBatch {
            outcomes,
            n_features: self.forest.n_features(),
        };
        info!(
            "perturbed {} samples, {} failed",
            batch.len(),
            batch.num_failed()
        );
        Ok(batch)
    }

    fn search(
        &self,
        solver: &PerturbationSolver<'_>,
        x: ArrayView1<RBAFloat>,
        label: usize,
    ) -> Result<Array1<RBAFloat>, AttackError> {
        match &self.index {
            RegionIndex::Exact { regions, .. } => solver.solve(
                x,
                label,
                regions
                    .iter()
                    .filter(|region| region.label() != label)
                    .map(Candidate::new),
            ),
            RegionIndex::Approximate {
                regions,
                anchors,
                search,
            } => {
                let other_label = |&idx: &usize| regions[idx].label() != label;
                let candidate = |idx: usize| Candidate::anchored(&regions[idx], anchors.row(idx));
                match search {
                    CandidateSearch::All => solver.solve(
                        x,
                        label,
                        (0..regions.len()).filter(other_label).map(candidate),
                    ),
                    CandidateSearch::Nearest { budget, index } => {
                        let order = index.query(x);
                        if let Some(&bad) = order.iter().find(|&&idx| idx >= regions.len()) {
                            return Err(AttackError::NeighborOutOfRange {
                                index: bad,
                                n_points: regions.len(),
                            });
                        }
                        solver.solve(
                            x,
                            label,
                            order
                                .into_iter()
                                .filter(other_label)
                                .take(*budget)
                                .map(candidate),
                        )
                    }
                }
            }
        }
    }
}

fn check_shape(
    forest: &Forest,
    points: &ArrayView2<RBAFloat>,
    labels: &[usize],
) -> Result<(), AttackError> {
    if points.ncols() != forest.n_features() {
        return Err(AttackError::DimensionMismatch {
            expected: forest.n_features(),
            found: points.ncols(),
        });
    }
    if points.nrows() != labels.len() {
        return Err(AttackError::LengthMismatch {
            points: points.nrows(),
            labels: labels.len(),
        });
    }
    Ok(())
}

#[derive(Debug)]
pub enum SampleOutcome {
    AlreadyMisclassified,
    Perturbed(Array1<RBAFloat>),
    Failed(AttackError),
}

/// Per-sample results of [`RegionAttack::perturb`], in input order.
#[derive(Debug)]
pub struct PerturbationBatch {
    outcomes: Vec<SampleOutcome>,
    n_features: usize,
}

impl PerturbationBatch {
    pub fn outcomes(&self) -> &[SampleOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn num_failed(&self) -> usize {
        self.failures().count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &AttackError)> + '_ {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(idx, outcome)| match outcome {
                SampleOutcome::Failed(e) => Some((idx, e)),
                _ => None,
            })
    }

    /// One perturbation per row, zero for already misclassified samples.
    ///
    /// # Errors
    /// `SampleFailed` wrapping the first failed sample.
    pub fn into_array(self) -> Result<Array2<RBAFloat>, AttackError> {
        let mut out = Array2::zeros((self.outcomes.len(), self.n_features));
        for (idx, (outcome, mut row)) in self
            .outcomes
            .into_iter()
            .zip(out.axis_iter_mut(Axis(0)))
            .enumerate()
        {
            match outcome {
                SampleOutcome::AlreadyMisclassified => {}
                SampleOutcome::Perturbed(delta) => row.assign(&delta),
                SampleOutcome::Failed(source) => {
                    return Err(AttackError::SampleFailed {
                        index: idx,
                        source: Box::new(source),
                    })
                }
            }
        }
        Ok(out)
    }

    /// Checks that every perturbed sample, rounded as in `perturb`, changes
    /// the forest's prediction away from its label.
    ///
    /// # Errors
    /// `PostconditionViolated` naming the first offending sample, or a shape
    /// error if `points` and `labels` do not match the batch.
    pub fn verify(
        &self,
        forest: &Forest,
        points: ArrayView2<RBAFloat>,
        labels: &[usize],
    ) -> Result<(), AttackError> {
        check_shape(forest, &points, labels)?;
        if labels.len() != self.len() {
            return Err(AttackError::LengthMismatch {
                points: self.len(),
                labels: labels.len(),
            });
        }
        for (idx, outcome) in self.outcomes.iter().enumerate() {
            if let SampleOutcome::Perturbed(delta) = outcome {
                let moved = points.row(idx).mapv(to_f32_precision) + delta;
                if forest.predict(&moved.view()) == labels[idx] {
                    return Err(AttackError::PostconditionViolated { index: idx });
                }
            }
        }
        Ok(())
    }
}
