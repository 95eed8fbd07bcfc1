use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttackError {
    /// A constraint row that is not a single `+1`/`-1` entry, or a region that
    /// fails its own consistency check.
    #[error("malformed constraint: {detail}")]
    MalformedConstraint { detail: String },
    #[error("no candidate region produced a usable perturbation ({searched} searched, {skipped} skipped)")]
    NoUsableRegion { searched: usize, skipped: usize },
    #[error("neighbor search returned index {index} for {n_points} training points")]
    NeighborOutOfRange { index: usize, n_points: usize },
    #[error("search budget must be positive or unbounded")]
    InvalidSearchBudget,
    #[error("invalid configuration: {detail}")]
    InvalidConfig { detail: String },
    #[error("invalid forest: {detail}")]
    InvalidForest { detail: String },
    #[error("expected {expected} features, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("{points} points but {labels} labels")]
    LengthMismatch { points: usize, labels: usize },
    #[error("sample {index} failed")]
    SampleFailed {
        index: usize,
        #[source]
        source: Box<AttackError>,
    },
    #[error("perturbation of sample {index} does not change its prediction")]
    PostconditionViolated { index: usize },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl AttackError {
    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedConstraint {
            detail: detail.into(),
        }
    }
}
