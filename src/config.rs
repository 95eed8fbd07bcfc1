//! Numeric tolerances and execution settings for an attack
use crate::error::AttackError;
use crate::RBAFloat;
use approx::relative_eq;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AttackConfig {
    /// Slack subtracted from every finite inequality bound before solving, so
    /// that solutions sit strictly inside a region rather than on a split
    /// threshold the tree would route the other way.
    pub constraint_tol: RBAFloat,
    /// Relative tolerance used to decide that a lower and upper bound coincide.
    pub equality_rtol: RBAFloat,
    /// Absolute tolerance used to decide that a lower and upper bound coincide.
    pub equality_atol: RBAFloat,
    /// Worker threads for `perturb`; `None` runs on rayon's global pool.
    pub n_jobs: Option<usize>,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            constraint_tol: 5e-6,
            equality_rtol: 1e-5,
            equality_atol: 1e-8,
            n_jobs: None,
        }
    }
}

impl AttackConfig {
    /// # Errors
    /// Returns an error if the JSON is malformed or the values fail validation.
    pub fn from_json(json: &str) -> Result<Self, AttackError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_constraint_tol(mut self, tol: RBAFloat) -> Self {
        self.constraint_tol = tol;
        self
    }

    #[must_use]
    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    /// # Errors
    pub fn validate(&self) -> Result<(), AttackError> {
        let tolerances = [
            ("constraint_tol", self.constraint_tol),
            ("equality_rtol", self.equality_rtol),
            ("equality_atol", self.equality_atol),
        ];
        if let Some((name, value)) = tolerances
            .iter()
            .find(|(_, v)| !v.is_finite() || *v < 0.)
        {
            return Err(AttackError::InvalidConfig {
                detail: format!("{} must be finite and non-negative, got {}", name, value),
            });
        }
        if self.n_jobs == Some(0) {
            return Err(AttackError::InvalidConfig {
                detail: "n_jobs must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Whether two bounds describe the same value, in the sense of numpy's `isclose`.
    pub fn is_close(&self, a: RBAFloat, b: RBAFloat) -> bool {
        relative_eq!(
            a,
            b,
            epsilon = self.equality_atol,
            max_relative = self.equality_rtol
        )
    }
}
