use crate::config::AttackConfig;
use crate::RBAFloat;
use ndarray::s;
use ndarray::Axis;
use ndarray::Zip;
use ndarray::{Array1, Array2};
use ndarray::{ArrayView1, ArrayView2};

#[derive(Clone, Debug, PartialEq)]
pub struct Inequality {
    coeffs: Array2<RBAFloat>, // rows are constraints and cols are vars, i.e. Ax <= b
    rhs: Array1<RBAFloat>,
}

impl Inequality {
    /// # Panics
    /// If the number of rows and right-hand sides differ.
    pub fn new(coeffs: Array2<RBAFloat>, rhs: Array1<RBAFloat>) -> Self {
        assert_eq!(coeffs.nrows(), rhs.len());
        Self { coeffs, rhs }
    }

    pub fn empty(ndim: usize) -> Self {
        Self {
            coeffs: Array2::zeros((0, ndim)),
            rhs: Array1::zeros(0),
        }
    }

    pub fn coeffs(&self) -> ArrayView2<RBAFloat> {
        self.coeffs.view()
    }

    pub fn rhs(&self) -> ArrayView1<RBAFloat> {
        self.rhs.view()
    }

    pub fn num_dims(&self) -> usize {
        self.coeffs.ncols()
    }

    pub fn num_constraints(&self) -> usize {
        self.rhs.len()
    }

    /// # Panics
    /// If `eqns` has a different number of variables.
    pub fn add_eqns(&mut self, eqns: &Self) {
        self.coeffs.append(Axis(0), eqns.coeffs.view()).unwrap();
        self.rhs.append(Axis(0), eqns.rhs.view()).unwrap();
    }

    pub fn rows(&self) -> impl Iterator<Item = (ArrayView1<'_, RBAFloat>, RBAFloat)> + '_ {
        self.coeffs.rows().into_iter().zip(self.rhs.iter().copied())
    }

    /// Whether `point` satisfies every row up to `eps`.
    pub fn is_member(&self, point: &ArrayView1<RBAFloat>, eps: RBAFloat) -> bool {
        let vals = self.coeffs.dot(point);
        Zip::from(&self.rhs)
            .and(&vals)
            .fold(true, |acc, ub, v| acc && (*v <= *ub + eps))
    }

    /// Drops rows with an infinite right-hand side, which constrain nothing.
    pub fn finite_rows(&self) -> Self {
        let keep: Vec<usize> = self
            .rhs
            .indexed_iter()
            .filter(|(_, b)| b.is_finite())
            .map(|(i, _)| i)
            .collect();
        Self {
            coeffs: self.coeffs.select(Axis(0), &keep),
            rhs: self.rhs.select(Axis(0), &keep),
        }
    }

    /// Shrinks every right-hand side by `tol`.
    #[must_use]
    pub fn tightened(&self, tol: RBAFloat) -> Self {
        Self {
            coeffs: self.coeffs.clone(),
            rhs: &self.rhs - tol,
        }
    }

    /// Appends `extra` zero-coefficient variables to every row.
    #[must_use]
    pub fn with_zero_columns(&self, extra: usize) -> Self {
        Self {
            coeffs: pad_columns(&self.coeffs, extra),
            rhs: self.rhs.clone(),
        }
    }
}

/// Equality rows `C x = d`.
#[derive(Clone, Debug, PartialEq)]
pub struct Equality {
    coeffs: Array2<RBAFloat>,
    rhs: Array1<RBAFloat>,
}

impl Equality {
    /// # Panics
    /// If the number of rows and right-hand sides differ.
    pub fn new(coeffs: Array2<RBAFloat>, rhs: Array1<RBAFloat>) -> Self {
        assert_eq!(coeffs.nrows(), rhs.len());
        Self { coeffs, rhs }
    }

    pub fn coeffs(&self) -> ArrayView2<RBAFloat> {
        self.coeffs.view()
    }

    pub fn rhs(&self) -> ArrayView1<RBAFloat> {
        self.rhs.view()
    }

    pub fn num_dims(&self) -> usize {
        self.coeffs.ncols()
    }

    pub fn num_constraints(&self) -> usize {
        self.rhs.len()
    }

    pub fn rows(&self) -> impl Iterator<Item = (ArrayView1<'_, RBAFloat>, RBAFloat)> + '_ {
        self.coeffs.rows().into_iter().zip(self.rhs.iter().copied())
    }

    pub fn is_member(&self, point: &ArrayView1<RBAFloat>, config: &AttackConfig) -> bool {
        let vals = self.coeffs.dot(point);
        Zip::from(&self.rhs)
            .and(&vals)
            .all(|&d, &v| config.is_close(v, d))
    }

    #[must_use]
    pub fn with_zero_columns(&self, extra: usize) -> Self {
        Self {
            coeffs: pad_columns(&self.coeffs, extra),
            rhs: self.rhs.clone(),
        }
    }
}

fn pad_columns(coeffs: &Array2<RBAFloat>, extra: usize) -> Array2<RBAFloat> {
    let mut padded = Array2::zeros((coeffs.nrows(), coeffs.ncols() + extra));
    padded.slice_mut(s![.., ..coeffs.ncols()]).assign(coeffs);
    padded
}
