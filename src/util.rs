//! Utility functions
use crate::RBAFloat;
use good_lp::{IntoAffineExpression, Variable};
use ndarray::ArrayView1;
use std::collections::HashMap;

pub fn l2_norm(x: ArrayView1<RBAFloat>) -> RBAFloat {
    x.dot(&x).sqrt()
}

pub fn linf_norm(x: ArrayView1<RBAFloat>) -> RBAFloat {
    x.iter().fold(0., |acc: RBAFloat, v| acc.max(v.abs()))
}

/// Rounds a value to single precision, the precision trees route samples at.
#[allow(clippy::cast_possible_truncation)]
pub fn to_f32_precision(x: RBAFloat) -> RBAFloat {
    RBAFloat::from(x as f32)
}

/// Returns the dimension and coefficient of the only nonzero entry of `row`.
pub fn axis_of_row(row: ArrayView1<RBAFloat>) -> Option<(usize, RBAFloat)> {
    let mut nonzero = row.indexed_iter().filter(|(_, &v)| v != 0.);
    match (nonzero.next(), nonzero.next()) {
        (Some((dim, &coeff)), None) => Some((dim, coeff)),
        _ => None,
    }
}

/// An linear expression without a constant component
#[derive(Clone)]
pub struct LinearExpression {
    pub coefficients: HashMap<Variable, f64>,
}

impl LinearExpression {
    pub fn new<'a, I>(vars: &[Variable], coeffs: I) -> Self
    where
        I: IntoIterator<Item = &'a RBAFloat>,
    {
        Self {
            coefficients: vars
                .iter()
                .copied()
                .zip(coeffs.into_iter().copied())
                .filter(|(_, c)| *c != 0.)
                .collect(),
        }
    }
}

impl IntoAffineExpression for LinearExpression {
    type Iter = std::collections::hash_map::IntoIter<Variable, f64>;

    #[inline]
    fn linear_coefficients(self) -> Self::Iter {
        self.coefficients.into_iter()
    }
}
