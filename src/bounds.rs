#![allow(clippy::module_name_repetitions)]
use crate::error::AttackError;
use crate::RBAFloat;
use ndarray::{s, Array1, ArrayView1, Zip};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Axis-aligned box stored as a packed constraint list.
///
/// The first `ndim` entries are upper bounds (`x_i <= r[i]`) and the last
/// `ndim` entries are negated lower bounds (`-x_i <= r[ndim + i]`). With both
/// halves written as `<=` constraints, tightening any bound and intersecting
/// two boxes are both elementwise minimums.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Bounds {
    data: Array1<RBAFloat>,
}

impl Bounds {
    /// # Panics
    /// If `lower` and `upper` differ in length.
    pub fn new(lower: ArrayView1<RBAFloat>, upper: ArrayView1<RBAFloat>) -> Self {
        assert_eq!(lower.len(), upper.len());
        let mut data = Array1::zeros(2 * lower.len());
        data.slice_mut(s![..lower.len()]).assign(&upper);
        data.slice_mut(s![lower.len()..]).assign(&lower.mapv(|x| -x));
        Self { data }
    }

    /// The box covering the whole space.
    pub fn trivial(ndim: usize) -> Self {
        Self {
            data: Array1::from_elem(2 * ndim, RBAFloat::INFINITY),
        }
    }

    /// # Errors
    /// Fails if `data` cannot be split into an upper and a negated lower half.
    pub fn from_packed(data: Array1<RBAFloat>) -> Result<Self, AttackError> {
        if data.len() % 2 != 0 {
            return Err(AttackError::malformed(format!(
                "constraint list has odd length {}",
                data.len()
            )));
        }
        Ok(Self { data })
    }

    pub fn as_packed(&self) -> ArrayView1<RBAFloat> {
        self.data.view()
    }

    pub fn ndim(&self) -> usize {
        self.data.len() / 2
    }

    pub fn upper(&self) -> ArrayView1<RBAFloat> {
        self.data.slice(s![..self.ndim()])
    }

    pub fn neg_lower(&self) -> ArrayView1<RBAFloat> {
        self.data.slice(s![self.ndim()..])
    }

    pub fn lower(&self) -> Array1<RBAFloat> {
        self.neg_lower().mapv(|x| -x)
    }

    pub fn upper_bound(&self, dim: usize) -> RBAFloat {
        self.data[dim]
    }

    pub fn lower_bound(&self, dim: usize) -> RBAFloat {
        -self.data[self.ndim() + dim]
    }

    pub fn tighten_upper(&mut self, dim: usize, value: RBAFloat) {
        let slot = &mut self.data[dim];
        *slot = slot.min(value);
    }

    pub fn tighten_lower(&mut self, dim: usize, value: RBAFloat) {
        let ndim = self.ndim();
        let slot = &mut self.data[ndim + dim];
        *slot = slot.min(-value);
    }

    /// # Panics
    /// If the boxes live in spaces of different dimension.
    pub fn intersect(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.intersect_assign(other);
        out
    }

    /// # Panics
    /// If the boxes live in spaces of different dimension.
    pub fn intersect_assign(&mut self, other: &Self) {
        assert_eq!(self.data.len(), other.data.len());
        Zip::from(&mut self.data)
            .and(&other.data)
            .for_each(|a, &b| *a = a.min(b));
    }

    /// Every lower bound is at most its matching upper bound.
    pub fn is_consistent(&self) -> bool {
        Zip::from(self.upper())
            .and(self.neg_lower())
            .all(|&ub, &neg_lb| -neg_lb <= ub)
    }

    pub fn is_member(&self, x: &ArrayView1<RBAFloat>, eps: RBAFloat) -> bool {
        x.len() == self.ndim()
            && Zip::from(x)
                .and(self.upper())
                .and(self.neg_lower())
                .all(|&v, &ub, &neg_lb| -neg_lb - eps <= v && v <= ub + eps)
    }

    /// A point at least `margin` inside every finite face, or `None` if some
    /// dimension is too thin to hold one.
    pub fn interior_point(&self, margin: RBAFloat) -> Option<Array1<RBAFloat>> {
        let point: Option<Vec<RBAFloat>> = self
            .lower()
            .iter()
            .zip(self.upper())
            .map(|(&lb, &ub)| match (lb.is_finite(), ub.is_finite()) {
                (true, true) if ub - lb > 2. * margin => Some((lb + ub) / 2.),
                (true, true) => None,
                (true, false) => Some(lb + 2. * margin + 1.),
                (false, true) => Some(ub - 2. * margin - 1.),
                (false, false) => Some(0.),
            })
            .collect();
        point.map(Array1::from_vec)
    }
}

impl Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        write!(f, "Lower: {}\nUpper: {}", self.lower(), self.upper())
    }
}
