//! Box constraints `lower <= x <= upper` for the projected solvers.

use num_traits::Float;

use crate::error::LaError;

/// Per-component bounds. Infinite entries leave a side unconstrained.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds<T> {
    lower: Vec<T>,
    upper: Vec<T>,
}

/// Which bound holds a component fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Lower,
    Upper,
}

impl<T: Float> Bounds<T> {
    /// Checks equal lengths, no NaN, and `lower[i] <= upper[i]`.
    pub fn new(lower: Vec<T>, upper: Vec<T>) -> Result<Self, LaError> {
        if lower.len() != upper.len() {
            return Err(LaError::InvalidBounds(format!(
                "{} lower bounds but {} upper bounds",
                lower.len(),
                upper.len()
            )));
        }
        for (i, (&l, &u)) in lower.iter().zip(&upper).enumerate() {
            if l.is_nan() || u.is_nan() || l > u {
                return Err(LaError::InvalidBounds(format!("component {i}: lower bound exceeds upper bound")));
            }
        }
        Ok(Self { lower, upper })
    }

    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: vec![T::neg_infinity(); n],
            upper: vec![T::infinity(); n],
        }
    }

    /// `x >= 0`, the complementarity setting.
    pub fn nonnegative(n: usize) -> Self {
        Self {
            lower: vec![T::zero(); n],
            upper: vec![T::infinity(); n],
        }
    }

    /// The same interval for every component.
    pub fn uniform(n: usize, lower: T, upper: T) -> Result<Self, LaError> {
        Self::new(vec![lower; n], vec![upper; n])
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    pub fn lower(&self) -> &[T] {
        &self.lower
    }

    pub fn upper(&self) -> &[T] {
        &self.upper
    }

    #[inline]
    pub fn clamp(&self, i: usize, v: T) -> T {
        v.max(self.lower[i]).min(self.upper[i])
    }

    /// Clamps every component of `x` into its interval.
    pub fn project(&self, x: &mut [T]) {
        for (i, v) in x.iter_mut().enumerate() {
            *v = self.clamp(i, *v);
        }
    }

    /// The bound `x[i]` sits on, if any.
    pub fn touching(&self, i: usize, v: T) -> Option<Side> {
        if v <= self.lower[i] {
            Some(Side::Lower)
        } else if v >= self.upper[i] {
            Some(Side::Upper)
        } else {
            None
        }
    }

    pub(crate) fn check_len(&self, n: usize) -> Result<(), LaError> {
        if self.len() == n {
            Ok(())
        } else {
            Err(LaError::InvalidBounds(format!("{} bounds for a system of size {}", self.len(), n)))
        }
    }
}
