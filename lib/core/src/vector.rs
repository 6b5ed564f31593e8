use serde::{Deserialize, Serialize};

use crate::Result;

/// A sentence or word embedding
///
/// An empty vector is a valid value: it is what a sentence without a single
/// known word embeds to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    #[inline]
    #[must_use]
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    #[inline]
    #[must_use]
    pub fn from_slice(data: &[f32]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }

    #[inline]
    #[must_use]
    pub fn zeros(dim: usize) -> Self {
        Self {
            data: vec![0.0; dim],
        }
    }

    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self { data: Vec::new() }
    }

    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Vec<f32> {
        self.data
    }

    /// Euclidean distance to another embedding
    #[inline]
    pub fn l2_distance(&self, other: &Vector) -> Result<f32> {
        crate::distance::euclidean_distance(&self.data, &other.data)
    }

    /// Element-wise `self += other`; callers check dimensions first.
    #[inline]
    pub(crate) fn add_assign_slice(&mut self, other: &[f32]) {
        for (acc, x) in self.data.iter_mut().zip(other) {
            *acc += x;
        }
    }

    #[inline]
    pub(crate) fn divide(&mut self, divisor: f32) {
        for x in &mut self.data {
            *x /= divisor;
        }
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Vector::new(data)
    }
}
