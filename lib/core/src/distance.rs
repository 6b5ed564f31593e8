//! Euclidean distance between sentence embeddings.
//!
//! Both inputs must be non-empty and of equal length. Empty embeddings mean
//! "no word of the sentence had a vector" and can never be compared, so they
//! are reported as [`Error::EmptyEmbedding`] rather than as a distance.

use crate::{Error, Result};

/// `sqrt(Σ |a_i - b_i|²)`
#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.is_empty() || b.is_empty() {
        return Err(Error::EmptyEmbedding);
    }
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    Ok(squared_sum_of_differences(a, b).sqrt())
}

/// Two accumulators over chunks of four keep the loop free of dependencies
/// between iterations.
#[inline]
fn squared_sum_of_differences(a: &[f32], b: &[f32]) -> f32 {
    let mut even = 0.0f32;
    let mut odd = 0.0f32;

    let a_chunks = a.chunks_exact(4);
    let a_tail = a_chunks.remainder();
    let b_chunks = b.chunks_exact(4);
    let b_tail = b_chunks.remainder();

    for (x, y) in a_chunks.zip(b_chunks) {
        let d0 = x[0] - y[0];
        let d1 = x[1] - y[1];
        let d2 = x[2] - y[2];
        let d3 = x[3] - y[3];
        even += d0 * d0 + d1 * d1;
        odd += d2 * d2 + d3 * d3;
    }

    for (x, y) in a_tail.iter().zip(b_tail) {
        let d = x - y;
        even += d * d;
    }

    even + odd
}
