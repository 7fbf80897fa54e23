//! Sparse weight storage for the SDR classifier.
//!
//! Every prediction step owns a `WeightMatrix` that links input bits (rows) to buckets (columns).
//! Only coordinates that have received a weight update are stored, so memory grows with the
//! number of (bit, bucket) pairs actually learned rather than with the full input space.
//!
//! Reading and writing are deliberately separate entry points:
//! - `read` never allocates, a missing coordinate simply reads as 0.0.
//! - `accumulate` creates the coordinate (starting from 0.0) before adding the delta.
//!
//! The `WeightStore` bundles the matrices of all steps together with the highest input bit and
//! bucket index seen so far. Both maxima only ever grow.

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A sparse 2D matrix of weights indexed as [input_bit][bucket].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightMatrix {
    rows: FxHashMap<usize, FxHashMap<usize, f64>>,
}

impl WeightMatrix {
    /// Returns the weight linking `bit` to `bucket`, or 0.0 if it was never written.
    #[inline]
    pub fn read(&self, bit: usize, bucket: usize) -> f64 {
        self.rows
            .get(&bit)
            .and_then(|row| row.get(&bucket))
            .copied()
            .unwrap_or(0.0)
    }

    /// Adds `delta` to the weight linking `bit` to `bucket`, materializing it if needed.
    #[inline]
    pub fn accumulate(&mut self, bit: usize, bucket: usize, delta: f64) {
        *self
            .rows
            .entry(bit)
            .or_default()
            .entry(bucket)
            .or_insert(0.0) += delta;
    }

    /// Adds the weights of every active bit into `into`, one slot per bucket.
    /// Buckets beyond `into.len()` are ignored.
    #[inline]
    pub fn add_activations(&self, pattern: &[usize], into: &mut [f64]) {
        for bit in pattern {
            if let Some(row) = self.rows.get(bit) {
                for (&bucket, &weight) in row {
                    if let Some(activation) = into.get_mut(bucket) {
                        *activation += weight;
                    }
                }
            }
        }
    }

    /// The number of materialized (bit, bucket) entries.
    pub fn len(&self) -> usize {
        self.rows.values().map(|row| row.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.values().all(|row| row.is_empty())
    }

    /// Highest row and column index stored, if any.
    pub(crate) fn max_indices(&self) -> Option<(usize, usize)> {
        let max_bit = self.rows.keys().copied().max()?;
        let max_bucket = self
            .rows
            .values()
            .flat_map(|row| row.keys().copied())
            .max()?;
        Some((max_bit, max_bucket))
    }
}

/// Weight matrices for all prediction steps plus the size of the input and bucket universes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightStore {
    /// One sparse matrix per prediction step.
    matrices: FxHashMap<u32, WeightMatrix>,

    /// Highest input bit seen so far.
    max_input_idx: Option<usize>,

    /// Highest bucket index seen so far.
    max_bucket_idx: Option<usize>,
}

impl WeightStore {
    /// Creates an empty store with one matrix per step.
    pub fn new(steps: &[u32]) -> Self {
        Self {
            matrices: steps
                .iter()
                .map(|&step| (step, WeightMatrix::default()))
                .collect(),
            max_input_idx: None,
            max_bucket_idx: None,
        }
    }

    /// Returns the weight for (`bit`, `bucket`) of the given step without allocating.
    #[inline]
    pub fn read(&self, step: u32, bit: usize, bucket: usize) -> f64 {
        self.matrices
            .get(&step)
            .map_or(0.0, |matrix| matrix.read(bit, bucket))
    }

    /// Adds `delta` to the weight for (`bit`, `bucket`) of the given step, growing the input and
    /// bucket universes as needed.
    #[inline]
    pub fn accumulate(&mut self, step: u32, bit: usize, bucket: usize, delta: f64) {
        self.extend_inputs(bit);
        self.extend_buckets(bucket);
        self.matrices
            .entry(step)
            .or_default()
            .accumulate(bit, bucket, delta);
    }

    /// Makes sure input bit `bit` is part of the input universe.
    #[inline]
    pub fn extend_inputs(&mut self, bit: usize) {
        self.max_input_idx = self.max_input_idx.max(Some(bit));
    }

    /// Makes sure `bucket` is part of the bucket universe.
    #[inline]
    pub fn extend_buckets(&mut self, bucket: usize) {
        self.max_bucket_idx = self.max_bucket_idx.max(Some(bucket));
    }

    /// Computes the raw score of every bucket for `pattern`: the sum of the weights of all
    /// active bits. The result has one entry per known bucket.
    pub fn activations(&self, step: u32, pattern: &[usize]) -> Vec<f64> {
        let mut activations = vec![0.0; self.num_buckets()];

        if let Some(matrix) = self.matrices.get(&step) {
            matrix.add_activations(pattern, &mut activations);
        }

        activations
    }

    pub fn matrix(&self, step: u32) -> Option<&WeightMatrix> {
        self.matrices.get(&step)
    }

    pub fn max_input_idx(&self) -> Option<usize> {
        self.max_input_idx
    }

    pub fn max_bucket_idx(&self) -> Option<usize> {
        self.max_bucket_idx
    }

    /// The number of buckets in the bucket universe (0 before any bucket was seen).
    #[inline]
    pub fn num_buckets(&self) -> usize {
        self.max_bucket_idx.map_or(0, |max| max + 1)
    }

    /// Checks that there is exactly one matrix per step.
    pub(crate) fn has_steps(&self, steps: &[u32]) -> bool {
        self.matrices.len() == steps.len()
            && steps.iter().all(|step| self.matrices.contains_key(step))
    }

    /// Checks that every stored coordinate lies inside the recorded universes.
    pub(crate) fn is_consistent(&self) -> bool {
        self.matrices
            .values()
            .filter_map(WeightMatrix::max_indices)
            .all(|(bit, bucket)| {
                Some(bit) <= self.max_input_idx && Some(bucket) <= self.max_bucket_idx
            })
    }
}
