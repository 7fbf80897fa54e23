//! Per-bucket estimates of the actual value behind each bucket.
//!
//! An encoder discretizes a scalar (or category) into a bucket and throws away the exact value.
//! To decode a predicted bucket back into a value, the classifier keeps an exponential moving
//! average of the values observed for every bucket:
//!
//! - The first observation of a bucket is stored as is, so the estimate is not biased toward 0.
//! - Later observations are blended in with `new = (1 - alpha) * old + alpha * value`.
//!
//! Buckets that were never observed read as 0.0 and are flagged as unset.

use serde::{Deserialize, Serialize};

/// Exponentially decayed actual value per bucket, plus a flag whether it was ever observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActualValues {
    /// Decay rate applied when blending in a new observation.
    alpha: f64,

    /// Current estimate per bucket.
    values: Vec<f64>,

    /// Whether a bucket received at least one observation.
    set: Vec<bool>,
}

impl ActualValues {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            values: Vec::new(),
            set: Vec::new(),
        }
    }

    /// Folds `value` into the estimate of `bucket`, growing the tracked buckets as needed.
    #[inline]
    pub fn observe(&mut self, bucket: usize, value: f64) {
        self.extend_to(bucket);

        if self.set[bucket] {
            self.values[bucket] = (1.0 - self.alpha) * self.values[bucket] + self.alpha * value;
        } else {
            self.values[bucket] = value;
            self.set[bucket] = true;
        }
    }

    /// Makes sure buckets `0..=bucket` are tracked. New buckets start at 0.0 and unset.
    #[inline]
    pub fn extend_to(&mut self, bucket: usize) {
        if bucket >= self.values.len() {
            self.values.resize(bucket + 1, 0.0);
            self.set.resize(bucket + 1, false);
        }
    }

    /// Returns the estimate of every bucket in `0..num_buckets`.
    pub fn snapshot(&self, num_buckets: usize) -> Vec<f64> {
        let mut snapshot = self.values.clone();
        snapshot.resize(num_buckets, 0.0);
        snapshot
    }

    /// The estimate for `bucket`, if it was ever observed.
    pub fn get(&self, bucket: usize) -> Option<f64> {
        match self.set.get(bucket) {
            Some(true) => Some(self.values[bucket]),
            _ => None,
        }
    }

    pub fn is_set(&self, bucket: usize) -> bool {
        self.set.get(bucket).copied().unwrap_or(false)
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn is_consistent(&self) -> bool {
        self.values.len() == self.set.len()
    }
}
