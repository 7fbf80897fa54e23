//! Probability helpers shared by learning and inference.
//!
//! `softmax` turns the per-bucket activation scores into a probability distribution. The maximum
//! score is subtracted before exponentiating, so large weights never overflow and equal scores
//! (e.g. the all-zero scores of a fresh classifier) yield the uniform distribution.
//!
//! `argmax` picks the most likely bucket of such a distribution.

/// Probability density over buckets, indexed by bucket.
pub type Pdf = Vec<f64>;

/// Normalizes `scores` in place into a probability distribution that sums to 1.
///
/// Scores are expected to be finite, which the learned weights always are. An empty slice, or
/// one whose largest score is infinite, is left untouched and is therefore not a distribution.
#[inline]
pub fn softmax(scores: &mut [f64]) {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if !max.is_finite() {
        return;
    }

    for score in scores.iter_mut() {
        *score = (*score - max).exp();
    }

    let total: f64 = scores.iter().sum();

    for score in scores.iter_mut() {
        *score /= total;
    }
}

/// Returns the index of the most probable bucket, or `None` for an empty distribution.
///
/// Ties resolve to the lowest index.
#[inline]
pub fn argmax(pdf: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (bucket, &probability) in pdf.iter().enumerate() {
        match best {
            Some((_, max)) if probability <= max => {}
            _ => best = Some((bucket, probability)),
        }
    }

    best.map(|(bucket, _)| bucket)
}
