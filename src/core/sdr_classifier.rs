//! SDRClassifier module for HTM.
//!
//! Learns to map sparse distributed representations (SDRs) to future discrete output classes (buckets)
//! for multiple prediction steps. It trains one sparse weight matrix per step using error-driven learning,
//! associating past input patterns with the buckets observed `step` records later. When using inference,
//! it predicts the bucket probabilities of every step for the current input pattern.
//!
//! Mechanism:
//! - Records recent sparse input patterns together with their record numbers.
//! - Maintains a sparse weight matrix per prediction step linking active input bits to output buckets.
//! - For each new sample:
//!     - Looks up the pattern seen exactly `step` records ago (skipping the step if that record is missing).
//!     - Computes the softmax distribution the weights assign to that pattern and compares it to the
//!       target distribution (one-hot, or uniform over all given buckets for multi-label samples).
//!     - Moves the weights of every active bit of the old pattern by `alpha * (target - predicted)`.
//!     - Tracks an exponentially decayed actual value per bucket for decoding predictions.
//!
//! Inference:
//! - Sums the weights of the active bits for each bucket and normalizes the sums with a softmax.
//! - This yields a probability distribution (sums to 1) per step, plus the actual value estimates.
//!
//! Persistence:
//! - The complete state is written with bincode, prefixed by `SDR_CLASSIFIER_VERSION`.
//! - Loading a stream of any other version fails without modifying the classifier.

use super::{
    actual_values::ActualValues,
    error::ClassifierError,
    params::SDRClassifierParams,
    pattern_history::PatternHistory,
    softmax::{self, Pdf},
    weight_matrix::WeightStore,
};
use anyhow::{ensure, Context, Result};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Version of the serialized classifier format.
pub const SDR_CLASSIFIER_VERSION: u32 = 2;

/// Identifies one vector of a `ClassifierResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResultKey {
    /// The current actual value estimate of every bucket.
    ActualValues,

    /// The bucket probabilities predicted for the given number of steps ahead.
    Prediction(u32),
}

impl ResultKey {
    /// The integer key used for the actual values by consumers that key results by step number.
    pub const LEGACY_ACTUAL_VALUES: i64 = -1;

    /// Converts to the integer key scheme: the step number, or -1 for the actual values.
    pub fn legacy_key(self) -> i64 {
        match self {
            Self::ActualValues => Self::LEGACY_ACTUAL_VALUES,
            Self::Prediction(step) => step as i64,
        }
    }

    /// Inverse of `legacy_key`.
    pub fn from_legacy_key(key: i64) -> Option<Self> {
        match key {
            Self::LEGACY_ACTUAL_VALUES => Some(Self::ActualValues),
            step => u32::try_from(step).ok().map(Self::Prediction),
        }
    }
}

/// The output of an inference: one PDF per prediction step and the actual value estimates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifierResult {
    entries: BTreeMap<ResultKey, Pdf>,
}

impl ClassifierResult {
    /// Stores `values` under `key`, replacing any previous vector.
    pub fn insert(&mut self, key: ResultKey, values: Pdf) {
        self.entries.insert(key, values);
    }

    /// The vector stored under `key`.
    pub fn get(&self, key: ResultKey) -> Option<&[f64]> {
        self.entries.get(&key).map(Vec::as_slice)
    }

    /// The bucket probabilities predicted for `step` records ahead.
    pub fn prediction(&self, step: u32) -> Option<&[f64]> {
        self.get(ResultKey::Prediction(step))
    }

    /// The actual value estimate of every bucket.
    pub fn actual_values(&self) -> Option<&[f64]> {
        self.get(ResultKey::ActualValues)
    }

    /// Iterates over `(step, pdf)` pairs in ascending step order.
    pub fn predictions(&self) -> impl Iterator<Item = (u32, &[f64])> {
        self.entries.iter().filter_map(|(key, pdf)| match key {
            ResultKey::Prediction(step) => Some((*step, pdf.as_slice())),
            ResultKey::ActualValues => None,
        })
    }

    /// The most likely bucket for `step` records ahead.
    pub fn classification(&self, step: u32) -> Option<usize> {
        self.prediction(step).and_then(softmax::argmax)
    }

    /// The actual value estimate of the most likely bucket for `step` records ahead.
    pub fn most_likely_value(&self, step: u32) -> Option<f64> {
        let bucket = self.classification(step)?;
        self.actual_values()?.get(bucket).copied()
    }

    /// Iterates over all entries, the actual values first and then the steps in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (&ResultKey, &Pdf)> {
        self.entries.iter()
    }

    /// The number of stored vectors, including the actual values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-keys the result with the integer key scheme (see `ResultKey::legacy_key`).
    pub fn into_legacy_map(self) -> BTreeMap<i64, Pdf> {
        self.entries
            .into_iter()
            .map(|(key, values)| (key.legacy_key(), values))
            .collect()
    }
}

/// A classifier that learns a mapping from a sparse distributed representation (SDR)
/// to target buckets, with support for multi-step prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SDRClassifier {
    /// Learning rate for weight updates.
    alpha: f64,

    /// The prediction steps (horizons) that the classifier learns, sorted and unique.
    steps: Vec<u32>,

    /// Logging verbosity.
    verbosity: u32,

    /// The last `max(steps) + 1` activation patterns with their record numbers.
    history: PatternHistory,

    /// One sparse weight matrix per step, plus the highest input bit and bucket seen so far.
    weights: WeightStore,

    /// Decayed actual value per bucket.
    actual_values: ActualValues,
}

impl SDRClassifier {
    /// Creates a new SDRClassifier.
    ///
    /// # Arguments
    ///
    /// * `steps` - The prediction steps the classifier should learn. Must be non-empty and greater than zero.
    /// * `alpha` - The learning rate.
    /// * `act_value_alpha` - The decay rate of the per-bucket actual values, in `[0, 1]`.
    /// * `verbosity` - The logging verbosity.
    pub fn new(steps: Vec<u32>, alpha: f64, act_value_alpha: f64, verbosity: u32) -> Result<Self> {
        check_config(&steps, alpha, act_value_alpha)?;

        let mut steps = steps;
        steps.sort_unstable();
        steps.dedup();

        let max_step = steps.last().copied().unwrap_or(0) as usize;

        if verbosity >= 1 {
            debug!(
                "SDRClassifier: steps {:?}, alpha {}, act_value_alpha {}",
                steps, alpha, act_value_alpha
            );
        }

        Ok(Self {
            alpha,
            history: PatternHistory::with_capacity(max_step + 1),
            weights: WeightStore::new(&steps),
            actual_values: ActualValues::new(act_value_alpha),
            steps,
            verbosity,
        })
    }

    /// Creates a new SDRClassifier from a parameter set.
    pub fn from_params(params: &SDRClassifierParams) -> Result<Self> {
        Self::new(
            params.steps.clone(),
            params.alpha,
            params.act_value_alpha,
            params.verbosity,
        )
    }

    /// Resets the classifier to a freshly constructed state with the given configuration.
    /// On error the classifier is left unchanged.
    pub fn initialize(
        &mut self,
        steps: Vec<u32>,
        alpha: f64,
        act_value_alpha: f64,
        verbosity: u32,
    ) -> Result<()> {
        *self = Self::new(steps, alpha, act_value_alpha, verbosity)?;
        Ok(())
    }

    /// Processes one input sample.
    ///
    /// This method:
    /// - Stores the activation pattern in history (once per record number).
    /// - If learning is enabled, updates the weights of every step whose historical pattern is
    ///   available and folds the actual values into the per-bucket estimates.
    /// - If inference is enabled, returns the probability distribution for each prediction step.
    ///
    /// # Arguments
    ///
    /// * `record_num` - Non-decreasing record number. Gaps correspond to missing records.
    /// * `pattern` - A slice of active indices from the SDR.
    /// * `bucket_indices` - The target bucket(s) of this record.
    /// * `actual_values` - The actual value for each entry of `bucket_indices`.
    /// * `category` - Whether the actual values are category labels rather than quantities.
    /// * `learn` - Whether to perform weight updates.
    /// * `infer` - Whether to compute an inference.
    ///
    /// # Returns
    ///
    /// The prediction of every step and the actual value estimates, or an empty result if
    /// inference is disabled.
    #[allow(clippy::too_many_arguments)]
    pub fn compute(
        &mut self,
        record_num: u32,
        pattern: &[usize],
        bucket_indices: &[usize],
        actual_values: &[f64],
        category: bool,
        learn: bool,
        infer: bool,
    ) -> Result<ClassifierResult> {
        ensure!(
            bucket_indices.len() == actual_values.len(),
            ClassifierError::MismatchedTargets {
                buckets: bucket_indices.len(),
                values: actual_values.len(),
            }
        );

        if self.verbosity >= 1 {
            debug!(
                "SDRClassifier.compute: record {}, pattern {:?}, buckets {:?}, actual values {:?}, category {}, learn {}, infer {}",
                record_num, pattern, bucket_indices, actual_values, category, learn, infer
            );
        }

        self.history.record(record_num, pattern)?;

        if let Some(&max_bit) = pattern.iter().max() {
            self.weights.extend_inputs(max_bit);
        }

        if learn {
            self.learn(record_num, bucket_indices, actual_values);
        }

        if infer {
            Ok(self.infer(pattern))
        } else {
            Ok(ClassifierResult::default())
        }
    }

    /// Updates the actual value estimates and the weights of every step.
    fn learn(&mut self, record_num: u32, bucket_indices: &[usize], actual_values: &[f64]) {
        for (&bucket, &value) in bucket_indices.iter().zip(actual_values) {
            self.weights.extend_buckets(bucket);
            self.actual_values.observe(bucket, value);
        }

        if bucket_indices.is_empty() {
            return;
        }

        let target = self.target_distribution(bucket_indices);

        for &step in &self.steps {
            let Some(pattern) = self.history.lookup(step, record_num) else {
                if self.verbosity >= 2 {
                    trace!(
                        "SDRClassifier: no pattern for record {}, skipping step {}",
                        record_num.saturating_sub(step),
                        step
                    );
                }
                continue;
            };

            let mut error = self.weights.activations(step, pattern);
            softmax::softmax(&mut error);

            for (err_val, &target_val) in error.iter_mut().zip(&target) {
                *err_val = target_val - *err_val;
            }

            if self.verbosity >= 2 {
                trace!(
                    "SDRClassifier: step {}, learning pattern {:?}, error {:?}",
                    step,
                    pattern,
                    error
                );
            }

            for &bit in pattern {
                for (bucket, &err_val) in error.iter().enumerate() {
                    self.weights
                        .accumulate(step, bit, bucket, self.alpha * err_val);
                }
            }
        }
    }

    /// Builds the target distribution over all known buckets: each given bucket gets an equal
    /// share of the probability mass.
    fn target_distribution(&self, bucket_indices: &[usize]) -> Pdf {
        let mut target = vec![0.0; self.weights.num_buckets()];
        let share = 1.0 / bucket_indices.len() as f64;

        for &bucket in bucket_indices {
            target[bucket] += share;
        }

        target
    }

    /// Performs inference over all prediction steps.
    ///
    /// Returns the distribution of every step, each summing to 1 (or empty if no bucket was ever
    /// learned), together with the actual value estimate of every bucket.
    pub fn infer(&self, pattern: &[usize]) -> ClassifierResult {
        let mut result = ClassifierResult::default();

        result.insert(
            ResultKey::ActualValues,
            self.actual_values.snapshot(self.weights.num_buckets()),
        );

        for &step in &self.steps {
            result.insert(
                ResultKey::Prediction(step),
                self.infer_single_step(pattern, step),
            );
        }

        result
    }

    /// Performs inference for a single prediction step.
    ///
    /// The activation of each bucket is the sum of the weights of the active bits in the input
    /// pattern. The activations are turned into a probability distribution with a softmax.
    #[inline]
    pub fn infer_single_step(&self, pattern: &[usize], step: u32) -> Pdf {
        let mut distribution = self.weights.activations(step, pattern);
        softmax::softmax(&mut distribution);
        distribution
    }

    /// Returns the bucket with the greatest probability, preferring the lowest index on ties.
    pub fn get_classification(&self, pdf: &[f64]) -> Option<usize> {
        softmax::argmax(pdf)
    }

    /// The persistence format version.
    pub fn version(&self) -> u32 {
        SDR_CLASSIFIER_VERSION
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn act_value_alpha(&self) -> f64 {
        self.actual_values.alpha()
    }

    pub fn verbosity(&self) -> u32 {
        self.verbosity
    }

    pub fn set_verbosity(&mut self, verbosity: u32) {
        self.verbosity = verbosity;
    }

    pub fn steps(&self) -> &[u32] {
        &self.steps
    }

    /// Highest input bit seen so far.
    pub fn max_input_idx(&self) -> Option<usize> {
        self.weights.max_input_idx()
    }

    /// Highest bucket index seen so far.
    pub fn max_bucket_idx(&self) -> Option<usize> {
        self.weights.max_bucket_idx()
    }

    pub fn history(&self) -> &PatternHistory {
        &self.history
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn weights(&self) -> &WeightStore {
        &self.weights
    }

    pub fn actual_values(&self) -> &ActualValues {
        &self.actual_values
    }

    /// Writes the complete classifier state to `writer`.
    pub fn save<W: Write>(&self, mut writer: W) -> Result<()> {
        bincode::serialize_into(&mut writer, &SDR_CLASSIFIER_VERSION)
            .context("failed to write the classifier format version")?;
        bincode::serialize_into(&mut writer, self).context("failed to write the classifier state")?;
        writer.flush().context("failed to flush the classifier state")?;

        if self.verbosity >= 1 {
            debug!(
                "SDRClassifier: saved state (version {}, {} history entries)",
                SDR_CLASSIFIER_VERSION,
                self.history.len()
            );
        }

        Ok(())
    }

    /// Replaces the classifier state with the state read from `reader`.
    /// On error the classifier is left unchanged.
    pub fn load<R: Read>(&mut self, reader: R) -> Result<()> {
        *self = Self::from_reader(reader)?;

        if self.verbosity >= 1 {
            debug!(
                "SDRClassifier: loaded state (version {}, {} history entries)",
                SDR_CLASSIFIER_VERSION,
                self.history.len()
            );
        }

        Ok(())
    }

    /// Reads a classifier previously written with `save`.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let found: u32 = bincode::deserialize_from(&mut reader).context(
            ClassifierError::CorruptState("missing format version".to_string()),
        )?;

        ensure!(
            found == SDR_CLASSIFIER_VERSION,
            ClassifierError::VersionMismatch {
                expected: SDR_CLASSIFIER_VERSION,
                found,
            }
        );

        let classifier: Self = bincode::deserialize_from(&mut reader).context(
            ClassifierError::CorruptState("undecodable classifier state".to_string()),
        )?;

        classifier.validate()?;

        Ok(classifier)
    }

    /// Writes the complete classifier state to the file at `path`.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        self.save(BufWriter::new(file))
    }

    /// Reads a classifier from the file at `path`.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Checks the invariants a deserialized state has to satisfy: everything `new` requires of
    /// the configuration, plus the consistency of the learned state with it.
    fn validate(&self) -> Result<()> {
        let corrupt = |reason: &str| ClassifierError::CorruptState(reason.to_string());

        check_config(&self.steps, self.alpha, self.actual_values.alpha())
            .map_err(|err| corrupt(&err.to_string()))?;
        ensure!(
            self.steps.windows(2).all(|pair| pair[0] < pair[1]),
            corrupt("prediction steps are not sorted and unique")
        );

        let max_step = self.steps[self.steps.len() - 1] as usize;
        ensure!(
            self.history.capacity() == max_step + 1 && self.history.is_consistent(),
            corrupt("inconsistent pattern history")
        );
        ensure!(
            self.weights.has_steps(&self.steps),
            corrupt("weight matrices do not match the prediction steps")
        );
        ensure!(
            self.weights.is_consistent(),
            corrupt("weights outside the known input or bucket range")
        );
        ensure!(
            self.actual_values.is_consistent()
                && self.actual_values.len() <= self.weights.num_buckets(),
            corrupt("inconsistent actual values")
        );

        Ok(())
    }
}

/// Checks the configuration shared by construction and deserialization.
fn check_config(
    steps: &[u32],
    alpha: f64,
    act_value_alpha: f64,
) -> std::result::Result<(), ClassifierError> {
    if steps.is_empty() {
        return Err(ClassifierError::NoSteps);
    }
    if steps.contains(&0) {
        return Err(ClassifierError::ZeroStep);
    }
    if !(alpha.is_finite() && alpha >= 0.0) {
        return Err(ClassifierError::InvalidRate {
            name: "alpha",
            value: alpha,
        });
    }
    if !(0.0..=1.0).contains(&act_value_alpha) {
        return Err(ClassifierError::InvalidRate {
            name: "act_value_alpha",
            value: act_value_alpha,
        });
    }
    Ok(())
}
