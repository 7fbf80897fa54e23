//! Failure kinds reported by the classifier.
//!
//! All fallible operations return `anyhow::Result`. The errors raised by the classifier itself
//! carry a `ClassifierError` (derived with `thiserror`), so callers can tell usage errors apart
//! from format errors with `err.downcast_ref::<ClassifierError>()`. I/O and decoding failures
//! from the underlying stream are attached as context to a `ClassifierError::CorruptState`.

use thiserror::Error;

/// Describes why a classifier operation was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    /// The classifier was configured without any prediction step.
    #[error("at least one prediction step is required")]
    NoSteps,

    /// A prediction step of zero was requested. Steps must look at least one record ahead.
    #[error("prediction steps must be greater than zero")]
    ZeroStep,

    /// A learning or decay rate that is not a finite number within its allowed range.
    #[error("invalid {name}: {value}")]
    InvalidRate { name: &'static str, value: f64 },

    /// `bucket_indices` and `actual_values` must be parallel sequences.
    #[error("got {buckets} bucket indices but {values} actual values")]
    MismatchedTargets { buckets: usize, values: usize },

    /// Record numbers have to be non-decreasing.
    #[error("record number {current} is lower than the previous record number {previous}")]
    RecordOutOfOrder { previous: u32, current: u32 },

    /// The stream was written by an incompatible format version.
    #[error("unsupported classifier format version {found}, expected {expected}")]
    VersionMismatch { expected: u32, found: u32 },

    /// The stream could not be decoded or describes an inconsistent state.
    #[error("corrupt classifier state: {0}")]
    CorruptState(String),
}

impl ClassifierError {
    /// Returns true for errors caused by how the classifier was called or configured.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::NoSteps
                | Self::ZeroStep
                | Self::InvalidRate { .. }
                | Self::MismatchedTargets { .. }
                | Self::RecordOutOfOrder { .. }
        )
    }

    /// Returns true for errors raised while restoring a saved state.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::VersionMismatch { .. } | Self::CorruptState(_))
    }
}
