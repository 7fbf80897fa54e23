//! Construction parameters of the `SDRClassifier`.

use serde::{Deserialize, Serialize};

/// Holds the parameters required to set up an `SDRClassifier`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SDRClassifierParams {
    /// The prediction steps (horizons) to learn and infer. Every step must be at least 1.
    pub steps: Vec<u32>,

    /// Learning rate of the weight updates.
    pub alpha: f64,

    /// Decay rate of the per-bucket actual values, in `[0, 1]`.
    pub act_value_alpha: f64,

    /// Logging verbosity: 0 is silent, 1 logs calls at debug level, 2 adds per-step trace output.
    pub verbosity: u32,
}

impl Default for SDRClassifierParams {
    fn default() -> Self {
        Self {
            steps: vec![1],
            alpha: 0.001,
            act_value_alpha: 0.3,
            verbosity: 0,
        }
    }
}
