pub mod actual_values;
pub mod error;
pub mod params;
pub mod pattern_history;
pub mod sdr_classifier;
pub mod softmax;
pub mod weight_matrix;
