//! SDR classification for Hierarchical Temporal Memory (HTM) pipelines.
//!
//! The `core` module holds the multi-step `SDRClassifier` together with the building blocks
//! it is made of: the sparse weight matrices, the bounded pattern history, the actual-value
//! tracker and the softmax primitives.

pub mod core;
