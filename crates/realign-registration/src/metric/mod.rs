//! Metric implementations.
//!
//! This module contains the similarity metrics used to score alignment of a
//! moving frame against the reference.

pub mod trait_;
pub mod correlation;
pub mod mse;

pub use trait_::{CostMetric, SimilarityMetric};
pub use correlation::Correlation;
pub use mse::MeanSquares;
