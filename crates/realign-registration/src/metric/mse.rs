//! Mean squares metric implementation.

use super::trait_::{check_samples, SimilarityMetric};
use crate::error::Result;

/// Mean Squares Metric.
///
/// Computes the mean squared difference between sample intensities:
/// MSE = (1/N) * sum((Fixed(x) - Moving(T(x)))^2)
///
/// Only meaningful when frames share intensity scaling; prefer
/// [`super::Correlation`] when global signal drifts between frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSquares;

impl MeanSquares {
    /// Create a new mean squares metric.
    pub fn new() -> Self {
        Self
    }
}

impl SimilarityMetric for MeanSquares {
    fn loss(&self, fixed: &[f64], moving: &[f64]) -> Result<f64> {
        check_samples(fixed, moving)?;
        let sum: f64 = fixed.iter().zip(moving).map(|(f, m)| (m - f) * (m - f)).sum();
        Ok(sum / fixed.len() as f64)
    }

    fn loss_derivative(&self, fixed: &[f64], moving: &[f64]) -> Result<Vec<f64>> {
        check_samples(fixed, moving)?;
        let scale = 2.0 / fixed.len() as f64;
        Ok(fixed.iter().zip(moving).map(|(f, m)| scale * (m - f)).collect())
    }

    fn name(&self) -> &'static str {
        "MeanSquares"
    }
}
