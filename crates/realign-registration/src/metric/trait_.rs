//! Metric trait for intensity similarity measurement.
//!
//! This module defines the capability every similarity metric implements.
//! Metrics operate on host `f64` samples: the reference intensities at the
//! precomputed sample points and the moving intensities pulled through the
//! candidate transform.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use super::{Correlation, MeanSquares};
use crate::error::{RegistrationError, Result};

/// Metric trait for measuring dissimilarity between sample vectors.
///
/// Lower values indicate better alignment.
pub trait SimilarityMetric: Send + Sync + Debug {
    /// Loss between fixed and moving samples of equal length.
    fn loss(&self, fixed: &[f64], moving: &[f64]) -> Result<f64>;

    /// Partial derivatives of the loss with respect to every moving sample.
    fn loss_derivative(&self, fixed: &[f64], moving: &[f64]) -> Result<Vec<f64>>;

    /// Get the name of this metric.
    fn name(&self) -> &'static str;
}

/// Metric selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CostMetric {
    /// `1 - r`, Pearson correlation of the samples.
    #[default]
    Correlation,
    /// Mean squared intensity difference.
    MeanSquares,
}

impl CostMetric {
    /// Instantiate the metric.
    pub fn build(self) -> Box<dyn SimilarityMetric> {
        match self {
            CostMetric::Correlation => Box::new(Correlation::new()),
            CostMetric::MeanSquares => Box::new(MeanSquares::new()),
        }
    }
}

/// Shared argument checks.
pub(crate) fn check_samples(fixed: &[f64], moving: &[f64]) -> Result<()> {
    if fixed.len() != moving.len() {
        return Err(RegistrationError::metric(format!(
            "sample count mismatch: {} fixed vs {} moving",
            fixed.len(),
            moving.len()
        )));
    }
    if fixed.len() < 2 {
        return Err(RegistrationError::metric(format!(
            "at least 2 samples required, got {}",
            fixed.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_metric_default() {
        let metric: CostMetric = Default::default();
        assert_eq!(metric, CostMetric::Correlation);
        assert_eq!(metric.build().name(), "Correlation");
        assert_eq!(CostMetric::MeanSquares.build().name(), "MeanSquares");
    }

    #[test]
    fn test_check_samples() {
        assert!(check_samples(&[1.0, 2.0], &[1.0, 2.0]).is_ok());
        assert!(check_samples(&[1.0, 2.0], &[1.0]).is_err());
        assert!(check_samples(&[1.0], &[1.0]).is_err());
    }
}
