//! Realignment configuration.

use burn::config::Config;
use realign_core::InterpolationOrder;

use super::reference::ReferenceStrategy;
use crate::cost::GradientMode;
use crate::metric::CostMetric;
use crate::optimizer::{OptimizerKind, StoppingCriteria};

/// Options of a realignment run.
///
/// Saved and loaded as JSON through [`Config::save`] / [`Config::load`].
///
/// # Examples
///
/// ```rust,ignore
/// use realign_registration::{RealignConfig, ReferenceStrategy};
///
/// let config = RealignConfig::new()
///     .with_reference_strategy(ReferenceStrategy::First)
///     .with_parallel(true);
/// ```
#[derive(Config, Debug)]
pub struct RealignConfig {
    /// Volume every frame is aligned to.
    #[config(default = "ReferenceStrategy::Mean")]
    pub reference_strategy: ReferenceStrategy,
    /// Similarity metric scoring the samples.
    #[config(default = "CostMetric::Correlation")]
    pub cost_metric: CostMetric,
    #[config(default = "OptimizerKind::QuasiNewton")]
    pub optimizer: OptimizerKind,
    #[config(default = "GradientMode::FiniteDifference")]
    pub gradient_mode: GradientMode,
    /// Iteration cap per frame and pass.
    #[config(default = 64)]
    pub max_iterations: usize,
    /// Relative cost improvement / scaled step norm treated as converged.
    #[config(default = 1e-4)]
    pub convergence_tolerance: f64,
    #[config(default = "InterpolationOrder::Linear")]
    pub interpolation_order: InterpolationOrder,
    /// Stride of the reference sample lattice, in voxels.
    #[config(default = 2)]
    pub sample_subsampling_factor: usize,
    /// Intensity outside the field of view.
    #[config(default = 0.0)]
    pub background: f64,
    /// Optimize frames concurrently from identity starts.
    #[config(default = false)]
    pub parallel: bool,
    /// Weight pulling each frame towards its predecessor (sequential only).
    #[config(default = 0.0)]
    pub temporal_smoothness: f64,
    /// Wall-clock budget for the optimization passes.
    pub time_budget_secs: Option<f64>,
}

impl RealignConfig {
    /// Optimizer stopping criteria without a deadline.
    pub fn stopping_criteria(&self) -> StoppingCriteria {
        StoppingCriteria::new(self.max_iterations, self.convergence_tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RealignConfig::new();
        assert_eq!(config.reference_strategy, ReferenceStrategy::Mean);
        assert_eq!(config.cost_metric, CostMetric::Correlation);
        assert_eq!(config.optimizer, OptimizerKind::QuasiNewton);
        assert_eq!(config.gradient_mode, GradientMode::FiniteDifference);
        assert_eq!(config.max_iterations, 64);
        assert_eq!(config.convergence_tolerance, 1e-4);
        assert_eq!(config.interpolation_order, InterpolationOrder::Linear);
        assert_eq!(config.sample_subsampling_factor, 2);
        assert_eq!(config.background, 0.0);
        assert!(!config.parallel);
        assert_eq!(config.temporal_smoothness, 0.0);
        assert_eq!(config.time_budget_secs, None);
    }

    #[test]
    fn test_builder_and_criteria() {
        let config = RealignConfig::new()
            .with_max_iterations(10)
            .with_convergence_tolerance(1e-3);
        let criteria = config.stopping_criteria();
        assert_eq!(criteria.max_iterations, 10);
        assert_eq!(criteria.tolerance, 1e-3);
        assert!(criteria.deadline.is_none());
    }
}
