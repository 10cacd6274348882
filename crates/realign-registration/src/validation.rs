//! Validation utilities for realignment runs.
//!
//! This module checks configurations and input series before any
//! optimization starts, and provides the convergence test shared by the
//! optimizers.

use burn::tensor::backend::Backend;
use burn::tensor::ElementConversion;
use realign_core::{GeometryError, TimeSeries};

use crate::error::{RegistrationError, Result};
use crate::realign::RealignConfig;

/// Validate every numeric option of a configuration.
pub fn validate_config(config: &RealignConfig) -> Result<()> {
    validate_iterations(config.max_iterations)?;

    if config.convergence_tolerance.is_nan() || config.convergence_tolerance <= 0.0 {
        return Err(RegistrationError::invalid_configuration(format!(
            "Convergence tolerance must be positive, got {}",
            config.convergence_tolerance
        )));
    }

    if config.sample_subsampling_factor == 0 {
        return Err(RegistrationError::invalid_configuration(
            "Sample subsampling factor must be at least 1",
        ));
    }

    if !config.background.is_finite() {
        return Err(RegistrationError::invalid_configuration(format!(
            "Background must be finite, got {}",
            config.background
        )));
    }

    if config.temporal_smoothness.is_nan() || config.temporal_smoothness < 0.0 {
        return Err(RegistrationError::invalid_configuration(format!(
            "Temporal smoothness must be non-negative, got {}",
            config.temporal_smoothness
        )));
    }

    if let Some(budget) = config.time_budget_secs {
        if budget.is_nan() || budget <= 0.0 {
            return Err(RegistrationError::invalid_configuration(format!(
                "Time budget must be positive, got {}",
                budget
            )));
        }
    }

    Ok(())
}

/// Validate iteration count.
pub fn validate_iterations(iterations: usize) -> Result<()> {
    if iterations == 0 {
        return Err(RegistrationError::invalid_configuration(
            "Iterations must be positive",
        ));
    }

    if iterations > 1_000_000 {
        return Err(RegistrationError::invalid_configuration(
            format!("Iterations too large: {}", iterations),
        ));
    }

    Ok(())
}

/// Reject frames holding NaN or infinite intensities.
///
/// Shapes are already guaranteed equal by [`TimeSeries`] construction.
pub fn validate_series<B: Backend>(series: &TimeSeries<B>) -> Result<()> {
    for (index, frame) in series.frames().iter().enumerate() {
        let sum = frame.data().clone().sum().into_scalar().elem::<f64>();
        if !sum.is_finite() {
            return Err(GeometryError::invalid_data(format!(
                "frame {} contains non-finite intensities",
                index
            ))
            .into());
        }
    }
    Ok(())
}

/// Convergence test on consecutive optimizer iterations.
///
/// An iteration is quiet when its relative cost improvement or its step norm
/// is below `min_improvement`; convergence needs `patience` quiet
/// iterations in a row.
#[derive(Debug, Clone)]
pub struct ConvergenceChecker {
    /// Threshold on relative improvement and on the step norm.
    pub min_improvement: f64,
    /// Consecutive quiet iterations required.
    pub patience: usize,
    quiet: usize,
}

impl Default for ConvergenceChecker {
    fn default() -> Self {
        Self::new(1e-4, 2)
    }
}

impl ConvergenceChecker {
    /// Create a new convergence checker.
    pub fn new(min_improvement: f64, patience: usize) -> Self {
        Self {
            min_improvement,
            patience: patience.max(1),
            quiet: 0,
        }
    }

    /// Record one iteration; returns true once converged.
    pub fn observe(&mut self, relative_improvement: f64, step_norm: f64) -> bool {
        if relative_improvement < self.min_improvement || step_norm < self.min_improvement {
            self.quiet += 1;
        } else {
            self.quiet = 0;
        }
        self.quiet >= self.patience
    }

    /// Quiet iterations observed in a row.
    pub fn quiet_iterations(&self) -> usize {
        self.quiet
    }

    pub fn reset(&mut self) {
        self.quiet = 0;
    }
}
