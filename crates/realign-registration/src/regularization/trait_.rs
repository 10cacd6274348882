//! Regularizer trait definition.
//!
//! This module defines the penalty terms that can be added to an image cost,
//! and the wrapper combining the two.

use std::fmt::Debug;

use realign_core::RigidTransform;

use crate::cost::CostFunction;
use crate::error::Result;

/// Trait for penalties on rigid transform parameters.
///
/// Regularizers constrain the estimated motion, e.g. towards temporal
/// smoothness across consecutive frames.
pub trait Regularizer: Send + Sync + Debug {
    /// Penalty at the given parameters `(tx, ty, tz, rx, ry, rz)`.
    fn penalty(&self, parameters: &[f64; 6]) -> f64;

    /// Gradient of [`Regularizer::penalty`].
    fn gradient(&self, parameters: &[f64; 6]) -> [f64; 6];

    /// Get the weight (scaling factor) for this regularizer.
    fn weight(&self) -> f64;

    /// Set the weight (scaling factor) for this regularizer.
    fn set_weight(&mut self, weight: f64);
}

/// A cost function plus a parameter penalty.
#[derive(Debug)]
pub struct Regularized<C, R> {
    cost: C,
    regularizer: R,
}

impl<C: CostFunction, R: Regularizer> Regularized<C, R> {
    /// Add `regularizer` to `cost`.
    pub fn new(cost: C, regularizer: R) -> Self {
        Self { cost, regularizer }
    }

    /// The unregularized cost.
    pub fn inner(&self) -> &C {
        &self.cost
    }
}

impl<C: CostFunction, R: Regularizer> CostFunction for Regularized<C, R> {
    fn evaluate(&self, transform: &RigidTransform) -> Result<f64> {
        Ok(self.cost.evaluate(transform)? + self.regularizer.penalty(&transform.parameters()))
    }

    fn gradient(&self, transform: &RigidTransform) -> Result<[f64; 6]> {
        let mut gradient = self.cost.gradient(transform)?;
        let penalty = self.regularizer.gradient(&transform.parameters());
        for (g, p) in gradient.iter_mut().zip(penalty) {
            *g += p;
        }
        Ok(gradient)
    }

    fn parameter_scales(&self) -> [f64; 6] {
        self.cost.parameter_scales()
    }
}
