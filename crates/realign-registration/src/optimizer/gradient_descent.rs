//! Steepest descent with an adaptive step length.

use realign_core::RigidTransform;

use super::descent::{minimize_with, norm, SearchDirection};
use super::line_search::LineSearch;
use super::trait_::{OptimizationResult, Optimizer, StoppingCriteria};
use crate::cost::CostFunction;
use crate::error::Result;

/// Gradient descent optimizer.
///
/// Searches along the normalized negative gradient. The trial step length
/// starts at `initial_step` and then follows twice the last accepted step.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientDescent {
    pub initial_step: f64,
    pub max_step: f64,
    pub line_search: LineSearch,
}

impl Default for GradientDescent {
    fn default() -> Self {
        Self {
            initial_step: 1.0,
            max_step: 10.0,
            line_search: LineSearch::default(),
        }
    }
}

impl GradientDescent {
    pub fn new(initial_step: f64) -> Self {
        Self {
            initial_step,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
struct Steepest {
    initial_step: f64,
    max_step: f64,
    step_length: f64,
}

impl SearchDirection for Steepest {
    fn direction(&mut self, gradient: &[f64; 6]) -> [f64; 6] {
        let length = norm(gradient);
        if length == 0.0 {
            return [0.0; 6];
        }
        std::array::from_fn(|k| -gradient[k] * self.step_length / length)
    }

    fn update(&mut self, step: &[f64; 6], _gradient_change: &[f64; 6]) {
        self.step_length = (2.0 * norm(step)).clamp(1e-6, self.max_step);
    }

    fn reset(&mut self) {
        self.step_length = self.initial_step;
    }
}

impl Optimizer for GradientDescent {
    fn minimize(
        &self,
        cost: &dyn CostFunction,
        start: &RigidTransform,
        criteria: &StoppingCriteria,
    ) -> Result<OptimizationResult> {
        let mut directions = Steepest {
            initial_step: self.initial_step,
            max_step: self.max_step,
            step_length: self.initial_step,
        };
        minimize_with(cost, start, criteria, &mut directions, &self.line_search, self.max_step)
    }

    fn name(&self) -> &'static str {
        "gradient-descent"
    }
}
