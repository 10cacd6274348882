//! BFGS quasi-Newton optimizer.
//!
//! Maintains a dense 6x6 inverse-Hessian approximation in scaled parameter
//! space, updated from accepted line-search steps.

use nalgebra::{Matrix6, Vector6};
use realign_core::RigidTransform;

use super::descent::{minimize_with, SearchDirection};
use super::line_search::LineSearch;
use super::trait_::{OptimizationResult, Optimizer, StoppingCriteria};
use crate::cost::CostFunction;
use crate::error::Result;

/// Updates with `sᵀy` below this are skipped to keep the approximation
/// positive definite.
const CURVATURE_EPSILON: f64 = 1e-10;

/// BFGS with Armijo backtracking.
#[derive(Debug, Clone, PartialEq)]
pub struct QuasiNewton {
    /// Length (scaled units) of the first, gradient-descent step.
    pub initial_step: f64,
    /// Longest step the line search may try.
    pub max_step: f64,
    pub line_search: LineSearch,
}

impl Default for QuasiNewton {
    fn default() -> Self {
        Self {
            initial_step: 1.0,
            max_step: 10.0,
            line_search: LineSearch::default(),
        }
    }
}

impl QuasiNewton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_step(mut self, step: f64) -> Self {
        self.initial_step = step;
        self
    }

    pub fn with_max_step(mut self, step: f64) -> Self {
        self.max_step = step;
        self
    }
}

/// Inverse-Hessian state for one minimization.
#[derive(Debug, Clone)]
pub struct BfgsDirection {
    inverse_hessian: Matrix6<f64>,
    initial_step: f64,
    updated: bool,
}

impl BfgsDirection {
    pub fn new(initial_step: f64) -> Self {
        Self {
            inverse_hessian: Matrix6::identity(),
            initial_step,
            updated: false,
        }
    }

    pub fn inverse_hessian(&self) -> &Matrix6<f64> {
        &self.inverse_hessian
    }
}

impl SearchDirection for BfgsDirection {
    fn direction(&mut self, gradient: &[f64; 6]) -> [f64; 6] {
        let g = Vector6::from(*gradient);
        let d = if self.updated {
            -(self.inverse_hessian * g)
        } else {
            let length = g.norm();
            if length == 0.0 {
                return [0.0; 6];
            }
            -g * (self.initial_step / length)
        };
        std::array::from_fn(|k| d[k])
    }

    fn update(&mut self, step: &[f64; 6], gradient_change: &[f64; 6]) {
        let s = Vector6::from(*step);
        let y = Vector6::from(*gradient_change);
        let sy = s.dot(&y);
        if sy <= CURVATURE_EPSILON {
            return;
        }
        if !self.updated {
            // Scale the initial approximation to the observed curvature.
            self.inverse_hessian = Matrix6::identity() * (sy / y.dot(&y));
            self.updated = true;
        }
        let rho = 1.0 / sy;
        let identity = Matrix6::<f64>::identity();
        let left = identity - s * y.transpose() * rho;
        let right = identity - y * s.transpose() * rho;
        self.inverse_hessian = left * self.inverse_hessian * right + s * s.transpose() * rho;
    }

    fn reset(&mut self) {
        self.inverse_hessian = Matrix6::identity();
        self.updated = false;
    }
}

impl Optimizer for QuasiNewton {
    fn minimize(
        &self,
        cost: &dyn CostFunction,
        start: &RigidTransform,
        criteria: &StoppingCriteria,
    ) -> Result<OptimizationResult> {
        let mut directions = BfgsDirection::new(self.initial_step);
        minimize_with(cost, start, criteria, &mut directions, &self.line_search, self.max_step)
    }

    fn name(&self) -> &'static str {
        "quasi-newton"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::descent::tests::{Bowl, Flat, Misleading};
    use crate::optimizer::ConvergenceStatus;

    #[test]
    fn test_secant_condition() {
        let mut directions = BfgsDirection::new(1.0);
        let s = [1.0, 0.5, 0.0, 0.0, -0.2, 0.1];
        let y = [2.0, 1.5, 0.1, 0.0, -0.1, 0.3];
        directions.update(&s, &y);
        let hy = directions.inverse_hessian() * Vector6::from(y);
        for k in 0..6 {
            assert!((hy[k] - s[k]).abs() < 1e-10);
        }
    }

    #[test]
    fn test_negative_curvature_is_skipped() {
        let mut directions = BfgsDirection::new(1.0);
        directions.update(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0], &[-1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(directions.inverse_hessian(), &Matrix6::identity());
        let d = directions.direction(&[0.0, 3.0, 0.0, 0.0, 0.0, 4.0]);
        assert!((d[1] + 0.6).abs() < 1e-12);
        assert!((d[5] + 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_minimizes_quadratic() {
        let target = [4.0, -2.0, 1.0, 0.05, -0.03, 0.08];
        let result = QuasiNewton::default()
            .minimize(&Bowl { target }, &RigidTransform::default(), &StoppingCriteria::new(100, 1e-8))
            .unwrap();
        assert_eq!(result.status, ConvergenceStatus::Converged);
        let p = result.transform.parameters();
        for k in 0..3 {
            assert!((p[k] - target[k]).abs() < 1e-2, "translation {k}: {}", p[k]);
        }
        for k in 3..6 {
            assert!((p[k] - target[k]).abs() < 1e-3, "rotation {k}: {}", p[k]);
        }
        assert!(result.cost_history.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_zero_gradient_start() {
        let start = RigidTransform::new([0.5, 0.0, 0.0], [0.0, 0.0, 0.1], [1.0, 2.0, 3.0]);
        let result = QuasiNewton::default()
            .minimize(&Flat, &start, &StoppingCriteria::default())
            .unwrap();
        assert_eq!(result.status, ConvergenceStatus::Converged);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.transform, start);
    }

    #[test]
    fn test_stalls_without_improving_step() {
        let result = QuasiNewton::default()
            .minimize(&Misleading, &RigidTransform::default(), &StoppingCriteria::default())
            .unwrap();
        assert_eq!(result.status, ConvergenceStatus::Stalled);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.final_cost, 10.0);
    }

    #[test]
    fn test_converges_when_minimum_is_below_resolution() {
        // The unit first step overshoots at every trial length, but the
        // gradient at the start is negligible.
        let bowl = Bowl { target: [1e-5, 0.0, 0.0, 0.0, 0.0, 0.0] };
        let result = QuasiNewton::default()
            .minimize(&bowl, &RigidTransform::default(), &StoppingCriteria::default())
            .unwrap();
        assert_eq!(result.status, ConvergenceStatus::Converged);
        assert!(result.final_cost <= result.cost_history[0]);
    }
}
