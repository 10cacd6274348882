//! Shared descent loop for the line-search optimizers.
//!
//! Parameters are optimized in scaled space `x = p / scales` so that one unit
//! is 1 mm or 1 degree on every axis.

use std::fmt::Debug;

use realign_core::RigidTransform;

use super::line_search::{LineSearch, LineSearchOutcome};
use super::trait_::{ConvergenceStatus, OptimizationResult, OptimizerState, StoppingCriteria};
use crate::cost::CostFunction;
use crate::error::Result;
use crate::validation::ConvergenceChecker;

/// Iterations in a row that must be quiet before declaring convergence.
pub const CONVERGENCE_PATIENCE: usize = 2;

/// Scaled gradient norm (cost per mm or per degree) at or below which a point
/// where no improving step exists counts as a minimum.
pub const STATIONARY_GRADIENT_NORM: f64 = 1e-2;

/// Strategy producing search directions from gradients.
pub trait SearchDirection: Debug {
    /// Direction to search along, given the current scaled gradient.
    fn direction(&mut self, gradient: &[f64; 6]) -> [f64; 6];

    /// Feed back an accepted step and the resulting gradient change.
    fn update(&mut self, step: &[f64; 6], gradient_change: &[f64; 6]);

    /// Forget accumulated curvature.
    fn reset(&mut self);
}

pub(crate) fn dot(a: &[f64; 6], b: &[f64; 6]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub(crate) fn norm(a: &[f64; 6]) -> f64 {
    dot(a, a).sqrt()
}

fn is_finite(a: &[f64; 6]) -> bool {
    a.iter().all(|v| v.is_finite())
}

/// Scaled view of a cost function around a start transform.
struct ScaledProblem<'a> {
    cost: &'a dyn CostFunction,
    start: &'a RigidTransform,
    scales: [f64; 6],
}

impl ScaledProblem<'_> {
    fn transform(&self, x: &[f64; 6]) -> RigidTransform {
        self.start
            .with_parameters(std::array::from_fn(|k| x[k] * self.scales[k]))
    }

    fn evaluate(&self, x: &[f64; 6]) -> Result<f64> {
        self.cost.evaluate(&self.transform(x))
    }

    fn gradient(&self, x: &[f64; 6]) -> Result<[f64; 6]> {
        let g = self.cost.gradient(&self.transform(x))?;
        Ok(std::array::from_fn(|k| g[k] * self.scales[k]))
    }
}

/// Run the descent loop with `directions` and `line_search`.
///
/// Search directions longer than `max_step` (scaled units) are shortened.
pub fn minimize_with<D: SearchDirection>(
    cost: &dyn CostFunction,
    start: &RigidTransform,
    criteria: &StoppingCriteria,
    directions: &mut D,
    line_search: &LineSearch,
    max_step: f64,
) -> Result<OptimizationResult> {
    let scales = cost.parameter_scales();
    let problem = ScaledProblem { cost, start, scales };
    let mut x: [f64; 6] = std::array::from_fn(|k| start.parameters()[k] / scales[k]);
    let mut state = OptimizerState::Initialized;

    let mut f = problem.evaluate(&x)?;
    let mut history = vec![f];
    let mut iterations = 0;

    let finish = |state: OptimizerState, x: &[f64; 6], f: f64, iterations: usize, history: Vec<f64>| {
        let status = state.status().unwrap_or(ConvergenceStatus::Stalled);
        tracing::debug!(
            "Optimizer finished: {} after {} iterations, cost {:.6}",
            status,
            iterations,
            f
        );
        OptimizationResult {
            transform: problem.transform(x),
            status,
            iterations,
            final_cost: f,
            cost_history: history,
        }
    };

    if !f.is_finite() {
        return Ok(finish(OptimizerState::Stalled, &x, f, 0, history));
    }

    let mut g = problem.gradient(&x)?;
    if !is_finite(&g) {
        return Ok(finish(OptimizerState::Stalled, &x, f, 0, history));
    }
    if g.iter().all(|&v| v == 0.0) {
        // Flat start: nothing to do, and no direction to normalize.
        return Ok(OptimizationResult {
            transform: *start,
            status: ConvergenceStatus::Converged,
            iterations: 0,
            final_cost: f,
            cost_history: history,
        });
    }

    debug_assert!(state.can_transition_to(OptimizerState::Iterating));
    state = OptimizerState::Iterating;
    let mut checker = ConvergenceChecker::new(criteria.tolerance, CONVERGENCE_PATIENCE);
    let mut restarted = false;

    while !state.is_terminal() {
        let next = if iterations >= criteria.max_iterations || criteria.deadline_passed() {
            OptimizerState::MaxIterationsExceeded
        } else if g.iter().all(|&v| v == 0.0) {
            OptimizerState::Converged
        } else {
            let mut d = directions.direction(&g);
            if !is_finite(&d) || dot(&d, &g) >= 0.0 {
                directions.reset();
                d = directions.direction(&g);
            }
            let length = norm(&d);
            if length > max_step {
                d.iter_mut().for_each(|v| *v *= max_step / length);
            }

            match line_search.search(|p| problem.evaluate(p), &x, f, &g, &d, criteria.tolerance)? {
                LineSearchOutcome::Accepted { point, cost } => {
                    let step: [f64; 6] = std::array::from_fn(|k| point[k] - x[k]);
                    let g_new = problem.gradient(&point)?;
                    let relative_improvement = (f - cost) / (f.abs() + 1e-12);
                    iterations += 1;
                    restarted = false;
                    x = point;
                    f = cost;
                    history.push(f);

                    if !is_finite(&g_new) {
                        OptimizerState::Stalled
                    } else {
                        let change: [f64; 6] = std::array::from_fn(|k| g_new[k] - g[k]);
                        directions.update(&step, &change);
                        g = g_new;
                        tracing::debug!(
                            "Iteration {}: cost {:.6}, step {:.2e}",
                            iterations,
                            f,
                            norm(&step)
                        );
                        if checker.observe(relative_improvement, norm(&step)) {
                            OptimizerState::Converged
                        } else {
                            OptimizerState::Iterating
                        }
                    }
                }
                LineSearchOutcome::NegligibleStep => {
                    // A quiet iteration that leaves x in place.
                    if checker.observe(0.0, norm(&d)) {
                        OptimizerState::Converged
                    } else {
                        OptimizerState::Iterating
                    }
                }
                LineSearchOutcome::BelowResolution => {
                    if checker.quiet_iterations() > 0 || norm(&g) <= STATIONARY_GRADIENT_NORM {
                        OptimizerState::Converged
                    } else if !restarted {
                        // Retry once along steepest descent before giving up.
                        tracing::debug!("Line search failed; resetting search direction");
                        directions.reset();
                        restarted = true;
                        OptimizerState::Iterating
                    } else {
                        OptimizerState::Stalled
                    }
                }
                LineSearchOutcome::Exhausted => OptimizerState::Stalled,
            }
        };
        debug_assert!(next == OptimizerState::Iterating || state.can_transition_to(next));
        state = next;
    }

    Ok(finish(state, &x, f, iterations, history))
}
