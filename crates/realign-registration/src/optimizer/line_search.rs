//! Backtracking line search with the Armijo sufficient-decrease condition.

use crate::error::Result;

/// Sufficient-decrease constant.
pub const ARMIJO_C1: f64 = 1e-4;

/// Step shrink factor per backtrack.
pub const SHRINK_FACTOR: f64 = 0.5;

/// Backtracking budget.
pub const MAX_BACKTRACKS: usize = 30;

/// What a line search found along a direction.
#[derive(Debug, Clone, PartialEq)]
pub enum LineSearchOutcome {
    /// A point with sufficient decrease.
    Accepted { point: [f64; 6], cost: f64 },
    /// The proposed step is already shorter than the parameter resolution;
    /// no trial point was evaluated.
    NegligibleStep,
    /// Trial steps shrank below the parameter resolution without finding
    /// sufficient decrease.
    BelowResolution,
    /// Every trial cost was non-finite, or the budget ran out while the step
    /// was still above the resolution.
    Exhausted,
}

/// Armijo backtracking line search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearch {
    pub c1: f64,
    pub shrink: f64,
    pub max_backtracks: usize,
}

impl Default for LineSearch {
    fn default() -> Self {
        Self {
            c1: ARMIJO_C1,
            shrink: SHRINK_FACTOR,
            max_backtracks: MAX_BACKTRACKS,
        }
    }
}

impl LineSearch {
    /// Search along `direction` from `x` (cost `fx`, gradient `gradient`).
    ///
    /// `direction` must be a descent direction. Steps whose norm drops below
    /// `resolution` end the search.
    pub fn search<F>(
        &self,
        mut cost: F,
        x: &[f64; 6],
        fx: f64,
        gradient: &[f64; 6],
        direction: &[f64; 6],
        resolution: f64,
    ) -> Result<LineSearchOutcome>
    where
        F: FnMut(&[f64; 6]) -> Result<f64>,
    {
        let slope: f64 = gradient.iter().zip(direction).map(|(g, d)| g * d).sum();
        let direction_norm = direction.iter().map(|d| d * d).sum::<f64>().sqrt();

        let mut alpha = 1.0;
        let mut trials = 0usize;
        let mut finite_trials = 0usize;

        if direction_norm < resolution {
            return Ok(LineSearchOutcome::NegligibleStep);
        }

        for _ in 0..=self.max_backtracks {
            if alpha * direction_norm < resolution {
                if trials > 0 && finite_trials == 0 {
                    return Ok(LineSearchOutcome::Exhausted);
                }
                return Ok(LineSearchOutcome::BelowResolution);
            }

            let point: [f64; 6] = std::array::from_fn(|k| x[k] + alpha * direction[k]);
            let trial = cost(&point)?;
            trials += 1;
            if trial.is_finite() {
                finite_trials += 1;
                if trial <= fx + self.c1 * alpha * slope {
                    return Ok(LineSearchOutcome::Accepted { point, cost: trial });
                }
            }
            alpha *= self.shrink;
        }

        Ok(LineSearchOutcome::Exhausted)
    }
}
