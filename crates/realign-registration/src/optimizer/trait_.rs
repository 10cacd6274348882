//! Optimizer trait and result types.
//!
//! Optimizers minimize a [`CostFunction`] over the six rigid parameters,
//! starting from a warm-start transform. Each call owns its own state and
//! walks `Initialized -> Iterating -> {Converged, MaxIterationsExceeded,
//! Stalled}`.

use std::fmt::Debug;
use std::time::Instant;

use realign_core::RigidTransform;
use serde::{Deserialize, Serialize};

use crate::cost::CostFunction;
use crate::error::Result;

/// Lifecycle of a single minimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerState {
    /// Start point set, nothing evaluated yet.
    Initialized,
    /// Taking line-search steps.
    Iterating,
    /// Terminal: the cost stopped improving at the parameter resolution.
    Converged,
    /// Terminal: iteration cap or deadline reached first.
    MaxIterationsExceeded,
    /// Terminal: no acceptable step could be found.
    Stalled,
}

impl OptimizerState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        self.status().is_some()
    }

    /// Status recorded for a terminal state.
    pub fn status(self) -> Option<ConvergenceStatus> {
        match self {
            OptimizerState::Converged => Some(ConvergenceStatus::Converged),
            OptimizerState::MaxIterationsExceeded => Some(ConvergenceStatus::MaxIterationsExceeded),
            OptimizerState::Stalled => Some(ConvergenceStatus::Stalled),
            OptimizerState::Initialized | OptimizerState::Iterating => None,
        }
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// A zero or non-finite starting gradient terminates directly from
    /// `Initialized`.
    pub fn can_transition_to(self, next: OptimizerState) -> bool {
        match self {
            OptimizerState::Initialized => next != OptimizerState::Initialized,
            OptimizerState::Iterating => next.is_terminal(),
            _ => false,
        }
    }
}

impl From<ConvergenceStatus> for OptimizerState {
    fn from(status: ConvergenceStatus) -> Self {
        match status {
            ConvergenceStatus::Converged => OptimizerState::Converged,
            ConvergenceStatus::MaxIterationsExceeded => OptimizerState::MaxIterationsExceeded,
            ConvergenceStatus::Stalled => OptimizerState::Stalled,
        }
    }
}

/// Outcome of one frame's optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    Converged,
    MaxIterationsExceeded,
    Stalled,
}

impl std::fmt::Display for ConvergenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConvergenceStatus::Converged => "converged",
            ConvergenceStatus::MaxIterationsExceeded => "max iterations exceeded",
            ConvergenceStatus::Stalled => "stalled",
        };
        f.write_str(label)
    }
}

/// When to stop iterating.
#[derive(Debug, Clone, PartialEq)]
pub struct StoppingCriteria {
    /// Iteration cap.
    pub max_iterations: usize,
    /// Threshold on relative cost improvement and on the scaled step norm.
    pub tolerance: f64,
    /// Wall-clock deadline shared by all frames of a run.
    pub deadline: Option<Instant>,
}

impl StoppingCriteria {
    /// Criteria without a deadline.
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_iterations,
            tolerance,
            deadline: None,
        }
    }

    /// Stop once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Whether the deadline (if any) has passed.
    pub fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

impl Default for StoppingCriteria {
    fn default() -> Self {
        Self::new(64, 1e-4)
    }
}

/// Result of [`Optimizer::minimize`].
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Best transform found (keeps the start transform's center).
    pub transform: RigidTransform,
    pub status: ConvergenceStatus,
    /// Accepted iterations.
    pub iterations: usize,
    /// Cost at `transform`.
    pub final_cost: f64,
    /// Cost at the start followed by the cost after each accepted step.
    pub cost_history: Vec<f64>,
}

impl OptimizationResult {
    pub fn is_converged(&self) -> bool {
        self.status == ConvergenceStatus::Converged
    }
}

/// Rigid-parameter optimizer.
///
/// Implementations are stateless between calls, so one optimizer can serve
/// several frames concurrently.
///
/// # Examples
///
/// ```rust,ignore
/// use realign_registration::optimizer::{Optimizer, QuasiNewton, StoppingCriteria};
///
/// let result = QuasiNewton::default().minimize(&cost, &start, &StoppingCriteria::default())?;
/// ```
pub trait Optimizer: Send + Sync + Debug {
    /// Minimize `cost` starting from `start`.
    ///
    /// Errors are reserved for fatal cost failures; non-convergence is
    /// reported through [`OptimizationResult::status`].
    fn minimize(
        &self,
        cost: &dyn CostFunction,
        start: &RigidTransform,
        criteria: &StoppingCriteria,
    ) -> Result<OptimizationResult>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
