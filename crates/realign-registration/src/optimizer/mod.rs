//! Optimizers for the six rigid parameters.
//!
//! Both strategies share the descent loop in [`descent`] and the Armijo
//! [`LineSearch`]; they differ only in how search directions are chosen.
//!
//! # Examples
//!
//! ```rust,ignore
//! use realign_registration::optimizer::{OptimizerKind, StoppingCriteria};
//!
//! let optimizer = OptimizerKind::QuasiNewton.build();
//! let result = optimizer.minimize(&cost, &start, &StoppingCriteria::new(64, 1e-4))?;
//! ```

pub mod trait_;
pub mod line_search;
pub mod descent;
pub mod quasi_newton;
pub mod gradient_descent;

pub use trait_::{ConvergenceStatus, OptimizationResult, Optimizer, OptimizerState, StoppingCriteria};
pub use line_search::{LineSearch, LineSearchOutcome};
pub use quasi_newton::QuasiNewton;
pub use gradient_descent::GradientDescent;

use serde::{Deserialize, Serialize};

/// Optimizer selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OptimizerKind {
    /// BFGS quasi-Newton.
    #[default]
    QuasiNewton,
    /// Steepest descent.
    GradientDescent,
}

impl OptimizerKind {
    /// Instantiate the optimizer with default step settings.
    pub fn build(self) -> Box<dyn Optimizer> {
        match self {
            OptimizerKind::QuasiNewton => Box::new(QuasiNewton::default()),
            OptimizerKind::GradientDescent => Box::new(GradientDescent::default()),
        }
    }
}
