//! Rigid-body motion correction of 4D series.
//!
//! Each frame of a [`realign_core::TimeSeries`] is registered to a reference
//! volume with a six-parameter rigid transform and resampled into reference
//! space. The pieces are pluggable: similarity [`metric`]s, [`cost`]
//! functions, [`optimizer`]s and temporal [`regularization`], orchestrated
//! by the [`Realigner`].

pub mod metric;
pub mod cost;
pub mod optimizer;
pub mod regularization;
pub mod realign;
pub mod error;
pub mod validation;
pub mod progress;

pub use error::{RegistrationError, Result};
pub use cost::{CostFunction, GradientMode, ImageCost, ReferenceContext};
pub use metric::{CostMetric, SimilarityMetric};
pub use optimizer::{ConvergenceStatus, OptimizationResult, Optimizer, OptimizerKind, StoppingCriteria};
pub use realign::{RealignConfig, RealignOutput, Realigner, ReferenceStrategy, TransformLog, TransformRecord};
pub use validation::ConvergenceChecker;
pub use progress::{ConsoleProgressCallback, FrameProgress, HistoryCallback, ProgressCallback};
