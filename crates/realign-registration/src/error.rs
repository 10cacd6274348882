//! Error types for realignment operations.
//!
//! This module provides structured error types for realignment workflows.
//! Geometry failures from `realign-core` are wrapped transparently; frame
//! context is attached with [`RegistrationError::in_frame`].

use realign_core::GeometryError;
use thiserror::Error;

/// Main error type for realignment operations.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// Singular affine, shape mismatch or malformed volume data.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// Error in metric computation.
    #[error("Metric error: {0}")]
    MetricError(String),

    /// The line search could not find an improving step.
    #[error("Optimizer stalled on frame {frame}")]
    OptimizerStall { frame: usize },

    /// The iteration cap or time budget ran out before convergence.
    #[error("Frame {frame} did not converge within {iterations} iterations")]
    MaxIterationsExceeded { frame: usize, iterations: usize },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A fatal error raised while processing one frame.
    #[error("Frame {frame}: {operation} failed: {source}")]
    Frame {
        frame: usize,
        operation: &'static str,
        #[source]
        source: Box<RegistrationError>,
    },
}

/// Result type for realignment operations.
pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    /// Create a metric error.
    pub fn metric(msg: impl Into<String>) -> Self {
        Self::MetricError(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Attach the frame index and the failing operation.
    pub fn in_frame(self, frame: usize, operation: &'static str) -> Self {
        Self::Frame {
            frame,
            operation,
            source: Box::new(self),
        }
    }

    /// Whether this error is a recorded, non-fatal optimization outcome.
    pub fn is_non_fatal(&self) -> bool {
        match self {
            Self::OptimizerStall { .. } | Self::MaxIterationsExceeded { .. } => true,
            Self::Frame { source, .. } => source.is_non_fatal(),
            _ => false,
        }
    }
}
