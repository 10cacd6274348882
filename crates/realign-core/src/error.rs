//! Error types for geometry and data-model operations.

use thiserror::Error;

/// Errors raised while building or mapping volumes and transforms.
///
/// Every variant here is fatal for a realignment run: without a valid
/// coordinate mapping or a consistent voxel shape nothing can be aligned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// A matrix that must be inverted has a (numerically) zero determinant.
    #[error("Singular transform in {context}: determinant {determinant:e}")]
    SingularTransform {
        context: String,
        determinant: f64,
    },

    /// A frame's voxel shape differs from the series shape.
    #[error("Dimension mismatch at frame {frame}: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        frame: usize,
        expected: [usize; 3],
        actual: [usize; 3],
    },

    /// A series was constructed without frames.
    #[error("Series contains no frames")]
    EmptySeries,

    /// Malformed input data (wrong length, non-finite values, ...).
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, GeometryError>;

impl GeometryError {
    /// Create a singular transform error.
    pub fn singular(context: impl Into<String>, determinant: f64) -> Self {
        Self::SingularTransform {
            context: context.into(),
            determinant,
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }
}
