//! Transform types and operations.
//!
//! This module provides the six-parameter rigid transform used for motion
//! correction and the homogeneous affine helpers shared with volumes.

pub mod affine;
pub mod rigid;

pub use affine::{invert_affine, transform_points};
pub use rigid::RigidTransform;
