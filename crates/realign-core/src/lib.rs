//! Geometry core for 4D rigid-body realignment.
//!
//! Volumes are `burn` tensors paired with a voxel-to-world affine; rigid
//! transforms and affines are `nalgebra` matrices evaluated in `f64`.

pub mod error;
pub mod volume;
pub mod transform;
pub mod interpolation;
pub mod filter;

pub use error::{GeometryError, Result};
pub use volume::{TimeSeries, VolumeGrid};
pub use transform::RigidTransform;
pub use interpolation::{InterpolationOrder, Interpolator};
pub use filter::ResampleFilter;
