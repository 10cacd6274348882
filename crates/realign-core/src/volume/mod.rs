//! Volume types and operations.
//!
//! This module provides the 3D `VolumeGrid`, the 4D `TimeSeries` built from
//! it, voxel grid generation and host/tensor conversion helpers.

pub mod volume;
pub mod series;
pub mod grid;
pub mod tensor;

pub use volume::VolumeGrid;
pub use series::TimeSeries;
pub use grid::{generate_grid, grid_indices};
pub use tensor::{int_tensor_from_indices, tensor_from_f64, tensor_to_f64};
