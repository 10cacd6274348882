//! Interpolation types and operations.
//!
//! This module provides the interpolator capability, its trilinear and cubic
//! B-spline implementations, and helpers for sampling a volume at world
//! coordinates.

pub mod trait_;
pub mod linear;
pub mod bspline;

pub use trait_::Interpolator;
pub use linear::LinearInterpolator;
pub use bspline::BSplineInterpolator;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use crate::volume::VolumeGrid;

/// Interpolation kernel selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationOrder {
    /// Trilinear (order 1).
    #[default]
    Linear,
    /// Cubic B-spline (order 3).
    Cubic,
}

impl InterpolationOrder {
    /// Instantiate the interpolator for this order.
    pub fn build<B: Backend>(self) -> Box<dyn Interpolator<B>> {
        match self {
            InterpolationOrder::Linear => Box::new(LinearInterpolator::new()),
            InterpolationOrder::Cubic => Box::new(BSplineInterpolator::new()),
        }
    }

    /// Polynomial degree of the kernel.
    pub fn degree(self) -> usize {
        match self {
            InterpolationOrder::Linear => 1,
            InterpolationOrder::Cubic => 3,
        }
    }
}

/// Slack, in voxels, for coordinates that land on the grid edge up to
/// round-off of the voxel/world mapping.
pub const BOUNDARY_TOLERANCE: f64 = 1e-4;

/// Mask `[N]` holding 1 where a voxel coordinate lies inside `[0, n - 1]` on
/// every axis (within [`BOUNDARY_TOLERANCE`]), 0 otherwise (including
/// non-finite coordinates).
pub fn inside_mask<B: Backend>(indices: &Tensor<B, 2>, shape: [usize; 3]) -> Tensor<B, 1> {
    let [n, _] = indices.dims();
    let mut mask = Tensor::<B, 1>::ones([n], &indices.device());
    for (axis, &len) in shape.iter().enumerate() {
        let coord = indices.clone().narrow(1, axis, 1).squeeze::<1>(1);
        let lower = coord.clone().greater_equal_elem(-BOUNDARY_TOLERANCE).float();
        let upper = coord.lower_equal_elem((len as f64) - 1.0 + BOUNDARY_TOLERANCE).float();
        mask = mask * lower * upper;
    }
    mask
}

/// Replace values outside the grid with the background.
///
/// Filled rather than blended: a non-finite coordinate interpolates to NaN.
pub(crate) fn apply_background<B: Backend>(
    values: Tensor<B, 1>,
    mask: Tensor<B, 1>,
    background: f64,
) -> Tensor<B, 1> {
    values.mask_fill(mask.equal_elem(0.0), background)
}

/// Zero the spatial gradient `[N, 3]` outside the grid.
pub(crate) fn zero_outside<B: Backend>(gradient: Tensor<B, 2>, mask: Tensor<B, 1>) -> Tensor<B, 2> {
    let outside = mask.equal_elem(0.0).unsqueeze_dim::<2>(1).repeat_dim(1, 3);
    gradient.mask_fill(outside, 0.0)
}

/// Sample `volume` at a batch of world points `[N, 3]`.
///
/// Prepares the coefficient volume on every call; callers evaluating many
/// batches against one volume should call [`Interpolator::prepare`] once and
/// map points with [`VolumeGrid::world_to_voxel_tensor`] themselves.
pub fn sample_world_points<B: Backend>(
    volume: &VolumeGrid<B>,
    interpolator: &dyn Interpolator<B>,
    world_points: Tensor<B, 2>,
    background: f64,
) -> Tensor<B, 1> {
    let coefficients = interpolator.prepare(volume.data());
    let indices = volume.world_to_voxel_tensor(world_points);
    interpolator.interpolate(&coefficients, indices, background)
}
