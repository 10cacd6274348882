//! Interpolator trait for sampling volumes at continuous voxel coordinates.
//!
//! This module defines the capability every interpolation kernel implements.

use std::fmt::Debug;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::InterpolationOrder;

/// Interpolator trait for sampling values at continuous coordinates.
///
/// Sampling is a two-step process: [`Interpolator::prepare`] turns voxel
/// intensities into the coefficient volume the kernel works on (a no-op for
/// trilinear, a spline prefilter for higher orders) and is done once per
/// volume; [`Interpolator::interpolate`] then evaluates any number of point
/// batches against those coefficients.
///
/// Coordinates are continuous voxel indices `(i, j, k)` matching the axes of
/// the `[nx, ny, nz]` data tensor. A point outside `[0, n - 1]` on any axis
/// yields `background` and a zero gradient.
///
/// # Type Parameters
/// * `B` - The Burn backend
pub trait Interpolator<B: Backend>: Send + Sync + Debug {
    /// Kernel order implemented by this interpolator.
    fn order(&self) -> InterpolationOrder;

    /// Compute the coefficient volume for `data` (same shape).
    fn prepare(&self, data: &Tensor<B, 3>) -> Tensor<B, 3>;

    /// Interpolate values at the given continuous indices.
    ///
    /// # Arguments
    /// * `coefficients` - Output of [`Interpolator::prepare`], shape `[nx, ny, nz]`
    /// * `indices` - Voxel coordinates `[N, 3]`
    /// * `background` - Value returned for out-of-bounds points
    ///
    /// # Returns
    /// Tensor of sampled values `[N]`
    fn interpolate(
        &self,
        coefficients: &Tensor<B, 3>,
        indices: Tensor<B, 2>,
        background: f64,
    ) -> Tensor<B, 1>;

    /// Interpolate values and their spatial gradient.
    ///
    /// # Returns
    /// `(values [N], gradient [N, 3])`, the gradient taken with respect to
    /// voxel coordinates.
    fn interpolate_with_gradient(
        &self,
        coefficients: &Tensor<B, 3>,
        indices: Tensor<B, 2>,
        background: f64,
    ) -> (Tensor<B, 1>, Tensor<B, 2>);
}
