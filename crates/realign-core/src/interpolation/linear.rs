//! Linear interpolation implementation.
//!
//! This module provides trilinear interpolation of 3D volumes.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use super::trait_::Interpolator;
use super::{apply_background, inside_mask, zero_outside, InterpolationOrder};

/// Linear Interpolator.
///
/// Performs trilinear interpolation over the 2×2×2 voxel neighbourhood.
/// Values at voxel centres are reproduced exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearInterpolator;

impl LinearInterpolator {
    /// Create a new linear interpolator.
    pub fn new() -> Self {
        Self
    }
}

/// Floor/ceil indices and weights of one axis.
struct AxisStencil<B: Backend> {
    index: [Tensor<B, 1, Int>; 2],
    weight: [Tensor<B, 1>; 2],
}

impl<B: Backend> AxisStencil<B> {
    fn new(coord: Tensor<B, 1>, len: usize) -> Self {
        let upper = (len - 1) as f64;
        // Out-of-bounds points are masked later; keep their indices valid.
        let coord = coord.clone().mask_fill(coord.is_nan(), 0.0).clamp(0.0, upper);
        let lo = coord.clone().floor();
        let frac = coord - lo.clone();
        let hi = (lo.clone() + 1.0).clamp(0.0, upper);
        Self {
            index: [lo.int(), hi.int()],
            weight: [frac.clone().neg().add_scalar(1.0), frac],
        }
    }
}

/// Trilinear interpolation, optionally with the voxel-space gradient.
fn trilinear<B: Backend>(
    data: &Tensor<B, 3>,
    indices: Tensor<B, 2>,
    with_gradient: bool,
) -> (Tensor<B, 1>, Option<[Tensor<B, 1>; 3]>) {
    let [nx, ny, nz] = data.dims();
    let [n, _] = indices.dims();
    let device = indices.device();

    let axes = [nx, ny, nz];
    let strides = [(ny * nz) as i32, nz as i32, 1];
    let stencils: Vec<AxisStencil<B>> = (0..3)
        .map(|axis| {
            let coord = indices.clone().narrow(1, axis, 1).squeeze::<1>(1);
            AxisStencil::new(coord, axes[axis])
        })
        .collect();

    // Pre-flatten data once to avoid repeated reshaping
    let flat_data = data.clone().reshape([nx * ny * nz]);

    let mut value = Tensor::<B, 1>::zeros([n], &device);
    let mut gradient = [
        Tensor::<B, 1>::zeros([n], &device),
        Tensor::<B, 1>::zeros([n], &device),
        Tensor::<B, 1>::zeros([n], &device),
    ];

    for corner in 0..8usize {
        let bits = [(corner >> 2) & 1, (corner >> 1) & 1, corner & 1];
        let idx = stencils[0].index[bits[0]].clone() * strides[0]
            + stencils[1].index[bits[1]].clone() * strides[1]
            + stencils[2].index[bits[2]].clone();
        let v = flat_data.clone().gather(0, idx);

        let w = |axis: usize| stencils[axis].weight[bits[axis]].clone();
        value = value + v.clone() * w(0) * w(1) * w(2);

        if with_gradient {
            // d/dx of the weights is -1 for the low corner and +1 for the high one
            let partials = [w(1) * w(2), w(0) * w(2), w(0) * w(1)];
            for (axis, partial) in partials.into_iter().enumerate() {
                let term = v.clone() * partial;
                gradient[axis] = if bits[axis] == 1 {
                    gradient[axis].clone() + term
                } else {
                    gradient[axis].clone() - term
                };
            }
        }
    }

    (value, with_gradient.then_some(gradient))
}

impl<B: Backend> Interpolator<B> for LinearInterpolator {
    fn order(&self) -> InterpolationOrder {
        InterpolationOrder::Linear
    }

    fn prepare(&self, data: &Tensor<B, 3>) -> Tensor<B, 3> {
        data.clone()
    }

    fn interpolate(
        &self,
        coefficients: &Tensor<B, 3>,
        indices: Tensor<B, 2>,
        background: f64,
    ) -> Tensor<B, 1> {
        let mask = inside_mask(&indices, coefficients.dims());
        let (value, _) = trilinear(coefficients, indices, false);
        apply_background(value, mask, background)
    }

    fn interpolate_with_gradient(
        &self,
        coefficients: &Tensor<B, 3>,
        indices: Tensor<B, 2>,
        background: f64,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let mask = inside_mask(&indices, coefficients.dims());
        let (value, gradient) = trilinear(coefficients, indices, true);
        let gradient = gradient
            .map(|g| Tensor::stack::<2>(g.to_vec(), 1))
            .unwrap_or_else(|| Tensor::zeros([mask.dims()[0], 3], &mask.device()));
        let gradient = zero_outside(gradient, mask.clone());
        (apply_background(value, mask, background), gradient)
    }
}
