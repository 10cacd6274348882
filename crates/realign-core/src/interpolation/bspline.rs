//! B-Spline interpolation implementation.
//!
//! This module provides cubic B-spline interpolation for smooth sampling of
//! volumes at continuous coordinates. Intensities are first converted to
//! spline coefficients by a separable recursive prefilter (mirror boundary
//! conditions) so that the interpolant passes through every voxel value.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::trait_::Interpolator;
use super::{apply_background, inside_mask, zero_outside, InterpolationOrder};
use crate::volume::tensor::{int_tensor_from_indices, tensor_from_f64, tensor_to_f64};

/// Pole of the cubic B-spline prefilter, `sqrt(3) - 2`.
const POLE: f64 = -0.267_949_192_431_122_7;

/// Accuracy of the truncated causal initialisation.
const PREFILTER_TOLERANCE: f64 = 1e-10;

/// Cubic B-spline weights for the four taps at `floor(x) - 1 ..= floor(x) + 2`,
/// with `t = x - floor(x)`.
fn cubic_weights(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    let one_minus = 1.0 - t;
    [
        one_minus * one_minus * one_minus / 6.0,
        (4.0 - 6.0 * t2 + 3.0 * t3) / 6.0,
        (1.0 + 3.0 * t + 3.0 * t2 - 3.0 * t3) / 6.0,
        t3 / 6.0,
    ]
}

/// Derivatives of [`cubic_weights`] with respect to `t`.
fn cubic_weight_derivatives(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let one_minus = 1.0 - t;
    [
        -one_minus * one_minus / 2.0,
        (3.0 * t2 - 4.0 * t) / 2.0,
        (1.0 + 2.0 * t - 3.0 * t2) / 2.0,
        t2 / 2.0,
    ]
}

/// Reflect an index into `[0, len)` with whole-sample mirror symmetry.
fn mirror_index(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let mut m = index.rem_euclid(period);
    if m >= len as isize {
        m = period - m;
    }
    m as usize
}

/// In-place cubic B-spline prefilter of one line of samples.
fn prefilter_line(line: &mut [f64]) {
    let n = line.len();
    if n < 2 {
        return;
    }
    let z = POLE;
    let gain = (1.0 - z) * (1.0 - 1.0 / z);
    line.iter_mut().for_each(|c| *c *= gain);

    line[0] = initial_causal_coefficient(line, z);
    for k in 1..n {
        line[k] += z * line[k - 1];
    }

    line[n - 1] = (z / (z * z - 1.0)) * (z * line[n - 2] + line[n - 1]);
    for k in (0..n - 1).rev() {
        line[k] = z * (line[k + 1] - line[k]);
    }
}

fn initial_causal_coefficient(line: &[f64], z: f64) -> f64 {
    let n = line.len();
    let horizon = (PREFILTER_TOLERANCE.ln() / z.abs().ln()).ceil() as usize;
    if horizon < n {
        let mut zn = z;
        let mut sum = line[0];
        for &c in &line[1..horizon] {
            sum += zn * c;
            zn *= z;
        }
        return sum;
    }

    // Exact mirror-symmetric sum for short lines
    let mut zn = z;
    let iz = 1.0 / z;
    let mut z2n = z.powi(n as i32 - 1);
    let mut sum = line[0] + z2n * line[n - 1];
    z2n *= z2n * iz;
    for &c in &line[1..n - 1] {
        sum += (zn + z2n) * c;
        zn *= z;
        z2n *= iz;
    }
    sum / (1.0 - zn * zn)
}

/// Apply [`prefilter_line`] along every line of `axis` of a row-major volume.
fn prefilter_axis(values: &mut [f64], shape: [usize; 3], axis: usize) {
    let strides = [shape[1] * shape[2], shape[2], 1];
    let len = shape[axis];
    let stride = strides[axis];
    let mut line = vec![0.0; len];

    for start in 0..values.len() {
        // Only visit line origins (index 0 along `axis`)
        if (start / stride) % len != 0 {
            continue;
        }
        for (p, slot) in line.iter_mut().enumerate() {
            *slot = values[start + p * stride];
        }
        prefilter_line(&mut line);
        for (p, &c) in line.iter().enumerate() {
            values[start + p * stride] = c;
        }
    }
}

/// Cubic B-spline interpolator.
///
/// Provides smooth interpolation using cubic B-spline basis functions over a
/// 4×4×4 neighbourhood, with an analytic spatial gradient.
#[derive(Debug, Clone, Copy, Default)]
pub struct BSplineInterpolator;

impl BSplineInterpolator {
    /// Create a new B-spline interpolator.
    pub fn new() -> Self {
        Self
    }

    fn evaluate<B: Backend>(
        &self,
        coefficients: &Tensor<B, 3>,
        indices: Tensor<B, 2>,
        with_gradient: bool,
    ) -> (Tensor<B, 1>, Option<Tensor<B, 2>>) {
        let shape = coefficients.dims();
        let [n, _] = indices.dims();
        let device = indices.device();
        let coords = tensor_to_f64(indices);

        // Per point and axis: the four mirrored taps and their weights.
        let mut taps = vec![[[0usize; 4]; 3]; n];
        let mut weights = vec![[[0.0f64; 4]; 3]; n];
        let mut derivatives = vec![[[0.0f64; 4]; 3]; n];
        for p in 0..n {
            for axis in 0..3 {
                let x = coords[p * 3 + axis];
                // Out-of-bounds points are masked later; keep their taps valid.
                let x = if x.is_finite() {
                    x.clamp(0.0, (shape[axis] - 1) as f64)
                } else {
                    0.0
                };
                let base = x.floor();
                let t = x - base;
                for (tap, slot) in taps[p][axis].iter_mut().enumerate() {
                    *slot = mirror_index(base as isize - 1 + tap as isize, shape[axis]);
                }
                weights[p][axis] = cubic_weights(t);
                derivatives[p][axis] = cubic_weight_derivatives(t);
            }
        }

        let strides = [shape[1] * shape[2], shape[2], 1];
        let flat = coefficients.clone().reshape([shape.iter().product::<usize>()]);
        let mut value = Tensor::<B, 1>::zeros([n], &device);
        let mut gradient = [
            Tensor::<B, 1>::zeros([n], &device),
            Tensor::<B, 1>::zeros([n], &device),
            Tensor::<B, 1>::zeros([n], &device),
        ];

        let mut flat_index = vec![0usize; n];
        let mut w = vec![0.0f64; n];
        let mut dw = [vec![0.0f64; n], vec![0.0f64; n], vec![0.0f64; n]];
        for a in 0..4 {
            for b in 0..4 {
                for c in 0..4 {
                    let tap = [a, b, c];
                    for p in 0..n {
                        flat_index[p] = (0..3).map(|axis| taps[p][axis][tap[axis]] * strides[axis]).sum();
                        let ws = [
                            weights[p][0][a],
                            weights[p][1][b],
                            weights[p][2][c],
                        ];
                        w[p] = ws[0] * ws[1] * ws[2];
                        if with_gradient {
                            dw[0][p] = derivatives[p][0][a] * ws[1] * ws[2];
                            dw[1][p] = ws[0] * derivatives[p][1][b] * ws[2];
                            dw[2][p] = ws[0] * ws[1] * derivatives[p][2][c];
                        }
                    }
                    let samples = flat
                        .clone()
                        .gather(0, int_tensor_from_indices::<B>(&flat_index, &device));
                    value = value + samples.clone() * tensor_from_f64::<B, 1>(&w, [n], &device);
                    if with_gradient {
                        for axis in 0..3 {
                            gradient[axis] = gradient[axis].clone()
                                + samples.clone() * tensor_from_f64::<B, 1>(&dw[axis], [n], &device);
                        }
                    }
                }
            }
        }

        let gradient = with_gradient.then(|| Tensor::stack::<2>(gradient.to_vec(), 1));
        (value, gradient)
    }
}

impl<B: Backend> Interpolator<B> for BSplineInterpolator {
    fn order(&self) -> InterpolationOrder {
        InterpolationOrder::Cubic
    }

    fn prepare(&self, data: &Tensor<B, 3>) -> Tensor<B, 3> {
        let shape = data.dims();
        tracing::debug!("B-spline prefilter on {:?}", shape);
        let mut values = tensor_to_f64(data.clone());
        for axis in 0..3 {
            prefilter_axis(&mut values, shape, axis);
        }
        tensor_from_f64::<B, 3>(&values, shape, &data.device())
    }

    fn interpolate(
        &self,
        coefficients: &Tensor<B, 3>,
        indices: Tensor<B, 2>,
        background: f64,
    ) -> Tensor<B, 1> {
        let mask = inside_mask(&indices, coefficients.dims());
        let (value, _) = self.evaluate(coefficients, indices, false);
        apply_background(value, mask, background)
    }

    fn interpolate_with_gradient(
        &self,
        coefficients: &Tensor<B, 3>,
        indices: Tensor<B, 2>,
        background: f64,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let mask = inside_mask(&indices, coefficients.dims());
        let [n, _] = indices.dims();
        let (value, gradient) = self.evaluate(coefficients, indices, true);
        let gradient = gradient.unwrap_or_else(|| Tensor::zeros([n, 3], &mask.device()));
        let gradient = zero_outside(gradient, mask.clone());
        (apply_background(value, mask, background), gradient)
    }
}
