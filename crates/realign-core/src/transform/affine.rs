//! Homogeneous 4×4 affine helpers.
//!
//! Affines are kept in `f64` on the host and only pushed to the backend when a
//! batch of points has to be mapped.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nalgebra::Matrix4;

use crate::error::{GeometryError, Result};
use crate::volume::tensor::tensor_from_f64;

/// Points per matmul dispatch; some backends cap workgroup counts at 65535.
const CHUNK_SIZE: usize = 32768;

/// Invert a homogeneous affine, failing on a (numerically) singular matrix.
///
/// A determinant that is non-finite or within machine epsilon of zero is
/// rejected before inversion is attempted.
pub fn invert_affine(matrix: &Matrix4<f64>, context: &str) -> Result<Matrix4<f64>> {
    let determinant = matrix.determinant();
    if !determinant.is_finite() || determinant.abs() <= f64::EPSILON {
        return Err(GeometryError::singular(context, determinant));
    }
    matrix
        .try_inverse()
        .ok_or_else(|| GeometryError::singular(context, determinant))
}

/// Apply a homogeneous affine to a batch of points.
///
/// # Arguments
/// * `matrix` - 4×4 affine; the bottom row is assumed to be `[0, 0, 0, 1]`
/// * `points` - Tensor of shape `[N, 3]`
///
/// # Returns
/// Tensor of shape `[N, 3]` with `y = L x + b` per row
pub fn transform_points<B: Backend>(matrix: &Matrix4<f64>, points: Tensor<B, 2>) -> Tensor<B, 2> {
    let device = points.device();
    let [n_points, _] = points.dims();

    // Row-vector form: y = x @ L^T + b
    let mut linear_t = [0.0f64; 9];
    for r in 0..3 {
        for c in 0..3 {
            linear_t[c * 3 + r] = matrix[(r, c)];
        }
    }
    let linear_t = tensor_from_f64::<B, 2>(&linear_t, [3, 3], &device);
    let offset = tensor_from_f64::<B, 2>(
        &[matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)]],
        [1, 3],
        &device,
    );

    if n_points <= CHUNK_SIZE {
        return points.matmul(linear_t) + offset;
    }

    let chunks = (0..n_points)
        .step_by(CHUNK_SIZE)
        .map(|start| {
            let len = CHUNK_SIZE.min(n_points - start);
            points.clone().narrow(0, start, len).matmul(linear_t.clone()) + offset.clone()
        })
        .collect::<Vec<_>>();
    Tensor::cat(chunks, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::tensor::tensor_to_f64;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_invert_affine() {
        let mut m = Matrix4::new_scaling(2.0);
        m[(3, 3)] = 1.0;
        m[(0, 3)] = 4.0;
        let inv = invert_affine(&m, "test").unwrap();
        assert!((m * inv - Matrix4::identity()).amax() < 1e-12);
    }

    #[test]
    fn test_invert_singular() {
        let mut m = Matrix4::identity();
        m[(1, 1)] = 0.0;
        let err = invert_affine(&m, "scanner affine").unwrap_err();
        match err {
            GeometryError::SingularTransform { context, determinant } => {
                assert_eq!(context, "scanner affine");
                assert_eq!(determinant, 0.0);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_transform_points() {
        let device = Default::default();
        // Swap x and y, then shift z by 3.
        let m = Matrix4::new(
            0.0, 1.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 3.0, //
            0.0, 0.0, 0.0, 1.0,
        );
        let points = tensor_from_f64::<B, 2>(&[1.0, 2.0, 3.0, -1.0, 0.5, 0.0], [2, 3], &device);
        let out = tensor_to_f64(transform_points(&m, points));
        assert_eq!(out, vec![2.0, 1.0, 6.0, 0.5, -1.0, 3.0]);
    }

    #[test]
    fn test_transform_points_chunked() {
        let device = Default::default();
        let n = CHUNK_SIZE + 10;
        let values: Vec<f64> = (0..n * 3).map(|i| (i % 7) as f64).collect();
        let points = tensor_from_f64::<B, 2>(&values, [n, 3], &device);
        let mut m = Matrix4::identity();
        m[(0, 3)] = 1.0;
        let out = transform_points(&m, points);
        assert_eq!(out.dims(), [n, 3]);
        let out = tensor_to_f64(out);
        let last = n - 1;
        assert_eq!(out[last * 3], values[last * 3] + 1.0);
        assert_eq!(out[last * 3 + 2], values[last * 3 + 2]);
    }
}
