use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::tensor::tensor_from_f64;

/// Voxel indices `(i, j, k)` of a `[nx, ny, nz]` grid taken every `stride`
/// voxels along each axis.
///
/// Order matches the row-major layout of a `[nx, ny, nz]` tensor (`k`
/// fastest), so with `stride == 1` the i-th entry is the i-th element of the
/// flattened volume. A stride of 0 is treated as 1.
pub fn grid_indices(shape: [usize; 3], stride: usize) -> Vec<[usize; 3]> {
    let stride = stride.max(1);
    let [nx, ny, nz] = shape;
    let mut indices = Vec::with_capacity(
        nx.div_ceil(stride) * ny.div_ceil(stride) * nz.div_ceil(stride),
    );
    for i in (0..nx).step_by(stride) {
        for j in (0..ny).step_by(stride) {
            for k in (0..nz).step_by(stride) {
                indices.push([i, j, k]);
            }
        }
    }
    indices
}

/// Generate a grid of continuous voxel coordinates for the given shape.
///
/// Returns a tensor of shape `[N, 3]` with columns `(i, j, k)`.
///
/// # Arguments
/// * `shape` - The volume shape `[nx, ny, nz]`
/// * `stride` - Subsampling step along every axis (1 = every voxel)
/// * `device` - The device to create the tensor on
pub fn generate_grid<B: Backend>(
    shape: [usize; 3],
    stride: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let indices = grid_indices(shape, stride);
    let total = indices.len();
    let flat: Vec<f64> = indices
        .iter()
        .flat_map(|idx| idx.iter().map(|&v| v as f64))
        .collect();
    tensor_from_f64::<B, 2>(&flat, [total, 3], device)
}
