//! Conversions between host `f64` buffers and backend tensors.
//!
//! Geometry is computed in `f64` on the host; voxel data lives in the
//! backend's float element type. These helpers keep the element conversion
//! in one place so callers never assume `f32`.

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Int, Tensor, TensorData};

/// Build a float tensor of the given shape from `f64` values.
pub fn tensor_from_f64<B: Backend, const D: usize>(
    values: &[f64],
    shape: [usize; D],
    device: &B::Device,
) -> Tensor<B, D> {
    let data: Vec<B::FloatElem> = values.iter().map(|v| v.elem()).collect();
    Tensor::from_data(TensorData::new(data, shape), device)
}

/// Build a 1D integer tensor from flat indices.
pub fn int_tensor_from_indices<B: Backend>(
    indices: &[usize],
    device: &B::Device,
) -> Tensor<B, 1, Int> {
    let data: Vec<B::IntElem> = indices.iter().map(|&i| (i as i64).elem()).collect();
    Tensor::from_data(TensorData::new(data, [indices.len()]), device)
}

/// Read a float tensor back to the host as row-major `f64` values.
pub fn tensor_to_f64<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f64> {
    tensor.into_data().iter::<f64>().collect()
}
