//! Volume grid with a voxel-to-world affine.
//!
//! This module provides `VolumeGrid`, an immutable 3D scalar field sampled on
//! a regular voxel lattice together with the 4×4 affine mapping voxel
//! indices to world (millimetre) coordinates.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nalgebra::{Matrix4, Point3, Vector3};

use super::tensor::{tensor_from_f64, tensor_to_f64};
use crate::error::{GeometryError, Result};
use crate::transform::affine::{invert_affine, transform_points};

/// Immutable 3D volume with physical geometry.
///
/// The intensity tensor has shape `[nx, ny, nz]` and is stored row-major
/// (`k` varies fastest). The affine maps homogeneous voxel indices
/// `(i, j, k, 1)` to world coordinates; its inverse is computed once at
/// construction.
///
/// # Coordinate Systems
/// * **Voxel Space**: continuous indices, voxel centres at integers
/// * **World Space**: millimetres, as defined by the affine
///
/// # Examples
/// ```rust
/// use realign_core::VolumeGrid;
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
/// use nalgebra::Matrix4;
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let data = Tensor::<Backend, 3>::zeros([10, 10, 10], &device);
/// let volume = VolumeGrid::new(data, Matrix4::new_scaling(2.0)).unwrap();
/// assert_eq!(volume.shape(), [10, 10, 10]);
/// ```
#[derive(Debug, Clone)]
pub struct VolumeGrid<B: Backend> {
    data: Tensor<B, 3>,
    affine: Matrix4<f64>,
    inverse_affine: Matrix4<f64>,
}

impl<B: Backend> VolumeGrid<B> {
    /// Create a volume from an intensity tensor and its voxel-to-world affine.
    ///
    /// Fails with `SingularTransform` when the affine's determinant is within
    /// machine epsilon of zero.
    pub fn new(data: Tensor<B, 3>, affine: Matrix4<f64>) -> Result<Self> {
        let inverse_affine = invert_affine(&affine, "voxel-to-world affine")?;
        Ok(Self {
            data,
            affine,
            inverse_affine,
        })
    }

    /// Create a volume from host values laid out row-major over `shape`.
    pub fn from_values(
        values: &[f64],
        shape: [usize; 3],
        affine: Matrix4<f64>,
        device: &B::Device,
    ) -> Result<Self> {
        let expected = shape.iter().product::<usize>();
        if values.len() != expected {
            return Err(GeometryError::invalid_data(format!(
                "expected {} voxels for shape {:?}, got {}",
                expected,
                shape,
                values.len()
            )));
        }
        Self::new(tensor_from_f64::<B, 3>(values, shape, device), affine)
    }

    /// Create a volume sharing this volume's geometry but holding new data.
    pub fn with_data(&self, data: Tensor<B, 3>) -> Result<Self> {
        let actual = data.dims();
        if actual != self.shape() {
            return Err(GeometryError::DimensionMismatch {
                frame: 0,
                expected: self.shape(),
                actual,
            });
        }
        Ok(Self {
            data,
            affine: self.affine,
            inverse_affine: self.inverse_affine,
        })
    }

    /// Get the intensity tensor.
    pub fn data(&self) -> &Tensor<B, 3> {
        &self.data
    }

    /// Get the volume shape `[nx, ny, nz]`.
    pub fn shape(&self) -> [usize; 3] {
        self.data.dims()
    }

    /// Total number of voxels.
    pub fn num_voxels(&self) -> usize {
        self.shape().iter().product()
    }

    /// Device holding the intensity tensor.
    pub fn device(&self) -> B::Device {
        self.data.device()
    }

    /// Voxel-to-world affine.
    pub fn affine(&self) -> &Matrix4<f64> {
        &self.affine
    }

    /// World-to-voxel affine (exact inverse of [`Self::affine`]).
    pub fn inverse_affine(&self) -> &Matrix4<f64> {
        &self.inverse_affine
    }

    /// Map a continuous voxel index to world coordinates.
    pub fn voxel_to_world(&self, voxel: &Point3<f64>) -> Point3<f64> {
        self.affine.transform_point(voxel)
    }

    /// Map a world point to a continuous voxel index.
    pub fn world_to_voxel(&self, point: &Point3<f64>) -> Point3<f64> {
        self.inverse_affine.transform_point(point)
    }

    /// Batch voxel-to-world mapping of a `[N, 3]` tensor.
    pub fn voxel_to_world_tensor(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        transform_points(&self.affine, indices)
    }

    /// Batch world-to-voxel mapping of a `[N, 3]` tensor.
    pub fn world_to_voxel_tensor(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        transform_points(&self.inverse_affine, points)
    }

    /// Voxel size along each axis (column norms of the affine's linear part).
    pub fn spacing(&self) -> Vector3<f64> {
        let linear = self.affine.fixed_view::<3, 3>(0, 0);
        Vector3::new(
            linear.column(0).norm(),
            linear.column(1).norm(),
            linear.column(2).norm(),
        )
    }

    /// World coordinates of the geometric centre of the voxel lattice.
    pub fn center(&self) -> Point3<f64> {
        let [nx, ny, nz] = self.shape();
        let mid = Point3::new(
            (nx as f64 - 1.0) / 2.0,
            (ny as f64 - 1.0) / 2.0,
            (nz as f64 - 1.0) / 2.0,
        );
        self.voxel_to_world(&mid)
    }

    /// Whether `other` has the same shape and (numerically) the same affine.
    pub fn same_geometry(&self, other: &Self) -> bool {
        self.shape() == other.shape() && (self.affine - other.affine).amax() < 1e-9
    }

    /// Copy the intensities to the host, row-major.
    pub fn to_values(&self) -> Vec<f64> {
        tensor_to_f64(self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    fn affine_2mm() -> Matrix4<f64> {
        let mut affine = Matrix4::new_scaling(2.0);
        affine[(3, 3)] = 1.0;
        affine[(0, 3)] = -10.0;
        affine[(1, 3)] = -20.0;
        affine[(2, 3)] = 5.0;
        affine
    }

    #[test]
    fn test_volume_creation() {
        let device = Default::default();
        let data = Tensor::<Backend, 3>::zeros([4, 5, 6], &device);
        let volume = VolumeGrid::new(data, Matrix4::identity()).unwrap();

        assert_eq!(volume.shape(), [4, 5, 6]);
        assert_eq!(volume.num_voxels(), 120);
        assert_eq!(volume.spacing(), Vector3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_singular_affine_rejected() {
        let device = Default::default();
        let data = Tensor::<Backend, 3>::zeros([2, 2, 2], &device);
        let mut affine = Matrix4::identity();
        affine[(2, 2)] = 0.0;

        let err = VolumeGrid::new(data, affine).unwrap_err();
        assert!(matches!(err, GeometryError::SingularTransform { .. }));
    }

    #[test]
    fn test_world_voxel_roundtrip() {
        let device = Default::default();
        let data = Tensor::<Backend, 3>::zeros([10, 10, 10], &device);
        let volume = VolumeGrid::new(data, affine_2mm()).unwrap();

        let voxel = Point3::new(3.0, 4.5, 7.25);
        let world = volume.voxel_to_world(&voxel);
        assert!((world - Point3::new(-4.0, -11.0, 19.5)).norm() < 1e-12);

        let back = volume.world_to_voxel(&world);
        assert!((back - voxel).norm() < 1e-12);
        assert_eq!(volume.spacing(), Vector3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn test_center() {
        let device = Default::default();
        let data = Tensor::<Backend, 3>::zeros([11, 21, 5], &device);
        let volume = VolumeGrid::new(data, affine_2mm()).unwrap();
        let center = volume.center();
        assert!((center - Point3::new(0.0, 0.0, 9.0)).norm() < 1e-12);
    }

    #[test]
    fn test_from_values_length_check() {
        let device = Default::default();
        let err = VolumeGrid::<Backend>::from_values(&[1.0; 7], [2, 2, 2], Matrix4::identity(), &device)
            .unwrap_err();
        assert!(matches!(err, GeometryError::InvalidData(_)));
    }

    #[test]
    fn test_tensor_mapping_matches_point_mapping() {
        let device = Default::default();
        let data = Tensor::<Backend, 3>::zeros([10, 10, 10], &device);
        let volume = VolumeGrid::new(data, affine_2mm()).unwrap();

        let indices = tensor_from_f64::<Backend, 2>(&[1.0, 2.0, 3.0, 0.0, 0.0, 0.0], [2, 3], &device);
        let world = tensor_to_f64(volume.voxel_to_world_tensor(indices));
        assert_eq!(world, vec![-8.0, -16.0, 11.0, -10.0, -20.0, 5.0]);
    }
}
