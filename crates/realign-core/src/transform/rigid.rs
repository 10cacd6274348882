//! Rigid transform implementation.
//!
//! This module provides a six-parameter rigid transform (rotation +
//! translation about a fixed center).

use std::fmt;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nalgebra::{Matrix3, Matrix4, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use super::affine::transform_points;
use crate::error::{GeometryError, Result};

/// Tolerance on `RᵀR - I` when accepting a matrix as a rotation.
const ORTHONORMAL_TOLERANCE: f64 = 1e-6;

/// Rigid Transform (Rotation + Translation).
///
/// Parameters are `(tx, ty, tz, rx, ry, rz)`: translations in millimetres and
/// Euler angles in radians. The mapping includes a fixed center of rotation:
/// `T(x) = R(x - c) + c + t`
///
/// # Rotation order
/// `R = Rz(rz) · Ry(ry) · Rx(rx)`: a point is rotated about X first, then Y,
/// then Z. Every operation (`matrix`, `apply`, `compose`, `invert`,
/// `from_matrix`) uses this order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    parameters: [f64; 6],
    center: [f64; 3],
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity([0.0; 3])
    }
}

impl RigidTransform {
    /// Create a new rigid transform.
    ///
    /// # Arguments
    /// * `translation` - `[tx, ty, tz]` in millimetres
    /// * `rotation` - `[rx, ry, rz]` Euler angles in radians
    /// * `center` - fixed center of rotation in world coordinates
    pub fn new(translation: [f64; 3], rotation: [f64; 3], center: [f64; 3]) -> Self {
        let [tx, ty, tz] = translation;
        let [rx, ry, rz] = rotation;
        Self {
            parameters: [tx, ty, tz, rx, ry, rz],
            center,
        }
    }

    /// Create an identity rigid transform about `center`.
    pub fn identity(center: [f64; 3]) -> Self {
        Self {
            parameters: [0.0; 6],
            center,
        }
    }

    /// Create a transform from the packed parameter vector.
    pub fn from_parameters(parameters: [f64; 6], center: [f64; 3]) -> Self {
        Self { parameters, center }
    }

    /// Packed parameters `(tx, ty, tz, rx, ry, rz)`.
    pub fn parameters(&self) -> [f64; 6] {
        self.parameters
    }

    /// Same center, new parameters.
    pub fn with_parameters(&self, parameters: [f64; 6]) -> Self {
        Self {
            parameters,
            center: self.center,
        }
    }

    /// Express the same mapping about a different center.
    ///
    /// Rotation angles are unchanged; the translation absorbs the shift.
    pub fn with_center(&self, center: [f64; 3]) -> Self {
        Self::from_matrix_unchecked(&self.matrix(), center)
    }

    /// Translation vector.
    pub fn translation(&self) -> Vector3<f64> {
        Vector3::new(self.parameters[0], self.parameters[1], self.parameters[2])
    }

    /// Euler angles `(rx, ry, rz)` in radians.
    pub fn rotation_angles(&self) -> Vector3<f64> {
        Vector3::new(self.parameters[3], self.parameters[4], self.parameters[5])
    }

    /// Euler angles in degrees.
    pub fn rotation_angles_deg(&self) -> Vector3<f64> {
        self.rotation_angles().map(f64::to_degrees)
    }

    /// Center of rotation.
    pub fn center(&self) -> Point3<f64> {
        Point3::from(self.center)
    }

    /// Length of the translation vector.
    pub fn translation_norm(&self) -> f64 {
        self.translation().norm()
    }

    /// Rotation matrix `Rz · Ry · Rx`.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        let [_, _, _, rx, ry, rz] = self.parameters;
        // nalgebra's (roll, pitch, yaw) composes as Rz(yaw) * Ry(pitch) * Rx(roll)
        Rotation3::from_euler_angles(rx, ry, rz).into_inner()
    }

    /// Homogeneous 4×4 matrix of the mapping.
    pub fn matrix(&self) -> Matrix4<f64> {
        let r = self.rotation_matrix();
        let c = Vector3::from(self.center);
        let offset = c + self.translation() - r * c;

        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&offset);
        m
    }

    /// Recover a rigid transform from a homogeneous matrix.
    ///
    /// Fails with `InvalidData` if the linear block is not a proper rotation.
    pub fn from_matrix(matrix: &Matrix4<f64>, center: [f64; 3]) -> Result<Self> {
        let r: Matrix3<f64> = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let deviation = (r.transpose() * r - Matrix3::identity()).amax();
        let determinant = r.determinant();
        if !deviation.is_finite() || deviation > ORTHONORMAL_TOLERANCE || determinant <= 0.0 {
            return Err(GeometryError::invalid_data(format!(
                "matrix is not a proper rotation (orthonormality error {deviation:e}, det {determinant:e})"
            )));
        }
        Ok(Self::from_matrix_unchecked(matrix, center))
    }

    /// Parameter extraction for matrices known to be rigid.
    fn from_matrix_unchecked(matrix: &Matrix4<f64>, center: [f64; 3]) -> Self {
        let r: Matrix3<f64> = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let (rx, ry, rz) = Rotation3::from_matrix_unchecked(r).euler_angles();
        let offset: Vector3<f64> = matrix.fixed_view::<3, 1>(0, 3).into_owned();
        let c = Vector3::from(center);
        // offset = c + t - R c
        let t = offset - c + r * c;
        Self::new([t.x, t.y, t.z], [rx, ry, rz], center)
    }

    /// Map a single world point.
    pub fn apply(&self, point: &Point3<f64>) -> Point3<f64> {
        let c = self.center();
        c + self.rotation_matrix() * (point - c) + self.translation()
    }

    /// Map a batch of `[N, 3]` world points on the backend.
    pub fn transform_points<B: Backend>(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        transform_points(&self.matrix(), points)
    }

    /// Composition `self ∘ other`: `other` is applied first.
    ///
    /// The result keeps `self`'s center.
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        Self::from_matrix_unchecked(&(self.matrix() * other.matrix()), self.center)
    }

    /// Exact inverse, about the same center.
    pub fn invert(&self) -> RigidTransform {
        let r = self.rotation_matrix();
        let m = self.matrix();
        let offset: Vector3<f64> = m.fixed_view::<3, 1>(0, 3).into_owned();
        let rt = r.transpose();

        let mut inv = Matrix4::identity();
        inv.fixed_view_mut::<3, 3>(0, 0).copy_from(&rt);
        inv.fixed_view_mut::<3, 1>(0, 3).copy_from(&(-(rt * offset)));
        Self::from_matrix_unchecked(&inv, self.center)
    }

    /// Whether both transforms map points identically up to `tolerance`
    /// (compared on their homogeneous matrices).
    pub fn approx_eq(&self, other: &RigidTransform, tolerance: f64) -> bool {
        (self.matrix() - other.matrix()).amax() <= tolerance
    }

    /// Whether every parameter is within `tolerance` of zero.
    pub fn is_identity(&self, tolerance: f64) -> bool {
        self.parameters.iter().all(|p| p.abs() <= tolerance)
    }
}

impl fmt::Display for RigidTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.translation();
        let r = self.rotation_angles_deg();
        write!(
            f,
            "t=({:.3}, {:.3}, {:.3}) mm, r=({:.3}, {:.3}, {:.3}) deg",
            t.x, t.y, t.z, r.x, r.y, r.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::tensor::{tensor_from_f64, tensor_to_f64};
    use burn_ndarray::NdArray;
    use std::f64::consts::FRAC_PI_2;

    type TestBackend = NdArray<f32>;

    fn assert_point_eq(a: Point3<f64>, b: Point3<f64>) {
        assert!((a - b).norm() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_pure_translation() {
        let t = RigidTransform::new([1.0, 2.0, 3.0], [0.0; 3], [0.0; 3]);
        assert_point_eq(t.apply(&Point3::new(1.0, 1.0, 1.0)), Point3::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn test_rotation_about_center() {
        // 90 degrees about z, centered at (1, 0, 0)
        let t = RigidTransform::new([0.0; 3], [0.0, 0.0, FRAC_PI_2], [1.0, 0.0, 0.0]);
        assert_point_eq(t.apply(&Point3::new(1.0, 0.0, 0.0)), Point3::new(1.0, 0.0, 0.0));
        assert_point_eq(t.apply(&Point3::new(2.0, 0.0, 0.0)), Point3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_rotation_order_x_then_z() {
        // Rx(90) sends y to z; Rz(90) then leaves z alone.
        let t = RigidTransform::new([0.0; 3], [FRAC_PI_2, 0.0, FRAC_PI_2], [0.0; 3]);
        assert_point_eq(t.apply(&Point3::new(0.0, 1.0, 0.0)), Point3::new(0.0, 0.0, 1.0));
        // Rx(90) leaves x alone; Rz(90) then sends x to y.
        assert_point_eq(t.apply(&Point3::new(1.0, 0.0, 0.0)), Point3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_matrix_roundtrip_parameters() {
        let t = RigidTransform::new([2.0, -1.0, 0.5], [0.1, -0.2, 0.3], [10.0, 5.0, -3.0]);
        let back = RigidTransform::from_matrix(&t.matrix(), [10.0, 5.0, -3.0]).unwrap();
        for (a, b) in t.parameters().iter().zip(back.parameters()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn test_from_matrix_rejects_scaling() {
        let m = Matrix4::new_scaling(1.5);
        assert!(RigidTransform::from_matrix(&m, [0.0; 3]).is_err());
    }

    #[test]
    fn test_invert() {
        let t = RigidTransform::new([5.0, 0.0, -2.0], [0.05, 0.0, 0.1], [15.5, 15.5, 15.5]);
        let p = Point3::new(3.0, 7.0, -1.0);
        assert_point_eq(t.invert().apply(&t.apply(&p)), p);
        assert!(t.compose(&t.invert()).is_identity(1e-10));
    }

    #[test]
    fn test_compose_order() {
        let a = RigidTransform::new([1.0, 0.0, 0.0], [0.0; 3], [0.0; 3]);
        let b = RigidTransform::new([0.0; 3], [0.0, 0.0, FRAC_PI_2], [0.0; 3]);
        let p = Point3::new(1.0, 0.0, 0.0);
        // b first: (1,0,0) -> (0,1,0), then a: -> (1,1,0)
        assert_point_eq(a.compose(&b).apply(&p), Point3::new(1.0, 1.0, 0.0));
        assert_point_eq(a.compose(&b).apply(&p), a.apply(&b.apply(&p)));
    }

    #[test]
    fn test_with_center_preserves_mapping() {
        let t = RigidTransform::new([1.0, 2.0, 3.0], [0.2, 0.1, -0.3], [0.0; 3]);
        let moved = t.with_center([4.0, 4.0, 4.0]);
        assert!(t.approx_eq(&moved, 1e-10));
        assert!((t.rotation_angles() - moved.rotation_angles()).amax() < 1e-10);
    }

    #[test]
    fn test_transform_points_matches_apply() {
        let device = Default::default();
        let t = RigidTransform::new([1.0, -2.0, 0.5], [0.0, 0.0, 0.3], [2.0, 2.0, 2.0]);
        let points = tensor_from_f64::<TestBackend, 2>(&[0.0, 0.0, 0.0, 3.0, 1.0, -1.0], [2, 3], &device);
        let out = tensor_to_f64(t.transform_points(points));

        let expected = [t.apply(&Point3::new(0.0, 0.0, 0.0)), t.apply(&Point3::new(3.0, 1.0, -1.0))];
        for (row, e) in expected.iter().enumerate() {
            for axis in 0..3 {
                assert!((out[row * 3 + axis] - e[axis]).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_display() {
        let t = RigidTransform::new([1.0, 0.0, 0.0], [0.0, 0.0, 3f64.to_radians()], [0.0; 3]);
        assert_eq!(
            t.to_string(),
            "t=(1.000, 0.000, 0.000) mm, r=(0.000, 0.000, 3.000) deg"
        );
    }
}
