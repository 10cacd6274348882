//! Synthetic phantom shared by the realignment tests.

#![allow(dead_code)]

use burn_ndarray::NdArray;
use nalgebra::{Matrix4, Point3, Vector3};
use realign_core::{RigidTransform, TimeSeries, VolumeGrid};

pub type B = NdArray<f32>;

pub const SIZE: usize = 32;

/// World center of the 32³ unit grid.
pub const CENTER: [f64; 3] = [15.5, 15.5, 15.5];

fn gaussian(d: Vector3<f64>, sigma: [f64; 3]) -> f64 {
    (-(d.x * d.x / (2.0 * sigma[0] * sigma[0])
        + d.y * d.y / (2.0 * sigma[1] * sigma[1])
        + d.z * d.z / (2.0 * sigma[2] * sigma[2])))
        .exp()
}

/// Asymmetric phantom: an anisotropic body plus two off-center blobs.
pub fn phantom(point: &Point3<f64>) -> f64 {
    let d = point - Point3::from(CENTER);
    100.0 * gaussian(d, [3.0, 2.0, 2.5])
        + 60.0 * gaussian(d - Vector3::new(3.0, -2.0, 1.0), [1.5; 3])
        + 40.0 * gaussian(d - Vector3::new(-4.0, 3.0, -3.0), [2.0; 3])
}

/// Rigid motion about the grid center, rotation in degrees.
pub fn motion(translation: [f64; 3], rotation_deg: [f64; 3]) -> RigidTransform {
    RigidTransform::new(translation, rotation_deg.map(f64::to_radians), CENTER)
}

/// Frame showing the phantom after it moved by `motion`.
pub fn moved_frame(motion: &RigidTransform) -> VolumeGrid<B> {
    let inverse = motion.invert();
    let mut values = Vec::with_capacity(SIZE * SIZE * SIZE);
    for i in 0..SIZE {
        for j in 0..SIZE {
            for k in 0..SIZE {
                let p = Point3::new(i as f64, j as f64, k as f64);
                values.push(phantom(&inverse.apply(&p)));
            }
        }
    }
    VolumeGrid::from_values(&values, [SIZE; 3], Matrix4::identity(), &Default::default())
        .expect("identity affine")
}

/// One frame per motion.
pub fn series(motions: &[RigidTransform]) -> TimeSeries<B> {
    TimeSeries::new(motions.iter().map(moved_frame).collect()).expect("equal shapes")
}

/// `n` frames of the unmoved phantom.
pub fn static_series(n: usize) -> TimeSeries<B> {
    series(&vec![RigidTransform::identity(CENTER); n])
}

/// Translation error (mm) and largest rotation error (degrees) of `estimate`
/// against the inverse of `applied`.
pub fn residual(estimate: &RigidTransform, applied: &RigidTransform) -> (f64, f64) {
    let composed = estimate.compose(applied);
    (
        composed.translation_norm(),
        composed.rotation_angles_deg().amax(),
    )
}
