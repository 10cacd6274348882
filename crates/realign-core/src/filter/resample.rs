//! Resample volume filter.
//!
//! This module provides `ResampleFilter`, which resamples a volume onto a
//! target grid through a rigid transform and an interpolator.

use burn::tensor::backend::Backend;
use nalgebra::Matrix4;

use crate::error::Result;
use crate::interpolation::trait_::Interpolator;
use crate::transform::affine::transform_points;
use crate::transform::RigidTransform;
use crate::volume::{generate_grid, VolumeGrid};

/// Resample volume filter.
///
/// Resamples a volume by mapping every output voxel to output world space,
/// through the transform into input world space, and interpolating the input
/// there.
///
/// The transform maps Output World Space -> Input World Space. When
/// resampling a moving frame into reference space this is the inverse of the
/// estimated moving -> reference transform.
///
/// # Type Parameters
/// * `B` - The Burn backend
#[derive(Debug)]
pub struct ResampleFilter<'a, B: Backend> {
    shape: [usize; 3],
    affine: Matrix4<f64>,
    transform: RigidTransform,
    interpolator: &'a dyn Interpolator<B>,
    background: f64,
}

impl<'a, B: Backend> ResampleFilter<'a, B> {
    /// Create a new resample filter.
    ///
    /// # Arguments
    /// * `shape` - Output volume shape
    /// * `affine` - Output voxel-to-world affine
    /// * `transform` - Transform from output space to input space
    /// * `interpolator` - Interpolator for input volume sampling
    pub fn new(
        shape: [usize; 3],
        affine: Matrix4<f64>,
        transform: RigidTransform,
        interpolator: &'a dyn Interpolator<B>,
    ) -> Self {
        Self {
            shape,
            affine,
            transform,
            interpolator,
            background: 0.0,
        }
    }

    /// Create from a reference volume, reusing its shape and affine.
    pub fn from_reference(
        reference: &VolumeGrid<B>,
        transform: RigidTransform,
        interpolator: &'a dyn Interpolator<B>,
    ) -> Self {
        Self::new(reference.shape(), *reference.affine(), transform, interpolator)
    }

    /// Set the value written where the input has no coverage.
    pub fn with_background(mut self, value: f64) -> Self {
        self.background = value;
        self
    }

    /// Apply filter to an input volume.
    pub fn apply(&self, input: &VolumeGrid<B>) -> Result<VolumeGrid<B>> {
        let device = input.device();

        // Output voxel -> output world -> input world -> input voxel, in one matrix
        let pull = input.inverse_affine() * self.transform.matrix() * self.affine;
        tracing::debug!(
            "Resampling {:?} onto {:?} with {:?} interpolation ({})",
            input.shape(),
            self.shape,
            self.interpolator.order(),
            self.transform
        );

        let output_indices = generate_grid::<B>(self.shape, 1, &device);
        let input_indices = transform_points(&pull, output_indices);

        let coefficients = self.interpolator.prepare(input.data());
        let values = self
            .interpolator
            .interpolate(&coefficients, input_indices, self.background);

        VolumeGrid::new(values.reshape(self.shape), self.affine)
    }
}
