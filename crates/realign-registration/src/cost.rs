//! Cost functions scoring a candidate rigid transform.
//!
//! A [`CostFunction`] maps the six rigid parameters to a scalar to be
//! minimized. [`ImageCost`] is the image-driven implementation: it pulls the
//! moving frame through the candidate transform at sample points fixed once
//! per reference and scores the samples with a [`SimilarityMetric`].

use std::f64::consts::PI;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nalgebra::Matrix4;
use realign_core::interpolation::Interpolator;
use realign_core::transform::transform_points;
use realign_core::volume::{generate_grid, grid_indices, int_tensor_from_indices, tensor_to_f64};
use realign_core::{RigidTransform, VolumeGrid};
use serde::{Deserialize, Serialize};

use crate::error::{RegistrationError, Result};
use crate::metric::SimilarityMetric;

/// Central-difference step for translations (mm).
pub const TRANSLATION_STEP_MM: f64 = 0.1;

/// Central-difference step for rotations (0.1 degree, in radians).
pub const ROTATION_STEP_RAD: f64 = 0.1 * PI / 180.0;

/// Natural scale of one rotation unit for the optimizer (1 degree).
pub const ROTATION_SCALE_RAD: f64 = PI / 180.0;

/// Per-parameter finite-difference steps `(tx, ty, tz, rx, ry, rz)`.
pub const FINITE_DIFFERENCE_STEPS: [f64; 6] = [
    TRANSLATION_STEP_MM,
    TRANSLATION_STEP_MM,
    TRANSLATION_STEP_MM,
    ROTATION_STEP_RAD,
    ROTATION_STEP_RAD,
    ROTATION_STEP_RAD,
];

/// Per-parameter scales: 1 mm for translations, 1 degree for rotations.
pub const PARAMETER_SCALES: [f64; 6] = [
    1.0,
    1.0,
    1.0,
    ROTATION_SCALE_RAD,
    ROTATION_SCALE_RAD,
    ROTATION_SCALE_RAD,
];

/// Parameter offset used to differentiate the pull matrix.
const MATRIX_DERIVATIVE_STEP: f64 = 1e-6;

/// Scalar objective over rigid transforms.
pub trait CostFunction {
    /// Cost at `transform` (lower is better).
    fn evaluate(&self, transform: &RigidTransform) -> Result<f64>;

    /// Gradient with respect to `(tx, ty, tz, rx, ry, rz)`.
    ///
    /// Defaults to central finite differences with [`FINITE_DIFFERENCE_STEPS`].
    fn gradient(&self, transform: &RigidTransform) -> Result<[f64; 6]> {
        finite_difference_gradient(self, transform)
    }

    /// Typical magnitude of a unit change in each parameter.
    fn parameter_scales(&self) -> [f64; 6] {
        PARAMETER_SCALES
    }
}

/// Central finite-difference gradient with the fixed documented steps.
pub fn finite_difference_gradient<C: CostFunction + ?Sized>(
    cost: &C,
    transform: &RigidTransform,
) -> Result<[f64; 6]> {
    let parameters = transform.parameters();
    let mut gradient = [0.0; 6];
    for (k, &h) in FINITE_DIFFERENCE_STEPS.iter().enumerate() {
        let mut plus = parameters;
        let mut minus = parameters;
        plus[k] += h;
        minus[k] -= h;
        let f_plus = cost.evaluate(&transform.with_parameters(plus))?;
        let f_minus = cost.evaluate(&transform.with_parameters(minus))?;
        gradient[k] = (f_plus - f_minus) / (2.0 * h);
    }
    Ok(gradient)
}

/// How [`ImageCost`] computes its gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GradientMode {
    /// Chain rule through the interpolator's spatial gradient.
    Analytic,
    /// Central differences with [`FINITE_DIFFERENCE_STEPS`].
    #[default]
    FiniteDifference,
}

/// Read-only per-reference state shared by every frame's cost.
///
/// Built once per reference volume: the sample lattice, the reference
/// intensities there, and the rotation center all transforms use.
#[derive(Debug, Clone)]
pub struct ReferenceContext<B: Backend> {
    volume: VolumeGrid<B>,
    sample_voxels: Tensor<B, 2>,
    sample_points: Vec<[f64; 3]>,
    reference_values: Vec<f64>,
    center: [f64; 3],
    subsampling: usize,
}

impl<B: Backend> ReferenceContext<B> {
    /// Select samples on the reference grid every `subsampling` voxels.
    pub fn new(volume: VolumeGrid<B>, subsampling: usize) -> Result<Self> {
        let subsampling = subsampling.max(1);
        let shape = volume.shape();
        let device = volume.device();

        let indices = grid_indices(shape, subsampling);
        if indices.len() < 2 {
            return Err(RegistrationError::metric(format!(
                "reference grid {:?} with subsampling {} yields {} samples, need at least 2",
                shape,
                subsampling,
                indices.len()
            )));
        }

        let flat: Vec<usize> = indices
            .iter()
            .map(|[i, j, k]| (i * shape[1] + j) * shape[2] + k)
            .collect();
        let reference_values = tensor_to_f64(
            volume
                .data()
                .clone()
                .reshape([volume.num_voxels()])
                .gather(0, int_tensor_from_indices::<B>(&flat, &device)),
        );
        let sample_points = indices
            .iter()
            .map(|idx| idx.map(|v| v as f64))
            .collect();
        let sample_voxels = generate_grid::<B>(shape, subsampling, &device);
        let c = volume.center();

        tracing::debug!(
            "Reference context: {} samples (subsampling {}), center ({:.2}, {:.2}, {:.2})",
            flat.len(),
            subsampling,
            c.x,
            c.y,
            c.z
        );

        Ok(Self {
            volume,
            sample_voxels,
            sample_points,
            reference_values,
            center: [c.x, c.y, c.z],
            subsampling,
        })
    }

    /// Reference volume.
    pub fn volume(&self) -> &VolumeGrid<B> {
        &self.volume
    }

    /// Sample voxel coordinates on the reference grid, `[N, 3]`.
    pub fn sample_voxels(&self) -> &Tensor<B, 2> {
        &self.sample_voxels
    }

    /// Reference intensities at the samples.
    pub fn reference_values(&self) -> &[f64] {
        &self.reference_values
    }

    /// Number of samples.
    pub fn num_samples(&self) -> usize {
        self.reference_values.len()
    }

    /// World-space rotation center (reference grid center).
    pub fn center(&self) -> [f64; 3] {
        self.center
    }

    /// Sampling stride.
    pub fn subsampling(&self) -> usize {
        self.subsampling
    }

    /// Identity transform about the reference center.
    pub fn identity(&self) -> RigidTransform {
        RigidTransform::identity(self.center)
    }
}

/// Image similarity cost of one moving frame against a reference.
///
/// The candidate transform `T` maps moving world coordinates to reference
/// world coordinates; a reference sample at `x` is compared with the moving
/// frame at `T⁻¹(x)`.
#[derive(Debug)]
pub struct ImageCost<'a, B: Backend> {
    context: &'a ReferenceContext<B>,
    moving: &'a VolumeGrid<B>,
    coefficients: Tensor<B, 3>,
    interpolator: &'a dyn Interpolator<B>,
    metric: &'a dyn SimilarityMetric,
    gradient_mode: GradientMode,
    background: f64,
}

impl<'a, B: Backend> ImageCost<'a, B> {
    /// Bind a moving frame to the shared reference context.
    pub fn new(
        context: &'a ReferenceContext<B>,
        moving: &'a VolumeGrid<B>,
        interpolator: &'a dyn Interpolator<B>,
        metric: &'a dyn SimilarityMetric,
    ) -> Self {
        Self {
            context,
            moving,
            coefficients: interpolator.prepare(moving.data()),
            interpolator,
            metric,
            gradient_mode: GradientMode::default(),
            background: 0.0,
        }
    }

    /// Select analytic or finite-difference gradients.
    pub fn with_gradient_mode(mut self, mode: GradientMode) -> Self {
        self.gradient_mode = mode;
        self
    }

    /// Value used for samples that fall outside the moving frame.
    pub fn with_background(mut self, background: f64) -> Self {
        self.background = background;
        self
    }

    /// Matrix taking reference voxel indices to moving voxel indices.
    fn pull_matrix(&self, transform: &RigidTransform) -> Matrix4<f64> {
        self.moving.inverse_affine() * transform.invert().matrix() * self.context.volume().affine()
    }

    fn pulled_indices(&self, pull: &Matrix4<f64>) -> Tensor<B, 2> {
        transform_points(pull, self.context.sample_voxels().clone())
    }

    /// Moving intensities at the samples under `transform`.
    pub fn moving_samples(&self, transform: &RigidTransform) -> Vec<f64> {
        let indices = self.pulled_indices(&self.pull_matrix(transform));
        tensor_to_f64(
            self.interpolator
                .interpolate(&self.coefficients, indices, self.background),
        )
    }

    fn analytic_gradient(&self, transform: &RigidTransform) -> Result<[f64; 6]> {
        let pull = self.pull_matrix(transform);
        let (values, spatial) = self.interpolator.interpolate_with_gradient(
            &self.coefficients,
            self.pulled_indices(&pull),
            self.background,
        );
        let values = tensor_to_f64(values);
        let spatial = tensor_to_f64(spatial);
        let dloss = self
            .metric
            .loss_derivative(self.context.reference_values(), &values)?;

        // d(pull)/dp_k by central differences of the (cheap, exact) matrix
        let parameters = transform.parameters();
        let pull_derivatives: Vec<Matrix4<f64>> = (0..6)
            .map(|k| {
                let mut plus = parameters;
                let mut minus = parameters;
                plus[k] += MATRIX_DERIVATIVE_STEP;
                minus[k] -= MATRIX_DERIVATIVE_STEP;
                (self.pull_matrix(&transform.with_parameters(plus))
                    - self.pull_matrix(&transform.with_parameters(minus)))
                    / (2.0 * MATRIX_DERIVATIVE_STEP)
            })
            .collect();

        let mut gradient = [0.0; 6];
        for (i, point) in self.context.sample_points.iter().enumerate() {
            if dloss[i] == 0.0 {
                continue;
            }
            let g = &spatial[i * 3..i * 3 + 3];
            for (k, dm) in pull_derivatives.iter().enumerate() {
                let mut dot = 0.0;
                for r in 0..3 {
                    let moved = dm[(r, 0)] * point[0] + dm[(r, 1)] * point[1] + dm[(r, 2)] * point[2] + dm[(r, 3)];
                    dot += g[r] * moved;
                }
                gradient[k] += dloss[i] * dot;
            }
        }
        Ok(gradient)
    }
}

impl<B: Backend> CostFunction for ImageCost<'_, B> {
    fn evaluate(&self, transform: &RigidTransform) -> Result<f64> {
        let moving = self.moving_samples(transform);
        self.metric.loss(self.context.reference_values(), &moving)
    }

    fn gradient(&self, transform: &RigidTransform) -> Result<[f64; 6]> {
        match self.gradient_mode {
            GradientMode::FiniteDifference => finite_difference_gradient(self, transform),
            GradientMode::Analytic => self.analytic_gradient(transform),
        }
    }
}
