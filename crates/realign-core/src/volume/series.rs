//! 4D time series of volumes.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nalgebra::Matrix4;

use super::volume::VolumeGrid;
use crate::error::{GeometryError, Result};

/// Ordered sequence of volumes sharing one voxel shape.
///
/// Frame order is acquisition order. Each frame keeps its own affine; only
/// the shape is required to agree.
#[derive(Debug, Clone)]
pub struct TimeSeries<B: Backend> {
    frames: Vec<VolumeGrid<B>>,
    acquisition_times: Vec<f64>,
}

impl<B: Backend> TimeSeries<B> {
    /// Build a series from frames.
    ///
    /// Acquisition times default to the frame index. Fails with `EmptySeries`
    /// for no frames and `DimensionMismatch` (naming the first offending
    /// frame) when shapes differ.
    pub fn new(frames: Vec<VolumeGrid<B>>) -> Result<Self> {
        let first = frames.first().ok_or(GeometryError::EmptySeries)?;
        let expected = first.shape();
        if let Some((frame, volume)) = frames
            .iter()
            .enumerate()
            .find(|(_, volume)| volume.shape() != expected)
        {
            return Err(GeometryError::DimensionMismatch {
                frame,
                expected,
                actual: volume.shape(),
            });
        }
        let acquisition_times = (0..frames.len()).map(|i| i as f64).collect();
        Ok(Self {
            frames,
            acquisition_times,
        })
    }

    /// Split a `[nx, ny, nz, nt]` tensor into frames sharing `affine`.
    ///
    /// Frame `t` is acquired at `t * repetition_time`.
    pub fn from_tensor(data: Tensor<B, 4>, affine: Matrix4<f64>, repetition_time: f64) -> Result<Self> {
        let [nx, ny, nz, nt] = data.dims();
        let frames = (0..nt)
            .map(|t| VolumeGrid::new(data.clone().narrow(3, t, 1).reshape([nx, ny, nz]), affine))
            .collect::<Result<Vec<_>>>()?;
        let times = (0..nt).map(|t| t as f64 * repetition_time).collect();
        Self::new(frames)?.with_acquisition_times(times)
    }

    /// Replace the acquisition times (one per frame).
    pub fn with_acquisition_times(mut self, times: Vec<f64>) -> Result<Self> {
        if times.len() != self.frames.len() {
            return Err(GeometryError::invalid_data(format!(
                "{} acquisition times for {} frames",
                times.len(),
                self.frames.len()
            )));
        }
        self.acquisition_times = times;
        Ok(self)
    }

    /// Stack the frames back into a `[nx, ny, nz, nt]` tensor.
    pub fn to_tensor(&self) -> Tensor<B, 4> {
        let frames = self.frames.iter().map(|f| f.data().clone()).collect();
        Tensor::stack::<4>(frames, 3)
    }

    /// All frames in acquisition order.
    pub fn frames(&self) -> &[VolumeGrid<B>] {
        &self.frames
    }

    /// Frame at `index`, if any.
    pub fn frame(&self, index: usize) -> Option<&VolumeGrid<B>> {
        self.frames.get(index)
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false for a constructed series; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Shared voxel shape.
    pub fn shape(&self) -> [usize; 3] {
        self.frames[0].shape()
    }

    /// Per-frame acquisition times.
    pub fn acquisition_times(&self) -> &[f64] {
        &self.acquisition_times
    }

    /// Voxel-wise mean of all frames, on the first frame's geometry.
    pub fn mean_volume(&self) -> Result<VolumeGrid<B>> {
        let sum = self
            .frames
            .iter()
            .skip(1)
            .fold(self.frames[0].data().clone(), |acc, f| acc + f.data().clone());
        self.frames[0].with_data(sum.div_scalar(self.frames.len() as f64))
    }
}
