//! Reference volume selection.

use burn::tensor::backend::Backend;
use realign_core::{TimeSeries, VolumeGrid};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which volume the series is aligned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferenceStrategy {
    /// Frame 0.
    First,
    /// Frame `n / 2`.
    Middle,
    /// Voxel-wise mean of all frames, refined once after the first pass.
    #[default]
    Mean,
}

impl ReferenceStrategy {
    /// Index of the frame serving as reference, if the reference is a frame.
    pub fn frame_index(self, num_frames: usize) -> Option<usize> {
        match self {
            ReferenceStrategy::First => Some(0),
            ReferenceStrategy::Middle => Some(num_frames / 2),
            ReferenceStrategy::Mean => None,
        }
    }

    /// Build the reference volume for `series`.
    pub fn build<B: Backend>(self, series: &TimeSeries<B>) -> Result<VolumeGrid<B>> {
        match self.frame_index(series.len()) {
            Some(index) => Ok(series.frames()[index].clone()),
            None => Ok(series.mean_volume()?),
        }
    }
}

impl std::fmt::Display for ReferenceStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ReferenceStrategy::First => "first",
            ReferenceStrategy::Middle => "middle",
            ReferenceStrategy::Mean => "mean",
        };
        f.write_str(label)
    }
}
