//! Per-frame record of estimated transforms.

use realign_core::RigidTransform;
use serde::{Deserialize, Serialize};

use crate::error::{RegistrationError, Result};
use crate::optimizer::ConvergenceStatus;

/// Outcome of one frame's realignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRecord {
    pub frame: usize,
    /// Maps the frame's world coordinates into the reference's.
    pub transform: RigidTransform,
    pub status: ConvergenceStatus,
    pub iterations: usize,
    /// Cost at `transform`; NaN when the frame was never optimized.
    pub final_cost: f64,
    /// Pass that produced the record (2 after mean refinement).
    pub pass: usize,
}

impl TransformRecord {
    pub fn transform(&self) -> &RigidTransform {
        &self.transform
    }

    /// `(tx, ty, tz, rx, ry, rz)` in mm and radians.
    pub fn parameters(&self) -> [f64; 6] {
        self.transform.parameters()
    }

    pub fn is_converged(&self) -> bool {
        self.status == ConvergenceStatus::Converged
    }

    /// Turn a non-converged record into its error, for callers that treat
    /// non-convergence as a failure.
    pub fn check(&self) -> Result<()> {
        match self.status {
            ConvergenceStatus::Converged => Ok(()),
            ConvergenceStatus::Stalled => Err(RegistrationError::OptimizerStall { frame: self.frame }),
            ConvergenceStatus::MaxIterationsExceeded => Err(RegistrationError::MaxIterationsExceeded {
                frame: self.frame,
                iterations: self.iterations,
            }),
        }
    }
}

/// Ordered collection of [`TransformRecord`]s, one per frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformLog {
    records: Vec<TransformRecord>,
}

impl TransformLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any earlier record for the same frame.
    pub fn record(&mut self, record: TransformRecord) {
        match self.records.binary_search_by_key(&record.frame, |r| r.frame) {
            Ok(index) => self.records[index] = record,
            Err(index) => self.records.insert(index, record),
        }
    }

    pub fn get(&self, frame: usize) -> Option<&TransformRecord> {
        self.records
            .binary_search_by_key(&frame, |r| r.frame)
            .ok()
            .map(|index| &self.records[index])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in frame order.
    pub fn iter(&self) -> impl Iterator<Item = &TransformRecord> {
        self.records.iter()
    }

    /// Transforms in frame order.
    pub fn transforms(&self) -> Vec<RigidTransform> {
        self.records.iter().map(|r| r.transform).collect()
    }

    pub fn converged_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_converged()).count()
    }

    /// Every non-converged record as an error, in frame order.
    pub fn failures(&self) -> Vec<RegistrationError> {
        self.records.iter().filter_map(|r| r.check().err()).collect()
    }
}

impl<'a> IntoIterator for &'a TransformLog {
    type Item = &'a TransformRecord;
    type IntoIter = std::slice::Iter<'a, TransformRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
