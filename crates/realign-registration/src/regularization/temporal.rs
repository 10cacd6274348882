//! Temporal smoothness regularization.

use super::trait_::Regularizer;

/// Pulls a frame's parameters towards its predecessor's solution.
///
/// `penalty = weight * Σ ((p_k - a_k) / s_k)²` where `a` is the previous
/// frame's parameters and `s` the per-parameter scales (1 mm, 1 degree), so
/// translations and rotations are penalized in comparable units.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalSmoothness {
    anchor: [f64; 6],
    scales: [f64; 6],
    weight: f64,
}

impl TemporalSmoothness {
    /// Create a smoothness term around `anchor`.
    pub fn new(anchor: [f64; 6], scales: [f64; 6], weight: f64) -> Self {
        Self {
            anchor,
            scales,
            weight,
        }
    }

    /// Parameters the penalty is centred on.
    pub fn anchor(&self) -> [f64; 6] {
        self.anchor
    }
}

impl Regularizer for TemporalSmoothness {
    fn penalty(&self, parameters: &[f64; 6]) -> f64 {
        let sum: f64 = (0..6)
            .map(|k| {
                let d = (parameters[k] - self.anchor[k]) / self.scales[k];
                d * d
            })
            .sum();
        self.weight * sum
    }

    fn gradient(&self, parameters: &[f64; 6]) -> [f64; 6] {
        std::array::from_fn(|k| {
            2.0 * self.weight * (parameters[k] - self.anchor[k]) / (self.scales[k] * self.scales[k])
        })
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }
}
