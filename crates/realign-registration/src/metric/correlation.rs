//! Correlation metric implementation.

use super::trait_::{check_samples, SimilarityMetric};
use crate::error::{RegistrationError, Result};

/// Per-sample variance below which a signal is treated as constant.
const VARIANCE_EPSILON: f64 = 1e-12;

/// Correlation Metric.
///
/// Computes the Pearson correlation `r` between fixed and moving samples and
/// returns `1 - r` as loss, so perfect alignment of same-contrast frames
/// scores 0 and the range is `[0, 2]`.
///
/// A constant reference has no defined correlation and is an error. A
/// constant moving signal (e.g. every sample fell outside the frame) scores
/// 1 with a zero derivative.
#[derive(Debug, Clone, Copy, Default)]
pub struct Correlation;

/// Centred second moments of a sample pair.
struct Moments {
    fixed_mean: f64,
    moving_mean: f64,
    sxx: f64,
    syy: f64,
    sxy: f64,
}

impl Moments {
    fn new(fixed: &[f64], moving: &[f64]) -> Self {
        let n = fixed.len() as f64;
        let fixed_mean = fixed.iter().sum::<f64>() / n;
        let moving_mean = moving.iter().sum::<f64>() / n;
        let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
        for (f, m) in fixed.iter().zip(moving) {
            let df = f - fixed_mean;
            let dm = m - moving_mean;
            sxx += df * df;
            syy += dm * dm;
            sxy += df * dm;
        }
        Self {
            fixed_mean,
            moving_mean,
            sxx,
            syy,
            sxy,
        }
    }
}

impl Correlation {
    /// Create a new correlation metric.
    pub fn new() -> Self {
        Self
    }

    fn moments(fixed: &[f64], moving: &[f64]) -> Result<Option<Moments>> {
        check_samples(fixed, moving)?;
        let moments = Moments::new(fixed, moving);
        let floor = VARIANCE_EPSILON * fixed.len() as f64;
        if moments.sxx.is_nan() || moments.sxx <= floor {
            return Err(RegistrationError::metric(
                "reference samples have zero variance",
            ));
        }
        if moments.syy.is_nan() || moments.syy <= floor {
            return Ok(None);
        }
        Ok(Some(moments))
    }

    /// Pearson correlation of the samples (0 for a constant moving signal).
    pub fn coefficient(&self, fixed: &[f64], moving: &[f64]) -> Result<f64> {
        Ok(Self::moments(fixed, moving)?
            .map(|m| m.sxy / (m.sxx * m.syy).sqrt())
            .unwrap_or(0.0))
    }
}

impl SimilarityMetric for Correlation {
    fn loss(&self, fixed: &[f64], moving: &[f64]) -> Result<f64> {
        Ok(1.0 - self.coefficient(fixed, moving)?)
    }

    fn loss_derivative(&self, fixed: &[f64], moving: &[f64]) -> Result<Vec<f64>> {
        let Some(m) = Self::moments(fixed, moving)? else {
            return Ok(vec![0.0; moving.len()]);
        };
        let norm = (m.sxx * m.syy).sqrt();
        let r = m.sxy / norm;
        // d(1 - r)/dm_i = -[(f_i - f̄) / sqrt(sxx syy) - r (m_i - m̄) / syy]
        Ok(fixed
            .iter()
            .zip(moving)
            .map(|(f, mv)| -((f - m.fixed_mean) / norm - r * (mv - m.moving_mean) / m.syy))
            .collect())
    }

    fn name(&self) -> &'static str {
        "Correlation"
    }
}
