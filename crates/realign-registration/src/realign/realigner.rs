//! Realignment of a 4D series to a reference volume.

use std::sync::Arc;
use std::time::{Duration, Instant};

use burn::tensor::backend::Backend;
use rayon::prelude::*;
use realign_core::filter::ResampleFilter;
use realign_core::interpolation::Interpolator;
use realign_core::{RigidTransform, TimeSeries, VolumeGrid};

use super::config::RealignConfig;
use super::log::{TransformLog, TransformRecord};
use super::reference::ReferenceStrategy;
use crate::cost::{CostFunction, ImageCost, ReferenceContext};
use crate::error::{RegistrationError, Result};
use crate::metric::SimilarityMetric;
use crate::optimizer::{ConvergenceStatus, Optimizer, StoppingCriteria};
use crate::progress::{FrameProgress, ProgressCallback};
use crate::regularization::{Regularized, TemporalSmoothness};
use crate::validation::{validate_config, validate_series};

/// Result of [`Realigner::realign`].
#[derive(Debug, Clone)]
pub struct RealignOutput<B: Backend> {
    /// Every frame resampled into the reference grid.
    pub series: TimeSeries<B>,
    /// One record per frame, in frame order.
    pub log: TransformLog,
    /// The reference the series was aligned to (the refined mean for
    /// [`ReferenceStrategy::Mean`]).
    pub reference: VolumeGrid<B>,
}

/// Estimates and applies per-frame rigid motion.
///
/// Strategies (metric, optimizer, interpolator) are chosen from the
/// configuration and can be replaced with the `with_*` builders.
///
/// # Examples
///
/// ```rust,ignore
/// use realign_registration::{RealignConfig, Realigner};
///
/// let realigner = Realigner::new(RealignConfig::new())?;
/// let output = realigner.realign(&series)?;
/// for record in &output.log {
///     println!("{}: {}", record.frame, record.transform);
/// }
/// ```
pub struct Realigner<B: Backend> {
    config: RealignConfig,
    metric: Box<dyn SimilarityMetric>,
    optimizer: Box<dyn Optimizer>,
    interpolator: Box<dyn Interpolator<B>>,
    callbacks: Vec<Arc<dyn ProgressCallback>>,
}

impl<B: Backend> Realigner<B> {
    /// Validate `config` and build its strategies.
    pub fn new(config: RealignConfig) -> Result<Self> {
        validate_config(&config)?;
        Ok(Self {
            metric: config.cost_metric.build(),
            optimizer: config.optimizer.build(),
            interpolator: config.interpolation_order.build(),
            callbacks: Vec::new(),
            config,
        })
    }

    /// Replace the similarity metric.
    pub fn with_metric(mut self, metric: Box<dyn SimilarityMetric>) -> Self {
        self.metric = metric;
        self
    }

    /// Replace the optimizer.
    pub fn with_optimizer(mut self, optimizer: Box<dyn Optimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Replace the interpolator used for both cost evaluation and resampling.
    pub fn with_interpolator(mut self, interpolator: Box<dyn Interpolator<B>>) -> Self {
        self.interpolator = interpolator;
        self
    }

    /// Add a progress callback.
    pub fn with_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn config(&self) -> &RealignConfig {
        &self.config
    }
}

impl<B: Backend> std::fmt::Debug for Realigner<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Realigner")
            .field("config", &self.config)
            .field("metric", &self.metric)
            .field("optimizer", &self.optimizer)
            .field("interpolator", &self.interpolator)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// Per-run state shared by every frame.
struct Run<'a, B: Backend> {
    context: &'a ReferenceContext<B>,
    criteria: &'a StoppingCriteria,
    started: Instant,
    total_frames: usize,
    pass: usize,
}

impl<B: Backend> Realigner<B>
where
    VolumeGrid<B>: Send + Sync,
    ReferenceContext<B>: Send + Sync,
{
    /// Realign every frame of `series` to the configured reference.
    ///
    /// Fatal errors (geometry, metric) abort the run; frames that stall or
    /// run out of iterations or time are recorded in the log instead.
    pub fn realign(&self, series: &TimeSeries<B>) -> Result<RealignOutput<B>> {
        let started = Instant::now();
        self.callbacks.iter().for_each(|c| c.on_start(series.len()));

        let output = self.run(series, started);
        match &output {
            Ok(output) => {
                let converged = output.log.converged_count();
                tracing::info!(
                    "Realigned {} frames in {:.2}s ({} converged)",
                    series.len(),
                    started.elapsed().as_secs_f64(),
                    converged
                );
                self.callbacks
                    .iter()
                    .for_each(|c| c.on_complete(converged, series.len(), started.elapsed()));
            }
            Err(err) => {
                let message = err.to_string();
                self.callbacks.iter().for_each(|c| c.on_error(&message));
            }
        }
        output
    }

    fn run(&self, series: &TimeSeries<B>, started: Instant) -> Result<RealignOutput<B>> {
        validate_series(series)?;

        let deadline = self
            .config
            .time_budget_secs
            .map(|secs| started + Duration::from_secs_f64(secs));
        let criteria = self.config.stopping_criteria().with_deadline(deadline);
        let strategy = self.config.reference_strategy;

        tracing::info!(
            "Realigning {} frames of shape {:?}: reference {}, {} / {}, {}",
            series.len(),
            series.shape(),
            strategy,
            self.metric.name(),
            self.optimizer.name(),
            if self.config.parallel { "parallel" } else { "sequential" }
        );

        let mut reference = strategy.build(series)?;
        let mut context = ReferenceContext::new(reference.clone(), self.config.sample_subsampling_factor)?;
        let mut log = self.run_pass(1, &context, series, None, &criteria, started)?;

        if strategy == ReferenceStrategy::Mean {
            if criteria.deadline_passed() {
                tracing::warn!("Time budget exhausted, skipping mean refinement");
            } else {
                // Barrier: the refined mean needs every pass-1 transform.
                let aligned = self.resample(series, &reference, &log)?;
                reference = aligned.mean_volume()?;
                context = ReferenceContext::new(reference.clone(), self.config.sample_subsampling_factor)?;
                let initial = log.transforms();
                log = self.run_pass(2, &context, series, Some(&initial), &criteria, started)?;
            }
        }

        let aligned = self.resample(series, &reference, &log)?;
        Ok(RealignOutput {
            series: aligned,
            log,
            reference,
        })
    }

    /// Optimize every frame once.
    ///
    /// Without `initial`, sequential passes warm-start each frame from its
    /// predecessor's result and parallel passes start from identity.
    fn run_pass(
        &self,
        pass: usize,
        context: &ReferenceContext<B>,
        series: &TimeSeries<B>,
        initial: Option<&[RigidTransform]>,
        criteria: &StoppingCriteria,
        started: Instant,
    ) -> Result<TransformLog> {
        let run = Run {
            context,
            criteria,
            started,
            total_frames: series.len(),
            pass,
        };
        let mut log = TransformLog::new();

        if self.config.parallel {
            let records = series
                .frames()
                .par_iter()
                .enumerate()
                .map(|(index, frame)| {
                    let start = initial.map_or_else(|| context.identity(), |t| t[index]);
                    self.align_frame(&run, index, frame, start, None)
                })
                .collect::<Result<Vec<_>>>()?;
            records.into_iter().for_each(|r| log.record(r));
        } else {
            let mut previous: Option<RigidTransform> = None;
            for (index, frame) in series.frames().iter().enumerate() {
                let start = match initial {
                    Some(transforms) => transforms[index],
                    None => previous.unwrap_or_else(|| context.identity()),
                };
                let record = self.align_frame(&run, index, frame, start, previous)?;
                previous = Some(record.transform);
                log.record(record);
            }
        }

        tracing::info!(
            "Pass {} complete: {}/{} frames converged",
            pass,
            log.converged_count(),
            log.len()
        );
        self.callbacks
            .iter()
            .for_each(|c| c.on_pass_complete(pass, started.elapsed()));
        Ok(log)
    }

    /// Optimize one frame starting from `start`.
    ///
    /// `anchor` is the previous frame's solution for temporal smoothness.
    fn align_frame(
        &self,
        run: &Run<'_, B>,
        index: usize,
        frame: &VolumeGrid<B>,
        start: RigidTransform,
        anchor: Option<RigidTransform>,
    ) -> Result<TransformRecord> {
        let record = if run.criteria.deadline_passed() {
            TransformRecord {
                frame: index,
                transform: start,
                status: ConvergenceStatus::MaxIterationsExceeded,
                iterations: 0,
                final_cost: f64::NAN,
                pass: run.pass,
            }
        } else {
            let cost = ImageCost::new(run.context, frame, self.interpolator.as_ref(), self.metric.as_ref())
                .with_gradient_mode(self.config.gradient_mode)
                .with_background(self.config.background);

            let smoothness = self.config.temporal_smoothness;
            let result = match anchor {
                Some(anchor) if smoothness > 0.0 => {
                    let penalty = TemporalSmoothness::new(anchor.parameters(), cost.parameter_scales(), smoothness);
                    self.optimizer
                        .minimize(&Regularized::new(cost, penalty), &start, run.criteria)
                }
                _ => self.optimizer.minimize(&cost, &start, run.criteria),
            }
            .map_err(|e| e.in_frame(index, "optimization"))?;

            TransformRecord {
                frame: index,
                transform: result.transform,
                status: result.status,
                iterations: result.iterations,
                final_cost: result.final_cost,
                pass: run.pass,
            }
        };

        match record.status {
            ConvergenceStatus::Converged => tracing::debug!(
                "Pass {} frame {}: {} in {} iterations, cost {:.6}",
                run.pass,
                index,
                record.transform,
                record.iterations,
                record.final_cost
            ),
            status => tracing::warn!(
                "Pass {} frame {}: {} after {} iterations ({})",
                run.pass,
                index,
                status,
                record.iterations,
                record.transform
            ),
        }

        let progress = FrameProgress {
            frame: index,
            total_frames: run.total_frames,
            pass: run.pass,
            transform: record.transform,
            status: record.status,
            iterations: record.iterations,
            final_cost: record.final_cost,
            elapsed: run.started.elapsed(),
        };
        self.callbacks.iter().for_each(|c| c.on_frame(&progress));

        Ok(record)
    }

    /// Resample every frame onto the reference grid through its transform.
    fn resample(
        &self,
        series: &TimeSeries<B>,
        reference: &VolumeGrid<B>,
        log: &TransformLog,
    ) -> Result<TimeSeries<B>> {
        let resample_frame = |(index, frame): (usize, &VolumeGrid<B>)| -> Result<VolumeGrid<B>> {
            let transform = log
                .get(index)
                .map(|r| r.transform)
                .ok_or_else(|| RegistrationError::metric(format!("no transform recorded for frame {}", index)))?;
            // The filter maps output (reference) points into the input frame.
            ResampleFilter::from_reference(reference, transform.invert(), self.interpolator.as_ref())
                .with_background(self.config.background)
                .apply(frame)
                .map_err(|e| RegistrationError::from(e).in_frame(index, "resampling"))
        };

        let frames = if self.config.parallel {
            series
                .frames()
                .par_iter()
                .enumerate()
                .map(&resample_frame)
                .collect::<Result<Vec<_>>>()?
        } else {
            series
                .frames()
                .iter()
                .enumerate()
                .map(&resample_frame)
                .collect::<Result<Vec<_>>>()?
        };

        Ok(TimeSeries::new(frames)?.with_acquisition_times(series.acquisition_times().to_vec())?)
    }
}
