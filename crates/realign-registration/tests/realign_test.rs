mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{motion, residual, series, static_series, B, CENTER};
use realign_core::{GeometryError, InterpolationOrder, RigidTransform, TimeSeries};
use realign_registration::optimizer::QuasiNewton;
use realign_registration::{
    ConvergenceStatus, CostFunction, GradientMode, HistoryCallback, OptimizationResult, Optimizer,
    RealignConfig, Realigner, ReferenceStrategy, RegistrationError, StoppingCriteria,
};

fn realigner(config: RealignConfig) -> Realigner<B> {
    Realigner::new(config).unwrap()
}

#[test]
fn test_identity_series() {
    let input = static_series(4);
    let output = realigner(RealignConfig::new()).realign(&input).unwrap();

    assert_eq!(output.log.len(), 4);
    for record in &output.log {
        assert_eq!(record.status, ConvergenceStatus::Converged);
        assert!(record.transform.is_identity(1e-3), "frame {}: {}", record.frame, record.transform);
    }

    let original = input.frame(0).unwrap().to_values();
    for frame in output.series.frames() {
        for (a, b) in frame.to_values().iter().zip(&original) {
            assert!((a - b).abs() < 1e-2);
        }
    }
}

#[test]
fn test_single_shifted_frame() {
    let mut motions = vec![motion([0.0; 3], [0.0; 3]); 10];
    motions[9] = motion([5.0, 0.0, 0.0], [0.0; 3]);
    let input = series(&motions);

    let config = RealignConfig::new().with_reference_strategy(ReferenceStrategy::First);
    let output = realigner(config).realign(&input).unwrap();

    assert_eq!(output.log.converged_count(), 10);
    for record in output.log.iter().take(9) {
        assert!(record.transform.translation_norm() < 0.5, "frame {}: {}", record.frame, record.transform);
    }
    let shifted = output.log.get(9).unwrap().transform;
    let t = shifted.translation();
    assert!((t.x + 5.0).abs() < 0.5, "{}", shifted);
    assert!(t.y.abs() < 0.5 && t.z.abs() < 0.5, "{}", shifted);
    assert!(shifted.rotation_angles_deg().amax() < 0.5, "{}", shifted);

    // The realigned frame matches the reference again
    let reference = input.frame(0).unwrap().to_values();
    let corrected = output.series.frame(9).unwrap().to_values();
    let peak = reference.iter().cloned().fold(0.0, f64::max);
    let worst = reference
        .iter()
        .zip(&corrected)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max);
    assert!(worst < 0.2 * peak, "max difference {worst}");
}

/// Quasi-Newton that gives up without moving on one call.
#[derive(Debug)]
struct StallOnCall {
    stall_at: usize,
    calls: AtomicUsize,
    inner: QuasiNewton,
}

impl Optimizer for StallOnCall {
    fn minimize(
        &self,
        cost: &dyn CostFunction,
        start: &RigidTransform,
        criteria: &StoppingCriteria,
    ) -> realign_registration::Result<OptimizationResult> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == self.stall_at {
            let final_cost = cost.evaluate(start)?;
            return Ok(OptimizationResult {
                transform: *start,
                status: ConvergenceStatus::Stalled,
                iterations: 0,
                final_cost,
                cost_history: vec![final_cost],
            });
        }
        self.inner.minimize(cost, start, criteria)
    }

    fn name(&self) -> &'static str {
        "stall-on-call"
    }
}

#[test]
fn test_stalled_frame_is_recorded_and_run_continues() {
    let mut motions = vec![motion([0.0; 3], [0.0; 3]); 3];
    motions.push(motion([1.5, 0.0, 0.0], [0.0; 3]));
    motions.push(motion([1.5, -1.0, 0.0], [0.0; 3]));
    let input = series(&motions);

    let config = RealignConfig::new().with_reference_strategy(ReferenceStrategy::First);
    let optimizer = StallOnCall {
        stall_at: 2,
        calls: AtomicUsize::new(0),
        inner: QuasiNewton::default(),
    };
    let output = realigner(config)
        .with_optimizer(Box::new(optimizer))
        .realign(&input)
        .unwrap();

    assert_eq!(output.log.len(), 5);
    let stalled = output.log.get(2).unwrap();
    assert_eq!(stalled.status, ConvergenceStatus::Stalled);
    assert!(matches!(stalled.check(), Err(RegistrationError::OptimizerStall { frame: 2 })));

    for frame in 3..5 {
        let record = output.log.get(frame).unwrap();
        assert_eq!(record.status, ConvergenceStatus::Converged, "frame {frame}");
        assert!(record.check().is_ok());
    }
    let last = output.log.get(4).unwrap().transform.translation();
    assert!((last.x + 1.5).abs() < 0.5 && (last.y - 1.0).abs() < 0.5, "{last:?}");

    let failures = output.log.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].is_non_fatal());
    assert_eq!(output.series.len(), 5);
}

#[test]
fn test_recovers_translation_and_rotation() {
    let applied = motion([2.0, 1.0, 0.0], [0.0, 0.0, 3.0]);
    let input = series(&[motion([0.0; 3], [0.0; 3]), applied]);

    let config = RealignConfig::new().with_reference_strategy(ReferenceStrategy::First);
    let output = realigner(config).realign(&input).unwrap();

    let record = output.log.get(1).unwrap();
    let (translation_error, rotation_error) = residual(&record.transform, &applied);
    assert!(translation_error < 0.5, "translation error {translation_error} mm ({})", record.transform);
    assert!(rotation_error < 0.5, "rotation error {rotation_error} deg ({})", record.transform);
}

#[test]
fn test_analytic_gradient_with_cubic_interpolation() {
    let applied = motion([-1.5, 2.0, 0.5], [0.0; 3]);
    let input = series(&[motion([0.0; 3], [0.0; 3]), applied]);

    let config = RealignConfig::new()
        .with_reference_strategy(ReferenceStrategy::First)
        .with_gradient_mode(GradientMode::Analytic)
        .with_interpolation_order(InterpolationOrder::Cubic);
    let output = realigner(config).realign(&input).unwrap();

    let (translation_error, rotation_error) = residual(&output.log.get(1).unwrap().transform, &applied);
    assert!(translation_error < 0.5, "translation error {translation_error}");
    assert!(rotation_error < 0.5, "rotation error {rotation_error}");
}

#[test]
fn test_mean_reference_is_consistent_across_frames() {
    let motions = [
        motion([0.0; 3], [0.0; 3]),
        motion([1.0, 0.0, 0.0], [0.0; 3]),
        motion([0.0, -1.0, 0.5], [0.0; 3]),
        motion([0.5, 0.5, 0.0], [0.0, 0.0, 1.0]),
    ];
    let history = HistoryCallback::new();
    let output = realigner(RealignConfig::new())
        .with_callback(Arc::new(history.clone()))
        .realign(&series(&motions))
        .unwrap();

    // Each estimate undoes its frame's motion up to one common offset
    let offsets: Vec<RigidTransform> = output
        .log
        .iter()
        .zip(&motions)
        .map(|(record, applied)| record.transform.compose(applied))
        .collect();
    for offset in &offsets[1..] {
        let relative = offset.compose(&offsets[0].invert());
        assert!(relative.translation_norm() < 0.5, "{}", relative);
        assert!(relative.rotation_angles_deg().amax() < 0.5, "{}", relative);
    }

    assert_eq!(history.completed_passes(), vec![1, 2]);
    assert!(output.log.iter().all(|r| r.pass == 2));
    assert_eq!(history.get_history().len(), 8);
    assert!(output.reference.same_geometry(output.series.frame(0).unwrap()));
}

#[test]
fn test_parallel_matches_sequential() {
    let mut motions = vec![motion([0.0; 3], [0.0; 3]); 4];
    motions[2] = motion([0.0, 2.0, 0.0], [0.0; 3]);
    let input = series(&motions);

    let base = RealignConfig::new().with_reference_strategy(ReferenceStrategy::Middle);
    let sequential = realigner(base.clone()).realign(&input).unwrap();
    let parallel = realigner(base.with_parallel(true)).realign(&input).unwrap();

    assert_eq!(parallel.log.len(), 4);
    for (a, b) in sequential.log.iter().zip(parallel.log.iter()) {
        assert_eq!(a.frame, b.frame);
        assert!(
            a.transform.approx_eq(&b.transform, 0.3),
            "frame {}: {} vs {}",
            a.frame,
            a.transform,
            b.transform
        );
    }
    // Frame 2 is the reference: everything else moves by -2 mm in y
    let t = parallel.log.get(0).unwrap().transform.translation();
    assert!((t.y - 2.0).abs() < 0.5, "{}", parallel.log.get(0).unwrap().transform);
}

#[test]
fn test_temporal_smoothness_pulls_towards_previous_frame() {
    let input = series(&[
        motion([0.0; 3], [0.0; 3]),
        motion([0.0; 3], [0.0; 3]),
        motion([3.0, 0.0, 0.0], [0.0; 3]),
    ]);
    let base = RealignConfig::new().with_reference_strategy(ReferenceStrategy::First);

    let free = realigner(base.clone()).realign(&input).unwrap();
    let smooth = realigner(base.with_temporal_smoothness(10.0)).realign(&input).unwrap();

    let free_tx = free.log.get(2).unwrap().transform.translation().x;
    let smooth_tx = smooth.log.get(2).unwrap().transform.translation().x;
    assert!((free_tx + 3.0).abs() < 0.5);
    assert!(smooth_tx.abs() < 1.0, "smoothed estimate {smooth_tx}");
}

#[test]
fn test_exhausted_time_budget_records_frames() {
    let input = static_series(3);
    let config = RealignConfig::new().with_time_budget_secs(Some(1e-9));
    let history = HistoryCallback::new();
    let output = realigner(config)
        .with_callback(Arc::new(history.clone()))
        .realign(&input)
        .unwrap();

    assert_eq!(output.log.len(), 3);
    for record in &output.log {
        assert_eq!(record.status, ConvergenceStatus::MaxIterationsExceeded);
        assert_eq!(record.iterations, 0);
        assert_eq!(record.pass, 1);
        assert!(record.final_cost.is_nan());
        assert!(record.transform.is_identity(1e-12));
        assert!(matches!(
            record.check(),
            Err(RegistrationError::MaxIterationsExceeded { .. })
        ));
    }
    // No refinement pass once the budget is gone
    assert_eq!(history.completed_passes(), vec![1]);
    assert_eq!(output.series.len(), 3);
}

#[test]
fn test_dimension_mismatch_is_fatal() {
    let good = common::moved_frame(&RigidTransform::identity(CENTER));
    let small = realign_core::VolumeGrid::<B>::from_values(
        &vec![0.0; 8 * 8 * 8],
        [8, 8, 8],
        nalgebra::Matrix4::identity(),
        &Default::default(),
    )
    .unwrap();
    let err: RegistrationError = TimeSeries::new(vec![good.clone(), good, small]).unwrap_err().into();
    assert!(matches!(
        err,
        RegistrationError::Geometry(GeometryError::DimensionMismatch { frame: 2, .. })
    ));
    assert!(!err.is_non_fatal());
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let err = Realigner::<B>::new(RealignConfig::new().with_sample_subsampling_factor(0)).unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidConfiguration(_)));
}

#[test]
fn test_input_series_is_not_mutated() {
    let mut motions = vec![motion([0.0; 3], [0.0; 3]); 2];
    motions[1] = motion([1.0, 0.0, 0.0], [0.0; 3]);
    let input = series(&motions);
    let before = input.frame(1).unwrap().to_values();

    let config = RealignConfig::new().with_reference_strategy(ReferenceStrategy::First);
    realigner(config).realign(&input).unwrap();

    assert_eq!(input.frame(1).unwrap().to_values(), before);
}
