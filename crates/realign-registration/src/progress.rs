//! Progress tracking and callbacks for realignment runs.
//!
//! This module provides per-frame progress reports and the callbacks that
//! consume them: logging to `tracing` and recording a history.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use realign_core::RigidTransform;

use crate::optimizer::ConvergenceStatus;

/// Progress information for one optimized frame.
#[derive(Debug, Clone)]
pub struct FrameProgress {
    /// Frame index in acquisition order.
    pub frame: usize,
    /// Total number of frames.
    pub total_frames: usize,
    /// 1 for the initial pass, 2 for the mean-refinement pass.
    pub pass: usize,
    /// Estimated transform.
    pub transform: RigidTransform,
    pub status: ConvergenceStatus,
    pub iterations: usize,
    pub final_cost: f64,
    /// Time elapsed since the run started.
    pub elapsed: Duration,
}

impl FrameProgress {
    /// Calculate progress percentage within the current pass.
    pub fn progress_percent(&self) -> f64 {
        if self.total_frames == 0 {
            return 100.0;
        }
        (self.frame + 1) as f64 / self.total_frames as f64 * 100.0
    }
}

/// Progress callback trait for monitoring realignment.
///
/// In parallel mode `on_frame` is called from worker threads in completion
/// order.
pub trait ProgressCallback: Send + Sync {
    /// Called when a frame's optimization finishes.
    fn on_frame(&self, progress: &FrameProgress);

    /// Called when realignment starts.
    fn on_start(&self, _total_frames: usize) {
        // Default: no-op
    }

    /// Called after every frame of a pass has been optimized.
    fn on_pass_complete(&self, _pass: usize, _elapsed: Duration) {
        // Default: no-op
    }

    /// Called when realignment completes successfully.
    fn on_complete(&self, _converged: usize, _total_frames: usize, _elapsed: Duration) {
        // Default: no-op
    }

    /// Called when realignment fails.
    fn on_error(&self, _error: &str) {
        // Default: no-op
    }
}

/// Console progress callback that logs to tracing.
#[derive(Debug, Clone)]
pub struct ConsoleProgressCallback {
    /// Log every `log_interval`-th frame (non-converged frames always log).
    pub log_interval: usize,
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self { log_interval: 1 }
    }
}

impl ConsoleProgressCallback {
    /// Create a new console progress callback.
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
        }
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_frame(&self, progress: &FrameProgress) {
        if progress.status != ConvergenceStatus::Converged {
            tracing::warn!(
                "Pass {} frame {}/{}: {} after {} iterations ({})",
                progress.pass,
                progress.frame + 1,
                progress.total_frames,
                progress.status,
                progress.iterations,
                progress.transform
            );
        } else if progress.frame % self.log_interval == 0 || progress.frame + 1 == progress.total_frames {
            tracing::info!(
                "Pass {} frame {}/{} ({:.1}%) | Cost: {:.6} | Iters: {} | {} | Elapsed: {:.2}s",
                progress.pass,
                progress.frame + 1,
                progress.total_frames,
                progress.progress_percent(),
                progress.final_cost,
                progress.iterations,
                progress.transform,
                progress.elapsed.as_secs_f64()
            );
        }
    }

    fn on_start(&self, total_frames: usize) {
        tracing::info!("Realignment started: {} frames", total_frames);
    }

    fn on_pass_complete(&self, pass: usize, elapsed: Duration) {
        tracing::info!("Pass {} complete after {:.2}s", pass, elapsed.as_secs_f64());
    }

    fn on_complete(&self, converged: usize, total_frames: usize, elapsed: Duration) {
        tracing::info!(
            "Realignment completed in {:.2}s: {}/{} frames converged",
            elapsed.as_secs_f64(),
            converged,
            total_frames
        );
    }

    fn on_error(&self, error: &str) {
        tracing::error!("Realignment failed: {}", error);
    }
}

/// History callback that records all frame reports.
#[derive(Debug, Clone, Default)]
pub struct HistoryCallback {
    history: Arc<Mutex<Vec<FrameProgress>>>,
    passes: Arc<Mutex<Vec<usize>>>,
}

impl HistoryCallback {
    /// Create a new history callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the recorded frame reports.
    pub fn get_history(&self) -> Vec<FrameProgress> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Passes reported complete, in order.
    pub fn completed_passes(&self) -> Vec<usize> {
        self.passes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Clear the history.
    pub fn clear(&self) {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.passes.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl ProgressCallback for HistoryCallback {
    fn on_frame(&self, progress: &FrameProgress) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(progress.clone());
    }

    fn on_pass_complete(&self, pass: usize, _elapsed: Duration) {
        self.passes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(pass);
    }
}
