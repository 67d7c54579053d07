//! Simulation runner with lifecycle management
//!
//! This module provides the `SimulationRunner` which drives a kernel with a
//! fixed time step until the final time, writing snapshot frames on a
//! background thread. Runs are synchronous; another thread can request a stop
//! through [`SimulationRunner::stop_handle`], which is honoured between steps.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use kernel::SimulationKernel;

use crate::config::OutputConfig;
use crate::error::Error;
use crate::snapshot::{Snapshot, SnapshotWriter};

/// Runner state enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Simulation created but not yet started
    Initialized,
    /// Simulation actively stepping
    Stepping,
    /// Simulation reached its final time, its step limit, or was stopped
    Finished,
    /// Simulation diverged or could not write its output
    Failed,
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Completed steps
    pub steps: u64,
    /// Simulated time reached (s)
    pub time: f64,
    /// Frames written, in step order
    pub frames: Vec<PathBuf>,
    /// Final runner state
    pub state: RunnerState,
    /// Whether the run ended on a stop request before its final time
    pub stopped: bool,
    /// Wall-clock duration (s)
    pub wall_time: f64,
}

/// Handle for running a simulation to completion
pub struct SimulationRunner {
    kernel: Box<dyn SimulationKernel + Send>,
    dt: f64,
    end_time: f64,
    max_timesteps: Option<u64>,
    output: OutputConfig,
    state: RunnerState,
    stop: Arc<AtomicBool>,
}

/// Number of fixed steps needed to reach `end_time`.
fn steps_to_reach(end_time: f64, dt: f64) -> u64 {
    // Absorb round-off in the ratio so tf = n dt gives exactly n steps.
    (end_time / dt * (1.0 - 1.0e-12)).ceil().max(0.0) as u64
}

fn capture(kernel: &dyn SimulationKernel) -> Snapshot {
    Snapshot {
        step: kernel.step_count(),
        time: kernel.time(),
        fluid: kernel.fluid().clone(),
        solid: kernel.solid().clone(),
    }
}

impl SimulationRunner {
    /// Create a new simulation runner with the given kernel
    ///
    /// # Arguments
    /// * `kernel` - The simulation kernel to run
    /// * `dt` - Fixed time step (s)
    /// * `end_time` - Final simulated time (s)
    /// * `max_timesteps` - Optional step limit
    /// * `output` - Frame directory and interval
    pub fn new(
        kernel: Box<dyn SimulationKernel + Send>,
        dt: f64,
        end_time: f64,
        max_timesteps: Option<u64>,
        output: OutputConfig,
    ) -> Self {
        Self {
            kernel,
            dt,
            end_time,
            max_timesteps,
            output,
            state: RunnerState::Initialized,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get current runner state
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Fixed time step (s)
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// The kernel being driven
    pub fn kernel(&self) -> &dyn SimulationKernel {
        self.kernel.as_ref()
    }

    /// Flag that stops the run after the current step when set
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Step until the final time, saving frame 0, every `output.interval`
    /// steps, and the final state.
    ///
    /// On divergence the kernel keeps its last good state, the frames already
    /// queued are flushed, and the error names the last frame on disk.
    pub fn run(&mut self) -> Result<RunSummary, Error> {
        let mut target = steps_to_reach(self.end_time, self.dt);
        if let Some(limit) = self.max_timesteps {
            target = target.min(limit);
        }
        let interval = self.output.interval.max(1);

        tracing::info!(
            "Starting run: dt={:.3e}s, tf={:.3e}s, {} steps, frame every {} steps into {}",
            self.dt,
            self.end_time,
            target,
            interval,
            self.output.directory.display()
        );

        self.state = RunnerState::Stepping;
        let writer = match SnapshotWriter::spawn(&self.output.directory) {
            Ok(writer) => writer,
            Err(e) => {
                self.state = RunnerState::Failed;
                return Err(e.into());
            }
        };
        let start_wall_time = Instant::now();
        let mut last_saved = self.kernel.step_count();
        if let Err(e) = writer.submit(capture(self.kernel.as_ref())) {
            self.state = RunnerState::Failed;
            return Err(e.into());
        }

        let mut stopped = false;
        while self.kernel.step_count() < target {
            if self.stop.load(Ordering::Relaxed) {
                tracing::warn!(
                    "Stop requested at step {}, t={:.4e}s",
                    self.kernel.step_count(),
                    self.kernel.time()
                );
                stopped = true;
                break;
            }

            if let Err(source) = self.kernel.step(self.dt) {
                self.state = RunnerState::Failed;
                let last_good_frame = writer.finish().ok().and_then(|frames| frames.last().cloned());
                tracing::error!(
                    "Run aborted: {source}; last good frame: {:?}",
                    last_good_frame
                );
                return Err(Error::Diverged {
                    source,
                    last_good_frame,
                });
            }

            let step = self.kernel.step_count();
            if step % interval == 0 {
                if let Err(e) = writer.submit(capture(self.kernel.as_ref())) {
                    self.state = RunnerState::Failed;
                    return Err(e.into());
                }
                last_saved = step;

                let metrics = self.kernel.error_metrics();
                tracing::info!(
                    "Step {}/{}: t={:.4e}s, max density variation={:.2}%, wall_time={:.1}s",
                    step,
                    target,
                    self.kernel.time(),
                    100.0 * metrics.max_density_variation,
                    start_wall_time.elapsed().as_secs_f64()
                );
            }
        }

        if last_saved != self.kernel.step_count() {
            if let Err(e) = writer.submit(capture(self.kernel.as_ref())) {
                self.state = RunnerState::Failed;
                return Err(e.into());
            }
        }

        let frames = match writer.finish() {
            Ok(frames) => frames,
            Err(e) => {
                self.state = RunnerState::Failed;
                return Err(e.into());
            }
        };

        self.state = RunnerState::Finished;
        let summary = RunSummary {
            steps: self.kernel.step_count(),
            time: self.kernel.time(),
            frames,
            state: self.state,
            stopped,
            wall_time: start_wall_time.elapsed().as_secs_f64(),
        };
        tracing::info!(
            "Simulation finished: {} timesteps, {:.4e}s simulated, {} frames, {:.1}s wall time",
            summary.steps,
            summary.time,
            summary.frames.len(),
            summary.wall_time
        );
        Ok(summary)
    }
}
