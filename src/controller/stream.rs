//! Controller-side stream scheduler.
//!
//! The worker has no streaming state; a live feed is this scheduler
//! re-submitting `Snap` on a cadence. Each delivered frame feeds the FPS
//! estimator, and every few frames the fresh estimate is pushed down to the
//! worker with `SetFps` so recordings get stamped with a real rate. Frames
//! are handed to a caller-provided sink, which stands in for the display
//! surface.

use crate::controller::fps::FpsEstimator;
use crate::controller::ControllerFacade;
use crate::error::ControllerError;
use crate::hardware::Frame;
use crate::protocol::{Command, Response};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

// Deliveries between FPS pushes to the worker.
const FPS_PUSH_INTERVAL: u64 = 5;

/// Totals for a finished stream run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    /// Frames delivered to the sink.
    pub frames: u64,
    /// Final smoothed frame-rate estimate, 0 if fewer than two deliveries.
    pub fps: u32,
}

/// Repeated-`Snap` acquisition loop with frame-rate tracking.
pub struct StreamScheduler {
    delay: Duration,
    estimator: FpsEstimator,
}

impl StreamScheduler {
    /// Create a scheduler pausing `delay` between snaps (zero for flat out).
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            estimator: FpsEstimator::new(),
        }
    }

    /// Latest frame-rate estimate.
    pub fn fps(&self) -> u32 {
        self.estimator.current()
    }

    /// Discard timing history, required after an exposure change.
    pub fn reset_fps(&mut self) {
        self.estimator.reset();
    }

    /// Run the snap loop until `stop` is raised.
    ///
    /// Each frame goes to `sink`; a `NotReady` delivery is skipped, so one
    /// bad frame does not end the stream.
    ///
    /// # Errors
    /// Ends early on submission failures and on a worker `Fault`.
    pub fn run<F>(
        &mut self,
        facade: &mut ControllerFacade,
        stop: &AtomicBool,
        mut sink: F,
    ) -> Result<StreamStats, ControllerError>
    where
        F: FnMut(Frame),
    {
        let mut frames = 0u64;
        while !stop.load(Ordering::Acquire) {
            let timeout = facade.command_timeout(&Command::Snap);
            match facade.submit(Command::Snap, timeout)? {
                Response::Frame(frame) => {
                    frames += 1;
                    let estimate = self.estimator.tick(Instant::now());
                    if let Some(fps) = estimate {
                        if fps > 0 && frames % FPS_PUSH_INTERVAL == 0 {
                            let push_timeout = facade.command_timeout(&Command::SetFps(fps));
                            facade.submit(Command::SetFps(fps), push_timeout)?;
                            debug!(fps, "pushed frame-rate estimate to worker");
                        }
                    }
                    sink(frame);
                }
                Response::NotReady(reason) => {
                    warn!(reason, "snap delivered no frame");
                }
                Response::Fault(message) => {
                    warn!(message, "stream ended by worker fault");
                    return Err(ControllerError::WorkerDead);
                }
                other => {
                    warn!(response = other.label(), "unexpected response to snap");
                }
            }
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
        }
        Ok(StreamStats {
            frames,
            fps: self.estimator.current(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn fast_settings(dir: &TempDir) -> Settings {
        let mut settings = Settings::default();
        settings.camera.exposure_ms = 1;
        settings.recording.output_dir = dir.path().to_path_buf();
        settings
    }

    #[test]
    fn stream_delivers_frames_until_stopped() {
        let dir = TempDir::new().unwrap();
        let mut facade = ControllerFacade::new(fast_settings(&dir));
        facade.start().unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let mut scheduler = StreamScheduler::new(Duration::ZERO);
        let stop_in_sink = Arc::clone(&stop);
        let mut seen = 0u64;
        let stats = scheduler
            .run(&mut facade, &stop, |frame| {
                assert_eq!(frame.width, 640);
                seen += 1;
                if seen >= 7 {
                    stop_in_sink.store(true, Ordering::Release);
                }
            })
            .unwrap();

        assert_eq!(stats.frames, seen);
        assert!(stats.frames >= 7);
        // Seven deliveries at ~1 ms exposure produce a nonzero estimate.
        assert!(stats.fps > 0);

        // The estimate was pushed down, so the worker can report it back.
        let timeout = facade.command_timeout(&Command::QueryFps);
        match facade.submit(Command::QueryFps, timeout).unwrap() {
            Response::FpsValue(fps) => assert!(fps > 0),
            other => panic!("unexpected response {other:?}"),
        }
        facade.stop().unwrap();
    }

    #[test]
    fn raised_stop_flag_prevents_any_snap() {
        let dir = TempDir::new().unwrap();
        let mut facade = ControllerFacade::new(fast_settings(&dir));
        facade.start().unwrap();

        let stop = AtomicBool::new(true);
        let mut scheduler = StreamScheduler::new(Duration::ZERO);
        let stats = scheduler.run(&mut facade, &stop, |_| {}).unwrap();
        assert_eq!(stats.frames, 0);
        assert_eq!(stats.fps, 0);
        facade.stop().unwrap();
    }

    #[test]
    fn reset_clears_the_estimate() {
        let mut scheduler = StreamScheduler::new(Duration::ZERO);
        assert_eq!(scheduler.fps(), 0);
        scheduler.reset_fps();
        assert_eq!(scheduler.fps(), 0);
    }
}
