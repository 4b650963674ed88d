//! Frame-rate estimation from inter-delivery timing.
//!
//! Only the controller observes the wall-clock gap between frame deliveries,
//! so the estimate lives here and is pushed to the worker separately. The
//! estimator is a smoothed integer rate: the first interval yields
//! `round(1/dt)`, every later interval folds in with
//! `round(0.5 * (previous + round(1/dt)))`. An exposure change invalidates
//! the timing history and must be followed by `reset`.

use std::time::Instant;

/// Exponential-style smoothing of an integer frames-per-second estimate.
#[derive(Debug, Default)]
pub struct FpsEstimator {
    fps: u32,
    last_delivery: Option<Instant>,
}

impl FpsEstimator {
    /// Create an estimator with no timing history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame delivery at `now`.
    ///
    /// Returns the updated estimate, or `None` while only a single delivery
    /// has been observed.
    pub fn tick(&mut self, now: Instant) -> Option<u32> {
        let previous = self.last_delivery.replace(now)?;
        let dt = now.saturating_duration_since(previous).as_secs_f64();
        if dt <= 0.0 {
            return Some(self.fps);
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let instant_fps = (1.0 / dt).round() as u32;
        self.fps = if self.fps == 0 {
            instant_fps
        } else {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let smoothed = (0.5 * (f64::from(self.fps) + f64::from(instant_fps))).round() as u32;
            smoothed
        };
        Some(self.fps)
    }

    /// Latest estimate, 0 before the second delivery.
    pub fn current(&self) -> u32 {
        self.fps
    }

    /// Discard all history, e.g. after an exposure change.
    pub fn reset(&mut self) {
        self.fps = 0;
        self.last_delivery = None;
    }
}
