//! Simulated camera backend.
//!
//! Synthesizes uniform random noise frames at a fixed resolution and sleeps
//! for the configured exposure time (plus a little jitter) on every capture to
//! emulate real acquisition latency. Used as the default backend and as the
//! fallback when a hardware device fails to open.

use crate::error::DeviceError;
use crate::hardware::capabilities::{exposure_in_range, CameraDevice};
use crate::hardware::Frame;
use rand::Rng;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Frame width of the simulated sensor.
pub const SIM_WIDTH: u32 = 640;

/// Frame height of the simulated sensor.
pub const SIM_HEIGHT: u32 = 480;

/// Default exposure time in milliseconds.
pub const SIM_DEFAULT_EXPOSURE_MS: u32 = 50;

// Emulated driver latencies.
const OPEN_DELAY: Duration = Duration::from_millis(5);
const CLOSE_DELAY: Duration = Duration::from_millis(8);
const MAX_JITTER_MS: u64 = 2;

/// Noise-frame camera used for testing and as a safe fallback.
pub struct SimulatedCamera {
    width: u32,
    height: u32,
    exposure_ms: u32,
    opened: bool,
}

impl SimulatedCamera {
    /// Create a simulated camera at the standard 640x480 resolution.
    pub fn new() -> Self {
        Self::with_resolution(SIM_WIDTH, SIM_HEIGHT)
    }

    /// Create a simulated camera with a custom resolution.
    pub fn with_resolution(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            exposure_ms: SIM_DEFAULT_EXPOSURE_MS,
            opened: false,
        }
    }

    /// Sensor resolution as (width, height).
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraDevice for SimulatedCamera {
    fn open(&mut self) -> Result<(), DeviceError> {
        if self.opened {
            return Err(DeviceError::AlreadyOpen);
        }
        thread::sleep(OPEN_DELAY);
        self.opened = true;
        debug!(
            width = self.width,
            height = self.height,
            "simulated camera opened"
        );
        Ok(())
    }

    fn close(&mut self) {
        if self.opened {
            thread::sleep(CLOSE_DELAY);
            self.opened = false;
            debug!("simulated camera closed");
        }
    }

    fn capture_frame(&mut self) -> Option<Frame> {
        if !self.opened {
            return None;
        }

        let mut rng = rand::thread_rng();
        let jitter = rng.gen_range(0..=MAX_JITTER_MS);
        thread::sleep(Duration::from_millis(u64::from(self.exposure_ms) + jitter));

        let len = self.width as usize * self.height as usize;
        let mut pixels = vec![0u8; len];
        rng.fill(pixels.as_mut_slice());

        Some(Frame::gray(self.width, self.height, pixels))
    }

    fn set_exposure(&mut self, ms: u32) -> bool {
        if !exposure_in_range(ms) {
            return false;
        }
        self.exposure_ms = ms;
        true
    }

    fn exposure(&self) -> u32 {
        self.exposure_ms
    }

    fn device_kind(&self) -> &'static str {
        "simulated"
    }
}
