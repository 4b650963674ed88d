//! OS-embedded camera backend.
//!
//! Wraps the platform video-capture API through the `nokhwa` crate. Device
//! discovery probes capture indices in order and keeps the first device that
//! both opens and delivers a frame. Exposure is only adjustable when the
//! driver exposes a usable exposure control; otherwise `set_exposure` is
//! rejected without touching state.

use crate::error::DeviceError;
use crate::hardware::capabilities::{exposure_in_range, CameraDevice};
use crate::hardware::Frame;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, ControlValueSetter, KnownCameraControl, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use tracing::{debug, info, warn};

// Capture indices probed during discovery.
const MAX_PROBE_INDEX: u32 = 6;

/// Webcam backend using the OS capture stack.
pub struct EmbeddedCamera {
    camera: Option<Camera>,
    index: Option<u32>,
    exposure_ms: u32,
    exposure_adjustable: bool,
}

impl EmbeddedCamera {
    /// Create an unopened embedded camera.
    pub fn new(default_exposure_ms: u32) -> Self {
        Self {
            camera: None,
            index: None,
            exposure_ms: default_exposure_ms,
            exposure_adjustable: false,
        }
    }

    /// Whether the opened device accepts exposure changes.
    pub fn exposure_adjustable(&self) -> bool {
        self.exposure_adjustable
    }

    /// Capture index of the opened device, if any.
    pub fn device_index(&self) -> Option<u32> {
        self.index
    }

    fn probe(index: u32) -> Option<Camera> {
        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = match Camera::new(CameraIndex::Index(index), format) {
            Ok(camera) => camera,
            Err(err) => {
                debug!(index, error = %err, "capture index rejected");
                return None;
            }
        };
        if let Err(err) = camera.open_stream() {
            debug!(index, error = %err, "capture stream failed to open");
            return None;
        }
        // A device that opens but never delivers is useless; require one frame.
        match camera.frame() {
            Ok(_) => Some(camera),
            Err(err) => {
                debug!(index, error = %err, "device opened but delivered no frame");
                let _ = camera.stop_stream();
                None
            }
        }
    }
}

impl CameraDevice for EmbeddedCamera {
    fn open(&mut self) -> Result<(), DeviceError> {
        if self.camera.is_some() {
            return Err(DeviceError::AlreadyOpen);
        }

        for index in 0..MAX_PROBE_INDEX {
            if let Some(camera) = Self::probe(index) {
                self.exposure_adjustable = camera
                    .camera_control(KnownCameraControl::Exposure)
                    .is_ok();
                let resolution = camera.camera_format().resolution();
                info!(
                    index,
                    width = resolution.width(),
                    height = resolution.height(),
                    exposure_adjustable = self.exposure_adjustable,
                    "embedded camera opened"
                );
                self.index = Some(index);
                self.camera = Some(camera);
                return Ok(());
            }
        }

        Err(DeviceError::NotFound)
    }

    fn close(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(err) = camera.stop_stream() {
                warn!(error = %err, "error stopping capture stream");
            }
            self.index = None;
            debug!("embedded camera closed");
        }
    }

    fn capture_frame(&mut self) -> Option<Frame> {
        let camera = self.camera.as_mut()?;
        let buffer = match camera.frame() {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!(error = %err, "frame capture failed");
                return None;
            }
        };
        match buffer.decode_image::<RgbFormat>() {
            Ok(image) => {
                let (width, height) = (image.width(), image.height());
                Some(Frame::rgb(width, height, image.into_raw()))
            }
            Err(err) => {
                warn!(error = %err, "frame decode failed");
                None
            }
        }
    }

    fn set_exposure(&mut self, ms: u32) -> bool {
        if !exposure_in_range(ms) {
            return false;
        }
        if !self.exposure_adjustable {
            return false;
        }
        if let Some(camera) = self.camera.as_mut() {
            if let Err(err) = camera.set_camera_control(
                KnownCameraControl::Exposure,
                ControlValueSetter::Integer(i64::from(ms)),
            ) {
                warn!(error = %err, requested_ms = ms, "driver rejected exposure change");
                return false;
            }
        }
        self.exposure_ms = ms;
        true
    }

    fn exposure(&self) -> u32 {
        self.exposure_ms
    }

    fn device_kind(&self) -> &'static str {
        "embedded"
    }
}

// Tests require a physical capture device; see tests gated behind the
// `hardware_tests` feature in tests/embedded_hardware_test.rs.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unopened_camera_delivers_nothing() {
        let mut camera = EmbeddedCamera::new(50);
        assert!(camera.capture_frame().is_none());
        assert!(camera.device_index().is_none());
    }

    #[test]
    fn exposure_rejected_when_not_adjustable() {
        let mut camera = EmbeddedCamera::new(50);
        assert!(!camera.exposure_adjustable());
        assert!(!camera.set_exposure(100));
        assert_eq!(camera.exposure(), 50);
    }
}
