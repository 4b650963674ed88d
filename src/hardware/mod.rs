//! Camera hardware layer.
//!
//! Capability trait for camera backends, the pixel [`Frame`] type they
//! produce, the concrete backends (simulated noise source, OS-embedded
//! capture device), and the process-wide device registry used for
//! discovery and validation before a worker is spawned.

pub mod capabilities;
pub mod registry;
pub mod simulated;

#[cfg(feature = "embedded_camera")]
pub mod embedded;

pub use capabilities::{CameraDevice, EXPOSURE_MAX_MS, EXPOSURE_MIN_MS};
pub use registry::DeviceRegistry;
pub use simulated::SimulatedCamera;

#[cfg(feature = "embedded_camera")]
pub use embedded::EmbeddedCamera;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single captured image.
///
/// Pixels are row-major and tightly packed: `width * height * channels` bytes.
/// One channel means grayscale, three means RGB. Frames move by value between
/// pipeline stages; the recording path receives its own clone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// 1 for grayscale, 3 for RGB.
    pub channels: u8,
    /// Row-major packed pixel bytes.
    pub pixels: Vec<u8>,
    /// Capture time, also used for the recording burn-in.
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    /// Create a grayscale frame from raw pixels.
    pub fn gray(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels: 1,
            pixels,
            captured_at: Utc::now(),
        }
    }

    /// Create an RGB frame from raw pixels.
    pub fn rgb(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels: 3,
            pixels,
            captured_at: Utc::now(),
        }
    }

    /// Number of bytes a well-formed pixel buffer must hold.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    /// Whether the frame is single-channel grayscale.
    pub fn is_gray(&self) -> bool {
        self.channels == 1
    }

    /// Return the pixel data as 3-channel RGB, expanding grayscale if needed.
    pub fn rgb_pixels(&self) -> Vec<u8> {
        if self.is_gray() {
            let mut out = Vec::with_capacity(self.pixels.len() * 3);
            for &v in &self.pixels {
                out.extend_from_slice(&[v, v, v]);
            }
            out
        } else {
            self.pixels.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_frame_has_one_channel() {
        let frame = Frame::gray(4, 2, vec![0u8; 8]);
        assert_eq!(frame.channels, 1);
        assert_eq!(frame.expected_len(), 8);
        assert!(frame.is_gray());
    }

    #[test]
    fn gray_expands_to_rgb() {
        let frame = Frame::gray(2, 1, vec![10, 200]);
        assert_eq!(frame.rgb_pixels(), vec![10, 10, 10, 200, 200, 200]);
    }

    #[test]
    fn rgb_passes_through() {
        let pixels = vec![1, 2, 3, 4, 5, 6];
        let frame = Frame::rgb(2, 1, pixels.clone());
        assert_eq!(frame.rgb_pixels(), pixels);
    }
}
