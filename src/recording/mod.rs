//! Video recording pipeline.
//!
//! A [`RecordingSession`] decouples frame acquisition from disk and encoder
//! latency with a bounded single-producer single-consumer ring. The
//! acquisition side pushes clones of captured frames and never blocks; when
//! the ring is full the frame is dropped and counted. A dedicated writer
//! thread drains the ring, burns the capture timestamp into each frame, and
//! pipes raw RGB to an `ffmpeg` child process.
//!
//! Output files are named `test_video_<YYYY-MM-DD_HH-MM-SS>.mp4` inside the
//! configured output directory. The encoder is spawned lazily on the first
//! frame so its geometry always matches what the device actually delivers.

pub mod encoder;
pub mod overlay;

pub use encoder::VideoEncoder;

use crate::config::RecordingSettings;
use crate::error::RecordingError;
use crate::hardware::Frame;
use chrono::{DateTime, Local};
use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

// Writer idle backoff while the ring is empty.
const DRAIN_IDLE: Duration = Duration::from_millis(2);

/// Build the output file name for a recording started at `timestamp`.
pub fn video_filename(timestamp: DateTime<Local>) -> String {
    format!("test_video_{}.mp4", timestamp.format("%Y-%m-%d_%H-%M-%S"))
}

/// Outcome of a finalized recording.
#[derive(Debug, Clone)]
pub struct RecordingSummary {
    /// Path of the finalized video file.
    pub path: PathBuf,
    /// Frames encoded into the file.
    pub frames_written: u64,
    /// Frames discarded because the ring was full.
    pub frames_dropped: u64,
}

/// An in-progress recording: bounded frame ring plus background writer.
pub struct RecordingSession {
    producer: HeapProducer<Frame>,
    writer: Option<JoinHandle<Result<u64, RecordingError>>>,
    stop: Arc<AtomicBool>,
    path: PathBuf,
    accepted: u64,
    dropped: u64,
}

impl RecordingSession {
    /// Start a recording into the configured output directory.
    ///
    /// `fps` is the measured frame rate when one is known; otherwise the
    /// configured fallback is used for the container timing.
    ///
    /// # Errors
    /// Returns an error when the output directory cannot be created.
    pub fn start(settings: &RecordingSettings, fps: Option<u32>) -> Result<Self, RecordingError> {
        std::fs::create_dir_all(&settings.output_dir)?;
        let path = settings.output_dir.join(video_filename(Local::now()));
        let fps = fps.unwrap_or(settings.fallback_fps).max(1);

        let ring = HeapRb::<Frame>::new(settings.buffer_capacity);
        let (producer, consumer) = ring.split();
        let stop = Arc::new(AtomicBool::new(false));

        let writer = {
            let path = path.clone();
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("recording-writer".into())
                .spawn(move || drain_ring(consumer, &path, fps, &stop))?
        };

        info!(path = %path.display(), fps, capacity = settings.buffer_capacity, "recording started");
        Ok(Self {
            producer,
            writer: Some(writer),
            stop,
            path,
            accepted: 0,
            dropped: 0,
        })
    }

    /// Offer a frame to the writer. Returns `false` when the ring was full
    /// and the frame was dropped.
    pub fn push_frame(&mut self, frame: Frame) -> bool {
        match self.producer.push(frame) {
            Ok(()) => {
                self.accepted += 1;
                true
            }
            Err(_) => {
                self.dropped += 1;
                if self.dropped == 1 || self.dropped % 50 == 0 {
                    warn!(dropped = self.dropped, "recording ring full, dropping frames");
                }
                false
            }
        }
    }

    /// Path of the file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames accepted into the ring so far.
    pub fn frames_accepted(&self) -> u64 {
        self.accepted
    }

    /// Frames dropped because the ring was full.
    pub fn frames_dropped(&self) -> u64 {
        self.dropped
    }

    /// Stop accepting frames, drain the ring, and finalize the file.
    ///
    /// # Errors
    /// Propagates writer-thread failures, including encoder spawn and pipe
    /// errors.
    pub fn finish(mut self) -> Result<RecordingSummary, RecordingError> {
        self.stop.store(true, Ordering::Release);
        let Some(writer) = self.writer.take() else {
            return Err(RecordingError::EncoderFailed("writer already joined".into()));
        };
        let frames_written = writer
            .join()
            .map_err(|_| RecordingError::EncoderFailed("writer thread panicked".into()))??;
        info!(
            path = %self.path.display(),
            frames_written,
            frames_dropped = self.dropped,
            "recording finalized"
        );
        Ok(RecordingSummary {
            path: self.path.clone(),
            frames_written,
            frames_dropped: self.dropped,
        })
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        // Abandoned session: stop the writer and let the encoder clean up.
        if let Some(writer) = self.writer.take() {
            self.stop.store(true, Ordering::Release);
            let _ = writer.join();
        }
    }
}

fn drain_ring(
    mut consumer: HeapConsumer<Frame>,
    path: &Path,
    fps: u32,
    stop: &AtomicBool,
) -> Result<u64, RecordingError> {
    let mut encoder: Option<VideoEncoder> = None;
    let mut geometry: Option<(u32, u32)> = None;
    let mut written = 0u64;

    loop {
        let Some(frame) = consumer.pop() else {
            // Pop before stop-check, so frames queued ahead of the stop
            // request are still written.
            if stop.load(Ordering::Acquire) {
                break;
            }
            thread::sleep(DRAIN_IDLE);
            continue;
        };

        let (width, height) = (frame.width, frame.height);
        match geometry {
            None => {
                geometry = Some((width, height));
                encoder = Some(VideoEncoder::spawn(path, width, height, fps)?);
            }
            Some(expected) if expected != (width, height) => {
                warn!(
                    width,
                    height,
                    expected_width = expected.0,
                    expected_height = expected.1,
                    "skipping frame with mismatched geometry"
                );
                continue;
            }
            Some(_) => {}
        }

        let mut rgb = frame.rgb_pixels();
        overlay::burn_timestamp(&mut rgb, width, height, frame.captured_at);
        if let Some(encoder) = encoder.as_mut() {
            encoder.write_frame(&rgb)?;
            written += 1;
        }
    }

    if let Some(encoder) = encoder {
        encoder.finish()?;
    } else {
        debug!(path = %path.display(), "recording ended with no frames, no file written");
    }
    Ok(written)
}
