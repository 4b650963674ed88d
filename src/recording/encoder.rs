//! Video encoder backed by an external `ffmpeg` process.
//!
//! Raw RGB24 frames are piped to ffmpeg's stdin and encoded to H.264 in an
//! MP4 container. Finalization closes the pipe and waits for the process so
//! the container index is written before the output path is reported.

use crate::error::RecordingError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use tracing::{debug, warn};

/// Handle on a running ffmpeg encode.
pub struct VideoEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    path: PathBuf,
    frame_len: usize,
}

impl VideoEncoder {
    /// Whether an `ffmpeg` binary is reachable on `PATH`.
    pub fn is_available() -> bool {
        Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Spawn ffmpeg encoding `width` x `height` RGB24 frames at `fps`.
    ///
    /// # Errors
    /// Returns `EncoderSpawn` when the process cannot be started.
    pub fn spawn(path: &Path, width: u32, height: u32, fps: u32) -> Result<Self, RecordingError> {
        let mut child = Command::new("ffmpeg")
            .args([
                "-y",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-s",
                &format!("{width}x{height}"),
                "-r",
                &fps.to_string(),
                "-i",
                "-",
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-crf",
                "23",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
            ])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| RecordingError::EncoderSpawn(err.to_string()))?;

        let stdin = child.stdin.take().ok_or(RecordingError::EncoderPipeClosed)?;
        debug!(path = %path.display(), width, height, fps, "encoder started");
        Ok(Self {
            child,
            stdin: Some(stdin),
            path: path.to_path_buf(),
            frame_len: width as usize * height as usize * 3,
        })
    }

    /// Output path being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pipe one RGB24 frame to the encoder.
    ///
    /// # Errors
    /// Returns `EncoderPipeClosed` when the pipe is gone or the buffer length
    /// does not match the negotiated geometry.
    pub fn write_frame(&mut self, rgb: &[u8]) -> Result<(), RecordingError> {
        if rgb.len() != self.frame_len {
            warn!(
                got = rgb.len(),
                want = self.frame_len,
                "frame size does not match encoder geometry"
            );
            return Err(RecordingError::EncoderPipeClosed);
        }
        let stdin = self.stdin.as_mut().ok_or(RecordingError::EncoderPipeClosed)?;
        stdin
            .write_all(rgb)
            .map_err(|_| RecordingError::EncoderPipeClosed)
    }

    /// Close the pipe and wait for ffmpeg to finalize the container.
    ///
    /// # Errors
    /// Returns `EncoderFailed` when the process exits with a failure status.
    pub fn finish(mut self) -> Result<PathBuf, RecordingError> {
        // Dropping stdin sends EOF, which tells ffmpeg to flush and exit.
        drop(self.stdin.take());
        let status = self.child.wait()?;
        if !status.success() {
            return Err(RecordingError::EncoderFailed(status.to_string()));
        }
        debug!(path = %self.path.display(), "encoder finalized");
        Ok(self.path.clone())
    }
}

impl Drop for VideoEncoder {
    fn drop(&mut self) {
        // Only reached when finish() was skipped; kill rather than leak.
        if self.stdin.take().is_some() {
            if let Err(err) = self.child.kill() {
                warn!(error = %err, "failed to kill abandoned encoder");
            }
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_binary_reports_spawn_error() {
        // Guaranteed-absent binary name keeps this test hermetic.
        let spawned = Command::new("ffmpeg-definitely-not-installed")
            .stdin(Stdio::piped())
            .spawn();
        assert!(spawned.is_err());
    }

    #[test]
    fn encode_small_clip() {
        if !VideoEncoder::is_available() {
            eprintln!("skipping: ffmpeg not on PATH");
            return;
        }
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        let mut encoder = VideoEncoder::spawn(&path, 64, 48, 10).unwrap();
        let frame = vec![90u8; 64 * 48 * 3];
        for _ in 0..5 {
            encoder.write_frame(&frame).unwrap();
        }
        let written = encoder.finish().unwrap();
        assert!(written.exists());
        assert!(written.metadata().unwrap().len() > 0);
    }

    #[test]
    fn wrong_frame_size_is_rejected() {
        if !VideoEncoder::is_available() {
            eprintln!("skipping: ffmpeg not on PATH");
            return;
        }
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        let mut encoder = VideoEncoder::spawn(&path, 64, 48, 10).unwrap();
        let short = vec![0u8; 10];
        assert!(encoder.write_frame(&short).is_err());
    }
}
