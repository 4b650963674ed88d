//! Camera worker thread.
//!
//! The worker exclusively owns one [`CameraDevice`] and services the
//! command/response protocol from its own OS thread, so slow device I/O
//! never stalls the caller. It runs a small lifecycle state machine:
//!
//! ```text
//! Unopened -> Opening -> Idle <-> Recording -> Closed
//!                  \________________________-> Faulted
//! ```
//!
//! Streaming is not a worker state; a stream is the controller re-submitting
//! `Snap` on its own cadence. The worker handles exactly one command at a
//! time, start to finish, which makes response order match command order.
//!
//! Protocol violations (command signal raised over an empty queue, response
//! queue full on push) are tolerated once; a second consecutive violation
//! faults the worker.

use crate::config::RecordingSettings;
use crate::hardware::CameraDevice;
use crate::protocol::{Command, Response, WorkerChannels};
use crate::recording::RecordingSession;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

// Wait slice for the command signal; timeouts just re-arm the wait.
const COMMAND_POLL: Duration = Duration::from_millis(200);

// Consecutive protocol violations tolerated before faulting.
const MAX_VIOLATIONS: u32 = 2;

/// Lifecycle states of a camera worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraState {
    /// Constructed, device not yet opened.
    Unopened,
    /// Device open in progress.
    Opening,
    /// Device open, ready for commands.
    Idle,
    /// Device open and a recording session is active.
    Recording,
    /// Graceful shutdown complete. Terminal.
    Closed,
    /// Unrecoverable protocol or open failure. Terminal.
    Faulted,
}

/// Worker owning one camera device and one end of the protocol channels.
pub struct CameraWorker {
    device: Box<dyn CameraDevice>,
    channels: Arc<WorkerChannels>,
    recording: RecordingSettings,
    session: Option<RecordingSession>,
    state: CameraState,
    fps_hint: u32,
    violations: u32,
}

impl CameraWorker {
    /// Build a worker around an unopened device.
    pub fn new(
        device: Box<dyn CameraDevice>,
        channels: Arc<WorkerChannels>,
        recording: RecordingSettings,
    ) -> Self {
        Self {
            device,
            channels,
            recording,
            session: None,
            state: CameraState::Unopened,
            fps_hint: 0,
            violations: 0,
        }
    }

    /// Spawn the worker on a named thread and return its handle.
    ///
    /// # Errors
    /// Returns an error when the OS refuses to spawn the thread.
    pub fn spawn(
        device: Box<dyn CameraDevice>,
        channels: Arc<WorkerChannels>,
        recording: RecordingSettings,
    ) -> std::io::Result<JoinHandle<()>> {
        let worker = Self::new(device, channels, recording);
        std::thread::Builder::new()
            .name("camera-worker".into())
            .spawn(move || worker.run())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CameraState {
        self.state
    }

    /// Open the device and service commands until a terminal state.
    pub fn run(mut self) {
        self.state = CameraState::Opening;
        let kind = self.device.device_kind();
        match self.device.open() {
            Ok(()) => {
                info!(kind, "camera worker ready");
                self.state = CameraState::Idle;
                self.respond(Response::Ready);
            }
            Err(err) => {
                error!(kind, error = %err, "device open failed");
                self.respond(Response::NotReady(err.to_string()));
                self.state = CameraState::Faulted;
                return;
            }
        }

        while !self.is_terminal() {
            if !self.channels.command_ready.wait_timeout(COMMAND_POLL) {
                continue;
            }
            // Clear before draining so a command pushed during the drain
            // re-raises the signal instead of being lost.
            self.channels.command_ready.clear();

            match self.channels.commands.pop() {
                Ok(first) => {
                    self.violations = 0;
                    self.dispatch(first);
                    // Commands queued behind the first are already ours.
                    while !self.is_terminal() {
                        match self.channels.commands.pop() {
                            Ok(command) => self.dispatch(command),
                            Err(_) => break,
                        }
                    }
                }
                Err(_) => self.record_violation("command signal raised over empty queue"),
            }
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self.state, CameraState::Closed | CameraState::Faulted)
    }

    fn dispatch(&mut self, command: Command) {
        debug!(state = ?self.state, command = ?command_label(&command), "handling command");
        match command {
            Command::Snap => self.handle_snap(),
            Command::StartRecording => self.handle_start_recording(),
            Command::StopRecording => self.handle_stop_recording(),
            Command::SetExposure(ms) => self.handle_set_exposure(ms),
            Command::SetFps(fps) => {
                self.fps_hint = fps;
                self.respond(Response::FpsValue(self.fps_hint));
            }
            Command::QueryFps => self.respond(Response::FpsValue(self.fps_hint)),
            Command::Stop => self.handle_stop(),
        }
    }

    fn handle_snap(&mut self) {
        match self.device.capture_frame() {
            Some(frame) => {
                if let Some(session) = self.session.as_mut() {
                    session.push_frame(frame.clone());
                }
                self.respond(Response::Frame(frame));
            }
            None => {
                // One bad frame must not kill the worker.
                warn!("device delivered no frame");
                self.respond(Response::NotReady("no frame delivered".into()));
            }
        }
    }

    fn handle_start_recording(&mut self) {
        if self.session.is_some() {
            self.respond(Response::NotReady("already recording".into()));
            return;
        }
        let fps = (self.fps_hint > 0).then_some(self.fps_hint);
        match RecordingSession::start(&self.recording, fps) {
            Ok(session) => {
                info!(path = %session.path().display(), "recording session started");
                self.session = Some(session);
                self.state = CameraState::Recording;
                self.respond(Response::Ready);
            }
            Err(err) => {
                error!(error = %err, "recording could not start");
                self.respond(Response::NotReady(err.to_string()));
            }
        }
    }

    fn handle_stop_recording(&mut self) {
        self.finalize_recording();
        if self.state == CameraState::Recording {
            self.state = CameraState::Idle;
        }
        self.respond(Response::Stopped);
    }

    fn handle_stop(&mut self) {
        // Stop always wins: the recording is made playable before the
        // device goes away and the terminal response is sent.
        self.finalize_recording();
        self.device.close();
        self.state = CameraState::Closed;
        self.respond(Response::Stopped);
        info!("camera worker stopped");
    }

    fn finalize_recording(&mut self) {
        if let Some(session) = self.session.take() {
            match session.finish() {
                Ok(summary) => info!(
                    path = %summary.path.display(),
                    frames_written = summary.frames_written,
                    frames_dropped = summary.frames_dropped,
                    "recording finalized"
                ),
                Err(err) => error!(error = %err, "recording finalization failed"),
            }
        }
    }

    fn handle_set_exposure(&mut self, ms: u32) {
        if self.device.set_exposure(ms) {
            self.respond(Response::ExposureAck(self.device.exposure()));
        } else {
            self.respond(Response::ExposureRejected);
        }
    }

    fn respond(&mut self, response: Response) {
        let label = response.label();
        if self.channels.send_response(response).is_err() {
            self.record_violation("response queue full");
        } else {
            debug!(response = label, "response sent");
        }
    }

    fn record_violation(&mut self, message: &str) {
        self.violations += 1;
        warn!(
            violations = self.violations,
            message, "protocol violation observed"
        );
        if self.violations >= MAX_VIOLATIONS {
            self.fault(message);
        }
    }

    fn fault(&mut self, message: &str) {
        error!(message, "camera worker faulted");
        // Best effort: the channel may itself be the problem.
        let _ = self
            .channels
            .send_response(Response::Fault(message.to_string()));
        self.finalize_recording();
        self.device.close();
        self.state = CameraState::Faulted;
    }
}

fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Snap => "Snap",
        Command::StartRecording => "StartRecording",
        Command::StopRecording => "StopRecording",
        Command::SetExposure(_) => "SetExposure",
        Command::SetFps(_) => "SetFps",
        Command::QueryFps => "QueryFps",
        Command::Stop => "Stop",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerSettings;
    use crate::hardware::simulated::{SimulatedCamera, SIM_HEIGHT, SIM_WIDTH};
    use crate::recording::VideoEncoder;
    use std::time::Instant;
    use tempfile::TempDir;

    fn recording_into(dir: &TempDir) -> RecordingSettings {
        RecordingSettings {
            output_dir: dir.path().to_path_buf(),
            ..RecordingSettings::default()
        }
    }

    fn fast_camera() -> Box<dyn CameraDevice> {
        let mut camera = SimulatedCamera::new();
        camera.set_exposure(1);
        Box::new(camera)
    }

    struct Harness {
        channels: Arc<WorkerChannels>,
        handle: JoinHandle<()>,
    }

    impl Harness {
        fn start(recording: RecordingSettings) -> Self {
            let channels = WorkerChannels::new(&WorkerSettings::default());
            let handle =
                CameraWorker::spawn(fast_camera(), Arc::clone(&channels), recording).unwrap();
            let harness = Self { channels, handle };
            assert_eq!(harness.await_response(), Response::Ready);
            harness
        }

        fn submit(&self, command: Command) -> Response {
            self.channels.send_command(command).unwrap();
            self.await_response()
        }

        fn await_response(&self) -> Response {
            assert!(
                self.channels
                    .response_ready
                    .wait_timeout(Duration::from_secs(2)),
                "no response within deadline"
            );
            self.channels.response_ready.clear();
            self.channels.responses.pop().unwrap()
        }

        fn shutdown(self) {
            assert_eq!(self.submit(Command::Stop), Response::Stopped);
            self.handle.join().unwrap();
        }
    }

    #[test]
    fn snap_returns_configured_geometry_within_a_second() {
        let dir = TempDir::new().unwrap();
        let harness = Harness::start(recording_into(&dir));
        let started = Instant::now();
        match harness.submit(Command::Snap) {
            Response::Frame(frame) => {
                assert_eq!(frame.width, SIM_WIDTH);
                assert_eq!(frame.height, SIM_HEIGHT);
                assert!(started.elapsed() < Duration::from_secs(1));
            }
            other => panic!("expected frame, got {other:?}"),
        }
        harness.shutdown();
    }

    #[test]
    fn responses_match_commands_in_order() {
        let dir = TempDir::new().unwrap();
        let harness = Harness::start(recording_into(&dir));
        let commands = [
            Command::SetExposure(10),
            Command::QueryFps,
            Command::Snap,
            Command::SetFps(24),
            Command::QueryFps,
        ];
        let mut responses = Vec::new();
        for command in commands {
            responses.push(harness.submit(command));
        }
        assert_eq!(responses.len(), 5);
        assert_eq!(responses[0], Response::ExposureAck(10));
        assert_eq!(responses[1], Response::FpsValue(0));
        assert!(matches!(responses[2], Response::Frame(_)));
        assert_eq!(responses[3], Response::FpsValue(24));
        assert_eq!(responses[4], Response::FpsValue(24));
        harness.shutdown();
    }

    #[test]
    fn out_of_range_exposure_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let harness = Harness::start(recording_into(&dir));
        assert_eq!(harness.submit(Command::SetFps(15)), Response::FpsValue(15));
        assert_eq!(
            harness.submit(Command::SetExposure(5000)),
            Response::ExposureRejected
        );
        // The rejected exposure does not disturb the stored fps.
        assert_eq!(harness.submit(Command::QueryFps), Response::FpsValue(15));
        harness.shutdown();
    }

    #[test]
    fn stop_recording_when_idle_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let harness = Harness::start(recording_into(&dir));
        assert_eq!(harness.submit(Command::StopRecording), Response::Stopped);
        harness.shutdown();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn double_start_recording_is_rejected() {
        let dir = TempDir::new().unwrap();
        let harness = Harness::start(recording_into(&dir));
        assert_eq!(harness.submit(Command::StartRecording), Response::Ready);
        assert!(matches!(
            harness.submit(Command::StartRecording),
            Response::NotReady(reason) if reason.contains("already")
        ));
        assert_eq!(harness.submit(Command::StopRecording), Response::Stopped);
        harness.shutdown();
    }

    #[test]
    fn stop_while_recording_finalizes_the_file_first() {
        if !VideoEncoder::is_available() {
            eprintln!("skipping: ffmpeg not on PATH");
            return;
        }
        let dir = TempDir::new().unwrap();
        let harness = Harness::start(recording_into(&dir));
        assert_eq!(harness.submit(Command::StartRecording), Response::Ready);
        for _ in 0..3 {
            assert!(matches!(harness.submit(Command::Snap), Response::Frame(_)));
        }
        harness.shutdown();
        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        assert!(files[0]
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("test_video_"));
        assert!(files[0].metadata().unwrap().len() > 0);
    }

    #[test]
    fn two_empty_signals_fault_the_worker() {
        let dir = TempDir::new().unwrap();
        let harness = Harness::start(recording_into(&dir));
        // Raise the command signal twice without queueing anything.
        harness.channels.command_ready.set();
        std::thread::sleep(Duration::from_millis(50));
        harness.channels.command_ready.set();
        assert!(matches!(harness.await_response(), Response::Fault(_)));
        harness.handle.join().unwrap();
    }
}
