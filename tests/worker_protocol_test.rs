//! Integration tests for the camera worker's command/response protocol.
//!
//! These drive a real worker thread through the raw channel endpoints, the
//! same way the controller facade does, and check the protocol contract:
//! one response per command, in submission order, with structured rejection
//! instead of crashes.

use rust_cam::config::{RecordingSettings, WorkerSettings};
use rust_cam::error::DeviceError;
use rust_cam::hardware::{CameraDevice, Frame, SimulatedCamera};
use rust_cam::protocol::{Command, Response, WorkerChannels};
use rust_cam::worker::CameraWorker;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const RESPONSE_DEADLINE: Duration = Duration::from_secs(2);

fn await_response(channels: &WorkerChannels) -> Response {
    let deadline = Instant::now() + RESPONSE_DEADLINE;
    loop {
        if let Ok(response) = channels.responses.pop() {
            return response;
        }
        let now = Instant::now();
        assert!(now < deadline, "no response within deadline");
        if channels.response_ready.wait_timeout(deadline - now) {
            channels.response_ready.clear();
        }
    }
}

fn submit(channels: &WorkerChannels, command: Command) -> Response {
    channels.send_command(command).expect("command queue full");
    await_response(channels)
}

fn start_worker(dir: &TempDir) -> (Arc<WorkerChannels>, JoinHandle<()>) {
    let channels = WorkerChannels::new(&WorkerSettings::default());
    let mut camera = SimulatedCamera::new();
    camera.set_exposure(1);
    let recording = RecordingSettings {
        output_dir: dir.path().to_path_buf(),
        ..RecordingSettings::default()
    };
    let handle = CameraWorker::spawn(Box::new(camera), Arc::clone(&channels), recording)
        .expect("failed to spawn worker");
    assert_eq!(await_response(&channels), Response::Ready);
    (channels, handle)
}

/// A device whose `open` always fails, for exercising the fault path.
struct DeadCamera;

impl CameraDevice for DeadCamera {
    fn open(&mut self) -> Result<(), DeviceError> {
        Err(DeviceError::Open("sensor unplugged".into()))
    }

    fn close(&mut self) {}

    fn capture_frame(&mut self) -> Option<Frame> {
        None
    }

    fn set_exposure(&mut self, _ms: u32) -> bool {
        false
    }

    fn exposure(&self) -> u32 {
        0
    }

    fn device_kind(&self) -> &'static str {
        "dead"
    }
}

#[test]
fn every_command_gets_exactly_one_response_in_order() {
    let dir = TempDir::new().expect("tempdir");
    let (channels, handle) = start_worker(&dir);

    let commands = vec![
        Command::SetExposure(25),
        Command::Snap,
        Command::QueryFps,
        Command::SetFps(30),
        Command::StopRecording,
        Command::SetExposure(9999),
        Command::QueryFps,
        Command::Snap,
    ];
    let count = commands.len();
    let mut responses = Vec::new();
    for command in commands {
        responses.push(submit(&channels, command));
    }

    assert_eq!(responses.len(), count);
    assert_eq!(responses[0], Response::ExposureAck(25));
    assert!(matches!(responses[1], Response::Frame(_)));
    assert_eq!(responses[2], Response::FpsValue(0));
    assert_eq!(responses[3], Response::FpsValue(30));
    assert_eq!(responses[4], Response::Stopped);
    assert_eq!(responses[5], Response::ExposureRejected);
    // The rejected exposure left the communicated fps untouched.
    assert_eq!(responses[6], Response::FpsValue(30));
    assert!(matches!(responses[7], Response::Frame(_)));

    assert_eq!(submit(&channels, Command::Stop), Response::Stopped);
    handle.join().expect("worker thread");
}

#[test]
fn burst_of_commands_is_answered_in_submission_order() {
    let dir = TempDir::new().expect("tempdir");
    let (channels, handle) = start_worker(&dir);

    // Queue three commands back to back, then collect all three responses.
    channels.send_command(Command::SetFps(12)).expect("push");
    channels.send_command(Command::QueryFps).expect("push");
    channels.send_command(Command::Snap).expect("push");

    assert_eq!(await_response(&channels), Response::FpsValue(12));
    assert_eq!(await_response(&channels), Response::FpsValue(12));
    assert!(matches!(await_response(&channels), Response::Frame(_)));

    assert_eq!(submit(&channels, Command::Stop), Response::Stopped);
    handle.join().expect("worker thread");
}

#[test]
fn fresh_simulated_worker_snaps_vga_within_one_second() {
    let dir = TempDir::new().expect("tempdir");
    let (channels, handle) = start_worker(&dir);

    let started = Instant::now();
    match submit(&channels, Command::Snap) {
        Response::Frame(frame) => {
            assert_eq!((frame.width, frame.height), (640, 480));
            assert_eq!(frame.channels, 1);
            assert_eq!(frame.pixels.len(), frame.expected_len());
            assert!(started.elapsed() < Duration::from_secs(1));
        }
        other => panic!("expected a frame, got {other:?}"),
    }

    assert_eq!(submit(&channels, Command::Stop), Response::Stopped);
    handle.join().expect("worker thread");
}

#[test]
fn out_of_range_exposure_never_changes_device_state() {
    let dir = TempDir::new().expect("tempdir");
    let (channels, handle) = start_worker(&dir);

    assert_eq!(
        submit(&channels, Command::SetExposure(100)),
        Response::ExposureAck(100)
    );
    assert_eq!(
        submit(&channels, Command::SetExposure(5000)),
        Response::ExposureRejected
    );
    assert_eq!(
        submit(&channels, Command::SetExposure(0)),
        Response::ExposureRejected
    );
    // The accepted value is still in effect.
    assert_eq!(
        submit(&channels, Command::SetExposure(100)),
        Response::ExposureAck(100)
    );

    assert_eq!(submit(&channels, Command::Stop), Response::Stopped);
    handle.join().expect("worker thread");
}

#[test]
fn failed_open_reports_not_ready_and_ends_the_worker() {
    let dir = TempDir::new().expect("tempdir");
    let channels = WorkerChannels::new(&WorkerSettings::default());
    let recording = RecordingSettings {
        output_dir: dir.path().to_path_buf(),
        ..RecordingSettings::default()
    };
    let handle = CameraWorker::spawn(Box::new(DeadCamera), Arc::clone(&channels), recording)
        .expect("failed to spawn worker");

    match await_response(&channels) {
        Response::NotReady(reason) => assert!(reason.contains("sensor unplugged")),
        other => panic!("expected NotReady, got {other:?}"),
    }
    handle.join().expect("worker thread exits after failed open");
}

#[test]
fn command_signal_without_commands_faults_after_second_offense() {
    let dir = TempDir::new().expect("tempdir");
    let (channels, handle) = start_worker(&dir);

    channels.command_ready.set();
    std::thread::sleep(Duration::from_millis(50));
    channels.command_ready.set();

    match await_response(&channels) {
        Response::Fault(message) => assert!(message.contains("empty")),
        other => panic!("expected Fault, got {other:?}"),
    }
    handle.join().expect("worker thread exits after fault");
}
