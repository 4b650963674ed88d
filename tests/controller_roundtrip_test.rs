//! End-to-end tests for the controller facade.
//!
//! These exercise the public surface the UI layer uses: start/submit/stop
//! lifecycle, supervision after the worker is gone, and device switching
//! with fallback. Tests that mutate the process-wide device registry are
//! serialized.

use rust_cam::config::Settings;
use rust_cam::controller::{CameraStatus, ControllerFacade, FALLBACK_KIND};
use rust_cam::error::{ControllerError, DeviceError};
use rust_cam::hardware::registry;
use rust_cam::hardware::{CameraDevice, Frame};
use rust_cam::protocol::{Command, Response};
use serial_test::serial;
use std::time::Duration;
use tempfile::TempDir;

fn fast_settings(dir: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.camera.exposure_ms = 1;
    settings.recording.output_dir = dir.path().to_path_buf();
    settings
}

/// A backend whose `open` always fails, standing in for unplugged hardware.
struct FlakyCamera;

impl CameraDevice for FlakyCamera {
    fn open(&mut self) -> Result<(), DeviceError> {
        Err(DeviceError::Open("flaky backend refused to open".into()))
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
        "flaky"
    }
}

fn register_flaky() {
    let mut registry = registry::global()
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let _ = registry.register("flaky", |_settings| Box::new(FlakyCamera));
}

fn unregister_flaky() {
    let mut registry = registry::global()
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    registry.unregister("flaky");
}

#[test]
fn full_lifecycle_reaches_every_status() {
    let dir = TempDir::new().expect("tempdir");
    let mut facade = ControllerFacade::new(fast_settings(&dir));
    assert_eq!(facade.status(), CameraStatus::Inactive);
    assert!(!facade.is_alive());

    facade.start().expect("start");
    assert_eq!(facade.status(), CameraStatus::Active);
    assert!(facade.is_alive());
    assert!(facade.diagnostic().is_none());

    let timeout = facade.command_timeout(&Command::Snap);
    match facade.submit(Command::Snap, timeout).expect("snap") {
        Response::Frame(frame) => {
            assert_eq!((frame.width, frame.height), (640, 480));
        }
        other => panic!("expected a frame, got {other:?}"),
    }

    facade.stop().expect("stop");
    assert_eq!(facade.status(), CameraStatus::Inactive);
    assert!(!facade.is_alive());
}

#[test]
fn submit_after_stop_reports_worker_dead() {
    let dir = TempDir::new().expect("tempdir");
    let mut facade = ControllerFacade::new(fast_settings(&dir));
    facade.start().expect("start");
    facade.stop().expect("stop");

    let result = facade.submit(Command::QueryFps, Duration::from_millis(200));
    assert!(matches!(result, Err(ControllerError::WorkerDead)));
}

#[test]
fn exposure_commands_round_trip_through_facade() {
    let dir = TempDir::new().expect("tempdir");
    let mut facade = ControllerFacade::new(fast_settings(&dir));
    facade.start().expect("start");

    let timeout = facade.command_timeout(&Command::SetExposure(80));
    assert_eq!(
        facade.submit(Command::SetExposure(80), timeout).expect("set"),
        Response::ExposureAck(80)
    );
    assert_eq!(
        facade
            .submit(Command::SetExposure(2001), timeout)
            .expect("set out of range"),
        Response::ExposureRejected
    );

    facade.stop().expect("stop");
}

#[test]
#[serial]
fn switch_to_failing_backend_falls_back_to_simulated() {
    register_flaky();
    let dir = TempDir::new().expect("tempdir");
    let mut facade = ControllerFacade::new(fast_settings(&dir));
    facade.start().expect("start");

    facade.switch_device("flaky").expect("switch with fallback");
    assert_eq!(facade.device_kind(), FALLBACK_KIND);
    assert_eq!(facade.status(), CameraStatus::Active);
    let diagnostic = facade.diagnostic().expect("fallback diagnostic");
    assert!(diagnostic.contains("flaky"));
    assert!(diagnostic.contains(FALLBACK_KIND));

    // The fallback worker is fully functional.
    let timeout = facade.command_timeout(&Command::Snap);
    let response = facade.submit(Command::Snap, timeout).expect("snap");
    assert!(matches!(response, Response::Frame(_)));

    facade.stop().expect("stop");
    unregister_flaky();
}

#[test]
#[serial]
fn flaky_default_kind_surfaces_open_failure() {
    register_flaky();
    let dir = TempDir::new().expect("tempdir");
    let mut settings = fast_settings(&dir);
    settings.camera.default_kind = "flaky".into();
    let mut facade = ControllerFacade::new(settings);

    assert!(facade.start().is_err());
    assert_eq!(facade.status(), CameraStatus::Inactive);
    assert!(!facade.is_alive());
    let diagnostic = facade.diagnostic().expect("open failure diagnostic");
    assert!(diagnostic.contains("refused to open"));
    unregister_flaky();
}

#[test]
fn switching_between_known_kinds_restarts_the_worker() {
    let dir = TempDir::new().expect("tempdir");
    let mut facade = ControllerFacade::new(fast_settings(&dir));
    facade.start().expect("start");

    // Switching to the kind already in use still lands on a live worker.
    facade.switch_device("simulated").expect("switch");
    assert_eq!(facade.device_kind(), "simulated");
    assert!(facade.is_alive());
    assert!(facade.diagnostic().is_none());

    facade.stop().expect("stop");
}
