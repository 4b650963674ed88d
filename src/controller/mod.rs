//! Controller-side facade over the camera worker.
//!
//! The facade owns the channel endpoints and the worker's `JoinHandle`, and
//! is the only component the UI layer talks to. It submits commands with a
//! bounded wait per command class, supervises the worker lifecycle
//! (start, graceful stop, forced termination), and hosts the controller-side
//! acquisition policy: the FPS estimator and the stream scheduler, both of
//! which live here because only the controller observes wall-clock gaps
//! between frame deliveries.

pub mod fps;
pub mod stream;

pub use fps::FpsEstimator;
pub use stream::{StreamScheduler, StreamStats};

use crate::config::Settings;
use crate::error::{AppResult, CamError, ControllerError};
use crate::hardware::registry;
use crate::protocol::{Command, Response, WorkerChannels};
use crate::worker::CameraWorker;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Device kind used when a requested backend fails to open.
pub const FALLBACK_KIND: &str = "simulated";

// Poll interval while waiting for the worker thread to exit.
const JOIN_POLL: Duration = Duration::from_millis(10);

// Consecutive submit timeouts tolerated before the camera is shown inactive.
const MAX_TIMEOUTS: u32 = 2;

/// User-visible camera state derived from the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraStatus {
    /// Worker running and responsive.
    Active,
    /// No worker, or the worker is no longer trusted.
    Inactive,
    /// Start or stop in progress.
    Transitioning,
}

impl std::fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraStatus::Active => write!(f, "active"),
            CameraStatus::Inactive => write!(f, "inactive"),
            CameraStatus::Transitioning => write!(f, "transitioning"),
        }
    }
}

/// Owner of the worker thread and both protocol endpoints.
pub struct ControllerFacade {
    settings: Settings,
    kind: String,
    channels: Option<Arc<WorkerChannels>>,
    worker: Option<JoinHandle<()>>,
    status: CameraStatus,
    diagnostic: Option<String>,
    timeouts: u32,
}

impl ControllerFacade {
    /// Build a facade targeting the configured default device kind.
    pub fn new(settings: Settings) -> Self {
        let kind = settings.camera.default_kind.clone();
        Self {
            settings,
            kind,
            channels: None,
            worker: None,
            status: CameraStatus::Inactive,
            diagnostic: None,
            timeouts: 0,
        }
    }

    /// Device kind the facade is targeting.
    pub fn device_kind(&self) -> &str {
        &self.kind
    }

    /// Current user-visible camera status.
    pub fn status(&self) -> CameraStatus {
        self.status
    }

    /// Diagnostic message accompanying an `Inactive` status, if any.
    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    /// Whether the worker thread is currently running.
    pub fn is_alive(&self) -> bool {
        self.worker
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Bounded wait applied to a command when the caller has no override.
    pub fn command_timeout(&self, command: &Command) -> Duration {
        let ms = match command {
            Command::Snap => self.settings.worker.snap_timeout_ms,
            Command::SetExposure(_) => self.settings.worker.exposure_timeout_ms,
            Command::Stop => self.settings.worker.stop_timeout_ms,
            _ => self.settings.worker.default_timeout_ms,
        };
        Duration::from_millis(ms)
    }

    /// Spawn the worker and wait for it to report readiness.
    ///
    /// A facade that is already running is left untouched.
    ///
    /// # Errors
    /// Fails when the device kind is unknown, the device cannot open, or the
    /// worker does not report within the open timeout.
    pub fn start(&mut self) -> AppResult<()> {
        if self.is_alive() {
            debug!(kind = %self.kind, "worker already running");
            return Ok(());
        }
        self.status = CameraStatus::Transitioning;
        self.diagnostic = None;
        self.timeouts = 0;

        let device = match registry::create_device(&self.kind, &self.settings.camera) {
            Ok(device) => device,
            Err(err) => {
                self.status = CameraStatus::Inactive;
                return Err(err);
            }
        };
        let channels = WorkerChannels::new(&self.settings.worker);
        let handle = match CameraWorker::spawn(
            device,
            Arc::clone(&channels),
            self.settings.recording.clone(),
        ) {
            Ok(handle) => handle,
            Err(err) => {
                self.status = CameraStatus::Inactive;
                return Err(CamError::Io(err));
            }
        };
        self.channels = Some(channels);
        self.worker = Some(handle);

        let open_timeout = Duration::from_millis(self.settings.worker.open_timeout_ms);
        match self.await_response(open_timeout) {
            Ok(Response::Ready) => {
                self.status = CameraStatus::Active;
                info!(kind = %self.kind, "camera worker started");
                Ok(())
            }
            Ok(Response::NotReady(reason)) => {
                // The worker exits on a failed open; collect the thread.
                self.join_worker();
                self.status = CameraStatus::Inactive;
                self.diagnostic = Some(reason.clone());
                Err(CamError::WorkerFault(reason))
            }
            Ok(other) => {
                self.force_terminate();
                Err(CamError::WorkerFault(format!(
                    "unexpected response '{}' during open",
                    other.label()
                )))
            }
            Err(err) => {
                self.force_terminate();
                Err(err.into())
            }
        }
    }

    /// Submit one command and wait up to `timeout` for its response.
    ///
    /// # Errors
    /// `WorkerDead` when no worker is running, `Channel` on queue misuse,
    /// `Timeout` when the response signal never fires.
    pub fn submit(
        &mut self,
        command: Command,
        timeout: Duration,
    ) -> Result<Response, ControllerError> {
        if !self.is_alive() {
            return Err(ControllerError::WorkerDead);
        }
        let channels = Arc::clone(self.channels.as_ref().ok_or(ControllerError::WorkerDead)?);
        channels.send_command(command)?;
        match Self::wait_response(&channels, timeout) {
            Ok(response) => {
                self.timeouts = 0;
                if let Response::Fault(message) = &response {
                    warn!(message, "worker reported fault");
                    self.status = CameraStatus::Inactive;
                    self.diagnostic = Some(message.clone());
                }
                Ok(response)
            }
            Err(err) => {
                if matches!(err, ControllerError::Timeout(_)) {
                    self.timeouts += 1;
                    if self.timeouts >= MAX_TIMEOUTS {
                        self.status = CameraStatus::Inactive;
                        self.diagnostic =
                            Some("worker unresponsive after repeated timeouts".into());
                    }
                }
                Err(err)
            }
        }
    }

    /// Stop the worker, cooperatively first, forcibly after the grace period.
    ///
    /// # Errors
    /// Currently infallible in practice; kept fallible for parity with
    /// `start` at call sites.
    pub fn stop(&mut self) -> AppResult<()> {
        if !self.is_alive() {
            self.worker = None;
            self.channels = None;
            self.status = CameraStatus::Inactive;
            return Ok(());
        }
        self.status = CameraStatus::Transitioning;
        let timeout = Duration::from_millis(self.settings.worker.stop_timeout_ms);
        match self.submit(Command::Stop, timeout) {
            Ok(Response::Stopped) => {
                self.join_worker();
                self.status = CameraStatus::Inactive;
                info!(kind = %self.kind, "camera worker stopped");
            }
            Ok(other) => {
                warn!(response = other.label(), "unexpected response to stop");
                self.force_terminate();
            }
            Err(err) => {
                warn!(error = %err, "graceful stop failed");
                self.force_terminate();
            }
        }
        Ok(())
    }

    /// Abandon the worker without waiting for it.
    ///
    /// A `std` thread cannot be killed, so forced termination drops the
    /// handle and channel endpoints and marks the camera inactive; the
    /// orphaned thread exits on its own when its current device call
    /// returns.
    pub fn force_terminate(&mut self) {
        if self.worker.take().is_some() {
            warn!(kind = %self.kind, "worker forcibly terminated");
            if self.diagnostic.is_none() {
                self.diagnostic = Some("worker forcibly terminated".into());
            }
        }
        self.channels = None;
        self.status = CameraStatus::Inactive;
    }

    /// Swap to a different device kind, falling back to the simulated
    /// backend when the requested device fails to open.
    ///
    /// # Errors
    /// Unknown kinds are rejected before the running worker is disturbed.
    pub fn switch_device(&mut self, kind: &str) -> AppResult<()> {
        {
            let available = registry::global()
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if !available.contains(kind) {
                return Err(CamError::UnknownDeviceKind(kind.to_string()));
            }
        }
        self.stop()?;
        self.kind = kind.to_string();
        match self.start() {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(kind, error = %err, "device failed to open, falling back");
                self.kind = FALLBACK_KIND.to_string();
                self.start()?;
                self.diagnostic = Some(format!(
                    "'{kind}' failed to open ({err}); fell back to '{FALLBACK_KIND}'"
                ));
                Ok(())
            }
        }
    }

    fn await_response(&self, timeout: Duration) -> Result<Response, ControllerError> {
        let channels = self.channels.as_ref().ok_or(ControllerError::WorkerDead)?;
        Self::wait_response(channels, timeout)
    }

    fn wait_response(
        channels: &WorkerChannels,
        timeout: Duration,
    ) -> Result<Response, ControllerError> {
        let deadline = Instant::now() + timeout;
        loop {
            // Drain-before-wait covers responses queued while the signal
            // was already cleared.
            if let Ok(response) = channels.responses.pop() {
                return Ok(response);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ControllerError::Timeout(timeout));
            }
            if channels.response_ready.wait_timeout(deadline - now) {
                channels.response_ready.clear();
            }
        }
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            let grace = Duration::from_millis(self.settings.worker.join_grace_ms);
            let deadline = Instant::now() + grace;
            while !handle.is_finished() && Instant::now() < deadline {
                std::thread::sleep(JOIN_POLL);
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    warn!("worker thread panicked during shutdown");
                }
            } else {
                warn!("worker did not exit within grace period, abandoning thread");
                drop(handle);
            }
        }
        self.channels = None;
    }
}

impl Drop for ControllerFacade {
    fn drop(&mut self) {
        if self.is_alive() {
            let _ = self.stop();
        }
    }
}
