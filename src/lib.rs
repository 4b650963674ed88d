//! # Rust Cam Core Library
//!
//! This crate is the camera-control subsystem behind a live-view and
//! recording application. The camera device is owned by an isolated worker
//! thread; everything else talks to it exclusively through a bounded
//! command/response protocol, so slow device I/O can never stall a caller's
//! event loop. The CLI binary (`main.rs`) is a thin demonstration harness
//! over the same facade a GUI would use.
//!
//! ## Crate Structure
//!
//! - **`config`**: TOML-backed [`Settings`](config::Settings) covering device
//!   selection, protocol capacities, the controller timeout table, recording
//!   output, and logging.
//! - **`error`**: layered `thiserror` enums consolidated into
//!   [`CamError`](error::CamError).
//! - **`logging`**: `tracing` subscriber setup with pretty/compact/JSON
//!   output.
//! - **`hardware`**: the [`CameraDevice`](hardware::CameraDevice) capability
//!   trait, the [`Frame`](hardware::Frame) pixel buffer, the simulated and
//!   OS-embedded backends, and the process-wide device registry.
//! - **`protocol`**: `Command`/`Response` enums, bounded message queues, and
//!   the manual-reset [`Signal`](protocol::Signal) handshake primitive.
//! - **`worker`**: the [`CameraWorker`](worker::CameraWorker) thread and its
//!   lifecycle state machine.
//! - **`recording`**: bounded frame ring, timestamp burn-in, and the
//!   ffmpeg-backed video writer.
//! - **`controller`**: the [`ControllerFacade`](controller::ControllerFacade)
//!   submission/supervision API, FPS estimation, and the stream scheduler.

pub mod config;
pub mod controller;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod protocol;
pub mod recording;
pub mod worker;

pub use config::Settings;
pub use controller::{CameraStatus, ControllerFacade, StreamScheduler};
pub use error::{AppResult, CamError};
pub use hardware::{CameraDevice, Frame};
pub use protocol::{Command, Response};
pub use worker::{CameraState, CameraWorker};
