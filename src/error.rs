//! Custom error types for the application.
//!
//! This module defines the primary error type, `CamError`, for the entire
//! application. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle different kinds of errors, from configuration and
//! I/O issues to device and protocol problems.
//!
//! ## Error Hierarchy
//!
//! Each layer owns a small error enum; `CamError` consolidates them:
//!
//! - **`DeviceError`**: Errors originating from a camera backend (open failure,
//!   no device found, capture faults).
//! - **`ChannelError`**: Bounded-queue violations in the command/response
//!   protocol (queue full on submit, queue empty after a wakeup).
//! - **`RecordingError`**: Failures in the recording pipeline (encoder process
//!   spawn, pipe writes, finalization).
//! - **`ControllerError`**: Controller-side submission failures (timeout on the
//!   response signal, dead worker, channel misuse).
//!
//! By using `#[from]`, `CamError` can be seamlessly created from the underlying
//! error types, simplifying error handling throughout the application with the
//! `?` operator.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, CamError>;

/// Errors reported by camera device backends.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Failed to open device: {0}")]
    Open(String),

    #[error("No capture device found")]
    NotFound,

    #[error("Device already open")]
    AlreadyOpen,

    #[error("Capture failed: {0}")]
    Capture(String),
}

/// Bounded message-queue violations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Queue is full")]
    Full,

    #[error("Queue is empty")]
    Empty,
}

/// Failures in the recording pipeline.
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Failed to spawn encoder process: {0}")]
    EncoderSpawn(String),

    #[error("Encoder pipe closed unexpectedly")]
    EncoderPipeClosed,

    #[error("Encoder exited with failure status {0}")]
    EncoderFailed(String),

    #[error("Recording I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Controller-side submission and supervision failures.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Timed out after {0:?} waiting for worker response")]
    Timeout(std::time::Duration),

    #[error("Worker is not running")]
    WorkerDead,

    #[error("Protocol channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Top-level application error consolidating every layer.
#[derive(Error, Debug)]
pub enum CamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    #[error("Unknown device kind '{0}'")]
    UnknownDeviceKind(String),

    #[error("Device kind '{0}' is already registered")]
    DuplicateDeviceKind(String),

    #[error("Worker fault: {0}")]
    WorkerFault(String),
}
