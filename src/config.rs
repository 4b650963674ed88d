//! Configuration management.
//!
//! Strongly-typed settings loaded from TOML via the `config` crate. Every field
//! carries a serde default so a partial file (or no file at all) still yields a
//! usable configuration. `Settings::validate` catches values that parse but are
//! semantically wrong.

use crate::error::CamError;
use config::Config;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Camera selection and acquisition defaults.
    #[serde(default)]
    pub camera: CameraSettings,
    /// Worker protocol capacities and timeout table.
    #[serde(default)]
    pub worker: WorkerSettings,
    /// Recording pipeline settings.
    #[serde(default)]
    pub recording: RecordingSettings,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Camera selection and acquisition defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Device kind to open at startup (must be present in the registry).
    #[serde(default = "default_device_kind")]
    pub default_kind: String,
    /// Initial exposure time in milliseconds.
    #[serde(default = "default_exposure_ms")]
    pub exposure_ms: u32,
}

/// Worker protocol capacities and controller-side timeout table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Command queue capacity (submissions past this are a caller error).
    #[serde(default = "default_command_capacity")]
    pub command_queue_capacity: usize,
    /// Response queue capacity.
    #[serde(default = "default_response_capacity")]
    pub response_queue_capacity: usize,
    /// Wait for the worker to open the device and report readiness.
    #[serde(default = "default_open_timeout")]
    pub open_timeout_ms: u64,
    /// Wait for a single frame delivery.
    #[serde(default = "default_snap_timeout")]
    pub snap_timeout_ms: u64,
    /// Wait for an exposure change acknowledgement.
    #[serde(default = "default_exposure_timeout")]
    pub exposure_timeout_ms: u64,
    /// Wait for the terminal response after `Stop`.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_ms: u64,
    /// Wait applied to commands without a dedicated entry above.
    #[serde(default = "default_submit_timeout")]
    pub default_timeout_ms: u64,
    /// Grace period for the worker thread to exit after a graceful stop.
    #[serde(default = "default_join_grace")]
    pub join_grace_ms: u64,
}

/// Recording pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSettings {
    /// Directory receiving recorded video files; created on demand.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Frame ring capacity between acquisition and the writer thread.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Container frame rate used when no measured FPS was communicated.
    #[serde(default = "default_fallback_fps")]
    pub fallback_fps: u32,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format (pretty, compact, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_device_kind() -> String {
    "simulated".to_string()
}

fn default_exposure_ms() -> u32 {
    50
}

fn default_command_capacity() -> usize {
    5
}

fn default_response_capacity() -> usize {
    10
}

fn default_open_timeout() -> u64 {
    8500
}

fn default_snap_timeout() -> u64 {
    5000
}

fn default_exposure_timeout() -> u64 {
    5500
}

fn default_stop_timeout() -> u64 {
    4000
}

fn default_submit_timeout() -> u64 {
    5000
}

fn default_join_grace() -> u64 {
    2000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("recordings")
}

fn default_buffer_capacity() -> usize {
    20
}

fn default_fallback_fps() -> u32 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            default_kind: default_device_kind(),
            exposure_ms: default_exposure_ms(),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            command_queue_capacity: default_command_capacity(),
            response_queue_capacity: default_response_capacity(),
            open_timeout_ms: default_open_timeout(),
            snap_timeout_ms: default_snap_timeout(),
            exposure_timeout_ms: default_exposure_timeout(),
            stop_timeout_ms: default_stop_timeout(),
            default_timeout_ms: default_submit_timeout(),
            join_grace_ms: default_join_grace(),
        }
    }
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            buffer_capacity: default_buffer_capacity(),
            fallback_fps: default_fallback_fps(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Settings {
    /// Load settings from `config/<name>.toml` (default name: `default`).
    ///
    /// A missing file is not an error; built-in defaults apply.
    pub fn load(config_name: Option<&str>) -> Result<Self, CamError> {
        let config_path = format!("config/{}", config_name.unwrap_or("default"));
        let s = Config::builder()
            .add_source(config::File::with_name(&config_path).required(false))
            .build()
            .map_err(CamError::Config)?;

        let settings: Settings = s.try_deserialize().map_err(CamError::Config)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate values that parse but are semantically wrong.
    pub fn validate(&self) -> Result<(), CamError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(CamError::Configuration(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(CamError::Configuration(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_formats.join(", ")
            )));
        }

        if self.worker.command_queue_capacity == 0 {
            return Err(CamError::Configuration(
                "command_queue_capacity must be at least 1".into(),
            ));
        }
        if self.worker.response_queue_capacity == 0 {
            return Err(CamError::Configuration(
                "response_queue_capacity must be at least 1".into(),
            ));
        }
        if self.recording.buffer_capacity == 0 {
            return Err(CamError::Configuration(
                "recording buffer_capacity must be at least 1".into(),
            ));
        }
        if self.recording.fallback_fps == 0 {
            return Err(CamError::Configuration(
                "fallback_fps must be at least 1".into(),
            ));
        }

        Ok(())
    }
}
