//! Device registry for camera backend discovery.
//!
//! Maps a stable device-kind string to a factory producing a boxed
//! [`CameraDevice`]. The set of available kinds is explicit and statically
//! inspectable; a requested kind is validated against the registry before any
//! worker is spawned. Built-in backends are registered when the process-wide
//! registry is first touched.
//!
//! # Example Usage
//!
//! ```rust
//! use rust_cam::config::CameraSettings;
//! use rust_cam::hardware::registry;
//!
//! let kinds = registry::available_kinds();
//! assert!(kinds.contains(&"simulated"));
//!
//! let device = registry::create_device("simulated", &CameraSettings::default()).unwrap();
//! assert_eq!(device.device_kind(), "simulated");
//! ```

use crate::config::CameraSettings;
use crate::error::{AppResult, CamError};
use crate::hardware::capabilities::CameraDevice;
use crate::hardware::simulated::SimulatedCamera;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;

/// Factory producing a fresh, unopened device for a kind.
pub type DeviceFactory = fn(&CameraSettings) -> Box<dyn CameraDevice>;

/// Registry mapping device-kind strings to factories.
#[derive(Default)]
pub struct DeviceRegistry {
    factories: HashMap<&'static str, DeviceFactory>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the built-in backends.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        // Built-ins cannot collide in a fresh registry.
        let _ = registry.register("simulated", |settings| {
            let mut camera = SimulatedCamera::new();
            camera.set_exposure(settings.exposure_ms);
            Box::new(camera)
        });
        #[cfg(feature = "embedded_camera")]
        let _ = registry.register("embedded", |settings| {
            Box::new(crate::hardware::embedded::EmbeddedCamera::new(
                settings.exposure_ms,
            ))
        });
        registry
    }

    /// Register a factory under a kind string.
    ///
    /// # Errors
    /// Returns `DuplicateDeviceKind` if the kind is already taken.
    pub fn register(&mut self, kind: &'static str, factory: DeviceFactory) -> AppResult<()> {
        if self.factories.contains_key(kind) {
            return Err(CamError::DuplicateDeviceKind(kind.to_string()));
        }
        self.factories.insert(kind, factory);
        Ok(())
    }

    /// Remove a kind from the registry. Returns true if it was present.
    pub fn unregister(&mut self, kind: &str) -> bool {
        self.factories.remove(kind).is_some()
    }

    /// Whether a kind is registered.
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted for stable display.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<&'static str> = self.factories.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Instantiate a fresh, unopened device of the requested kind.
    ///
    /// # Errors
    /// Returns `UnknownDeviceKind` if the kind is not registered.
    pub fn create(&self, kind: &str, settings: &CameraSettings) -> AppResult<Box<dyn CameraDevice>> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| CamError::UnknownDeviceKind(kind.to_string()))?;
        Ok(factory(settings))
    }
}

static GLOBAL_REGISTRY: Lazy<Mutex<DeviceRegistry>> =
    Lazy::new(|| Mutex::new(DeviceRegistry::with_builtins()));

/// Access the process-wide registry.
pub fn global() -> &'static Mutex<DeviceRegistry> {
    &GLOBAL_REGISTRY
}

/// Instantiate a device from the process-wide registry.
pub fn create_device(kind: &str, settings: &CameraSettings) -> AppResult<Box<dyn CameraDevice>> {
    let registry = GLOBAL_REGISTRY
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    registry.create(kind, settings)
}

/// Registered kinds in the process-wide registry.
pub fn available_kinds() -> Vec<&'static str> {
    let registry = GLOBAL_REGISTRY
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    registry.kinds()
}
