// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  CameraController   │  ← toggle / zoom / capture
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │   CaptureSession    │  ← inputs, still output, configuration transactions
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraBackend Trait │  ← enumeration, inputs, per-device configuration
//! └──────────┬──────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!   ┌───────┐  ┌───────┐
//!   │Virtual│  │ V4L2  │
//!   └───────┘  └───────┘
//! ```

pub mod format_converters;
pub mod session;
pub mod types;
#[cfg(feature = "v4l2")]
pub mod v4l2;
#[cfg(all(target_os = "linux", feature = "v4l2"))]
pub mod v4l2_controls;
pub mod virtual_camera;
pub mod zoom;

pub use session::{
    CaptureInput, CaptureSession, SessionConfiguration, SessionPreset, StillImageOutput,
    VideoConnection,
};
pub use types::*;
pub use virtual_camera::VirtualCameraBackend;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Latest frame published by a capture thread
pub type SharedFrame = Arc<Mutex<Option<CameraFrame>>>;

/// A stream of frames from one opened device
///
/// Produced by [`CameraBackend::open_input`]. The source only delivers frames
/// between `start` and `stop`; dropping it stops the stream.
pub trait FrameSource: Send {
    /// The device this source reads from
    fn device(&self) -> &CameraDevice;

    /// Start streaming frames into the shared slot
    fn start(&mut self) -> BackendResult<()>;

    /// Stop streaming and release the capture thread
    fn stop(&mut self);

    /// Whether frames are currently being delivered
    fn is_streaming(&self) -> bool;

    /// Slot holding the most recent frame
    fn frame_slot(&self) -> SharedFrame;
}

/// Camera backend trait
///
/// Covers the platform pieces the session controller consumes:
/// - Device enumeration
/// - Input construction from a device
/// - Per-device exclusive configuration and zoom ramps
pub trait CameraBackend: Send + Sync {
    // ===== Metadata =====

    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Check if this backend is usable on the current system
    fn is_available(&self) -> bool;

    // ===== Enumeration =====

    /// Enumerate available video capture devices
    ///
    /// No ordering is guaranteed.
    fn enumerate_cameras(&self) -> Vec<CameraDevice>;

    // ===== Inputs =====

    /// Open a frame source for the device
    ///
    /// Fails when the device vanished or is held by another client.
    fn open_input(&self, device: &CameraDevice) -> BackendResult<Box<dyn FrameSource>>;

    // ===== Per-device configuration =====

    /// Current zoom factor of the device, `None` if the device is unknown
    fn zoom_factor(&self, device: &CameraDevice) -> Option<f64>;

    /// Take the exclusive configuration lock of a device
    fn lock_for_configuration(&self, device: &CameraDevice) -> BackendResult<()>;

    /// Release the configuration lock
    fn unlock_for_configuration(&self, device: &CameraDevice);

    /// Ramp the zoom factor to `factor` at `rate` units per second
    ///
    /// Requires the configuration lock. The target is clamped to the device range.
    fn ramp_to_zoom_factor(&self, device: &CameraDevice, factor: f64, rate: f64)
    -> BackendResult<()>;
}

/// Scoped configuration lock on one device
///
/// Unlocks when dropped.
pub struct DeviceConfigurationLock<'a> {
    backend: &'a dyn CameraBackend,
    device: &'a CameraDevice,
}

impl<'a> DeviceConfigurationLock<'a> {
    /// Acquire the configuration lock of `device`
    pub fn acquire(backend: &'a dyn CameraBackend, device: &'a CameraDevice) -> BackendResult<Self> {
        backend.lock_for_configuration(device)?;
        Ok(Self { backend, device })
    }

    /// Ramp the locked device's zoom factor
    pub fn ramp_to_zoom_factor(&self, factor: f64, rate: f64) -> BackendResult<()> {
        self.backend.ramp_to_zoom_factor(self.device, factor, rate)
    }
}

impl Drop for DeviceConfigurationLock<'_> {
    fn drop(&mut self) {
        self.backend.unlock_for_configuration(self.device);
    }
}

/// Create a backend instance for the requested type
///
/// `facing_overrides` maps device paths to a facing for backends that cannot
/// detect camera placement themselves.
pub fn get_backend(
    backend_type: CameraBackendType,
    facing_overrides: &HashMap<String, Facing>,
) -> BackendResult<Arc<dyn CameraBackend>> {
    match backend_type {
        CameraBackendType::Virtual => Ok(Arc::new(VirtualCameraBackend::new())),
        #[cfg(feature = "v4l2")]
        CameraBackendType::V4l2 => Ok(Arc::new(v4l2::V4l2Backend::new(
            facing_overrides.clone(),
        ))),
        #[cfg(not(feature = "v4l2"))]
        CameraBackendType::V4l2 => {
            let _ = facing_overrides;
            Err(BackendError::NotAvailable(
                "built without the v4l2 feature".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_backend_always_available() {
        let backend = get_backend(CameraBackendType::Virtual, &HashMap::new()).unwrap();
        assert!(backend.is_available());
        assert_eq!(backend.backend_type(), CameraBackendType::Virtual);
    }

    #[test]
    fn test_configuration_lock_releases_on_drop() {
        let backend = VirtualCameraBackend::new();
        let device = backend.enumerate_cameras().remove(0);
        {
            let _lock = DeviceConfigurationLock::acquire(&backend, &device).unwrap();
            assert!(backend.lock_for_configuration(&device).is_err());
        }
        assert!(backend.lock_for_configuration(&device).is_ok());
        backend.unlock_for_configuration(&device);
    }
}
