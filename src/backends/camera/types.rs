// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use super::format_converters;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackendType {
    /// In-process synthetic front/back camera pair
    Virtual,
    /// Linux video devices through V4L2
    V4l2,
}

impl Default for CameraBackendType {
    fn default() -> Self {
        if cfg!(feature = "v4l2") {
            CameraBackendType::V4l2
        } else {
            CameraBackendType::Virtual
        }
    }
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::Virtual => write!(f, "virtual"),
            CameraBackendType::V4l2 => write!(f, "v4l2"),
        }
    }
}

impl std::str::FromStr for CameraBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "virtual" => Ok(CameraBackendType::Virtual),
            "v4l2" => Ok(CameraBackendType::V4l2),
            other => Err(format!("unknown camera backend '{}'", other)),
        }
    }
}

/// Which way a camera points relative to the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Points at the user
    Front,
    /// Points away from the user
    Back,
    /// Detachable or unknown placement
    External,
}

impl Facing {
    /// The facing a toggle switches to, `None` for external cameras
    pub fn opposite(&self) -> Option<Facing> {
        match self {
            Facing::Front => Some(Facing::Back),
            Facing::Back => Some(Facing::Front),
            Facing::External => None,
        }
    }

    /// Guess the facing from a device name (libcamera and UVC naming conventions)
    pub fn from_device_name(name: &str) -> Facing {
        let name = name.to_ascii_lowercase();
        if ["front", "user-facing", "user facing", "integrated", "facetime"]
            .iter()
            .any(|hint| name.contains(hint))
        {
            Facing::Front
        } else if ["back", "rear", "world-facing", "world facing"]
            .iter()
            .any(|hint| name.contains(hint))
        {
            Facing::Back
        } else {
            Facing::External
        }
    }
}

impl std::fmt::Display for Facing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Facing::Front => write!(f, "front"),
            Facing::Back => write!(f, "back"),
            Facing::External => write!(f, "external"),
        }
    }
}

impl std::str::FromStr for Facing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" => Ok(Facing::Front),
            "back" | "rear" => Ok(Facing::Back),
            "external" => Ok(Facing::External),
            other => Err(format!("unknown camera facing '{}'", other)),
        }
    }
}

/// Reference to a camera device
///
/// Enumerated once by the backend and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraDevice {
    /// Display name (V4L2 card name for real devices)
    pub name: String,
    /// Backend-specific identifier (device node for V4L2)
    pub path: String,
    /// Placement of the camera
    pub facing: Facing,
    /// Driver name, when the backend knows it
    pub driver: Option<String>,
    /// Smallest zoom factor the device accepts
    pub min_zoom_factor: f64,
    /// Largest zoom factor the device accepts
    pub max_zoom_factor: f64,
}

impl CameraDevice {
    /// Clamp a requested zoom factor into the device range
    pub fn clamp_zoom(&self, factor: f64) -> f64 {
        factor.clamp(self.min_zoom_factor, self.max_zoom_factor)
    }
}

impl std::fmt::Display for CameraDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.facing, self.path)
    }
}

/// Pixel format for camera frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    RGB24,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    YUYV,
    /// UYVY - Packed 4:2:2 (U Y0 V Y1 interleaved)
    UYVY,
}

impl PixelFormat {
    /// Average bytes per pixel
    pub fn bytes_per_pixel(&self) -> f32 {
        match self {
            Self::RGBA => 4.0,
            Self::RGB24 => 3.0,
            Self::Gray8 => 1.0,
            Self::YUYV | Self::UYVY => 2.0,
        }
    }
}

/// A single frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Pixel data, shared between preview and capture without copying
    pub data: Arc<[u8]>,
    /// Pixel format of the data
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// Monotonic frame counter of the producing source
    pub sequence: u64,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Build a tightly packed RGBA frame
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>, sequence: u64) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data),
            format: PixelFormat::RGBA,
            stride: width * 4,
            sequence,
            captured_at: Instant::now(),
        }
    }

    /// Convert to a packed RGB image regardless of the source pixel format
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        let rgb = format_converters::frame_to_rgb(self)?;
        image::RgbImage::from_raw(self.width, self.height, rgb)
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Failed to initialize a device
    InitializationFailed(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Device held by another client
    DeviceBusy(String),
    /// Configuration lock already held
    ConfigurationLocked(String),
    /// Configuration call made without holding the lock
    NotLocked(String),
    /// Format not supported
    FormatNotSupported(String),
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::DeviceBusy(msg) => write!(f, "Device busy: {}", msg),
            BackendError::ConfigurationLocked(msg) => {
                write!(f, "Device already locked for configuration: {}", msg)
            }
            BackendError::NotLocked(msg) => {
                write!(f, "Device not locked for configuration: {}", msg)
            }
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::EBUSY) => BackendError::DeviceBusy(err.to_string()),
            Some(libc::ENOENT) | Some(libc::ENODEV) => BackendError::DeviceNotFound(err.to_string()),
            _ => BackendError::IoError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facing_opposite() {
        assert_eq!(Facing::Back.opposite(), Some(Facing::Front));
        assert_eq!(Facing::Front.opposite(), Some(Facing::Back));
        assert_eq!(Facing::External.opposite(), None);
    }

    #[test]
    fn test_facing_from_device_name() {
        assert_eq!(Facing::from_device_name("Integrated Camera"), Facing::Front);
        assert_eq!(Facing::from_device_name("ov8865 rear"), Facing::Back);
        assert_eq!(Facing::from_device_name("Logitech C920"), Facing::External);
    }

    #[test]
    fn test_backend_type_parse() {
        assert_eq!("V4L2".parse::<CameraBackendType>(), Ok(CameraBackendType::V4l2));
        assert!("gstreamer".parse::<CameraBackendType>().is_err());
    }

    #[test]
    fn test_busy_io_error() {
        let err: BackendError = std::io::Error::from_raw_os_error(libc::EBUSY).into();
        assert!(matches!(err, BackendError::DeviceBusy(_)));
    }
}
