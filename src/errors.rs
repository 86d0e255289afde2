// SPDX-License-Identifier: MPL-2.0

//! Error types for the camera application

use crate::backends::camera::types::{BackendError, Facing};
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera-related errors
    Camera(CameraError),
    /// Photo capture errors
    Photo(PhotoError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Camera-specific errors
#[derive(Debug, Clone, PartialEq)]
pub enum CameraError {
    /// No camera devices found
    NoCameraFound,
    /// Toggle requested but no camera faces the other way
    NoOppositeCamera(Facing),
    /// No active device to operate on
    NoActiveDevice,
    /// Building a session input from the device failed
    InputUnavailable(String),
    /// Camera is busy or in use
    Busy,
    /// The device configuration lock could not be acquired
    ConfigurationLocked(String),
    /// Backend error
    Backend(String),
}

/// Photo capture errors
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoError {
    /// The still output has no active video connection
    NoConnection,
    /// No frame available for capture
    NoFrameAvailable,
    /// Capture failed
    CaptureFailed(String),
    /// Encoding failed
    EncodingFailed(String),
    /// Decoding the captured bytes failed
    DecodingFailed(String),
    /// Save failed
    SaveFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Photo(e) => write!(f, "Photo error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::NoCameraFound => write!(f, "No camera devices found"),
            CameraError::NoOppositeCamera(facing) => {
                write!(f, "No camera facing away from the {} camera", facing)
            }
            CameraError::NoActiveDevice => write!(f, "No active camera"),
            CameraError::InputUnavailable(msg) => write!(f, "Cannot open camera input: {}", msg),
            CameraError::Busy => write!(f, "Camera is busy"),
            CameraError::ConfigurationLocked(msg) => {
                write!(f, "Cannot lock camera for configuration: {}", msg)
            }
            CameraError::Backend(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl fmt::Display for PhotoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhotoError::NoConnection => write!(f, "No active video connection"),
            PhotoError::NoFrameAvailable => write!(f, "No frame available for capture"),
            PhotoError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            PhotoError::EncodingFailed(msg) => write!(f, "Encoding failed: {}", msg),
            PhotoError::DecodingFailed(msg) => write!(f, "Decoding failed: {}", msg),
            PhotoError::SaveFailed(msg) => write!(f, "Save failed: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for PhotoError {}

impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<PhotoError> for AppError {
    fn from(err: PhotoError) -> Self {
        AppError::Photo(err)
    }
}

impl From<BackendError> for CameraError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::DeviceBusy(_) => CameraError::Busy,
            BackendError::DeviceNotFound(msg) | BackendError::InitializationFailed(msg) => {
                CameraError::InputUnavailable(msg)
            }
            BackendError::ConfigurationLocked(msg) => CameraError::ConfigurationLocked(msg),
            other => CameraError::Backend(other.to_string()),
        }
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Camera(err.into())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for PhotoError {
    fn from(err: std::io::Error) -> Self {
        PhotoError::SaveFailed(err.to_string())
    }
}

impl From<image::ImageError> for PhotoError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Decoding(e) => PhotoError::DecodingFailed(e.to_string()),
            image::ImageError::IoError(e) => PhotoError::SaveFailed(e.to_string()),
            other => PhotoError::EncodingFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_backend_maps_to_busy_camera() {
        let err: CameraError = BackendError::DeviceBusy("/dev/video0".into()).into();
        assert_eq!(err, CameraError::Busy);
    }

    #[test]
    fn test_display_mentions_facing() {
        let err = CameraError::NoOppositeCamera(Facing::Back);
        assert!(err.to_string().contains("back"));
    }
}
