// SPDX-License-Identifier: MPL-2.0

//! Simple Camera - a single-screen camera with swipe zoom and photo review
//!
//! This library provides the camera session controller and everything it
//! stands on: camera backends, the capture session, still encoding and
//! photo storage.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`controller`]: Camera session controller (toggle, zoom, capture, hand-off)
//! - [`backends`]: Camera backend abstraction and capture session
//! - [`pipelines`]: Still photo encoding
//! - [`config`]: User configuration handling
//! - [`storage`]: Photo file storage
//! - [`terminal`]: Terminal camera and review screens
//!
//! # Example
//!
//! ```no_run
//! use simple_camera::backends::camera::VirtualCameraBackend;
//! use simple_camera::{CameraController, Config};
//! use std::sync::Arc;
//!
//! let mut controller = CameraController::new(Arc::new(VirtualCameraBackend::new()), &Config::default());
//! controller.zoom_in().ok();
//! controller.capture().ok();
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod controller;
pub mod errors;
pub mod pipelines;
pub mod storage;
pub mod terminal;

// Re-export commonly used types
pub use config::Config;
pub use controller::{CameraController, Transition};
pub use pipelines::photo::CapturedImage;
