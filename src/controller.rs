// SPDX-License-Identifier: GPL-3.0-only

//! Camera session controller
//!
//! Owns the capture session and turns user gestures into session and device
//! operations:
//!
//! - toggle between the front and back camera
//! - stepped zoom in and out, ramped under the device configuration lock
//! - asynchronous still capture, handed to the review screen
//!
//! Failures are logged where they happen and the operation stops there. None
//! of them is fatal; the caller gets the error back only for status display.

use crate::backends::camera::{
    CameraBackend, CameraDevice, CameraFrame, CaptureInput, CaptureSession,
    DeviceConfigurationLock, Facing, SessionPreset, StillImageOutput,
    session::StillCaptureResult,
};
use crate::config::{Config, ZoomConfig};
use crate::constants::zoom::ZOOM_EPSILON;
use crate::errors::{CameraError, PhotoError};
use crate::pipelines::photo::CapturedImage;
use futures::channel::oneshot;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Screen transition requested by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Show the captured photo on the review screen
    ShowPhoto,
}

impl Transition {
    /// Stable identifier of the transition
    pub fn identifier(&self) -> &'static str {
        match self {
            Transition::ShowPhoto => "showPhoto",
        }
    }
}

/// Still capture waiting for its completion
struct PendingCapture {
    receiver: oneshot::Receiver<StillCaptureResult>,
    facing: Facing,
}

/// Camera session controller
pub struct CameraController {
    backend: Arc<dyn CameraBackend>,
    session: CaptureSession,
    front: Option<CameraDevice>,
    back: Option<CameraDevice>,
    active: Option<CameraDevice>,
    zoom: ZoomConfig,
    pending_capture: Option<PendingCapture>,
    still_image: Option<CapturedImage>,
}

impl CameraController {
    /// Discover cameras, configure the session and start it
    ///
    /// Never fails: a missing or unusable camera leaves the session without
    /// an input, so there is no preview and captures fail.
    pub fn new(backend: Arc<dyn CameraBackend>, config: &Config) -> Self {
        let devices = backend.enumerate_cameras();
        info!(
            backend = %backend.backend_type(),
            count = devices.len(),
            "Enumerated cameras"
        );

        // Last device seen for each facing wins
        let mut front = None;
        let mut back = None;
        for device in devices {
            match device.facing {
                Facing::Front => front = Some(device),
                Facing::Back => back = Some(device),
                Facing::External => {
                    debug!(device = %device, "Ignoring camera with unknown facing")
                }
            }
        }

        let active = match config.preferred_facing {
            Facing::Front => front.clone().or_else(|| back.clone()),
            Facing::Back | Facing::External => back.clone().or_else(|| front.clone()),
        };

        let mut session = CaptureSession::new();
        {
            let mut configuration = session.begin_configuration();
            configuration.set_preset(SessionPreset::Photo);

            match active.as_ref() {
                Some(device) => match CaptureInput::new(backend.as_ref(), device) {
                    Ok(input) => {
                        configuration.add_input(input);
                    }
                    Err(e) => {
                        error!(device = %device, error = %e, "Failed to create camera input");
                    }
                },
                None => warn!("No front or back camera available"),
            }

            configuration.add_output(StillImageOutput::new(config.jpeg_quality));
        }
        session.start_running();

        if let Some(device) = active.as_ref() {
            info!(device = %device, "Camera session running");
        }

        Self {
            backend,
            session,
            front,
            back,
            active,
            zoom: config.zoom,
            pending_capture: None,
            still_image: None,
        }
    }

    // ===== Accessors =====

    pub fn backend(&self) -> &Arc<dyn CameraBackend> {
        &self.backend
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    /// Device currently feeding the session
    pub fn active_device(&self) -> Option<&CameraDevice> {
        self.active.as_ref()
    }

    pub fn front_device(&self) -> Option<&CameraDevice> {
        self.front.as_ref()
    }

    pub fn back_device(&self) -> Option<&CameraDevice> {
        self.back.as_ref()
    }

    pub fn zoom_config(&self) -> &ZoomConfig {
        &self.zoom
    }

    /// Latest preview frame
    pub fn preview_frame(&self) -> Option<CameraFrame> {
        self.session.preview_frame()
    }

    /// Zoom factor the active device reports right now
    pub fn zoom_factor(&self) -> Option<f64> {
        self.active
            .as_ref()
            .and_then(|device| self.backend.zoom_factor(device))
    }

    fn device_for(&self, facing: Facing) -> Option<&CameraDevice> {
        match facing {
            Facing::Front => self.front.as_ref(),
            Facing::Back => self.back.as_ref(),
            Facing::External => None,
        }
    }

    // ===== Toggle =====

    /// Switch the session to the camera facing the other way
    ///
    /// Returns the facing of the new active device. When no opposite camera
    /// exists the session is left alone. When the new input cannot be built the
    /// session is left without an input and the active device is unchanged.
    pub fn toggle_device(&mut self) -> Result<Facing, CameraError> {
        let target = match self.active.as_ref() {
            Some(active) => {
                let current = active.facing;
                let opposite = current.opposite().and_then(|facing| self.device_for(facing));
                match opposite {
                    Some(device) => device.clone(),
                    None => {
                        warn!(facing = %current, "No opposite camera, toggle ignored");
                        return Err(CameraError::NoOppositeCamera(current));
                    }
                }
            }
            None => match self.back.as_ref().or(self.front.as_ref()) {
                Some(device) => device.clone(),
                None => {
                    warn!("No camera to toggle to");
                    return Err(CameraError::NoCameraFound);
                }
            },
        };

        let mut configuration = self.session.begin_configuration();
        configuration.remove_all_inputs();

        let input = match CaptureInput::new(self.backend.as_ref(), &target) {
            Ok(input) => input,
            Err(e) => {
                error!(device = %target, error = %e, "Failed to create camera input");
                return Err(e.into());
            }
        };

        if configuration.can_add_input(&input) {
            configuration.add_input(input);
        }

        info!(device = %target, "Switched camera");
        let facing = target.facing;
        self.active = Some(target);
        Ok(facing)
    }

    // ===== Zoom =====

    /// Step the zoom towards the ceiling
    ///
    /// Returns the ramp target, or `None` when the device is already at or
    /// above the ceiling.
    pub fn zoom_in(&self) -> Result<Option<f64>, CameraError> {
        let (device, current) = self.current_zoom()?;
        if current >= self.zoom.ceiling {
            debug!(current, ceiling = self.zoom.ceiling, "Zoom already at ceiling");
            return Ok(None);
        }
        let target = (current + self.zoom.step).min(self.zoom.ceiling);
        self.ramp_zoom(device, current, target)
    }

    /// Step the zoom towards the floor
    ///
    /// Returns the ramp target, or `None` when the device is already at or
    /// below the floor.
    pub fn zoom_out(&self) -> Result<Option<f64>, CameraError> {
        let (device, current) = self.current_zoom()?;
        if current <= self.zoom.floor {
            debug!(current, floor = self.zoom.floor, "Zoom already at floor");
            return Ok(None);
        }
        let target = (current - self.zoom.step).max(self.zoom.floor);
        self.ramp_zoom(device, current, target)
    }

    fn current_zoom(&self) -> Result<(&CameraDevice, f64), CameraError> {
        let device = self.active.as_ref().ok_or(CameraError::NoActiveDevice)?;
        let current = self.backend.zoom_factor(device).ok_or_else(|| {
            warn!(device = %device, "Camera does not report a zoom factor");
            CameraError::InputUnavailable(device.path.clone())
        })?;
        Ok((device, current))
    }

    fn ramp_zoom(
        &self,
        device: &CameraDevice,
        current: f64,
        target: f64,
    ) -> Result<Option<f64>, CameraError> {
        if (target - current).abs() < ZOOM_EPSILON {
            debug!(current, target, "Zoom target equals current factor, no ramp");
            return Ok(None);
        }

        let lock = DeviceConfigurationLock::acquire(self.backend.as_ref(), device).map_err(|e| {
            error!(device = %device, error = %e, "Failed to lock camera for configuration");
            CameraError::from(e)
        })?;
        lock.ramp_to_zoom_factor(target, self.zoom.ramp_rate)
            .map_err(|e| {
                error!(device = %device, error = %e, "Zoom ramp failed");
                CameraError::from(e)
            })?;

        info!(device = %device, from = current, to = target, "Zoom ramp issued");
        Ok(Some(target))
    }

    // ===== Capture =====

    /// Request a still capture; the result arrives through [`Self::poll_capture`]
    ///
    /// A new request replaces one that has not completed yet.
    pub fn capture(&mut self) -> Result<(), PhotoError> {
        let output = self.session.still_image_output().ok_or_else(|| {
            warn!("Capture requested without a still output");
            PhotoError::NoConnection
        })?;
        let connection = output.video_connection().ok_or_else(|| {
            warn!("Capture requested without an active video connection");
            PhotoError::NoConnection
        })?;

        let facing = connection.device().facing;
        let receiver = output.capture_still_image_asynchronously(connection);
        if self.pending_capture.is_some() {
            debug!("Replacing unfinished capture request");
        }
        self.pending_capture = Some(PendingCapture { receiver, facing });
        info!(facing = %facing, "Still capture requested");
        Ok(())
    }

    /// Whether a capture is waiting for completion
    pub fn is_capture_pending(&self) -> bool {
        self.pending_capture.is_some()
    }

    /// Handle a finished capture without blocking
    ///
    /// Call from the UI loop. Yields [`Transition::ShowPhoto`] exactly once per
    /// successful capture.
    pub fn poll_capture(&mut self) -> Option<Transition> {
        let pending = self.pending_capture.as_mut()?;
        match pending.receiver.try_recv() {
            Ok(None) => None,
            Ok(Some(result)) => {
                let facing = pending.facing;
                self.pending_capture = None;
                self.complete_capture(result, facing)
            }
            Err(oneshot::Canceled) => {
                warn!("Still capture was dropped before completing");
                self.pending_capture = None;
                None
            }
        }
    }

    /// Wait for the pending capture to finish
    pub async fn wait_capture(&mut self) -> Option<Transition> {
        let pending = self.pending_capture.take()?;
        match pending.receiver.await {
            Ok(result) => self.complete_capture(result, pending.facing),
            Err(oneshot::Canceled) => {
                warn!("Still capture was dropped before completing");
                None
            }
        }
    }

    fn complete_capture(&mut self, result: StillCaptureResult, facing: Facing) -> Option<Transition> {
        let bytes = match result {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                error!("Still capture returned no image data");
                return None;
            }
            Err(e) => {
                error!(error = %e, "Still capture failed");
                return None;
            }
        };

        match CapturedImage::from_jpeg(bytes, facing) {
            Ok(image) => {
                info!(
                    width = image.width(),
                    height = image.height(),
                    facing = %facing,
                    "Still image captured"
                );
                self.still_image = Some(image);
                Some(Transition::ShowPhoto)
            }
            Err(e) => {
                error!(error = %e, "Failed to decode captured still");
                None
            }
        }
    }

    // ===== Hand-off =====

    /// Most recent captured image, if not yet handed off
    pub fn still_image(&self) -> Option<&CapturedImage> {
        self.still_image.as_ref()
    }

    /// Hand the captured image to the review screen
    pub fn take_still_image(&mut self) -> Option<CapturedImage> {
        self.still_image.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::VirtualCameraBackend;

    fn controller_with(backend: VirtualCameraBackend) -> CameraController {
        CameraController::new(Arc::new(backend), &Config::default())
    }

    #[test]
    fn test_back_camera_active_by_default() {
        let controller = controller_with(VirtualCameraBackend::new());
        assert_eq!(controller.active_device().unwrap().facing, Facing::Back);
        assert!(controller.session().is_running());
        assert_eq!(controller.session().preset(), SessionPreset::Photo);
        assert_eq!(controller.session().inputs().len(), 1);
    }

    #[test]
    fn test_preferred_facing_falls_back() {
        let config = Config {
            preferred_facing: Facing::Front,
            ..Config::default()
        };
        let backend = VirtualCameraBackend::with_facings(&[Facing::Back]);
        let controller = CameraController::new(Arc::new(backend), &config);
        assert_eq!(controller.active_device().unwrap().facing, Facing::Back);
    }

    #[test]
    fn test_no_cameras() {
        let mut controller = controller_with(VirtualCameraBackend::with_facings(&[]));
        assert!(controller.active_device().is_none());
        assert!(controller.session().inputs().is_empty());
        assert_eq!(controller.toggle_device(), Err(CameraError::NoCameraFound));
        assert_eq!(controller.zoom_in(), Err(CameraError::NoActiveDevice));
        assert_eq!(controller.capture(), Err(PhotoError::NoConnection));
    }

    #[test]
    fn test_last_device_of_a_facing_wins() {
        let backend = VirtualCameraBackend::with_facings(&[Facing::Back, Facing::Back]);
        let controller = controller_with(backend);
        assert_eq!(controller.back_device().unwrap().path, "virtual-back-1");
    }

    #[test]
    fn test_transition_identifier() {
        assert_eq!(Transition::ShowPhoto.identifier(), "showPhoto");
    }
}
