// SPDX-License-Identifier: GPL-3.0-only

//! Capture session
//!
//! A session owns at most one video input and one still-image output. Inputs
//! are reconfigured inside a configuration transaction: changes made through a
//! [`SessionConfiguration`] guard are applied together when the outermost
//! guard is dropped.
//!
//! ```text
//! CaptureInput ──frames──▶ CaptureSession ──VideoConnection──▶ StillImageOutput
//!                                │
//!                                └──▶ preview_frame()
//! ```

use super::{BackendResult, CameraBackend, CameraDevice, CameraFrame, FrameSource, SharedFrame};
use crate::constants::JpegQualityPreset;
use crate::errors::PhotoError;
use crate::pipelines::photo::PhotoEncoder;
use futures::channel::oneshot;
use std::ops::{Deref, DerefMut};
use std::thread;
use tracing::{debug, error, info, warn};

/// Quality level the session is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPreset {
    /// Highest quality stills
    #[default]
    Photo,
    High,
    Medium,
    Low,
}

/// A device input feeding frames into the session
pub struct CaptureInput {
    device: CameraDevice,
    source: Box<dyn FrameSource>,
}

impl CaptureInput {
    /// Build an input from a device
    ///
    /// Fails when the backend cannot open the device (missing, busy, no permission).
    pub fn new(backend: &dyn CameraBackend, device: &CameraDevice) -> BackendResult<Self> {
        let source = backend.open_input(device)?;
        Ok(Self::from_source(source))
    }

    /// Wrap an already opened frame source
    pub fn from_source(source: Box<dyn FrameSource>) -> Self {
        Self {
            device: source.device().clone(),
            source,
        }
    }

    pub fn device(&self) -> &CameraDevice {
        &self.device
    }

    pub fn frame_slot(&self) -> SharedFrame {
        self.source.frame_slot()
    }

    pub fn is_streaming(&self) -> bool {
        self.source.is_streaming()
    }
}

impl std::fmt::Debug for CaptureInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureInput")
            .field("device", &self.device.path)
            .field("streaming", &self.source.is_streaming())
            .finish()
    }
}

/// Link between an attached input and the still output
#[derive(Clone)]
pub struct VideoConnection {
    device: CameraDevice,
    frames: SharedFrame,
}

impl VideoConnection {
    /// Device the connection carries frames from
    pub fn device(&self) -> &CameraDevice {
        &self.device
    }

    /// Copy of the most recent frame, if one has arrived
    pub fn latest_frame(&self) -> Option<CameraFrame> {
        self.frames.lock().ok().and_then(|slot| slot.clone())
    }
}

impl std::fmt::Debug for VideoConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoConnection")
            .field("device", &self.device.path)
            .finish()
    }
}

/// Result delivered once a still capture finishes
pub type StillCaptureResult = Result<Vec<u8>, PhotoError>;

/// Still-image output encoding JPEG
#[derive(Debug)]
pub struct StillImageOutput {
    quality: JpegQualityPreset,
    connection: Option<VideoConnection>,
}

impl StillImageOutput {
    pub fn new(quality: JpegQualityPreset) -> Self {
        Self {
            quality,
            connection: None,
        }
    }

    pub fn quality(&self) -> JpegQualityPreset {
        self.quality
    }

    /// Active video connection, present while an input is attached and the session runs
    pub fn video_connection(&self) -> Option<&VideoConnection> {
        self.connection.as_ref()
    }

    /// Capture a still from the connection without blocking the caller
    ///
    /// The latest frame is copied immediately; JPEG encoding runs on a worker
    /// thread and the result is delivered through the returned receiver. If the
    /// worker cannot be spawned the receiver resolves as cancelled.
    pub fn capture_still_image_asynchronously(
        &self,
        connection: &VideoConnection,
    ) -> oneshot::Receiver<StillCaptureResult> {
        let (tx, rx) = oneshot::channel();
        let frame = connection.latest_frame();
        let encoder = PhotoEncoder::new(self.quality);
        let device = connection.device.name.clone();

        let spawned = thread::Builder::new()
            .name("still-capture".to_string())
            .spawn(move || {
                let result = match frame {
                    Some(frame) => encoder.encode_frame(&frame).map(|encoded| encoded.data),
                    None => Err(PhotoError::NoFrameAvailable),
                };
                match &result {
                    Ok(data) => debug!(device = %device, size = data.len(), "Still capture encoded"),
                    Err(e) => warn!(device = %device, error = %e, "Still capture failed"),
                }
                // Receiver may be gone if the controller was dropped
                let _ = tx.send(result);
            });

        if let Err(e) = spawned {
            error!(error = %e, "Failed to spawn still capture worker");
        }

        rx
    }
}

/// Capture session holding one input and one still output
#[derive(Debug, Default)]
pub struct CaptureSession {
    preset: SessionPreset,
    inputs: Vec<CaptureInput>,
    output: Option<StillImageOutput>,
    running: bool,
    configuration_depth: usize,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a configuration transaction
    ///
    /// Changes made through the guard take effect when the outermost guard is
    /// dropped. Nested transactions are allowed.
    pub fn begin_configuration(&mut self) -> SessionConfiguration<'_> {
        self.configuration_depth += 1;
        SessionConfiguration { session: self }
    }

    /// Whether a configuration transaction is open
    pub fn is_configuring(&self) -> bool {
        self.configuration_depth > 0
    }

    pub fn preset(&self) -> SessionPreset {
        self.preset
    }

    pub fn set_preset(&mut self, preset: SessionPreset) {
        self.preset = preset;
    }

    /// Attached inputs (zero or one)
    pub fn inputs(&self) -> &[CaptureInput] {
        &self.inputs
    }

    /// Whether `input` could be attached right now
    pub fn can_add_input(&self, input: &CaptureInput) -> bool {
        if let Some(attached) = self.inputs.first() {
            debug!(
                device = %input.device.name,
                attached = %attached.device.name,
                "Session already has an input"
            );
            return false;
        }
        true
    }

    /// Attach an input, returning whether it was accepted
    pub fn add_input(&mut self, input: CaptureInput) -> bool {
        if !self.can_add_input(&input) {
            warn!(device = %input.device.name, "Session cannot accept input");
            return false;
        }
        info!(device = %input.device.name, "Adding session input");
        self.inputs.push(input);
        self.apply();
        true
    }

    /// Detach the input for `device_path`, stopping its stream
    pub fn remove_input(&mut self, device_path: &str) -> Option<CaptureInput> {
        let index = self.inputs.iter().position(|i| i.device.path == device_path)?;
        let mut input = self.inputs.remove(index);
        input.source.stop();
        if let Some(output) = self.output.as_mut() {
            output.connection = None;
        }
        info!(device = %input.device.name, "Removed session input");
        self.apply();
        Some(input)
    }

    /// Detach every input
    pub fn remove_all_inputs(&mut self) {
        let paths: Vec<String> = self.inputs.iter().map(|i| i.device.path.clone()).collect();
        for path in paths {
            self.remove_input(&path);
        }
    }

    pub fn can_add_output(&self) -> bool {
        self.output.is_none()
    }

    /// Attach the still output, returning whether it was accepted
    pub fn add_output(&mut self, output: StillImageOutput) -> bool {
        if !self.can_add_output() {
            warn!("Session already has a still output");
            return false;
        }
        self.output = Some(output);
        self.apply();
        true
    }

    pub fn still_image_output(&self) -> Option<&StillImageOutput> {
        self.output.as_ref()
    }

    /// Start delivering frames
    pub fn start_running(&mut self) {
        if self.running {
            return;
        }
        info!(preset = ?self.preset, inputs = self.inputs.len(), "Starting capture session");
        self.running = true;
        self.apply();
    }

    /// Stop every input stream
    pub fn stop_running(&mut self) {
        if !self.running {
            return;
        }
        info!("Stopping capture session");
        self.running = false;
        for input in &mut self.inputs {
            input.source.stop();
        }
        self.apply();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Latest frame of the attached input while the session runs
    pub fn preview_frame(&self) -> Option<CameraFrame> {
        if !self.running {
            return None;
        }
        let input = self.inputs.first()?;
        let slot = input.frame_slot();
        let frame = slot.lock().ok()?.clone();
        frame
    }

    /// Bring streams and connections in line with the current configuration
    ///
    /// Deferred while a transaction is open.
    fn apply(&mut self) {
        if self.is_configuring() {
            return;
        }

        if self.running {
            for input in &mut self.inputs {
                if input.source.is_streaming() {
                    continue;
                }
                if let Err(e) = input.source.start() {
                    error!(device = %input.device.name, error = %e, "Failed to start input stream");
                }
            }
        }

        let connection = if self.running {
            self.inputs
                .iter()
                .find(|i| i.source.is_streaming())
                .map(|i| VideoConnection {
                    device: i.device.clone(),
                    frames: i.source.frame_slot(),
                })
        } else {
            None
        };

        if let Some(output) = self.output.as_mut() {
            output.connection = connection;
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop_running();
    }
}

/// Open configuration transaction on a [`CaptureSession`]
///
/// Dereferences to the session; commits when dropped.
pub struct SessionConfiguration<'a> {
    session: &'a mut CaptureSession,
}

impl Deref for SessionConfiguration<'_> {
    type Target = CaptureSession;

    fn deref(&self) -> &CaptureSession {
        self.session
    }
}

impl DerefMut for SessionConfiguration<'_> {
    fn deref_mut(&mut self) -> &mut CaptureSession {
        self.session
    }
}

impl Drop for SessionConfiguration<'_> {
    fn drop(&mut self) {
        self.session.configuration_depth = self.session.configuration_depth.saturating_sub(1);
        if self.session.configuration_depth == 0 {
            debug!(inputs = self.session.inputs.len(), "Committing session configuration");
            self.session.apply();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{Facing, VirtualCameraBackend};

    fn device(backend: &VirtualCameraBackend, facing: Facing) -> CameraDevice {
        backend
            .enumerate_cameras()
            .into_iter()
            .find(|d| d.facing == facing)
            .unwrap()
    }

    fn running_session(backend: &VirtualCameraBackend) -> CaptureSession {
        let mut session = CaptureSession::new();
        session.add_output(StillImageOutput::new(JpegQualityPreset::High));
        let input = CaptureInput::new(backend, &device(backend, Facing::Back)).unwrap();
        session.add_input(input);
        session.start_running();
        session
    }

    #[test]
    fn test_only_one_input_accepted() {
        let backend = VirtualCameraBackend::new();
        let mut session = running_session(&backend);
        let front = CaptureInput::new(&backend, &device(&backend, Facing::Front)).unwrap();
        assert!(!session.can_add_input(&front));
        assert!(!session.add_input(front));
        assert_eq!(session.inputs().len(), 1);
    }

    #[test]
    fn test_transaction_defers_stream_start() {
        let backend = VirtualCameraBackend::new();
        let mut session = running_session(&backend);
        {
            let mut config = session.begin_configuration();
            config.remove_all_inputs();
            let front = CaptureInput::new(&backend, &device(&backend, Facing::Front)).unwrap();
            assert!(config.add_input(front));
            assert!(!config.inputs()[0].is_streaming());
            assert!(config.still_image_output().unwrap().video_connection().is_none());
        }
        assert!(session.inputs()[0].is_streaming());
        let connection = session.still_image_output().unwrap().video_connection().unwrap();
        assert_eq!(connection.device().facing, Facing::Front);
    }

    #[test]
    fn test_removed_input_drops_connection_inside_transaction() {
        let backend = VirtualCameraBackend::new();
        let mut session = running_session(&backend);
        {
            let mut config = session.begin_configuration();
            config.remove_all_inputs();
            assert!(config.inputs().is_empty());
            assert!(config.still_image_output().unwrap().video_connection().is_none());
        }
        assert!(session.still_image_output().unwrap().video_connection().is_none());
    }

    #[test]
    fn test_nested_transactions_commit_once() {
        let backend = VirtualCameraBackend::new();
        let mut session = running_session(&backend);
        {
            let mut outer = session.begin_configuration();
            outer.remove_all_inputs();
            {
                let mut inner = outer.begin_configuration();
                let front = CaptureInput::new(&backend, &device(&backend, Facing::Front)).unwrap();
                inner.add_input(front);
            }
            assert!(outer.is_configuring());
            assert!(!outer.inputs()[0].is_streaming());
        }
        assert!(!session.is_configuring());
        assert!(session.inputs()[0].is_streaming());
    }

    #[test]
    fn test_stopped_session_has_no_connection_or_preview() {
        let backend = VirtualCameraBackend::new();
        let mut session = running_session(&backend);
        assert!(session.preview_frame().is_some());
        session.stop_running();
        assert!(session.preview_frame().is_none());
        assert!(session.still_image_output().unwrap().video_connection().is_none());
    }

    #[test]
    fn test_async_capture_yields_jpeg() {
        let backend = VirtualCameraBackend::new();
        let session = running_session(&backend);
        let output = session.still_image_output().unwrap();
        let connection = output.video_connection().unwrap().clone();
        let result = pollster::block_on(output.capture_still_image_asynchronously(&connection));
        let bytes = result.unwrap().unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_second_output_rejected() {
        let mut session = CaptureSession::new();
        assert!(session.add_output(StillImageOutput::new(JpegQualityPreset::Low)));
        assert!(!session.add_output(StillImageOutput::new(JpegQualityPreset::High)));
        assert_eq!(
            session.still_image_output().unwrap().quality(),
            JpegQualityPreset::Low
        );
    }
}
