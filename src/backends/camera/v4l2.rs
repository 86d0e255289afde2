// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera backend
//!
//! Enumerates `/dev/video*` capture nodes, streams frames with the `v4l`
//! crate and drives zoom through `V4L2_CID_ZOOM_ABSOLUTE`.
//!
//! V4L2 has no notion of camera placement, so facing comes from the
//! configured overrides first and the card name second. Anything still
//! unclassified is treated as front-facing: a desktop webcam points at the
//! user.
//!
//! Hardware zoom has no native ramp. A ramp is emulated by a short-lived
//! thread stepping the control; a newer ramp on the same device supersedes
//! the running one.

use super::v4l2_controls::{self, ControlInfo};
use super::zoom::ZoomRamp;
use super::{
    BackendError, BackendResult, CameraBackend, CameraBackendType, CameraDevice, CameraFrame,
    Facing, FrameSource, PixelFormat, SharedFrame, format_converters,
};
use crate::constants::timing::{FRAME_LOG_INTERVAL, ZOOM_RAMP_TICK};
use crate::constants::v4l2::{BUFFER_COUNT, MAX_ZOOM_FACTOR, PREFERRED_HEIGHT, PREFERRED_WIDTH};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

/// Per-device configuration state
#[derive(Debug, Default)]
struct DeviceState {
    locked: AtomicBool,
    /// Bumped for every ramp; a ramp thread stops once it is outdated
    ramp_generation: Arc<AtomicU64>,
}

/// V4L2 backend
pub struct V4l2Backend {
    facing_overrides: HashMap<String, Facing>,
    states: Mutex<HashMap<String, Arc<DeviceState>>>,
}

impl V4l2Backend {
    pub fn new(facing_overrides: HashMap<String, Facing>) -> Self {
        Self {
            facing_overrides,
            states: Mutex::new(HashMap::new()),
        }
    }

    fn state(&self, device: &CameraDevice) -> Arc<DeviceState> {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(states.entry(device.path.clone()).or_default())
    }

    fn facing_for(&self, path: &str, card: &str) -> Facing {
        if let Some(facing) = self.facing_overrides.get(path) {
            return *facing;
        }
        match Facing::from_device_name(card) {
            Facing::External => Facing::Front,
            facing => facing,
        }
    }

    /// Build a device reference for a capture node, `None` for metadata or output nodes
    fn probe(&self, path: &str) -> Option<CameraDevice> {
        let info = v4l2_controls::query_device_info(path)?;
        if !info.is_capture_device() {
            debug!(path, card = %info.card, "Skipping non-capture node");
            return None;
        }

        let max_zoom_factor = if v4l2_controls::zoom_control(path).is_some() {
            MAX_ZOOM_FACTOR
        } else {
            1.0
        };

        Some(CameraDevice {
            facing: self.facing_for(path, &info.card),
            name: info.card,
            path: path.to_string(),
            driver: Some(info.driver),
            min_zoom_factor: 1.0,
            max_zoom_factor,
        })
    }
}

/// `/dev/videoN` nodes in numeric order
fn video_nodes() -> Vec<String> {
    let Ok(entries) = std::fs::read_dir("/dev") else {
        return Vec::new();
    };
    let mut nodes: Vec<(u32, String)> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            let index = name.strip_prefix("video")?.parse().ok()?;
            Some((index, entry.path().to_string_lossy().to_string()))
        })
        .collect();
    nodes.sort();
    nodes.into_iter().map(|(_, path)| path).collect()
}

impl CameraBackend for V4l2Backend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }

    fn is_available(&self) -> bool {
        Path::new("/dev").exists() && !video_nodes().is_empty()
    }

    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        let devices: Vec<CameraDevice> = video_nodes()
            .iter()
            .filter_map(|path| self.probe(path))
            .collect();
        for device in &devices {
            debug!(device = %device, max_zoom = device.max_zoom_factor, "Found V4L2 camera");
        }
        devices
    }

    fn open_input(&self, device: &CameraDevice) -> BackendResult<Box<dyn FrameSource>> {
        info!(device = %device, "Opening V4L2 input");
        let source = V4l2FrameSource::open(device.clone())?;
        Ok(Box::new(source))
    }

    fn zoom_factor(&self, device: &CameraDevice) -> Option<f64> {
        let Some(control) = v4l2_controls::zoom_control(&device.path) else {
            return Some(1.0);
        };
        let value = v4l2_controls::get_control(&device.path, control.id)?;
        Some(control.value_to_zoom_factor(value, device.max_zoom_factor))
    }

    fn lock_for_configuration(&self, device: &CameraDevice) -> BackendResult<()> {
        let state = self.state(device);
        state
            .locked
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| BackendError::ConfigurationLocked(device.name.clone()))
    }

    fn unlock_for_configuration(&self, device: &CameraDevice) {
        self.state(device).locked.store(false, Ordering::SeqCst);
    }

    fn ramp_to_zoom_factor(
        &self,
        device: &CameraDevice,
        factor: f64,
        rate: f64,
    ) -> BackendResult<()> {
        let state = self.state(device);
        if !state.locked.load(Ordering::SeqCst) {
            return Err(BackendError::NotLocked(device.name.clone()));
        }

        let control = v4l2_controls::zoom_control(&device.path).ok_or_else(|| {
            BackendError::NotAvailable(format!("{} has no zoom control", device.name))
        })?;

        let target = device.clamp_zoom(factor);
        let current = self.zoom_factor(device).unwrap_or(1.0);
        let generation = state.ramp_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let ramp = ZoomRamp::new(current, target, rate, Instant::now());

        if ramp.duration().is_zero() {
            let value = control.zoom_factor_to_value(target, device.max_zoom_factor);
            return v4l2_controls::set_control(&device.path, control.id, value)
                .map_err(BackendError::IoError);
        }

        let path = device.path.clone();
        let max_factor = device.max_zoom_factor;
        let generations = Arc::clone(&state.ramp_generation);
        thread::Builder::new()
            .name("zoom-ramp".to_string())
            .spawn(move || run_ramp(&path, &control, max_factor, ramp, generation, &generations))
            .map_err(|e| BackendError::Other(format!("failed to spawn zoom ramp: {}", e)))?;

        debug!(device = %device.name, from = current, to = target, rate, "V4L2 zoom ramp started");
        Ok(())
    }
}

fn run_ramp(
    path: &str,
    control: &ControlInfo,
    max_factor: f64,
    ramp: ZoomRamp,
    generation: u64,
    generations: &AtomicU64,
) {
    let mut last_value = None;
    loop {
        if generations.load(Ordering::SeqCst) != generation {
            debug!(path, "Zoom ramp superseded");
            return;
        }
        let now = Instant::now();
        let value = control.zoom_factor_to_value(ramp.factor_at(now), max_factor);
        if last_value != Some(value) {
            if let Err(e) = v4l2_controls::set_control(path, control.id, value) {
                warn!(path, error = %e, "Zoom ramp aborted");
                return;
            }
            last_value = Some(value);
        }
        if ramp.is_complete_at(now) {
            return;
        }
        thread::sleep(ZOOM_RAMP_TICK);
    }
}

/// Pixel layout negotiated with the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamFormat {
    Yuyv,
    Mjpeg,
}

impl StreamFormat {
    fn fourcc(&self) -> v4l::FourCC {
        match self {
            StreamFormat::Yuyv => v4l::FourCC::new(b"YUYV"),
            StreamFormat::Mjpeg => v4l::FourCC::new(b"MJPG"),
        }
    }
}

/// Negotiated capture geometry
#[derive(Debug, Clone, Copy)]
struct Negotiated {
    format: StreamFormat,
    width: u32,
    height: u32,
    stride: u32,
}

/// Open the device and agree on YUYV, or MJPEG when YUYV is refused
fn negotiate(path: &str) -> BackendResult<(Device, Negotiated)> {
    let dev = Device::with_path(path)?;

    for format in [StreamFormat::Yuyv, StreamFormat::Mjpeg] {
        let request = v4l::Format::new(PREFERRED_WIDTH, PREFERRED_HEIGHT, format.fourcc());
        match dev.set_format(&request) {
            Ok(actual) if actual.fourcc == format.fourcc() => {
                info!(
                    path,
                    width = actual.width,
                    height = actual.height,
                    fourcc = ?actual.fourcc,
                    "Negotiated V4L2 format"
                );
                let stride = if actual.stride > 0 {
                    actual.stride
                } else {
                    actual.width * 2
                };
                return Ok((
                    dev,
                    Negotiated {
                        format,
                        width: actual.width,
                        height: actual.height,
                        stride,
                    },
                ));
            }
            Ok(actual) => {
                debug!(path, requested = ?format.fourcc(), got = ?actual.fourcc, "Format not accepted");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(BackendError::FormatNotSupported(format!(
        "{} supports neither YUYV nor MJPEG",
        path
    )))
}

/// Frame source streaming from one V4L2 node
struct V4l2FrameSource {
    device: CameraDevice,
    /// Opened handle, consumed by the first start
    opened: Option<(Device, Negotiated)>,
    latest_frame: SharedFrame,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl V4l2FrameSource {
    fn open(device: CameraDevice) -> BackendResult<Self> {
        let opened = negotiate(&device.path)?;
        Ok(Self {
            device,
            opened: Some(opened),
            latest_frame: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        })
    }
}

impl FrameSource for V4l2FrameSource {
    fn device(&self) -> &CameraDevice {
        &self.device
    }

    fn start(&mut self) -> BackendResult<()> {
        if self.thread.is_some() {
            return Ok(());
        }
        let (dev, negotiated) = match self.opened.take() {
            Some(opened) => opened,
            None => negotiate(&self.device.path)?,
        };

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let latest_frame = Arc::clone(&self.latest_frame);
        let name = self.device.name.clone();

        let handle = thread::Builder::new()
            .name("v4l2-capture".to_string())
            .spawn(move || {
                if let Err(e) = capture_loop(dev, negotiated, &latest_frame, &running) {
                    error!(device = %name, error = %e, "V4L2 capture loop failed");
                }
            })
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?;

        self.thread = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            match handle.join() {
                Ok(_) => info!(device = %self.device.name, "V4L2 capture thread stopped"),
                Err(_) => warn!(device = %self.device.name, "V4L2 capture thread panicked"),
            }
        }
    }

    fn is_streaming(&self) -> bool {
        self.thread.is_some()
    }

    fn frame_slot(&self) -> SharedFrame {
        Arc::clone(&self.latest_frame)
    }
}

impl Drop for V4l2FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop(
    dev: Device,
    negotiated: Negotiated,
    latest_frame: &SharedFrame,
    running: &AtomicBool,
) -> BackendResult<()> {
    let mut stream = MmapStream::with_buffers(&dev, Type::VideoCapture, BUFFER_COUNT)?;
    info!(format = ?negotiated.format, "V4L2 capture stream started");

    let mut sequence: u64 = 0;
    while running.load(Ordering::SeqCst) {
        let (buf, _meta) = match stream.next() {
            Ok(next) => next,
            Err(e) => {
                warn!(error = %e, "Failed to dequeue V4L2 buffer");
                thread::sleep(ZOOM_RAMP_TICK);
                continue;
            }
        };

        let frame = match negotiated.format {
            StreamFormat::Yuyv => CameraFrame {
                width: negotiated.width,
                height: negotiated.height,
                data: Arc::from(buf),
                format: PixelFormat::YUYV,
                stride: negotiated.stride,
                sequence,
                captured_at: Instant::now(),
            },
            StreamFormat::Mjpeg => match format_converters::mjpeg_to_rgba(buf) {
                Ok((rgba, width, height)) => CameraFrame::from_rgba(width, height, rgba, sequence),
                Err(e) => {
                    debug!(error = %e, "Dropping corrupt MJPEG frame");
                    continue;
                }
            },
        };

        if sequence % FRAME_LOG_INTERVAL == 0 {
            debug!(sequence, size = buf.len(), "V4L2 frame captured");
        }
        sequence += 1;

        match latest_frame.lock() {
            Ok(mut slot) => *slot = Some(frame),
            Err(_) => {
                return Err(BackendError::Other("frame slot poisoned".to_string()));
            }
        }
    }

    info!("V4L2 capture loop ended");
    Ok(())
}
