// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera backend
//!
//! An in-process camera pair (back and front) that renders an animated test
//! pattern. Zoom ramps are honoured by cropping into the pattern, so the
//! preview reacts to zoom gestures exactly like a real sensor would.
//!
//! Devices can be marked busy to exercise input construction failures.

use super::zoom::ZoomState;
use super::{
    BackendError, BackendResult, CameraBackend, CameraBackendType, CameraDevice, CameraFrame,
    Facing, FrameSource, SharedFrame,
};
use crate::constants::virtual_camera::{FRAME_HEIGHT, FRAME_INTERVAL, FRAME_WIDTH, MAX_ZOOM_FACTOR};
use crate::constants::timing::FRAME_LOG_INTERVAL;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Path prefix of synthetic devices
pub const VIRTUAL_PATH_PREFIX: &str = "virtual-";

/// Mutable state of one synthetic device
#[derive(Debug)]
struct VirtualDeviceState {
    zoom: ZoomState,
    locked: bool,
    busy: bool,
}

type DeviceStates = HashMap<String, Arc<Mutex<VirtualDeviceState>>>;

/// Synthetic camera backend
pub struct VirtualCameraBackend {
    devices: Vec<CameraDevice>,
    states: DeviceStates,
}

impl VirtualCameraBackend {
    /// Back and front camera pair
    pub fn new() -> Self {
        Self::with_facings(&[Facing::Back, Facing::Front])
    }

    /// One synthetic device per listed facing, enumerated in that order
    ///
    /// Duplicate facings get numbered paths (`virtual-back`, `virtual-back-1`, ...).
    pub fn with_facings(facings: &[Facing]) -> Self {
        let mut devices = Vec::new();
        let mut states = HashMap::new();
        let mut seen: HashMap<Facing, usize> = HashMap::new();

        for facing in facings {
            let count = seen.entry(*facing).or_default();
            let path = if *count == 0 {
                format!("{}{}", VIRTUAL_PATH_PREFIX, facing)
            } else {
                format!("{}{}-{}", VIRTUAL_PATH_PREFIX, facing, count)
            };
            *count += 1;

            let device = CameraDevice {
                name: format!("Virtual {} camera", facing),
                path: path.clone(),
                facing: *facing,
                driver: Some("virtual".to_string()),
                min_zoom_factor: 1.0,
                max_zoom_factor: MAX_ZOOM_FACTOR,
            };
            states.insert(
                path,
                Arc::new(Mutex::new(VirtualDeviceState {
                    zoom: ZoomState::new(1.0),
                    locked: false,
                    busy: false,
                })),
            );
            devices.push(device);
        }

        Self { devices, states }
    }

    /// Mark a device as held by another client
    pub fn set_busy(&self, path: &str, busy: bool) {
        if let Some(mut state) = self.state(path) {
            state.busy = busy;
            debug!(path, busy, "Virtual camera busy flag changed");
        }
    }

    /// Jump a device to a zoom factor without ramping
    pub fn set_zoom_factor(&self, path: &str, factor: f64) {
        if let Some(mut state) = self.state(path) {
            state.zoom.set(factor);
        }
    }

    /// Whether the device configuration lock is currently held
    pub fn is_locked(&self, path: &str) -> bool {
        self.state(path).map(|s| s.locked).unwrap_or(false)
    }

    fn state(&self, path: &str) -> Option<MutexGuard<'_, VirtualDeviceState>> {
        let state = self.states.get(path)?;
        Some(state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

impl Default for VirtualCameraBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for VirtualCameraBackend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Virtual
    }

    fn is_available(&self) -> bool {
        true
    }

    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        self.devices.clone()
    }

    fn open_input(&self, device: &CameraDevice) -> BackendResult<Box<dyn FrameSource>> {
        let state = self
            .states
            .get(&device.path)
            .cloned()
            .ok_or_else(|| BackendError::DeviceNotFound(device.path.clone()))?;

        if state.lock().map(|s| s.busy).unwrap_or(true) {
            return Err(BackendError::DeviceBusy(device.name.clone()));
        }

        info!(device = %device.name, "Opening virtual camera input");
        Ok(Box::new(VirtualFrameSource::new(device.clone(), state)))
    }

    fn zoom_factor(&self, device: &CameraDevice) -> Option<f64> {
        self.state(&device.path)
            .map(|state| state.zoom.factor_at(Instant::now()))
    }

    fn lock_for_configuration(&self, device: &CameraDevice) -> BackendResult<()> {
        let mut state = self
            .state(&device.path)
            .ok_or_else(|| BackendError::DeviceNotFound(device.path.clone()))?;
        if state.locked {
            return Err(BackendError::ConfigurationLocked(device.name.clone()));
        }
        state.locked = true;
        Ok(())
    }

    fn unlock_for_configuration(&self, device: &CameraDevice) {
        if let Some(mut state) = self.state(&device.path) {
            state.locked = false;
        }
    }

    fn ramp_to_zoom_factor(
        &self,
        device: &CameraDevice,
        factor: f64,
        rate: f64,
    ) -> BackendResult<()> {
        let mut state = self
            .state(&device.path)
            .ok_or_else(|| BackendError::DeviceNotFound(device.path.clone()))?;
        if !state.locked {
            return Err(BackendError::NotLocked(device.name.clone()));
        }

        let target = device.clamp_zoom(factor);
        let ramp = state.zoom.ramp_to(target, rate, Instant::now());
        debug!(
            device = %device.name,
            target,
            rate,
            duration_ms = ramp.duration().as_millis() as u64,
            "Virtual zoom ramp started"
        );
        Ok(())
    }
}

/// Frame source rendering the test pattern on a background thread
struct VirtualFrameSource {
    device: CameraDevice,
    state: Arc<Mutex<VirtualDeviceState>>,
    latest_frame: SharedFrame,
    stop_signal: Arc<AtomicBool>,
    sequence: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl VirtualFrameSource {
    fn new(device: CameraDevice, state: Arc<Mutex<VirtualDeviceState>>) -> Self {
        Self {
            device,
            state,
            latest_frame: Arc::new(Mutex::new(None)),
            stop_signal: Arc::new(AtomicBool::new(false)),
            sequence: Arc::new(AtomicU64::new(0)),
            thread: None,
        }
    }
}

/// Render one frame for the device's current zoom
fn render_frame(
    facing: Facing,
    state: &Mutex<VirtualDeviceState>,
    sequence: u64,
) -> CameraFrame {
    let zoom = state
        .lock()
        .map(|s| s.zoom.factor_at(Instant::now()))
        .unwrap_or(1.0);
    let data = render_pattern(FRAME_WIDTH, FRAME_HEIGHT, zoom, sequence, facing);
    CameraFrame::from_rgba(FRAME_WIDTH, FRAME_HEIGHT, data, sequence)
}

/// Colour bars with a moving sweep line, magnified around the centre by `zoom`
///
/// Front and back cameras use mirrored bar orders so a toggle is visible.
pub fn render_pattern(width: u32, height: u32, zoom: f64, sequence: u64, facing: Facing) -> Vec<u8> {
    const BARS: [[u8; 3]; 8] = [
        [235, 235, 235],
        [235, 235, 16],
        [16, 235, 235],
        [16, 235, 16],
        [235, 16, 235],
        [235, 16, 16],
        [16, 16, 235],
        [16, 16, 16],
    ];

    let zoom = zoom.max(1.0);
    let w = width as f64;
    let h = height as f64;
    let (cx, cy) = (w / 2.0, h / 2.0);
    let sweep = (sequence % width.max(1) as u64) as f64;
    let mut data = Vec::with_capacity((width * height * 4) as usize);

    for y in 0..height {
        let sy = cy + (y as f64 - cy) / zoom;
        for x in 0..width {
            let sx = cx + (x as f64 - cx) / zoom;

            let mut bar = ((sx / w) * BARS.len() as f64) as usize;
            bar = bar.min(BARS.len() - 1);
            if facing == Facing::Front {
                bar = BARS.len() - 1 - bar;
            }

            let mut rgb = if sy > h * 0.75 {
                // Checkerboard strip makes magnification easy to see
                let cell = ((sx / 16.0) as u32 + (sy / 16.0) as u32) % 2;
                if cell == 0 { [40, 40, 40] } else { [200, 200, 200] }
            } else {
                BARS[bar]
            };

            if (sx - sweep).abs() < 1.0 / zoom {
                rgb = [255, 128, 0];
            }

            data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
    }

    data
}

impl FrameSource for VirtualFrameSource {
    fn device(&self) -> &CameraDevice {
        &self.device
    }

    fn start(&mut self) -> BackendResult<()> {
        if self.thread.is_some() {
            return Ok(());
        }
        if self.state.lock().map(|s| s.busy).unwrap_or(true) {
            return Err(BackendError::DeviceBusy(self.device.name.clone()));
        }

        self.stop_signal.store(false, Ordering::SeqCst);

        // Publish a first frame synchronously so capture works right after start
        let first = self.sequence.fetch_add(1, Ordering::Relaxed);
        let frame = render_frame(self.device.facing, &self.state, first);
        if let Ok(mut slot) = self.latest_frame.lock() {
            *slot = Some(frame);
        }

        let facing = self.device.facing;
        let name = self.device.name.clone();
        let state = Arc::clone(&self.state);
        let latest_frame = Arc::clone(&self.latest_frame);
        let stop_signal = Arc::clone(&self.stop_signal);
        let sequence = Arc::clone(&self.sequence);

        let handle = thread::Builder::new()
            .name(format!("{}-frames", self.device.path))
            .spawn(move || {
                info!(device = %name, "Virtual capture loop started");
                while !stop_signal.load(Ordering::SeqCst) {
                    thread::sleep(FRAME_INTERVAL);
                    let seq = sequence.fetch_add(1, Ordering::Relaxed);
                    let frame = render_frame(facing, &state, seq);
                    match latest_frame.lock() {
                        Ok(mut slot) => *slot = Some(frame),
                        Err(_) => {
                            warn!(device = %name, "Frame slot poisoned, stopping");
                            break;
                        }
                    }
                    if seq % FRAME_LOG_INTERVAL == 0 {
                        debug!(device = %name, sequence = seq, "Virtual frame rendered");
                    }
                }
                info!(device = %name, "Virtual capture loop stopped");
            })
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?;

        self.thread = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!(device = %self.device.name, "Virtual capture thread panicked");
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

impl Drop for VirtualFrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pair() {
        let backend = VirtualCameraBackend::new();
        let facings: Vec<_> = backend.enumerate_cameras().iter().map(|d| d.facing).collect();
        assert_eq!(facings, vec![Facing::Back, Facing::Front]);
    }

    #[test]
    fn test_duplicate_facings_get_unique_paths() {
        let backend = VirtualCameraBackend::with_facings(&[Facing::Back, Facing::Back]);
        let paths: Vec<_> = backend
            .enumerate_cameras()
            .into_iter()
            .map(|d| d.path)
            .collect();
        assert_eq!(paths, vec!["virtual-back", "virtual-back-1"]);
    }

    #[test]
    fn test_busy_device_rejects_input() {
        let backend = VirtualCameraBackend::new();
        let device = backend.enumerate_cameras().remove(0);
        backend.set_busy(&device.path, true);
        assert!(matches!(
            backend.open_input(&device),
            Err(BackendError::DeviceBusy(_))
        ));
    }

    #[test]
    fn test_ramp_requires_lock() {
        let backend = VirtualCameraBackend::new();
        let device = backend.enumerate_cameras().remove(0);
        assert!(matches!(
            backend.ramp_to_zoom_factor(&device, 2.0, 1.0),
            Err(BackendError::NotLocked(_))
        ));
    }

    #[test]
    fn test_zero_rate_ramp_lands_immediately() {
        let backend = VirtualCameraBackend::new();
        let device = backend.enumerate_cameras().remove(0);
        backend.lock_for_configuration(&device).unwrap();
        backend.ramp_to_zoom_factor(&device, 3.0, 0.0).unwrap();
        backend.unlock_for_configuration(&device);
        assert_eq!(backend.zoom_factor(&device), Some(3.0));
    }

    #[test]
    fn test_ramp_target_is_clamped_to_device_range() {
        let backend = VirtualCameraBackend::new();
        let device = backend.enumerate_cameras().remove(0);
        backend.lock_for_configuration(&device).unwrap();
        backend.ramp_to_zoom_factor(&device, 50.0, 0.0).unwrap();
        backend.unlock_for_configuration(&device);
        assert_eq!(backend.zoom_factor(&device), Some(MAX_ZOOM_FACTOR));
    }

    #[test]
    fn test_source_publishes_first_frame_on_start() {
        let backend = VirtualCameraBackend::new();
        let device = backend.enumerate_cameras().remove(0);
        let mut source = backend.open_input(&device).unwrap();
        source.start().unwrap();
        let frame = source.frame_slot().lock().unwrap().clone().unwrap();
        assert_eq!((frame.width, frame.height), (FRAME_WIDTH, FRAME_HEIGHT));
        source.stop();
        assert!(!source.is_streaming());
    }

    #[test]
    fn test_pattern_differs_between_facings() {
        let back = render_pattern(16, 8, 1.0, 0, Facing::Back);
        let front = render_pattern(16, 8, 1.0, 0, Facing::Front);
        assert_eq!(back.len(), 16 * 8 * 4);
        assert_ne!(back, front);
    }

    #[test]
    fn test_zoom_magnifies_center() {
        let plain = render_pattern(64, 32, 1.0, 0, Facing::Back);
        let zoomed = render_pattern(64, 32, 4.0, 0, Facing::Back);
        // Leftmost pixel moves from the first bar towards the centre bars
        assert_ne!(&plain[4..8], &zoomed[4..8]);
    }
}
