// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 device and control interface
//!
//! Raw ioctl access for the pieces the `v4l` crate does not cover well:
//! device capability queries and the absolute zoom control.
//!
//! Inspired by [cameractrls](https://github.com/soyersoyer/cameractrls).

use std::fs::File;
use std::os::unix::io::AsRawFd;
use tracing::{debug, warn};

// ===== V4L2 Control Class Bases =====
const V4L2_CTRL_CLASS_CAMERA: u32 = 0x009a0000;
const V4L2_CID_CAMERA_CLASS_BASE: u32 = V4L2_CTRL_CLASS_CAMERA | 0x900;

// ===== V4L2 Control IDs (Camera Class) =====

/// Absolute optical/digital zoom position
pub const V4L2_CID_ZOOM_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 13;
/// Relative zoom (some PTZ cameras only offer this)
pub const V4L2_CID_ZOOM_RELATIVE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 14;

// ===== Capability Flags =====

/// Device supports single-planar video capture
pub const V4L2_CAP_VIDEO_CAPTURE: u32 = 0x0000_0001;
/// Device supports streaming I/O
pub const V4L2_CAP_STREAMING: u32 = 0x0400_0000;
/// `device_caps` field is filled in
const V4L2_CAP_DEVICE_CAPS: u32 = 0x8000_0000;

// ===== V4L2 Control Flags =====
const V4L2_CTRL_FLAG_DISABLED: u32 = 0x0001;
const V4L2_CTRL_FLAG_INACTIVE: u32 = 0x0010;

// ===== V4L2 ioctl Numbers =====
// Calculated as: (dir << 30) | (size << 16) | ('V' << 8) | nr

/// Query device capabilities (v4l2_capability: 104 bytes)
const VIDIOC_QUERYCAP: libc::c_ulong = 0x8068_5600;
/// Get control value (v4l2_control: 8 bytes)
const VIDIOC_G_CTRL: libc::c_ulong = 0xC008_561B;
/// Set control value (v4l2_control: 8 bytes)
const VIDIOC_S_CTRL: libc::c_ulong = 0xC008_561C;
/// Query control info (v4l2_queryctrl: 68 bytes)
const VIDIOC_QUERYCTRL: libc::c_ulong = 0xC044_5624;

// ===== V4L2 ioctl Structures =====

#[repr(C)]
struct V4l2Capability {
    driver: [u8; 16],
    card: [u8; 32],
    bus_info: [u8; 32],
    version: u32,
    capabilities: u32,
    device_caps: u32,
    reserved: [u32; 3],
}

#[repr(C)]
struct V4l2Control {
    id: u32,
    value: i32,
}

#[repr(C)]
struct V4l2Queryctrl {
    id: u32,
    ctrl_type: u32,
    name: [u8; 32],
    minimum: i32,
    maximum: i32,
    step: i32,
    default_value: i32,
    flags: u32,
    reserved: [u32; 2],
}

// ===== Public Types =====

/// Device information from VIDIOC_QUERYCAP
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct V4l2DeviceInfo {
    pub driver: String,
    pub card: String,
    pub bus_info: String,
    /// Capabilities of this device node (falls back to the physical device caps)
    pub device_caps: u32,
}

impl V4l2DeviceInfo {
    /// Whether this node can stream video frames
    pub fn is_capture_device(&self) -> bool {
        self.device_caps & V4L2_CAP_VIDEO_CAPTURE != 0 && self.device_caps & V4L2_CAP_STREAMING != 0
    }
}

/// Information about a V4L2 control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlInfo {
    pub id: u32,
    pub name: String,
    pub minimum: i32,
    pub maximum: i32,
    pub step: i32,
    pub default_value: i32,
    pub flags: u32,
}

impl ControlInfo {
    /// Check if control is disabled
    pub fn is_disabled(&self) -> bool {
        self.flags & V4L2_CTRL_FLAG_DISABLED != 0
    }

    /// Check if control is inactive (value cannot be changed)
    pub fn is_inactive(&self) -> bool {
        self.flags & V4L2_CTRL_FLAG_INACTIVE != 0
    }

    /// Map a zoom factor in `1.0..=max_factor` onto this control's range
    pub fn zoom_factor_to_value(&self, factor: f64, max_factor: f64) -> i32 {
        if max_factor <= 1.0 || self.maximum <= self.minimum {
            return self.minimum;
        }
        let t = ((factor - 1.0) / (max_factor - 1.0)).clamp(0.0, 1.0);
        let raw = self.minimum as f64 + t * (self.maximum - self.minimum) as f64;
        let step = self.step.max(1) as f64;
        let snapped = self.minimum as f64 + ((raw - self.minimum as f64) / step).round() * step;
        (snapped as i32).clamp(self.minimum, self.maximum)
    }

    /// Map a control value back to a zoom factor in `1.0..=max_factor`
    pub fn value_to_zoom_factor(&self, value: i32, max_factor: f64) -> f64 {
        if self.maximum <= self.minimum {
            return 1.0;
        }
        let t = (value - self.minimum) as f64 / (self.maximum - self.minimum) as f64;
        1.0 + t.clamp(0.0, 1.0) * (max_factor - 1.0)
    }
}

// ===== Helper Functions =====

/// Extract a null-terminated string from a fixed-size byte array
fn extract_name(bytes: &[u8]) -> String {
    let name_len = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..name_len]).to_string()
}

// ===== Public Functions =====

/// Query driver, card name and capabilities of a device node
pub fn query_device_info(device_path: &str) -> Option<V4l2DeviceInfo> {
    let file = File::open(device_path).ok()?;
    let fd = file.as_raw_fd();

    let mut caps = V4l2Capability {
        driver: [0; 16],
        card: [0; 32],
        bus_info: [0; 32],
        version: 0,
        capabilities: 0,
        device_caps: 0,
        reserved: [0; 3],
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCAP, &mut caps as *mut V4l2Capability) };
    if result < 0 {
        debug!(device_path, "VIDIOC_QUERYCAP failed");
        return None;
    }

    let device_caps = if caps.capabilities & V4L2_CAP_DEVICE_CAPS != 0 {
        caps.device_caps
    } else {
        caps.capabilities
    };

    Some(V4l2DeviceInfo {
        driver: extract_name(&caps.driver),
        card: extract_name(&caps.card),
        bus_info: extract_name(&caps.bus_info),
        device_caps,
    })
}

/// Query if a control exists and get its information
pub fn query_control(device_path: &str, control_id: u32) -> Option<ControlInfo> {
    let file = File::open(device_path).ok()?;
    let fd = file.as_raw_fd();

    let mut qctrl = V4l2Queryctrl {
        id: control_id,
        ctrl_type: 0,
        name: [0; 32],
        minimum: 0,
        maximum: 0,
        step: 0,
        default_value: 0,
        flags: 0,
        reserved: [0; 2],
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCTRL, &mut qctrl as *mut V4l2Queryctrl) };
    if result < 0 {
        return None;
    }

    Some(ControlInfo {
        id: qctrl.id,
        name: extract_name(&qctrl.name),
        minimum: qctrl.minimum,
        maximum: qctrl.maximum,
        step: qctrl.step,
        default_value: qctrl.default_value,
        flags: qctrl.flags,
    })
}

/// Get current value of a control
pub fn get_control(device_path: &str, control_id: u32) -> Option<i32> {
    let file = File::open(device_path).ok()?;
    let fd = file.as_raw_fd();

    let mut ctrl = V4l2Control {
        id: control_id,
        value: 0,
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_G_CTRL, &mut ctrl as *mut V4l2Control) };
    if result < 0 {
        debug!(device_path, control_id, "Failed to get V4L2 control");
        return None;
    }

    Some(ctrl.value)
}

/// Set value of a control
pub fn set_control(device_path: &str, control_id: u32, value: i32) -> Result<(), String> {
    let file = File::open(device_path).map_err(|e| format!("Failed to open device: {}", e))?;
    let fd = file.as_raw_fd();

    let mut ctrl = V4l2Control {
        id: control_id,
        value,
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_S_CTRL, &mut ctrl as *mut V4l2Control) };
    if result < 0 {
        let errno = std::io::Error::last_os_error();
        warn!(
            device_path,
            control_id,
            value,
            ?errno,
            "Failed to set V4L2 control"
        );
        return Err(format!("Failed to set control: {}", errno));
    }

    if ctrl.value != value {
        debug!(
            device_path,
            control_id,
            requested = value,
            actual = ctrl.value,
            "V4L2 control value was clamped"
        );
    }

    Ok(())
}

/// Absolute zoom control of a device, if it has a usable one
pub fn zoom_control(device_path: &str) -> Option<ControlInfo> {
    query_control(device_path, V4L2_CID_ZOOM_ABSOLUTE)
        .filter(|info| !info.is_disabled() && info.maximum > info.minimum)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zoom_info() -> ControlInfo {
        ControlInfo {
            id: V4L2_CID_ZOOM_ABSOLUTE,
            name: "Zoom, Absolute".to_string(),
            minimum: 100,
            maximum: 500,
            step: 1,
            default_value: 100,
            flags: 0,
        }
    }

    #[test]
    fn test_control_id_values() {
        assert_eq!(V4L2_CID_ZOOM_ABSOLUTE, 0x009a090d);
        assert_eq!(V4L2_CID_ZOOM_RELATIVE, 0x009a090e);
    }

    #[test]
    fn test_zoom_mapping_endpoints() {
        let info = zoom_info();
        assert_eq!(info.zoom_factor_to_value(1.0, 5.0), 100);
        assert_eq!(info.zoom_factor_to_value(5.0, 5.0), 500);
        assert_eq!(info.zoom_factor_to_value(3.0, 5.0), 300);
        assert_eq!(info.zoom_factor_to_value(9.0, 5.0), 500);
    }

    #[test]
    fn test_zoom_mapping_inverse() {
        let info = zoom_info();
        assert!((info.value_to_zoom_factor(300, 5.0) - 3.0).abs() < 1e-9);
        assert_eq!(info.value_to_zoom_factor(100, 5.0), 1.0);
    }

    #[test]
    fn test_zoom_mapping_snaps_to_step() {
        let info = ControlInfo {
            step: 10,
            ..zoom_info()
        };
        assert_eq!(info.zoom_factor_to_value(1.013, 5.0), 100);
    }

    #[test]
    fn test_extract_name_stops_at_nul() {
        let mut bytes = [0u8; 16];
        bytes[..3].copy_from_slice(b"uvc");
        assert_eq!(extract_name(&bytes), "uvc");
    }

    #[test]
    fn test_capture_capability() {
        let info = V4l2DeviceInfo {
            device_caps: V4L2_CAP_VIDEO_CAPTURE | V4L2_CAP_STREAMING,
            ..Default::default()
        };
        assert!(info.is_capture_device());
        assert!(!V4l2DeviceInfo::default().is_capture_device());
    }
}
