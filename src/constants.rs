// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// JPEG quality presets for the still image output
///
/// The still output always encodes JPEG; the preset only trades file size
/// against fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JpegQualityPreset {
    /// Smaller files, visible artifacts
    Low,
    /// Balanced quality and file size
    Medium,
    /// Photo preset default
    #[default]
    High,
    /// Minimal compression
    Maximum,
}

impl JpegQualityPreset {
    /// All presets, lowest quality first
    pub const ALL: [JpegQualityPreset; 4] = [
        JpegQualityPreset::Low,
        JpegQualityPreset::Medium,
        JpegQualityPreset::High,
        JpegQualityPreset::Maximum,
    ];

    /// Get display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            JpegQualityPreset::Low => "Low",
            JpegQualityPreset::Medium => "Medium",
            JpegQualityPreset::High => "High",
            JpegQualityPreset::Maximum => "Maximum",
        }
    }

    /// JPEG encoder quality value (1-100)
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            JpegQualityPreset::Low => 60,
            JpegQualityPreset::Medium => 80,
            JpegQualityPreset::High => 92,
            JpegQualityPreset::Maximum => 98,
        }
    }
}

/// Zoom limits and ramp parameters
pub mod zoom {
    /// Practical zoom ceiling for stepped zoom-in
    pub const MAX_ZOOM_FACTOR: f64 = 5.0;

    /// Zoom floor for stepped zoom-out (no magnification)
    pub const MIN_ZOOM_FACTOR: f64 = 1.0;

    /// Zoom change per swipe
    pub const ZOOM_STEP: f64 = 1.0;

    /// Ramp rate in zoom units per second
    pub const ZOOM_RAMP_RATE: f64 = 1.0;

    /// Tolerance used when comparing zoom factors
    pub const ZOOM_EPSILON: f64 = 1e-6;
}

/// Virtual camera source constants
pub mod virtual_camera {
    use super::Duration;

    /// Synthetic frame width
    pub const FRAME_WIDTH: u32 = 640;

    /// Synthetic frame height
    pub const FRAME_HEIGHT: u32 = 480;

    /// Frame interval (~30fps)
    pub const FRAME_INTERVAL: Duration = Duration::from_millis(33);

    /// Maximum zoom reported by the synthetic devices
    pub const MAX_ZOOM_FACTOR: f64 = 10.0;
}

/// V4L2 backend constants
pub mod v4l2 {
    /// Preferred capture width
    pub const PREFERRED_WIDTH: u32 = 1280;

    /// Preferred capture height
    pub const PREFERRED_HEIGHT: u32 = 720;

    /// Number of mmap buffers for the capture stream
    pub const BUFFER_COUNT: u32 = 4;

    /// Zoom factor reported at the top of the ZOOM_ABSOLUTE range
    pub const MAX_ZOOM_FACTOR: f64 = 5.0;
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// UI event poll interval (~60fps redraw)
    pub const UI_POLL_INTERVAL: Duration = Duration::from_millis(16);

    /// Interval between zoom ramp steps on hardware without native ramping
    pub const ZOOM_RAMP_TICK: Duration = Duration::from_millis(33);

    /// Time to wait for the first frame in headless capture
    pub const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

    /// Camera warm-up before a headless capture
    pub const WARMUP: Duration = Duration::from_millis(500);
}

/// Application information utilities
pub mod app_info {
    /// Application name used for config and picture directories
    pub const APP_DIR_NAME: &str = "simple-camera";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_limits_are_ordered() {
        assert!(zoom::MIN_ZOOM_FACTOR < zoom::MAX_ZOOM_FACTOR);
        assert!(zoom::MAX_ZOOM_FACTOR <= virtual_camera::MAX_ZOOM_FACTOR);
    }

    #[test]
    fn test_default_preset_is_high() {
        assert_eq!(JpegQualityPreset::default(), JpegQualityPreset::High);
    }
}
