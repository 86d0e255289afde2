// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::{CameraBackendType, Facing};
use crate::constants::{JpegQualityPreset, app_info, zoom};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the persisted configuration
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Stepped zoom settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    /// Zoom-in stops once the device reports this factor
    pub ceiling: f64,
    /// Zoom-out stops once the device reports this factor
    pub floor: f64,
    /// Change per gesture
    pub step: f64,
    /// Ramp rate in zoom units per second
    pub ramp_rate: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            ceiling: zoom::MAX_ZOOM_FACTOR,
            floor: zoom::MIN_ZOOM_FACTOR,
            step: zoom::ZOOM_STEP,
            ramp_rate: zoom::ZOOM_RAMP_RATE,
        }
    }
}

impl ZoomConfig {
    /// Repair values that would make stepping impossible
    ///
    /// Returns the list of fields that were reset.
    pub fn sanitize(&mut self) -> Vec<&'static str> {
        let defaults = Self::default();
        let mut reset = Vec::new();
        if !self.floor.is_finite() || self.floor < 1.0 {
            self.floor = defaults.floor;
            reset.push("floor");
        }
        if !self.ceiling.is_finite() || self.ceiling < self.floor {
            self.ceiling = defaults.ceiling.max(self.floor);
            reset.push("ceiling");
        }
        if !self.step.is_finite() || self.step <= 0.0 {
            self.step = defaults.step;
            reset.push("step");
        }
        if !self.ramp_rate.is_finite() || self.ramp_rate < 0.0 {
            self.ramp_rate = defaults.ramp_rate;
            reset.push("ramp_rate");
        }
        reset
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera backend to use (virtual or V4L2)
    pub backend: CameraBackendType,
    /// Camera that is active after startup
    pub preferred_facing: Facing,
    /// Stepped zoom settings
    pub zoom: ZoomConfig,
    /// JPEG quality of captured stills
    pub jpeg_quality: JpegQualityPreset,
    /// Where saved photos go (default: ~/Pictures/simple-camera)
    pub photo_directory: Option<PathBuf>,
    /// Mirror the front camera preview horizontally (selfie mode)
    pub mirror_front_preview: bool,
    /// Facing of devices the backend cannot classify (key = device path)
    pub facing_overrides: HashMap<String, Facing>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: CameraBackendType::default(),
            preferred_facing: Facing::Back,
            zoom: ZoomConfig::default(),
            jpeg_quality: JpegQualityPreset::default(),
            photo_directory: None,
            mirror_front_preview: true,
            facing_overrides: HashMap::new(),
        }
    }
}

impl Config {
    /// Default configuration file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(app_info::APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Parse a configuration file
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        let mut config: Config = serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        let reset = config.zoom.sanitize();
        if !reset.is_empty() {
            warn!(path = %path.display(), fields = ?reset, "Invalid zoom settings replaced by defaults");
        }
        Ok(config)
    }

    /// Load from `path`, falling back to defaults
    ///
    /// A missing file is normal on first start; a malformed one is logged.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "No configuration file, using defaults");
            return Self::default();
        }
        match Self::from_file(path) {
            Ok(config) => {
                info!(path = %path.display(), "Loaded configuration");
                config
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable configuration");
                Self::default()
            }
        }
    }

    /// Load from the default location
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                warn!("No configuration directory available, using defaults");
                Self::default()
            }
        }
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Write to the default location
    pub fn save(&self) -> AppResult<()> {
        let path = Self::default_path()
            .ok_or_else(|| AppError::Config("no configuration directory".to_string()))?;
        self.save_to(&path)
    }

    /// Facing override for a device path, if configured
    pub fn facing_override(&self, device_path: &str) -> Option<Facing> {
        self.facing_overrides.get(device_path).copied()
    }
}
