// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use simple_camera::constants::{JpegQualityPreset, timing, virtual_camera, zoom};

#[test]
fn test_quality_preset_values() {
    assert_eq!(JpegQualityPreset::ALL.len(), 4);
}

#[test]
fn test_quality_preset_ordering() {
    // Presets are ordered from lowest to highest quality
    let mut prev = 0u8;
    for preset in JpegQualityPreset::ALL {
        let quality = preset.jpeg_quality();
        assert!(quality > prev, "Presets should be ordered from lowest to highest");
        assert!(quality <= 100);
        prev = quality;
    }
}

#[test]
fn test_quality_preset_display_names() {
    for preset in JpegQualityPreset::ALL {
        assert!(!preset.display_name().is_empty());
    }
}

#[test]
fn test_zoom_constants() {
    assert_eq!(zoom::MAX_ZOOM_FACTOR, 5.0);
    assert_eq!(zoom::MIN_ZOOM_FACTOR, 1.0);
    assert_eq!(zoom::ZOOM_STEP, 1.0);
    assert_eq!(zoom::ZOOM_RAMP_RATE, 1.0);
}

#[test]
fn test_virtual_camera_can_reach_ceiling() {
    assert!(virtual_camera::MAX_ZOOM_FACTOR >= zoom::MAX_ZOOM_FACTOR);
}

#[test]
fn test_warmup_shorter_than_timeout() {
    assert!(timing::WARMUP < timing::FIRST_FRAME_TIMEOUT);
}
