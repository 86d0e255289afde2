// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use simple_camera::Config;
use simple_camera::backends::camera::{CameraBackendType, Facing};
use simple_camera::constants::JpegQualityPreset;
use std::path::PathBuf;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.preferred_facing, Facing::Back);
    assert_eq!(config.zoom.ceiling, 5.0);
    assert_eq!(config.zoom.floor, 1.0);
    assert_eq!(config.zoom.step, 1.0);
    assert_eq!(config.zoom.ramp_rate, 1.0);
    assert_eq!(config.jpeg_quality, JpegQualityPreset::High);
    assert!(
        config.mirror_front_preview,
        "Front preview should be mirrored by default"
    );
    assert!(config.photo_directory.is_none());
}

#[test]
fn test_config_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config {
        backend: CameraBackendType::Virtual,
        preferred_facing: Facing::Front,
        jpeg_quality: JpegQualityPreset::Maximum,
        photo_directory: Some(PathBuf::from("/tmp/photos")),
        ..Config::default()
    };
    config
        .facing_overrides
        .insert("/dev/video2".to_string(), Facing::Back);

    config.save_to(&path).unwrap();
    assert_eq!(Config::load_from(&path), config);
}

#[test]
fn test_partial_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{ "preferred_facing": "front", "zoom": { "ceiling": 3.0 } }"#,
    )
    .unwrap();

    let config = Config::load_from(&path);
    assert_eq!(config.preferred_facing, Facing::Front);
    assert_eq!(config.zoom.ceiling, 3.0);
    assert_eq!(config.zoom.step, 1.0);
    assert_eq!(config.jpeg_quality, JpegQualityPreset::High);
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(
        Config::load_from(&dir.path().join("absent.json")),
        Config::default()
    );
}

#[test]
fn test_malformed_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(Config::from_file(&path).is_err());
    assert_eq!(Config::load_from(&path), Config::default());
}

#[test]
fn test_invalid_zoom_values_are_repaired() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{ "zoom": { "ceiling": 0.5, "floor": 1.0, "step": -2.0, "ramp_rate": 1.0 } }"#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();
    assert!(config.zoom.ceiling >= config.zoom.floor);
    assert_eq!(config.zoom.step, 1.0);
}

#[test]
fn test_facing_override_lookup() {
    let mut config = Config::default();
    config
        .facing_overrides
        .insert("/dev/video0".to_string(), Facing::Back);
    assert_eq!(config.facing_override("/dev/video0"), Some(Facing::Back));
    assert_eq!(config.facing_override("/dev/video1"), None);
}

#[test]
fn test_backend_names_in_json() {
    let json = serde_json::to_string(&CameraBackendType::V4l2).unwrap();
    assert_eq!(json, "\"v4l2\"");
}
