// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for camera operations
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Taking a photo without the terminal UI

use chrono::Local;
use simple_camera::backends::camera::{CameraBackend, DeviceConfigurationLock, Facing};
use simple_camera::config::Config;
use simple_camera::constants::timing::{FIRST_FRAME_TIMEOUT, UI_POLL_INTERVAL, WARMUP};
use simple_camera::controller::{CameraController, Transition};
use simple_camera::storage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// List all available cameras
pub fn list_cameras(backend: Arc<dyn CameraBackend>) -> Result<(), Box<dyn std::error::Error>> {
    let cameras = backend.enumerate_cameras();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras ({} backend):", backend.backend_type());
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {}", index, camera.name);
        println!("      Facing: {}", camera.facing);
        println!("      Path:   {}", camera.path);
        if let Some(driver) = &camera.driver {
            println!("      Driver: {}", driver);
        }
        if camera.max_zoom_factor > camera.min_zoom_factor {
            println!(
                "      Zoom:   {:.1}x - {:.1}x",
                camera.min_zoom_factor, camera.max_zoom_factor
            );
        }
        println!();
    }

    Ok(())
}

/// Take a photo with the camera facing `facing`
pub fn take_photo(
    backend: Arc<dyn CameraBackend>,
    config: &Config,
    facing: Option<Facing>,
    output: Option<PathBuf>,
    zoom: Option<f64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config {
        preferred_facing: facing.unwrap_or(config.preferred_facing),
        ..config.clone()
    };
    let mut controller = CameraController::new(backend, &config);

    let camera = controller
        .active_device()
        .cloned()
        .ok_or("No cameras found")?;
    if let Some(wanted) = facing
        && wanted != camera.facing
    {
        return Err(format!("No {} camera found", wanted).into());
    }
    println!("Using camera: {}", camera.name);

    if let Some(factor) = zoom {
        let zoom_config = controller.zoom_config();
        let factor = factor.clamp(zoom_config.floor, zoom_config.ceiling);
        // Jump straight to the factor instead of ramping
        let lock = DeviceConfigurationLock::acquire(controller.backend().as_ref(), &camera)?;
        lock.ramp_to_zoom_factor(factor, 0.0)?;
        drop(lock);
        println!("Zoom: {:.1}x", factor);
    }

    // Wait for frames to stabilize (camera warm-up)
    println!("Capturing...");
    let start = Instant::now();
    while controller.preview_frame().is_none() {
        if start.elapsed() > FIRST_FRAME_TIMEOUT {
            return Err("Timed out waiting for the first frame".into());
        }
        std::thread::sleep(UI_POLL_INTERVAL);
    }
    std::thread::sleep(WARMUP);

    controller.capture()?;
    match pollster::block_on(controller.wait_capture()) {
        Some(Transition::ShowPhoto) => {}
        None => return Err("Capture failed".into()),
    }
    let photo = controller
        .take_still_image()
        .ok_or("Capture produced no image")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let path = match output {
        Some(path) if path.is_dir() => runtime.block_on(storage::save_photo(photo.jpeg, path))?,
        Some(path) => runtime.block_on(storage::save_photo_to(photo.jpeg, path))?,
        None => runtime.block_on(storage::save_photo(
            photo.jpeg,
            storage::photo_directory(&config),
        ))?,
    };

    println!(
        "Saved {}x{} photo at {}: {}",
        photo.image.width(),
        photo.image.height(),
        Local::now().format("%H:%M:%S"),
        path.display()
    );
    Ok(())
}
