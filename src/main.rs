// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use simple_camera::backends::camera::{CameraBackendType, Facing, get_backend};
use simple_camera::config::Config;
use simple_camera::constants::app_info;
use simple_camera::controller::CameraController;
use std::path::PathBuf;
use tracing::{info, warn};

mod cli;

#[derive(Parser)]
#[command(name = "simple-camera")]
#[command(about = "Single-screen camera with swipe zoom and photo review")]
#[command(version = app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    /// Camera backend (virtual or v4l2); overrides the config file
    #[arg(short, long, global = true)]
    backend: Option<CameraBackendType>,

    /// Configuration file (default: ~/.config/simple-camera/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run in terminal mode (the default)
    Terminal,

    /// List available cameras
    List,

    /// Take a photo
    Photo {
        /// Camera to use (back or front)
        #[arg(short, long)]
        facing: Option<Facing>,

        /// Output file or directory (default: ~/Pictures/simple-camera/IMG_TIMESTAMP.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Zoom factor to apply before capturing
        #[arg(short, long)]
        zoom: Option<f64>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let terminal_mode = matches!(cli.command, None | Some(Commands::Terminal));
    init_logging(terminal_mode);

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load(),
    };
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    info!(backend = %config.backend, version = app_info::version(), "Starting");

    let backend = get_backend(config.backend, &config.facing_overrides)?;
    if !backend.is_available() {
        warn!(backend = %config.backend, "Camera backend reports no devices");
    }

    match cli.command {
        Some(Commands::List) => cli::list_cameras(backend),
        Some(Commands::Photo {
            facing,
            output,
            zoom,
        }) => cli::take_photo(backend, &config, facing, output, zoom),
        Some(Commands::Terminal) | None => {
            let controller = CameraController::new(backend, &config);
            simple_camera::terminal::run(controller, config)
        }
    }
}

/// Initialize logging
///
/// Set RUST_LOG to control the level (e.g. RUST_LOG=simple_camera=debug).
/// The terminal UI owns the screen, so its logs go to a file in the cache
/// directory instead of stderr.
fn init_logging(terminal_mode: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    let log_file = terminal_mode
        .then(|| {
            let dir = dirs::cache_dir()?.join(app_info::APP_DIR_NAME);
            std::fs::create_dir_all(&dir).ok()?;
            std::fs::File::create(dir.join("simple-camera.log")).ok()
        })
        .flatten();

    match log_file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init(),
        None if terminal_mode => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::sink)
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr)
            .init(),
    }
}
