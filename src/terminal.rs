// SPDX-License-Identifier: GPL-3.0-only

//! Terminal-based camera
//!
//! Renders the camera feed to the terminal using Unicode half-block
//! characters for improved vertical resolution. Keys stand in for the swipe
//! gestures and the shutter button:
//!
//! | Key                 | Action           |
//! |---------------------|------------------|
//! | `→` / `l`           | zoom in          |
//! | `←` / `h`           | zoom out         |
//! | `↑` / `k`           | switch camera    |
//! | `Space` / `Enter` / `p` | take photo   |
//! | `?`                 | help             |
//! | `q` / `Ctrl+C`      | quit             |
//!
//! A successful capture switches to the review screen, which shows the photo
//! and can save it (`s`) or save and open it (`o`). `Esc`, `Backspace` or `q`
//! go back to the camera.

use crate::backends::camera::{CameraFrame, Facing};
use crate::config::Config;
use crate::controller::{CameraController, Transition};
use crate::pipelines::photo::CapturedImage;
use crate::storage;
use crate::constants::timing::UI_POLL_INTERVAL;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use image::RgbImage;
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, stdout};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Run the terminal camera
pub fn run(mut controller: CameraController, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    // Runtime for file I/O; the UI loop itself stays synchronous
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut controller, &config, &runtime);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Camera screen commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraAction {
    ZoomIn,
    ZoomOut,
    ToggleCamera,
    Capture,
    ToggleHelp,
    Quit,
}

/// Review screen commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Save,
    SaveAndOpen,
    Back,
}

fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

/// Map a key press on the camera screen
pub fn camera_action(key: &KeyEvent) -> Option<CameraAction> {
    if is_ctrl_c(key) {
        return Some(CameraAction::Quit);
    }
    match key.code {
        KeyCode::Right | KeyCode::Char('l') => Some(CameraAction::ZoomIn),
        KeyCode::Left | KeyCode::Char('h') => Some(CameraAction::ZoomOut),
        KeyCode::Up | KeyCode::Char('k') => Some(CameraAction::ToggleCamera),
        KeyCode::Char(' ') | KeyCode::Enter | KeyCode::Char('p') => Some(CameraAction::Capture),
        KeyCode::Char('?') => Some(CameraAction::ToggleHelp),
        KeyCode::Char('q') => Some(CameraAction::Quit),
        _ => None,
    }
}

/// Map a key press on the review screen
pub fn review_action(key: &KeyEvent) -> Option<ReviewAction> {
    if is_ctrl_c(key) {
        return Some(ReviewAction::Back);
    }
    match key.code {
        KeyCode::Char('s') => Some(ReviewAction::Save),
        KeyCode::Char('o') => Some(ReviewAction::SaveAndOpen),
        KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q') => Some(ReviewAction::Back),
        _ => None,
    }
}

/// Review screen state: the photo handed over by the controller
struct ReviewScreen {
    photo: CapturedImage,
    saved_path: Option<PathBuf>,
}

enum Screen {
    Camera,
    Review(ReviewScreen),
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    controller: &mut CameraController,
    config: &Config,
    runtime: &tokio::runtime::Runtime,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut screen = Screen::Camera;
    let mut preview = PreviewWidget::new(config.mirror_front_preview);
    let mut show_help = false;
    let mut status_message = camera_status(controller);

    if controller.active_device().is_none() {
        status_message = "No camera available | 'q' quit".to_string();
    }

    loop {
        // Completion is handled on the UI thread
        if let Some(transition) = controller.poll_capture() {
            info!(transition = transition.identifier(), "Screen transition");
            match transition {
                Transition::ShowPhoto => {
                    if let Some(photo) = controller.take_still_image() {
                        screen = Screen::Review(ReviewScreen {
                            photo,
                            saved_path: None,
                        });
                        status_message = review_status(None);
                    }
                }
            }
        }

        if let Screen::Camera = screen
            && let Some(frame) = controller.preview_frame()
        {
            preview.update_frame(frame, controller.active_device().map(|d| d.facing));
        }

        terminal.draw(|f| {
            let area = f.area();

            // Reserve bottom line for status
            let content_area = Rect {
                height: area.height.saturating_sub(1),
                ..area
            };
            let status_area = Rect {
                x: area.x,
                y: area.y + area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };

            match &screen {
                Screen::Camera => f.render_widget(&preview, content_area),
                Screen::Review(review) => f.render_widget(
                    PhotoWidget {
                        image: &review.photo.image,
                    },
                    content_area,
                ),
            }

            f.render_widget(
                StatusBar {
                    message: &status_message,
                },
                status_area,
            );
        })?;

        // Handle input with timeout for frame updates
        if !event::poll(UI_POLL_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match &mut screen {
            Screen::Camera => {
                let Some(action) = camera_action(&key) else {
                    continue;
                };
                if action != CameraAction::ToggleHelp {
                    show_help = false;
                }
                match action {
                    CameraAction::Quit => break,
                    CameraAction::ToggleHelp => {
                        show_help = !show_help;
                        status_message = if show_help {
                            help_message()
                        } else {
                            camera_status(controller)
                        };
                    }
                    CameraAction::ZoomIn | CameraAction::ZoomOut => {
                        let result = if action == CameraAction::ZoomIn {
                            controller.zoom_in()
                        } else {
                            controller.zoom_out()
                        };
                        status_message = match result {
                            Ok(Some(target)) => format!("Zoom {:.1}x", target),
                            Ok(None) => camera_status(controller),
                            Err(e) => format!("Error: {}", e),
                        };
                    }
                    CameraAction::ToggleCamera => {
                        status_message = match controller.toggle_device() {
                            Ok(_) => {
                                preview.clear();
                                camera_status(controller)
                            }
                            Err(e) => format!("Error: {}", e),
                        };
                    }
                    CameraAction::Capture => {
                        status_message = match controller.capture() {
                            Ok(()) => "Capturing...".to_string(),
                            Err(e) => format!("Error: {}", e),
                        };
                    }
                }
            }
            Screen::Review(review) => {
                let Some(action) = review_action(&key) else {
                    continue;
                };
                match action {
                    ReviewAction::Back => {
                        // Unwind to the camera screen; the photo is discarded unless saved
                        screen = Screen::Camera;
                        status_message = camera_status(controller);
                    }
                    ReviewAction::Save | ReviewAction::SaveAndOpen => {
                        let path = match review.saved_path.clone() {
                            Some(path) => Ok(path),
                            None => runtime.block_on(storage::save_photo(
                                review.photo.jpeg.clone(),
                                storage::photo_directory(config),
                            )),
                        };
                        status_message = match path {
                            Ok(path) => {
                                review.saved_path = Some(path.clone());
                                if action == ReviewAction::SaveAndOpen
                                    && let Err(e) = storage::open_in_viewer(&path)
                                {
                                    warn!(error = %e, "Failed to open photo viewer");
                                }
                                review_status(Some(&path))
                            }
                            Err(e) => {
                                error!(error = %e, "Failed to save photo");
                                format!("Error: {}", e)
                            }
                        };
                    }
                }
            }
        }
    }

    Ok(())
}

fn camera_status(controller: &CameraController) -> String {
    let mut msg = match controller.active_device() {
        Some(device) => format!("{} camera", device.facing),
        None => "No camera".to_string(),
    };
    if let Some(zoom) = controller.zoom_factor() {
        msg.push_str(&format!(" {:.1}x", zoom));
    }
    msg.push_str(" | space photo | ←/→ zoom");
    if controller.front_device().is_some() && controller.back_device().is_some() {
        msg.push_str(" | ↑ switch");
    }
    msg.push_str(" | ? help | q quit");
    msg
}

fn help_message() -> String {
    "→/l: Zoom in | ←/h: Zoom out | ↑/k: Switch camera | Space/Enter/p: Photo | ?: Help | q/Ctrl+C: Quit"
        .to_string()
}

fn review_status(saved: Option<&std::path::Path>) -> String {
    match saved {
        Some(path) => format!("Saved: {} | o open | Esc back", path.display()),
        None => "s save | o save & open | Esc back".to_string(),
    }
}

/// Source rectangle of an aspect-fill (centre crop) mapping
///
/// Returns `(x0, y0, scale)`: output pixel `(x, y)` samples source pixel
/// `(x0 + x * scale, y0 + y * scale)`.
pub fn aspect_fill(src_width: u32, src_height: u32, out_width: u32, out_height: u32) -> (f64, f64, f64) {
    if src_width == 0 || src_height == 0 || out_width == 0 || out_height == 0 {
        return (0.0, 0.0, 1.0);
    }
    let scale = (src_width as f64 / out_width as f64).min(src_height as f64 / out_height as f64);
    let x0 = (src_width as f64 - out_width as f64 * scale) / 2.0;
    let y0 = (src_height as f64 - out_height as f64 * scale) / 2.0;
    (x0, y0, scale)
}

/// Source rectangle of an aspect-fit (letterbox) mapping
///
/// Returns `(display_width, display_height, scale)` in output pixels.
pub fn aspect_fit(src_width: u32, src_height: u32, out_width: u32, out_height: u32) -> (u32, u32, f64) {
    if src_width == 0 || src_height == 0 || out_width == 0 || out_height == 0 {
        return (0, 0, 1.0);
    }
    let scale = (src_width as f64 / out_width as f64).max(src_height as f64 / out_height as f64);
    let w = ((src_width as f64 / scale) as u32).min(out_width);
    let h = ((src_height as f64 / scale) as u32).min(out_height);
    (w, h, scale)
}

fn pixel_color(image: &RgbImage, x: f64, y: f64) -> Color {
    let x = (x.max(0.0) as u32).min(image.width().saturating_sub(1));
    let y = (y.max(0.0) as u32).min(image.height().saturating_sub(1));
    let p = image.get_pixel(x, y);
    Color::Rgb(p[0], p[1], p[2])
}

/// Live preview rendered with aspect-fill and half-block characters
struct PreviewWidget {
    image: Option<RgbImage>,
    sequence: Option<u64>,
    mirror_front: bool,
    mirrored: bool,
}

impl PreviewWidget {
    fn new(mirror_front: bool) -> Self {
        Self {
            image: None,
            sequence: None,
            mirror_front,
            mirrored: false,
        }
    }

    fn update_frame(&mut self, frame: CameraFrame, facing: Option<Facing>) {
        if self.sequence == Some(frame.sequence) {
            return;
        }
        self.sequence = Some(frame.sequence);
        self.mirrored = self.mirror_front && facing == Some(Facing::Front);
        self.image = frame.to_rgb_image();
    }

    fn clear(&mut self) {
        self.image = None;
        self.sequence = None;
    }
}

impl Widget for &PreviewWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(image) = &self.image else {
            render_placeholder("Waiting for camera...", area, buf);
            return;
        };

        // Each terminal cell displays 2 vertical pixels
        let out_w = area.width as u32;
        let out_h = area.height as u32 * 2;
        let (x0, y0, scale) = aspect_fill(image.width(), image.height(), out_w, out_h);

        for ty in 0..area.height {
            for tx in 0..area.width {
                let col = if self.mirrored {
                    area.width - 1 - tx
                } else {
                    tx
                };
                let src_x = x0 + (col as f64 + 0.5) * scale;
                let top_y = y0 + (ty as f64 * 2.0 + 0.5) * scale;
                let bottom_y = y0 + (ty as f64 * 2.0 + 1.5) * scale;

                if let Some(cell) = buf.cell_mut((area.x + tx, area.y + ty)) {
                    cell.set_char('▀');
                    cell.set_fg(pixel_color(image, src_x, top_y));
                    cell.set_bg(pixel_color(image, src_x, bottom_y));
                }
            }
        }
    }
}

/// Captured photo, letterboxed so the whole shot is visible
struct PhotoWidget<'a> {
    image: &'a RgbImage,
}

impl Widget for PhotoWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let out_w = area.width as u32;
        let out_h = area.height as u32 * 2;
        let (display_w, display_h, scale) =
            aspect_fit(self.image.width(), self.image.height(), out_w, out_h);
        if display_w == 0 || display_h == 0 {
            render_placeholder("Photo too small to display", area, buf);
            return;
        }

        let cells_h = (display_h / 2) as u16;
        let x_offset = area.x + (area.width.saturating_sub(display_w as u16)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(cells_h)) / 2;

        for ty in 0..cells_h {
            for tx in 0..display_w as u16 {
                let src_x = (tx as f64 + 0.5) * scale;
                let top_y = (ty as f64 * 2.0 + 0.5) * scale;
                let bottom_y = (ty as f64 * 2.0 + 1.5) * scale;
                if let Some(cell) = buf.cell_mut((x_offset + tx, y_offset + ty)) {
                    cell.set_char('▀');
                    cell.set_fg(pixel_color(self.image, src_x, top_y));
                    cell.set_bg(pixel_color(self.image, src_x, bottom_y));
                }
            }
        }
    }
}

fn render_placeholder(msg: &str, area: Rect, buf: &mut Buffer) {
    let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
    let y = area.y + area.height / 2;
    if y < area.y + area.height && x < area.x + area.width {
        buf.set_string(x, y, msg, ratatui::style::Style::default());
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        // Render text, cut at a char boundary
        let text: String = self.message.chars().take(area.width as usize).collect();

        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_gesture_keys() {
        assert_eq!(camera_action(&key(KeyCode::Right)), Some(CameraAction::ZoomIn));
        assert_eq!(camera_action(&key(KeyCode::Char('h'))), Some(CameraAction::ZoomOut));
        assert_eq!(camera_action(&key(KeyCode::Up)), Some(CameraAction::ToggleCamera));
        assert_eq!(camera_action(&key(KeyCode::Enter)), Some(CameraAction::Capture));
        assert_eq!(camera_action(&key(KeyCode::Down)), None);
    }

    #[test]
    fn test_ctrl_c_quits() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(camera_action(&ctrl_c), Some(CameraAction::Quit));
        assert_eq!(camera_action(&key(KeyCode::Char('c'))), None);
    }

    #[test]
    fn test_review_keys() {
        assert_eq!(review_action(&key(KeyCode::Esc)), Some(ReviewAction::Back));
        assert_eq!(review_action(&key(KeyCode::Char('o'))), Some(ReviewAction::SaveAndOpen));
        assert_eq!(review_action(&key(KeyCode::Char('p'))), None);
    }

    #[test]
    fn test_aspect_fill_crops_wide_source() {
        // 4:3 source into a square output crops the sides
        let (x0, y0, scale) = aspect_fill(640, 480, 100, 100);
        assert_eq!(scale, 4.8);
        assert_eq!(y0, 0.0);
        assert_eq!(x0, 80.0);
    }

    #[test]
    fn test_aspect_fit_letterboxes() {
        let (w, h, _) = aspect_fit(640, 480, 100, 100);
        assert_eq!((w, h), (100, 75));
    }

    #[test]
    fn test_preview_mirrors_front_camera() {
        let mut image = RgbImage::new(2, 2);
        image.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        image.put_pixel(0, 1, image::Rgb([255, 0, 0]));
        let data = image::DynamicImage::ImageRgb8(image).to_rgba8().into_raw();
        let frame = CameraFrame::from_rgba(2, 2, data, 1);

        let mut widget = PreviewWidget::new(true);
        widget.update_frame(frame, Some(Facing::Front));
        let area = Rect::new(0, 0, 2, 1);
        let mut buf = Buffer::empty(area);
        (&widget).render(area, &mut buf);
        assert_eq!(buf[(1, 0)].fg, Color::Rgb(255, 0, 0));
        assert_eq!(buf[(0, 0)].fg, Color::Rgb(0, 0, 0));
    }
}
