// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion utilities
//!
//! Backends hand out frames in whatever layout the device produces. These
//! helpers turn them into packed RGB/RGBA for preview sampling and still
//! encoding.

use super::types::{CameraFrame, PixelFormat};

/// Convert a BT.601 YUV triple to RGB
#[inline]
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

    (r, g, b)
}

/// Convert packed 4:2:2 YUV to RGBA
///
/// `luma_first` selects YUYV (Y0 U Y1 V) over UYVY (U Y0 V Y1).
fn packed_422_to_rgba(data: &[u8], width: u32, height: u32, stride: u32, luma_first: bool) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let stride = stride as usize;
    let mut rgba = Vec::with_capacity(w * h * 4);

    for row in 0..h {
        let start = row * stride;
        let Some(line) = data.get(start..start + w * 2) else {
            // Short buffer: pad the remaining rows black
            rgba.resize(w * h * 4, 0);
            break;
        };

        for chunk in line.chunks_exact(4) {
            let (y0, u, y1, v) = if luma_first {
                (chunk[0], chunk[1], chunk[2], chunk[3])
            } else {
                (chunk[1], chunk[0], chunk[3], chunk[2])
            };
            for y in [y0, y1] {
                let (r, g, b) = yuv_to_rgb(y, u, v);
                rgba.extend_from_slice(&[r, g, b, 255]);
            }
        }
    }

    rgba.resize(w * h * 4, 0);
    rgba
}

/// Convert YUYV (YUV 4:2:2) to RGBA
pub fn yuyv_to_rgba(data: &[u8], width: u32, height: u32, stride: u32) -> Vec<u8> {
    packed_422_to_rgba(data, width, height, stride, true)
}

/// Convert UYVY (YUV 4:2:2) to RGBA
pub fn uyvy_to_rgba(data: &[u8], width: u32, height: u32, stride: u32) -> Vec<u8> {
    packed_422_to_rgba(data, width, height, stride, false)
}

/// Decode an MJPEG frame into RGBA, returning the decoded dimensions
pub fn mjpeg_to_rgba(data: &[u8]) -> Result<(Vec<u8>, u32, u32), String> {
    let img = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
        .map_err(|e| format!("MJPEG decode failed: {}", e))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok((rgba.into_raw(), width, height))
}

/// Convert any supported frame into packed RGB (3 bytes per pixel)
///
/// Returns `None` when the buffer is too small for the advertised geometry.
pub fn frame_to_rgb(frame: &CameraFrame) -> Option<Vec<u8>> {
    let w = frame.width as usize;
    let h = frame.height as usize;
    let stride = frame.stride as usize;
    let data: &[u8] = &frame.data;
    let mut rgb = Vec::with_capacity(w * h * 3);

    match frame.format {
        PixelFormat::RGBA | PixelFormat::RGB24 => {
            let bpp = if frame.format == PixelFormat::RGBA { 4 } else { 3 };
            for row in 0..h {
                let line = data.get(row * stride..row * stride + w * bpp)?;
                for px in line.chunks_exact(bpp) {
                    rgb.extend_from_slice(&px[..3]);
                }
            }
        }
        PixelFormat::Gray8 => {
            for row in 0..h {
                let line = data.get(row * stride..row * stride + w)?;
                for &v in line {
                    rgb.extend_from_slice(&[v, v, v]);
                }
            }
        }
        PixelFormat::YUYV | PixelFormat::UYVY => {
            if data.len() < stride * h.saturating_sub(1) + w * 2 {
                return None;
            }
            let rgba = packed_422_to_rgba(
                data,
                frame.width,
                frame.height,
                frame.stride,
                frame.format == PixelFormat::YUYV,
            );
            for px in rgba.chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
            }
        }
    }

    Some(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_neutral_chroma_is_gray() {
        assert_eq!(yuv_to_rgb(128, 128, 128), (128, 128, 128));
    }

    #[test]
    fn test_yuyv_produces_two_pixels_per_chunk() {
        let data = [16u8, 128, 235, 128];
        let rgba = yuyv_to_rgba(&data, 2, 1, 4);
        assert_eq!(rgba.len(), 8);
        assert_eq!(&rgba[0..3], &[16, 16, 16]);
        assert_eq!(&rgba[4..7], &[235, 235, 235]);
    }

    #[test]
    fn test_uyvy_swaps_luma_position() {
        let data = [128u8, 16, 128, 235];
        assert_eq!(uyvy_to_rgba(&data, 2, 1, 4), yuyv_to_rgba(&[16, 128, 235, 128], 2, 1, 4));
    }

    #[test]
    fn test_frame_to_rgb_respects_stride() {
        // 1x2 RGBA with 4 bytes padding per row
        let data: Vec<u8> = vec![1, 2, 3, 255, 0, 0, 0, 0, 4, 5, 6, 255, 0, 0, 0, 0];
        let frame = CameraFrame {
            width: 1,
            height: 2,
            data: Arc::from(data),
            format: PixelFormat::RGBA,
            stride: 8,
            sequence: 0,
            captured_at: Instant::now(),
        };
        assert_eq!(frame_to_rgb(&frame), Some(vec![1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn test_frame_to_rgb_rejects_short_buffer() {
        let frame = CameraFrame {
            width: 4,
            height: 4,
            data: Arc::from(vec![0u8; 8]),
            format: PixelFormat::Gray8,
            stride: 4,
            sequence: 0,
            captured_at: Instant::now(),
        };
        assert!(frame_to_rgb(&frame).is_none());
    }
}
