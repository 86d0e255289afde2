// SPDX-License-Identifier: GPL-3.0-only

//! Still image encoding
//!
//! Stills are always JPEG; the quality preset decides the compression level.

use crate::backends::camera::types::CameraFrame;
use crate::constants::JpegQualityPreset;
use crate::errors::PhotoError;
use image::RgbImage;
use tracing::{debug, info};

/// Encoded image data ready for hand-off or saving
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Extension used for saved stills
pub const JPEG_EXTENSION: &str = "jpg";

/// Photo encoder
#[derive(Debug, Clone, Copy)]
pub struct PhotoEncoder {
    quality: JpegQualityPreset,
}

impl PhotoEncoder {
    pub fn new(quality: JpegQualityPreset) -> Self {
        Self { quality }
    }

    pub fn quality(&self) -> JpegQualityPreset {
        self.quality
    }

    /// Set encoding quality
    pub fn set_quality(&mut self, quality: JpegQualityPreset) {
        self.quality = quality;
    }

    /// Encode a camera frame of any supported pixel format
    pub fn encode_frame(&self, frame: &CameraFrame) -> Result<EncodedImage, PhotoError> {
        let image = frame.to_rgb_image().ok_or_else(|| {
            PhotoError::EncodingFailed(format!(
                "frame buffer does not match {}x{} {:?}",
                frame.width, frame.height, frame.format
            ))
        })?;
        self.encode_image(&image)
    }

    /// Encode an RGB image as JPEG
    pub fn encode_image(&self, image: &RgbImage) -> Result<EncodedImage, PhotoError> {
        info!(
            width = image.width(),
            height = image.height(),
            quality = self.quality.jpeg_quality(),
            "Encoding still"
        );

        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
            &mut cursor,
            self.quality.jpeg_quality(),
        );

        encoder
            .encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| PhotoError::EncodingFailed(e.to_string()))?;

        debug!(size = buffer.len(), "Encoding complete");

        Ok(EncodedImage {
            data: buffer,
            width: image.width(),
            height: image.height(),
        })
    }
}

impl Default for PhotoEncoder {
    fn default() -> Self {
        Self::new(JpegQualityPreset::default())
    }
}

/// Decode still image bytes into an RGB image
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, PhotoError> {
    if bytes.is_empty() {
        return Err(PhotoError::DecodingFailed("empty image data".to_string()));
    }
    let image = image::load_from_memory(bytes)?;
    Ok(image.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| image::Rgb([(x * 8) as u8, (y * 8) as u8, 128]))
    }

    #[test]
    fn test_encode_produces_jpeg_markers() {
        let encoded = PhotoEncoder::default().encode_image(&gradient(16, 8)).unwrap();
        assert_eq!(&encoded.data[..2], &[0xFF, 0xD8]);
        assert_eq!(&encoded.data[encoded.data.len() - 2..], &[0xFF, 0xD9]);
        assert_eq!((encoded.width, encoded.height), (16, 8));
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        let image = gradient(32, 32);
        let low = PhotoEncoder::new(JpegQualityPreset::Low).encode_image(&image).unwrap();
        let max = PhotoEncoder::new(JpegQualityPreset::Maximum).encode_image(&image).unwrap();
        assert!(low.data.len() < max.data.len());
    }

    #[test]
    fn test_decode_restores_dimensions() {
        let encoded = PhotoEncoder::default().encode_image(&gradient(12, 6)).unwrap();
        let decoded = decode_image(&encoded.data).unwrap();
        assert_eq!(decoded.dimensions(), (12, 6));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_image(&[]), Err(PhotoError::DecodingFailed(_))));
        assert!(decode_image(b"not an image").is_err());
    }

    #[test]
    fn test_encode_frame_rejects_short_buffer() {
        let mut frame = CameraFrame::from_rgba(4, 4, vec![0; 64], 0);
        frame.data = std::sync::Arc::from(vec![0u8; 10]);
        assert!(matches!(
            PhotoEncoder::default().encode_frame(&frame),
            Err(PhotoError::EncodingFailed(_))
        ));
    }
}
