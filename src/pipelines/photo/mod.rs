// SPDX-License-Identifier: MPL-2.0

//! Still photo pipeline
//!
//! ```text
//! Camera Frame → RGB conversion → JPEG encoding → Captured Image
//!                                       ↓
//!                                 storage (on request)
//! ```
//!
//! Encoding runs on the still-capture worker so the preview keeps updating.

pub mod encoding;

pub use encoding::{EncodedImage, JPEG_EXTENSION, PhotoEncoder, decode_image};

use crate::backends::camera::Facing;
use image::RgbImage;

/// A decoded still, ready for hand-off to the review screen
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// Decoded pixels
    pub image: RgbImage,
    /// Encoded bytes as produced by the still output
    pub jpeg: Vec<u8>,
    /// Facing of the camera that took the photo
    pub facing: Facing,
}

impl CapturedImage {
    /// Decode encoded still bytes
    pub fn from_jpeg(jpeg: Vec<u8>, facing: Facing) -> Result<Self, crate::errors::PhotoError> {
        let image = decode_image(&jpeg)?;
        Ok(Self {
            image,
            jpeg,
            facing,
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
