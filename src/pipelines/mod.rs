// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines for captured media
//!
//! - [`photo`]: JPEG encoding of stills and decoding into the captured image

pub mod photo;
