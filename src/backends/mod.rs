// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera capture
//!
//! The backend layer hides device access behind one API so the session
//! controller works the same against real and synthetic cameras:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │        Controller / Capture Session          │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │   Virtual   │    │       V4L2       │   │
//! │  │ (test bars) │    │  (/dev/video*)   │   │
//! │  └─────────────┘    └──────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Camera backend trait, capture session and implementations

pub mod camera;
