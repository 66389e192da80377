//! Finding the marker in a captured frame.
//!
//! This module provides:
//! - HSV color isolation (`HsvBand`)
//! - The template and its pre-scaled variants (`TemplateStore`)
//! - Multi-scale normalized cross-correlation (`match_scales`)
//! - Exclusion-radius and duplicate suppression (`suppress`)
//! - Offline detection and annotated previews on saved screenshots

pub mod color;
pub mod dedup;
pub mod matcher;
pub mod offline;
pub mod pipeline;
pub mod preview;
pub mod template;

pub use color::{Hsv, HsvBand};
pub use dedup::{suppress, DetectionSet};
pub use matcher::{match_scales, Detection, MatchImage};
pub use offline::{detect_in_image, OfflineReport};
pub use pipeline::{DetectionPass, Detector};
pub use preview::{annotate, save_annotated};
pub use template::{ScaledTemplate, TemplateStore};
