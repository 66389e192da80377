//! Error taxonomy for the detection pipeline.
//!
//! Only [`CaptureError`] ends a controller. Matching and injection failures
//! are cycle-local: they are logged and the loop carries on.

use std::path::PathBuf;

use thiserror::Error;

use crate::capture::WindowHandle;

/// Invalid configuration. Raised before any loop starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to load template {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("threshold must be in (0, 1], got {0}")]
    Threshold(f32),
    #[error("scale list is empty")]
    NoScales,
    #[error("scale factors must be finite and positive, got {0}")]
    InvalidScale(f32),
    #[error("scale factors must be strictly ascending ({previous} then {next})")]
    UnsortedScales { previous: f32, next: f32 },
    #[error("template scaled by {scale} has zero size")]
    ScaleTooSmall { scale: f32 },
    #[error("template scaled by {scale} has no contrast")]
    FlatTemplate { scale: f32 },
    #[error("color lower bound {lower:?} exceeds upper bound {upper:?} on channel {channel}")]
    InvertedColorBound {
        lower: [u8; 3],
        upper: [u8; 3],
        channel: usize,
    },
    #[error("{0} must be positive")]
    NonPositive(&'static str),
    #[error("window {0} is already driven by another controller")]
    DuplicateTarget(WindowHandle),
}

/// The target window can no longer be sampled. Fatal for its controller.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("target window {0} no longer exists")]
    WindowGone(WindowHandle),
    #[error("target window {0} has an empty client area")]
    EmptyRegion(WindowHandle),
    #[error("timed out after {0}ms waiting for a captured frame")]
    Timeout(u64),
    #[error("capture failed: {0}")]
    Os(String),
}

/// A cycle's matching could not run. The controller skips to the next cycle.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MatchError {
    #[error("captured frame is empty")]
    EmptyFrame,
    #[error(
        "template at scale {scale} ({template_width}x{template_height}) is larger than the frame ({frame_width}x{frame_height})"
    )]
    TemplateTooLarge {
        scale: f32,
        template_width: u32,
        template_height: u32,
        frame_width: u32,
        frame_height: u32,
    },
}

/// A message could not be posted. Surfaces through a partial injection outcome.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InjectionError {
    #[error("target window {0} no longer exists")]
    WindowGone(WindowHandle),
    #[error("failed to post message: {0}")]
    Os(String),
}
