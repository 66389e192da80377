//! Detection on saved screenshots.
//!
//! The image is treated as a capture of a window at the screen origin on a
//! 100% scale monitor, so capture-local, client and screen positions agree.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use super::dedup::DetectionSet;
use super::matcher::Detection;
use super::pipeline::Detector;
use crate::capture::{CaptureRegion, Frame};
use crate::config::GrabberConfig;
use crate::coords::CoordinateMapper;
use crate::geometry::Point;

/// Everything one offline pass found.
#[derive(Debug)]
pub struct OfflineReport {
    pub frame: Frame,
    pub reference: Point,
    pub raw: Vec<Detection>,
    pub kept: DetectionSet,
}

/// Loads `path` and runs the detection pipeline over it.
pub fn detect_in_image(
    path: &Path,
    config: &GrabberConfig,
    detector: &Detector,
) -> Result<OfflineReport> {
    let pixels = image::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .to_rgba8();
    let frame = Frame::new(pixels);
    detect_in_frame(frame, config, detector)
}

pub fn detect_in_frame(
    frame: Frame,
    config: &GrabberConfig,
    detector: &Detector,
) -> Result<OfflineReport> {
    let region = CaptureRegion::new(
        Point::new(0, 0),
        frame.width(),
        frame.height(),
        Point::new(0, 0),
        1.0,
    )
    .context("Image is empty")?;
    let mapper = CoordinateMapper::new(&region, config.coordinate_space);
    let reference = mapper.reference_point(config.reference_point);

    let pass = detector.detect(&frame, reference)?;
    info!(
        width = frame.width(),
        height = frame.height(),
        raw = pass.raw.len(),
        kept = pass.kept.len(),
        %reference,
        "Offline detection finished"
    );

    Ok(OfflineReport {
        frame,
        reference,
        raw: pass.raw,
        kept: pass.kept,
    })
}
