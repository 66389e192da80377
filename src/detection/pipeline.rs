//! Filter, match and suppress in one call, shared by the live controller
//! and offline detection.

use std::sync::Arc;
use tracing::debug;

use super::color::HsvBand;
use super::dedup::{suppress, DetectionSet};
use super::matcher::{match_scales, Detection, MatchImage};
use super::template::TemplateStore;
use crate::capture::Frame;
use crate::config::GrabberConfig;
use crate::error::{ConfigError, MatchError};
use crate::geometry::Point;

/// Raw and kept detections from one frame.
#[derive(Clone, Debug, Default)]
pub struct DetectionPass {
    pub raw: Vec<Detection>,
    pub kept: DetectionSet,
}

/// Per-session detection settings with the shared template store.
#[derive(Clone, Debug)]
pub struct Detector {
    band: HsvBand,
    templates: Arc<TemplateStore>,
    threshold: f32,
    exclusion_radius: u32,
}

impl Detector {
    pub fn new(config: &GrabberConfig, templates: Arc<TemplateStore>) -> Result<Self, ConfigError> {
        let band = HsvBand::new(config.color_lower, config.color_upper)?;
        if !(config.threshold > 0.0 && config.threshold <= 1.0) {
            return Err(ConfigError::Threshold(config.threshold));
        }
        Ok(Self {
            band,
            templates,
            threshold: config.threshold,
            exclusion_radius: config.exclusion_radius,
        })
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    /// Runs one frame through the pipeline. `reference` is capture-local.
    pub fn detect(&self, frame: &Frame, reference: Point) -> Result<DetectionPass, MatchError> {
        if frame.is_empty() {
            return Err(MatchError::EmptyFrame);
        }
        let isolated = self.band.isolate(frame);
        let image = MatchImage::new(&isolated);
        let raw = match_scales(&image, self.templates.scaled(), self.threshold)?;
        let kept = suppress(&raw, reference, self.exclusion_radius);
        debug!(
            raw = raw.len(),
            kept = kept.len(),
            %reference,
            "Detection pass"
        );
        Ok(DetectionPass { raw, kept })
    }
}
