//! Reference marker bitmap and its pre-scaled variants.
//!
//! Loaded once at startup; the controller only ever reads it.

use image::imageops::{self, FilterType};
use image::GrayImage;
use std::path::Path;
use tracing::{debug, info};

use crate::config::validate_scales;
use crate::error::ConfigError;

/// One rescaled copy of the template, ready for correlation.
#[derive(Clone, Debug)]
pub struct ScaledTemplate {
    scale: f32,
    width: u32,
    height: u32,
    /// Pixel values minus their mean, row-major
    zero_mean: Vec<f64>,
    /// Sum of squared zero-mean values
    energy: f64,
}

impl ScaledTemplate {
    fn build(pixels: &GrayImage, scale: f32) -> Result<Self, ConfigError> {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(ConfigError::ScaleTooSmall { scale });
        }

        let n = (width * height) as f64;
        let mean = pixels.pixels().map(|p| p[0] as f64).sum::<f64>() / n;
        let zero_mean: Vec<f64> = pixels.pixels().map(|p| p[0] as f64 - mean).collect();
        let energy = zero_mean.iter().map(|&v| v * v).sum::<f64>();
        if energy < 1e-9 {
            return Err(ConfigError::FlatTemplate { scale });
        }

        Ok(Self {
            scale,
            width,
            height,
            zero_mean,
            energy,
        })
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub(crate) fn zero_mean(&self) -> &[f64] {
        &self.zero_mean
    }

    pub(crate) fn energy(&self) -> f64 {
        self.energy
    }
}

/// The grayscale template and its scaled variants, ascending by scale.
#[derive(Clone, Debug)]
pub struct TemplateStore {
    original: GrayImage,
    scaled: Vec<ScaledTemplate>,
}

impl TemplateStore {
    /// Loads the template file as grayscale and pre-scales it.
    pub fn load(path: &Path, scales: &[f32]) -> Result<Self, ConfigError> {
        let original = image::open(path)
            .map_err(|source| ConfigError::Template {
                path: path.to_path_buf(),
                source,
            })?
            .to_luma8();
        info!(
            path = %path.display(),
            width = original.width(),
            height = original.height(),
            "Template loaded"
        );
        Self::from_image(original, scales)
    }

    pub fn from_image(original: GrayImage, scales: &[f32]) -> Result<Self, ConfigError> {
        validate_scales(scales)?;

        let mut scaled = Vec::with_capacity(scales.len());
        for &scale in scales {
            let resized = rescale(&original, scale)?;
            let template = ScaledTemplate::build(&resized, scale)?;
            debug!(
                scale,
                width = template.width(),
                height = template.height(),
                "Scaled template"
            );
            scaled.push(template);
        }

        Ok(Self { original, scaled })
    }

    pub fn original(&self) -> &GrayImage {
        &self.original
    }

    /// Never empty; ascending by scale.
    pub fn scaled(&self) -> &[ScaledTemplate] {
        &self.scaled
    }
}

fn rescale(original: &GrayImage, scale: f32) -> Result<GrayImage, ConfigError> {
    if scale == 1.0 {
        return Ok(original.clone());
    }
    let width = (original.width() as f32 * scale).round() as u32;
    let height = (original.height() as f32 * scale).round() as u32;
    if width == 0 || height == 0 {
        return Err(ConfigError::ScaleTooSmall { scale });
    }
    Ok(imageops::resize(original, width, height, FilterType::Triangle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use tempfile::tempdir;

    fn checker(size: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if (x / 2 + y / 2) % 2 == 0 { Luma([220]) } else { Luma([30]) }
        })
    }

    #[test]
    fn test_scales_ascending_with_sizes() {
        let store = TemplateStore::from_image(checker(20), &[0.5, 1.0, 1.5]).unwrap();
        let sizes: Vec<_> = store
            .scaled()
            .iter()
            .map(|t| (t.scale(), t.width(), t.height()))
            .collect();
        assert_eq!(sizes, vec![(0.5, 10, 10), (1.0, 20, 20), (1.5, 30, 30)]);
    }

    #[test]
    fn test_zero_mean_sums_to_zero() {
        let store = TemplateStore::from_image(checker(8), &[1.0]).unwrap();
        let t = &store.scaled()[0];
        let sum: f64 = t.zero_mean().iter().sum();
        assert!(sum.abs() < 1e-9);
        assert!(t.energy() > 0.0);
    }

    #[test]
    fn test_rejects_flat_template() {
        let flat = GrayImage::from_pixel(10, 10, Luma([128]));
        assert!(matches!(
            TemplateStore::from_image(flat, &[1.0]),
            Err(ConfigError::FlatTemplate { .. })
        ));
    }

    #[test]
    fn test_rejects_vanishing_scale() {
        assert!(matches!(
            TemplateStore::from_image(checker(4), &[0.1, 1.0]),
            Err(ConfigError::ScaleTooSmall { .. })
        ));
    }

    #[test]
    fn test_rejects_unsorted_scales() {
        assert!(matches!(
            TemplateStore::from_image(checker(20), &[1.0, 0.5]),
            Err(ConfigError::UnsortedScales { .. })
        ));
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let dir = tempdir().unwrap();
        let result = TemplateStore::load(&dir.path().join("missing.png"), &[1.0]);
        assert!(matches!(result, Err(ConfigError::Template { .. })));
    }

    #[test]
    fn test_load_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("target.png");
        checker(12).save(&path).unwrap();

        let store = TemplateStore::load(&path, &[1.0, 2.0]).unwrap();
        assert_eq!(store.original().dimensions(), (12, 12));
        assert_eq!(store.scaled()[1].width(), 24);
    }
}
