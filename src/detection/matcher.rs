//! Multi-scale template matching by normalized cross-correlation.
//!
//! Scores are the zero-mean normalized correlation coefficient (OpenCV's
//! TM_CCOEFF_NORMED), in [-1, 1]. The frame is prepared once per cycle
//! (`MatchImage`), and only the templates differ between scales.

use image::GrayImage;

use super::template::ScaledTemplate;
use crate::error::MatchError;

/// Below this the window (or template) is treated as featureless.
const MIN_VARIANCE: f64 = 1e-6;

/// Slack for rounding in the score, so an exact placement meets a threshold of 1.0.
const SCORE_TOLERANCE: f64 = 1e-6;

/// One raw match in capture-local pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    /// Centre of the matched window
    pub x: f32,
    pub y: f32,
    pub score: f32,
    /// Scale of the template that produced the match
    pub scale: f32,
}

impl Detection {
    /// Position rounded to the nearest pixel.
    pub fn rounded(&self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

/// A grayscale frame with the running sums needed for per-window statistics.
pub struct MatchImage {
    width: u32,
    height: u32,
    pixels: Vec<f64>,
    /// Summed-area tables, (width + 1) x (height + 1)
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl MatchImage {
    pub fn new(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let pixels: Vec<f64> = image.pixels().map(|p| p[0] as f64).collect();

        let stride = width as usize + 1;
        let mut sum = vec![0.0f64; stride * (height as usize + 1)];
        let mut sum_sq = vec![0.0f64; stride * (height as usize + 1)];
        for y in 0..height as usize {
            let mut row = 0.0f64;
            let mut row_sq = 0.0f64;
            for x in 0..width as usize {
                let v = pixels[y * width as usize + x];
                row += v;
                row_sq += v * v;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row;
                sum_sq[(y + 1) * stride + x + 1] = sum_sq[y * stride + x + 1] + row_sq;
            }
        }

        Self {
            width,
            height,
            pixels,
            sum,
            sum_sq,
        }
    }

    fn window_sum(table: &[f64], stride: usize, x: usize, y: usize, w: usize, h: usize) -> f64 {
        table[(y + h) * stride + x + w] - table[y * stride + x + w] - table[(y + h) * stride + x]
            + table[y * stride + x]
    }

    /// Correlation score of `template` placed with its top-left at (x, y).
    fn score_at(&self, template: &ScaledTemplate, x: usize, y: usize) -> f64 {
        let tw = template.width() as usize;
        let th = template.height() as usize;
        let stride = self.width as usize + 1;
        let n = (tw * th) as f64;

        let s = Self::window_sum(&self.sum, stride, x, y, tw, th);
        let s2 = Self::window_sum(&self.sum_sq, stride, x, y, tw, th);
        let variance = s2 - s * s / n;
        if variance <= MIN_VARIANCE {
            return 0.0;
        }

        // The template is zero-mean, so the window mean drops out of the numerator
        let width = self.width as usize;
        let mut numerator = 0.0f64;
        for (row, t_row) in template.zero_mean().chunks_exact(tw).enumerate() {
            let start = (y + row) * width + x;
            let i_row = &self.pixels[start..start + tw];
            numerator += i_row.iter().zip(t_row).map(|(a, b)| a * b).sum::<f64>();
        }

        let denominator = (template.energy() * variance).sqrt();
        if denominator <= MIN_VARIANCE {
            return 0.0;
        }
        (numerator / denominator).clamp(-1.0, 1.0)
    }
}

/// Every placement of one template scoring at or above `threshold`.
pub fn match_template(
    image: &MatchImage,
    template: &ScaledTemplate,
    threshold: f32,
) -> Result<Vec<Detection>, MatchError> {
    if image.width == 0 || image.height == 0 {
        return Err(MatchError::EmptyFrame);
    }
    if template.width() > image.width || template.height() > image.height {
        return Err(MatchError::TemplateTooLarge {
            scale: template.scale(),
            template_width: template.width(),
            template_height: template.height(),
            frame_width: image.width,
            frame_height: image.height,
        });
    }

    let half_w = template.width() as f32 / 2.0;
    let half_h = template.height() as f32 / 2.0;
    let max_x = (image.width - template.width()) as usize;
    let max_y = (image.height - template.height()) as usize;

    let threshold = threshold as f64 - SCORE_TOLERANCE;
    let mut detections = Vec::new();
    for y in 0..=max_y {
        for x in 0..=max_x {
            let score = image.score_at(template, x, y);
            if score >= threshold {
                detections.push(Detection {
                    x: x as f32 + half_w,
                    y: y as f32 + half_h,
                    score: score as f32,
                    scale: template.scale(),
                });
            }
        }
    }
    Ok(detections)
}

/// Matches every scale in order and concatenates the results.
///
/// Scores from different scales are not comparable, so nothing is ranked or
/// merged here.
pub fn match_scales(
    image: &MatchImage,
    templates: &[ScaledTemplate],
    threshold: f32,
) -> Result<Vec<Detection>, MatchError> {
    let mut all = Vec::new();
    for template in templates {
        all.extend(match_template(image, template, threshold)?);
    }
    Ok(all)
}
