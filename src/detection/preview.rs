//! Annotated copies of frames for checking detections by eye.
//!
//! Draws a rectangle the size of the matching template around every raw
//! detection, a crosshair on each kept detection and one on the reference
//! point.

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use std::path::Path;

use super::dedup::DetectionSet;
use super::matcher::Detection;
use super::template::TemplateStore;
use crate::geometry::Point;

pub const COLOR_RAW: Rgba<u8> = Rgba([255, 255, 0, 255]); // Yellow
pub const COLOR_KEPT: Rgba<u8> = Rgba([255, 0, 0, 255]); // Red
pub const COLOR_REFERENCE: Rgba<u8> = Rgba([0, 128, 255, 255]); // Blue

/// Renders detections onto a copy of `frame`.
pub fn annotate(
    frame: &RgbaImage,
    raw: &[Detection],
    kept: &DetectionSet,
    reference: Point,
    templates: &TemplateStore,
) -> RgbaImage {
    let mut img = frame.clone();

    for detection in raw {
        let Some(template) = templates
            .scaled()
            .iter()
            .find(|t| t.scale() == detection.scale)
        else {
            continue;
        };
        let left = detection.x - template.width() as f32 / 2.0;
        let top = detection.y - template.height() as f32 / 2.0;
        draw_rect(
            &mut img,
            left.max(0.0) as u32,
            top.max(0.0) as u32,
            template.width(),
            template.height(),
            COLOR_RAW,
            1,
        );
    }

    for p in kept.positions() {
        draw_crosshair(&mut img, p, COLOR_KEPT, 8);
    }
    draw_crosshair(&mut img, reference, COLOR_REFERENCE, 12);

    img
}

/// Writes an annotated image, creating parent directories as needed.
pub fn save_annotated(img: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    img.save(path)
        .with_context(|| format!("Failed to save {}", path.display()))
}

/// Draws a rectangle border on an image, clipped to its bounds.
pub fn draw_rect(
    img: &mut RgbaImage,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    color: Rgba<u8>,
    thickness: u32,
) {
    let (img_w, img_h) = img.dimensions();
    let mut put = |px: u32, py: u32| {
        if px < img_w && py < img_h {
            img.put_pixel(px, py, color);
        }
    };

    for t in 0..thickness.min(h) {
        for dx in 0..w {
            put(x + dx, y + t);
            put(x + dx, y + h - 1 - t);
        }
    }
    for t in 0..thickness.min(w) {
        for dy in 0..h {
            put(x + t, y + dy);
            put(x + w - 1 - t, y + dy);
        }
    }
}

/// Draws a three-pixel-wide crosshair centred on `center`.
pub fn draw_crosshair(img: &mut RgbaImage, center: Point, color: Rgba<u8>, arm_length: u32) {
    let (img_w, img_h) = img.dimensions();
    let arm = arm_length as i32;
    let mut put = |px: i32, py: i32| {
        if px >= 0 && py >= 0 && (px as u32) < img_w && (py as u32) < img_h {
            img.put_pixel(px as u32, py as u32, color);
        }
    };

    for d in -arm..=arm {
        for w in -1..=1 {
            put(center.x + d, center.y + w);
            put(center.x + w, center.y + d);
        }
    }
}
