//! Color isolation ahead of template matching.
//!
//! Works in 8-bit HSV with the usual OpenCV ranges: hue 0-179 (degrees / 2),
//! saturation and value 0-255.

use image::{GrayImage, Luma, Rgba};

use crate::capture::Frame;
use crate::config::validate_bounds;
use crate::error::ConfigError;

/// An 8-bit HSV triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let (rf, gf, bf) = (r as f32, g as f32, b as f32);
        let max = rf.max(gf).max(bf);
        let min = rf.min(gf).min(bf);
        let diff = max - min;

        let s = if max > 0.0 { diff * 255.0 / max } else { 0.0 };

        let mut h = if diff == 0.0 {
            0.0
        } else if max == rf {
            60.0 * (gf - bf) / diff
        } else if max == gf {
            120.0 + 60.0 * (bf - rf) / diff
        } else {
            240.0 + 60.0 * (rf - gf) / diff
        };
        if h < 0.0 {
            h += 360.0;
        }

        Self {
            // 360 degrees wraps to hue 0
            h: ((h / 2.0).round() as u32 % 180) as u8,
            s: s.round() as u8,
            v: max as u8,
        }
    }
}

/// Inclusive HSV range defining the color family of the marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HsvBand {
    lower: [u8; 3],
    upper: [u8; 3],
}

impl HsvBand {
    pub fn new(lower: [u8; 3], upper: [u8; 3]) -> Result<Self, ConfigError> {
        validate_bounds(lower, upper)?;
        Ok(Self { lower, upper })
    }

    pub fn contains(&self, hsv: Hsv) -> bool {
        let c = [hsv.h, hsv.s, hsv.v];
        (0..3).all(|i| self.lower[i] <= c[i] && c[i] <= self.upper[i])
    }

    fn contains_rgba(&self, px: &Rgba<u8>) -> bool {
        self.contains(Hsv::from_rgb(px[0], px[1], px[2]))
    }

    /// Binary mask: 255 where the pixel is in the band, 0 elsewhere.
    pub fn mask(&self, frame: &Frame) -> GrayImage {
        let img = frame.image();
        GrayImage::from_fn(img.width(), img.height(), |x, y| {
            if self.contains_rgba(img.get_pixel(x, y)) {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    /// Grayscale image for matching: BT.601 luma inside the band, black outside.
    pub fn isolate(&self, frame: &Frame) -> GrayImage {
        let img = frame.image();
        GrayImage::from_fn(img.width(), img.height(), |x, y| {
            let px = img.get_pixel(x, y);
            if self.contains_rgba(px) {
                Luma([luma(px)])
            } else {
                Luma([0])
            }
        })
    }
}

/// ITU-R BT.601 luma: Y = 0.299*R + 0.587*G + 0.114*B
pub fn luma(px: &Rgba<u8>) -> u8 {
    let y = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
    y.round().min(255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn frame_of(pixels: &[[u8; 3]]) -> Frame {
        let img = RgbaImage::from_fn(pixels.len() as u32, 1, |x, _| {
            let [r, g, b] = pixels[x as usize];
            Rgba([r, g, b, 255])
        });
        Frame::new(img)
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(Hsv::from_rgb(255, 0, 0), Hsv { h: 0, s: 255, v: 255 });
        assert_eq!(Hsv::from_rgb(0, 255, 0), Hsv { h: 60, s: 255, v: 255 });
        assert_eq!(Hsv::from_rgb(0, 0, 255), Hsv { h: 120, s: 255, v: 255 });
        assert_eq!(Hsv::from_rgb(128, 128, 128), Hsv { h: 0, s: 0, v: 128 });
        assert_eq!(Hsv::from_rgb(0, 0, 0), Hsv { h: 0, s: 0, v: 0 });
    }

    #[test]
    fn test_hsv_wraps_near_red() {
        // Hue just below 360 degrees rounds to 180 and wraps to 0
        assert_eq!(Hsv::from_rgb(255, 0, 1).h, 0);
        assert_eq!(Hsv::from_rgb(255, 0, 128).h, 165);
    }

    #[test]
    fn test_band_rejects_inverted_bounds() {
        assert!(HsvBand::new([40, 0, 0], [30, 255, 255]).is_err());
        assert!(HsvBand::new([40, 0, 0], [40, 255, 255]).is_ok());
    }

    #[test]
    fn test_mask_lower_bound_is_inclusive() {
        // Pure green is exactly (60, 255, 255)
        let frame = frame_of(&[[0, 255, 0]]);

        let at_bound = HsvBand::new([60, 255, 255], [179, 255, 255]).unwrap();
        assert_eq!(at_bound.mask(&frame).get_pixel(0, 0)[0], 255);

        let above_h = HsvBand::new([61, 255, 255], [179, 255, 255]).unwrap();
        assert_eq!(above_h.mask(&frame).get_pixel(0, 0)[0], 0);

        // One unit below on saturation only: (60, 254, 255)
        let band = HsvBand::new([60, 255, 0], [179, 255, 255]).unwrap();
        let desaturated = frame_of(&[[1, 255, 1]]);
        let hsv = Hsv::from_rgb(1, 255, 1);
        assert_eq!((hsv.h, hsv.s, hsv.v), (60, 254, 255));
        assert_eq!(band.mask(&desaturated).get_pixel(0, 0)[0], 0);

        // One unit below on value only: (60, 255, 254)
        let band = HsvBand::new([60, 255, 255], [179, 255, 255]).unwrap();
        let darker = frame_of(&[[0, 254, 0]]);
        let hsv = Hsv::from_rgb(0, 254, 0);
        assert_eq!((hsv.h, hsv.s, hsv.v), (60, 255, 254));
        assert_eq!(band.mask(&darker).get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_upper_bound_is_inclusive() {
        let band = HsvBand::new([0, 0, 0], [60, 255, 255]).unwrap();
        assert!(band.contains(Hsv { h: 60, s: 255, v: 255 }));
        assert!(!band.contains(Hsv { h: 61, s: 255, v: 255 }));
    }

    #[test]
    fn test_isolate_keeps_luma_inside_band_only() {
        let band = HsvBand::new([35, 100, 50], [85, 255, 255]).unwrap();
        let frame = frame_of(&[[0, 200, 0], [200, 0, 0], [0, 40, 0]]);
        let isolated = band.isolate(&frame);

        assert_eq!(isolated.dimensions(), (3, 1));
        assert_eq!(isolated.get_pixel(0, 0)[0], 117); // 0.587 * 200
        assert_eq!(isolated.get_pixel(1, 0)[0], 0, "red is outside the green band");
        assert_eq!(isolated.get_pixel(2, 0)[0], 0, "too dark for the band");
    }
}
