//! Per-cycle capture geometry and pixel buffer.
//!
//! All coordinates here are physical pixels in the virtual-screen space. The
//! process runs per-monitor DPI aware, so Win32 rectangles already use it.

use image::{Rgba, RgbaImage};

use crate::geometry::Point;

/// The client area of the target window as sampled this cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureRegion {
    /// Client-area top-left, physical virtual-screen pixels
    pub origin_x: i32,
    pub origin_y: i32,
    pub width: u32,
    pub height: u32,
    /// Top-left of the monitor containing the window
    pub monitor_offset: Point,
    /// Monitor DPI / 96
    pub dpi_scale: f32,
}

impl CaptureRegion {
    /// Returns `None` for an empty area or a non-positive DPI scale.
    pub fn new(
        origin: Point,
        width: u32,
        height: u32,
        monitor_offset: Point,
        dpi_scale: f32,
    ) -> Option<Self> {
        if width == 0 || height == 0 || !(dpi_scale > 0.0) {
            return None;
        }
        Some(Self {
            origin_x: origin.x,
            origin_y: origin.y,
            width,
            height,
            monitor_offset,
            dpi_scale,
        })
    }

    pub fn origin(&self) -> Point {
        Point::new(self.origin_x, self.origin_y)
    }

    /// Capture-local centre.
    pub fn center(&self) -> Point {
        Point::new((self.width / 2) as i32, (self.height / 2) as i32)
    }
}

/// Immutable RGBA8 (sRGB, straight alpha) snapshot, row-major from the top-left.
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: RgbaImage,
}

impl Frame {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    /// Builds a frame from tightly packed BGRA rows, as delivered by the OS.
    pub fn from_bgra(width: u32, height: u32, bgra: &[u8]) -> Option<Self> {
        let expected = width as usize * height as usize * 4;
        if bgra.len() != expected {
            return None;
        }
        let mut rgba = Vec::with_capacity(expected);
        for px in bgra.chunks_exact(4) {
            rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
        }
        RgbaImage::from_raw(width, height, rgba).map(Self::new)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Cuts a `width` x `height` client block out of a captured BGRA surface.
    ///
    /// `offset` is the client top-left relative to the surface top-left.
    /// Parts of the block past the surface edge come out black.
    pub fn crop_bgra(
        bgra: &[u8],
        surface_width: u32,
        surface_height: u32,
        offset: Point,
        width: u32,
        height: u32,
    ) -> Self {
        let surface_len = surface_width as usize * surface_height as usize * 4;
        let mut pixels = RgbaImage::new(width, height);
        if bgra.len() < surface_len {
            return Self::new(pixels);
        }
        for (x, y, px) in pixels.enumerate_pixels_mut() {
            let src_x = offset.x + x as i32;
            let src_y = offset.y + y as i32;
            if src_x < 0
                || src_y < 0
                || src_x >= surface_width as i32
                || src_y >= surface_height as i32
            {
                continue;
            }
            let src = (src_y as usize * surface_width as usize + src_x as usize) * 4;
            *px = Rgba([bgra[src + 2], bgra[src + 1], bgra[src], bgra[src + 3]]);
        }
        Self::new(pixels)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_rejects_empty_area() {
        assert!(CaptureRegion::new(Point::new(0, 0), 0, 10, Point::default(), 1.0).is_none());
        assert!(CaptureRegion::new(Point::new(0, 0), 10, 0, Point::default(), 1.0).is_none());
        assert!(CaptureRegion::new(Point::new(0, 0), 10, 10, Point::default(), 0.0).is_none());
    }

    #[test]
    fn test_region_center() {
        let region = CaptureRegion::new(Point::new(-1920, 40), 800, 601, Point::new(-1920, 0), 1.25)
            .unwrap();
        assert_eq!(region.center(), Point::new(400, 300));
        assert_eq!(region.origin(), Point::new(-1920, 40));
    }

    #[test]
    fn test_frame_from_bgra_swaps_channels() {
        let bgra = [10, 20, 30, 255, 1, 2, 3, 4];
        let frame = Frame::from_bgra(2, 1, &bgra).unwrap();
        assert_eq!(*frame.image().get_pixel(0, 0), Rgba([30, 20, 10, 255]));
        assert_eq!(*frame.image().get_pixel(1, 0), Rgba([3, 2, 1, 4]));
    }

    #[test]
    fn test_frame_from_bgra_rejects_short_buffer() {
        assert!(Frame::from_bgra(2, 2, &[0; 12]).is_none());
    }

    /// BGRA surface whose blue channel is the x coordinate and green the y.
    fn coordinate_surface(width: u32, height: u32) -> Vec<u8> {
        let mut bgra = Vec::new();
        for y in 0..height {
            for x in 0..width {
                bgra.extend_from_slice(&[x as u8, y as u8, 0, 255]);
            }
        }
        bgra
    }

    #[test]
    fn test_crop_bgra_applies_client_offset() {
        // Client area 1px inside a 1px visible border, 31px title bar
        let surface = coordinate_surface(60, 80);
        let frame = Frame::crop_bgra(&surface, 60, 80, Point::new(1, 31), 40, 30);

        assert_eq!((frame.width(), frame.height()), (40, 30));
        assert_eq!(*frame.image().get_pixel(0, 0), Rgba([0, 31, 1, 255]));
        assert_eq!(*frame.image().get_pixel(39, 29), Rgba([0, 60, 40, 255]));
    }

    #[test]
    fn test_crop_bgra_pads_past_surface_edge() {
        let surface = coordinate_surface(10, 10);
        let frame = Frame::crop_bgra(&surface, 10, 10, Point::new(8, -1), 4, 3);

        assert_eq!(*frame.image().get_pixel(0, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(*frame.image().get_pixel(0, 1), Rgba([0, 0, 8, 255]));
        assert_eq!(*frame.image().get_pixel(1, 2), Rgba([0, 1, 9, 255]));
        assert_eq!(*frame.image().get_pixel(2, 1), Rgba([0, 0, 0, 0]));
    }
}
