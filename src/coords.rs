//! Coordinate conversion between capture-local pixels and the spaces the
//! rest of the system talks in.
//!
//! Capture-local (0, 0) is the top-left of the target's client area, in
//! physical pixels. Screen coordinates are physical virtual-screen pixels.
//! Positions posted to the window are "client" coordinates, which depend on
//! whether the target is DPI aware (`CoordinateSpace`).

use crate::capture::CaptureRegion;
use crate::config::CoordinateSpace;
use crate::geometry::Point;

/// Converts positions for one cycle's capture region.
#[derive(Clone, Copy, Debug)]
pub struct CoordinateMapper {
    region: CaptureRegion,
    space: CoordinateSpace,
}

impl CoordinateMapper {
    pub fn new(region: &CaptureRegion, space: CoordinateSpace) -> Self {
        Self {
            region: *region,
            space,
        }
    }

    /// Capture-local to physical virtual-screen pixels.
    pub fn to_screen(&self, p: Point) -> Point {
        self.region.origin().offset(p.x, p.y)
    }

    /// Capture-local to the window-message coordinate space.
    pub fn to_client(&self, p: Point) -> Point {
        match self.space {
            CoordinateSpace::Physical => p,
            CoordinateSpace::Logical => self.scale_down(p),
        }
    }

    /// Capture-local to pixels relative to the containing monitor.
    pub fn to_monitor(&self, p: Point) -> Point {
        let screen = self.to_screen(p);
        let offset = self.region.monitor_offset;
        screen.offset(-offset.x, -offset.y)
    }

    /// Physical screen pixels to logical (DPI-unaware) pixels.
    pub fn to_logical(&self, screen: Point) -> Point {
        self.scale_down(screen)
    }

    /// Capture-local reference point: the configured client position, or
    /// the centre of the capture.
    pub fn reference_point(&self, configured: Option<Point>) -> Point {
        configured.unwrap_or_else(|| self.region.center())
    }

    pub fn region(&self) -> &CaptureRegion {
        &self.region
    }

    fn scale_down(&self, p: Point) -> Point {
        let scale = self.region.dpi_scale;
        Point::new(
            (p.x as f32 / scale).round() as i32,
            (p.y as f32 / scale).round() as i32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(origin: Point, monitor: Point, dpi: f32) -> CaptureRegion {
        CaptureRegion::new(origin, 800, 600, monitor, dpi).unwrap()
    }

    #[test]
    fn test_to_screen_adds_origin() {
        let mapper = CoordinateMapper::new(
            &region(Point::new(100, 100), Point::new(0, 0), 1.0),
            CoordinateSpace::Physical,
        );
        assert_eq!(mapper.to_screen(Point::new(0, 0)), Point::new(100, 100));
        assert_eq!(mapper.to_screen(Point::new(60, 40)), Point::new(160, 140));
    }

    #[test]
    fn test_second_monitor_offsets() {
        // Client area on a monitor to the left of the primary
        let mapper = CoordinateMapper::new(
            &region(Point::new(-1800, 50), Point::new(-1920, 0), 1.0),
            CoordinateSpace::Physical,
        );
        assert_eq!(mapper.to_screen(Point::new(10, 10)), Point::new(-1790, 60));
        assert_eq!(mapper.to_monitor(Point::new(10, 10)), Point::new(130, 60));
    }

    #[test]
    fn test_client_space_follows_dpi_awareness() {
        let r = region(Point::new(0, 0), Point::new(0, 0), 1.5);
        let physical = CoordinateMapper::new(&r, CoordinateSpace::Physical);
        let logical = CoordinateMapper::new(&r, CoordinateSpace::Logical);

        assert_eq!(physical.to_client(Point::new(150, 300)), Point::new(150, 300));
        assert_eq!(logical.to_client(Point::new(150, 300)), Point::new(100, 200));
        assert_eq!(logical.to_logical(Point::new(-300, 30)), Point::new(-200, 20));
    }

    #[test]
    fn test_reference_point_defaults_to_centre() {
        let mapper = CoordinateMapper::new(
            &region(Point::new(5, 5), Point::new(0, 0), 1.0),
            CoordinateSpace::Physical,
        );
        assert_eq!(mapper.reference_point(None), Point::new(400, 300));
        assert_eq!(
            mapper.reference_point(Some(Point::new(12, 34))),
            Point::new(12, 34)
        );
    }
}
