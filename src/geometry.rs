//! Integer points and the distance metric shared by suppression and dragging.

use serde::{Deserialize, Serialize};

/// A pixel position. Which space it lives in depends on the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan (L1) distance.
    pub fn manhattan(self, other: Point) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn offset(self, dx: i32, dy: i32) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }

    /// Point at fraction `t` of the way from `self` to `to`, truncated toward zero.
    pub fn lerp(self, to: Point, t: f64) -> Point {
        let x = self.x as f64 + (to.x - self.x) as f64 * t;
        let y = self.y as f64 + (to.y - self.y) as f64 * t;
        Point::new(x as i32, y as i32)
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Point::new(x, y)
    }
}

/// Manhattan distance between fractional positions.
pub fn manhattan_f32(ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    (ax - bx).abs() + (ay - by).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manhattan() {
        assert_eq!(Point::new(0, 0).manhattan(Point::new(3, -4)), 7);
        assert_eq!(Point::new(-5, 2).manhattan(Point::new(-5, 2)), 0);
    }

    #[test]
    fn test_lerp_endpoints() {
        let a = Point::new(10, 20);
        let b = Point::new(110, -80);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 0.5), Point::new(60, -30));
    }
}
