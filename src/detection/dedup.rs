//! Candidate filtering between matching and acting.

use std::collections::HashSet;

use super::matcher::Detection;
use crate::geometry::{manhattan_f32, Point};

/// Detections that survived filtering, unique by rounded position and in
/// the order matching produced them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionSet {
    items: Vec<Detection>,
}

impl DetectionSet {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.items.iter()
    }

    /// Rounded positions, one per detection.
    pub fn positions(&self) -> Vec<Point> {
        self.items
            .iter()
            .map(|d| {
                let (x, y) = d.rounded();
                Point::new(x, y)
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a DetectionSet {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Drops detections within `exclusion_radius` (Manhattan, inclusive) of
/// `reference`, then keeps the first detection for each rounded position.
///
/// Detections one pixel apart are distinct; no clustering happens here.
pub fn suppress(raw: &[Detection], reference: Point, exclusion_radius: u32) -> DetectionSet {
    let mut seen: HashSet<(i32, i32)> = HashSet::new();
    let mut items = Vec::new();

    for detection in raw {
        let distance = manhattan_f32(
            detection.x,
            detection.y,
            reference.x as f32,
            reference.y as f32,
        );
        if distance <= exclusion_radius as f32 {
            continue;
        }
        if seen.insert(detection.rounded()) {
            items.push(*detection);
        }
    }

    DetectionSet { items }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32, y: f32, scale: f32) -> Detection {
        Detection {
            x,
            y,
            score: 0.9,
            scale,
        }
    }

    #[test]
    fn test_exclusion_radius_is_inclusive() {
        let reference = Point::new(100, 100);
        let raw = [
            det(103.0, 102.0, 1.0), // distance 5
            det(103.0, 103.0, 1.0), // distance 6
            det(100.0, 100.0, 1.0),
        ];
        let set = suppress(&raw, reference, 5);
        assert_eq!(set.positions(), vec![Point::new(103, 103)]);
    }

    #[test]
    fn test_zero_radius_only_drops_exact_reference() {
        let raw = [det(10.0, 10.0, 1.0), det(11.0, 10.0, 1.0)];
        let set = suppress(&raw, Point::new(10, 10), 0);
        assert_eq!(set.positions(), vec![Point::new(11, 10)]);
    }

    #[test]
    fn test_same_rounded_position_keeps_first() {
        let raw = [
            det(200.4, 50.0, 1.0),
            det(199.6, 50.2, 1.5),
            det(300.0, 80.0, 1.0),
        ];
        let set = suppress(&raw, Point::new(0, 0), 5);
        assert_eq!(set.len(), 2);
        let kept: Vec<f32> = set.iter().map(|d| d.scale).collect();
        assert_eq!(kept, vec![1.0, 1.0]);
    }

    #[test]
    fn test_adjacent_pixels_are_not_merged() {
        let raw = [det(50.0, 50.0, 1.0), det(51.0, 50.0, 1.0), det(50.0, 51.0, 1.0)];
        let set = suppress(&raw, Point::new(0, 0), 5);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_preserves_input_order() {
        let raw = [det(90.0, 10.0, 2.0), det(10.0, 90.0, 0.5), det(40.0, 40.0, 1.0)];
        let set = suppress(&raw, Point::new(0, 0), 0);
        assert_eq!(
            set.positions(),
            vec![Point::new(90, 10), Point::new(10, 90), Point::new(40, 40)]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(suppress(&[], Point::new(0, 0), 5).is_empty());
    }
}
