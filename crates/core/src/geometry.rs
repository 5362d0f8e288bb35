//! Geometric primitives and text folding shared by the word-navigation engine.
//!
//! Coordinates follow page-image conventions: `x` grows to the right and `y`
//! grows downward, so `(x0, y0)` is the top-left corner of a [`BBox`].

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// A point on the page.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned bounding box with `x0 <= x1` and `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    /// Build a box from two corners, swapping coordinates when they come in
    /// the wrong order.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Degenerate box covering a single point.
    pub fn from_point(p: Point) -> Self {
        Self {
            x0: p.x,
            y0: p.y,
            x1: p.x,
            y1: p.y,
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn center(&self) -> Point {
        Point::new((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// Inclusive containment test: points on the border are inside.
    pub fn contains(&self, p: Point) -> bool {
        self.x0 <= p.x && p.x <= self.x1 && self.y0 <= p.y && p.y <= self.y1
    }

    /// Whether the closed vertical spans of both boxes intersect.
    pub fn overlaps_vertically(&self, other: &BBox) -> bool {
        self.y0 <= other.y1 && other.y0 <= self.y1
    }

    /// Whether the closed horizontal spans of both boxes intersect.
    pub fn overlaps_horizontally(&self, other: &BBox) -> bool {
        self.x0 <= other.x1 && other.x0 <= self.x1
    }
}

impl From<(f64, f64, f64, f64)> for BBox {
    fn from((x0, y0, x1, y1): (f64, f64, f64, f64)) -> Self {
        BBox::new(x0, y0, x1, y1)
    }
}

/// Squared distance from `p` to the closed segment `a`-`b`.
pub fn point_to_segment_squared_distance(p: Point, a: Point, b: Point) -> f64 {
    let ab_x = b.x - a.x;
    let ab_y = b.y - a.y;
    let ap_x = p.x - a.x;
    let ap_y = p.y - a.y;

    let ab_dot_ab = ab_x * ab_x + ab_y * ab_y;
    if ab_dot_ab == 0.0 {
        return ap_x * ap_x + ap_y * ap_y;
    }

    let proj = ((ab_x * ap_x + ab_y * ap_y) / ab_dot_ab).clamp(0.0, 1.0);
    let dx = p.x - (a.x + proj * ab_x);
    let dy = p.y - (a.y + proj * ab_y);
    dx * dx + dy * dy
}

/// Squared distance from `p` to `bbox`: zero inside, otherwise the closest of
/// the four edges.
pub fn point_to_bbox_squared_distance(p: Point, bbox: &BBox) -> f64 {
    if bbox.contains(p) {
        return 0.0;
    }

    let top_left = Point::new(bbox.x0, bbox.y0);
    let top_right = Point::new(bbox.x1, bbox.y0);
    let bottom_left = Point::new(bbox.x0, bbox.y1);
    let bottom_right = Point::new(bbox.x1, bbox.y1);

    [
        (top_left, bottom_left),
        (top_right, bottom_right),
        (top_left, top_right),
        (bottom_left, bottom_right),
    ]
    .into_iter()
    .map(|(a, b)| point_to_segment_squared_distance(p, a, b))
    .fold(f64::INFINITY, f64::min)
}

/// Strip diacritics without touching case: `"Inscrição"` becomes `"Inscricao"`.
///
/// Text is decomposed (NFKD) and combining marks are dropped. Compatibility
/// decomposition also expands ligatures such as `ﬁ` into `fi`. ASCII input is
/// returned unchanged, which keeps regex syntax intact.
pub fn strip_diacritics(text: &str) -> String {
    text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Fold case and strip diacritics: `"Inscrição"` becomes `"inscricao"`.
pub fn normalize_text(text: &str) -> String {
    strip_diacritics(text).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_new_orders_corners() {
        let b = BBox::new(10.0, 20.0, 0.0, 5.0);
        assert_eq!(b, BBox::new(0.0, 5.0, 10.0, 20.0));
        assert_eq!(b.width(), 10.0);
        assert_eq!(b.height(), 15.0);
    }

    #[test]
    fn test_contains_is_inclusive() {
        let b = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(b.contains(Point::new(0.0, 0.0)));
        assert!(b.contains(Point::new(10.0, 10.0)));
        assert!(b.contains(Point::new(5.0, 10.0)));
        assert!(!b.contains(Point::new(10.1, 5.0)));
    }

    #[test]
    fn test_overlaps() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(20.0, 10.0, 30.0, 20.0);
        assert!(a.overlaps_vertically(&b));
        assert!(!a.overlaps_horizontally(&b));
    }

    #[test]
    fn test_segment_distance_projection_inside() {
        let d = point_to_segment_squared_distance(
            Point::new(5.0, 3.0),
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
        );
        assert_eq!(d, 9.0);
    }

    #[test]
    fn test_segment_distance_clamped_to_endpoint() {
        let d = point_to_segment_squared_distance(
            Point::new(13.0, 4.0),
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
        );
        assert_eq!(d, 25.0);
    }

    #[test]
    fn test_segment_distance_degenerate() {
        let a = Point::new(1.0, 1.0);
        assert_eq!(point_to_segment_squared_distance(Point::new(4.0, 5.0), a, a), 25.0);
    }

    #[test]
    fn test_bbox_distance_inside_is_zero() {
        let b = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(point_to_bbox_squared_distance(Point::new(3.0, 3.0), &b), 0.0);
    }

    #[test]
    fn test_bbox_distance_outside() {
        let b = BBox::new(10.0, 10.0, 20.0, 20.0);
        // Diagonal from the top-left corner.
        assert_eq!(point_to_bbox_squared_distance(Point::new(7.0, 6.0), &b), 25.0);
        // Straight left of the box.
        assert_eq!(point_to_bbox_squared_distance(Point::new(4.0, 15.0), &b), 36.0);
    }

    #[test]
    fn test_strip_diacritics_keeps_case_and_syntax() {
        assert_eq!(strip_diacritics("Inscrição"), "Inscricao");
        assert_eq!(strip_diacritics(r"\D+\s*Nº"), r"\D+\s*No");
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("Inscrição"), "inscricao");
        assert_eq!(normalize_text("ÁRVORE Ñandú"), "arvore nandu");
        assert_eq!(normalize_text("\u{FB01}nal"), "final");
        assert_eq!(normalize_text(""), "");
    }
}
