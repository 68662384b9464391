//! Geometry for the block runtime
//!
//! All coordinates are `f32` in the space of whichever block owns them. A
//! foundation records child bounds in its own space; translating between a
//! child and its parent is a matter of adding or subtracting `bounds.min()`.

use std::ops::{Add, Neg, Sub};

use smallvec::SmallVec;

// ─────────────────────────────────────────────────────────────────────────────
// Point / Size / Rect
// ─────────────────────────────────────────────────────────────────────────────

/// 2D point
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Point {
    type Output = Point;

    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

/// 2D size
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Convert to a Rect at the origin (0, 0)
    pub const fn to_rect(self) -> Rect {
        Rect {
            origin: Point::ZERO,
            size: self,
        }
    }

    /// Pixel dimensions of a buffer holding this size
    pub fn to_pixels(self) -> (u32, u32) {
        (
            self.width.round().max(0.0) as u32,
            self.height.round().max(0.0) as u32,
        )
    }
}

impl From<Size> for Rect {
    fn from(size: Size) -> Self {
        size.to_rect()
    }
}

/// 2D rectangle
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        origin: Point::ZERO,
        size: Size::ZERO,
    };

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    /// Create a rect from its minimum and maximum corners
    pub fn from_min_max(min: Point, max: Point) -> Self {
        Self {
            origin: min,
            size: Size::new(max.x - min.x, max.y - min.y),
        }
    }

    pub fn min(&self) -> Point {
        self.origin
    }

    pub fn max(&self) -> Point {
        Point::new(
            self.origin.x + self.size.width,
            self.origin.y + self.size.height,
        )
    }

    pub fn width(&self) -> f32 {
        self.size.width
    }

    pub fn height(&self) -> f32 {
        self.size.height
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Whether the rect covers no area
    pub fn is_empty(&self) -> bool {
        self.size.width <= 0.0 || self.size.height <= 0.0
    }

    /// Edges are inclusive on both sides.
    pub fn contains(&self, point: Point) -> bool {
        let max = self.max();
        point.x >= self.origin.x && point.x <= max.x && point.y >= self.origin.y && point.y <= max.y
    }

    /// Whether `other` lies entirely inside this rect
    pub fn contains_rect(&self, other: &Rect) -> bool {
        let (a, b) = (self.max(), other.max());
        other.origin.x >= self.origin.x
            && other.origin.y >= self.origin.y
            && b.x <= a.x
            && b.y <= a.y
    }

    /// Whether the two rects share a region of positive area.
    ///
    /// Rects that only touch along an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        let (a, b) = (self.max(), other.max());
        self.origin.x < b.x && other.origin.x < a.x && self.origin.y < b.y && other.origin.y < a.y
    }

    /// The overlapping region, if any
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }
        let (a, b) = (self.max(), other.max());
        Some(Rect::from_min_max(
            Point::new(self.origin.x.max(other.origin.x), self.origin.y.max(other.origin.y)),
            Point::new(a.x.min(b.x), a.y.min(b.y)),
        ))
    }

    /// The same rect moved by `offset`
    pub fn translate(&self, offset: Point) -> Rect {
        Rect {
            origin: self.origin + offset,
            size: self.size,
        }
    }

    /// Smallest rect containing both
    pub fn union(&self, other: &Rect) -> Rect {
        let (a, b) = (self.max(), other.max());
        Rect::from_min_max(
            Point::new(self.origin.x.min(other.origin.x), self.origin.y.min(other.origin.y)),
            Point::new(a.x.max(b.x), a.y.max(b.y)),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RectSet
// ─────────────────────────────────────────────────────────────────────────────

/// A set of damaged rectangles.
///
/// Rects may overlap; the set only guarantees that no member is contained in
/// another member.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RectSet(SmallVec<[Rect; 4]>);

impl RectSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rect(rect: Rect) -> Self {
        let mut set = Self::new();
        set.insert(rect);
        set
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rect> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Rect] {
        &self.0
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Add a rect, dropping it if an existing member already covers it and
    /// dropping existing members it covers.
    pub fn insert(&mut self, rect: Rect) {
        if rect.is_empty() || self.0.iter().any(|r| r.contains_rect(&rect)) {
            return;
        }
        self.0.retain(|r| !rect.contains_rect(r));
        self.0.push(rect);
    }

    /// Union with another set
    pub fn merge(&mut self, other: RectSet) {
        for rect in other.0 {
            self.insert(rect);
        }
    }

    /// Every member moved by `offset`
    pub fn translate(&self, offset: Point) -> RectSet {
        RectSet(self.0.iter().map(|r| r.translate(offset)).collect())
    }

    /// Members clipped to `bounds`, dropping those outside it
    pub fn intersection(&self, bounds: &Rect) -> RectSet {
        RectSet(self.0.iter().filter_map(|r| r.intersection(bounds)).collect())
    }

    pub fn intersects(&self, bounds: &Rect) -> bool {
        self.0.iter().any(|r| r.intersects(bounds))
    }

    /// Smallest rect covering every member
    pub fn bounding_rect(&self) -> Option<Rect> {
        let mut rects = self.0.iter();
        let first = *rects.next()?;
        Some(rects.fold(first, |acc, r| acc.union(r)))
    }
}

impl FromIterator<Rect> for RectSet {
    fn from_iter<I: IntoIterator<Item = Rect>>(iter: I) -> Self {
        let mut set = RectSet::new();
        for rect in iter {
            set.insert(rect);
        }
        set
    }
}

impl IntoIterator for RectSet {
    type Item = Rect;
    type IntoIter = smallvec::IntoIter<[Rect; 4]>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a RectSet {
    type Item = &'a Rect;
    type IntoIter = std::slice::Iter<'a, Rect>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_inclusive() {
        let r = Rect::from_min_max(Point::new(10.0, 10.0), Point::new(60.0, 40.0));
        assert!(r.contains(Point::new(10.0, 10.0)));
        assert!(r.contains(Point::new(60.0, 40.0)));
        assert!(!r.contains(Point::new(60.5, 20.0)));
    }

    #[test]
    fn test_touching_rects_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert!(!a.intersects(&b));
        assert_eq!(a.intersection(&b), None);

        let c = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.intersection(&c), Some(Rect::new(5.0, 5.0, 5.0, 5.0)));
    }

    #[test]
    fn test_rect_set_insert_drops_covered() {
        let mut set = RectSet::new();
        set.insert(Rect::new(2.0, 2.0, 2.0, 2.0));
        set.insert(Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(set.len(), 1);

        set.insert(Rect::new(1.0, 1.0, 1.0, 1.0));
        assert_eq!(set.len(), 1);

        set.insert(Rect::new(20.0, 0.0, 5.0, 5.0));
        assert_eq!(set.len(), 2);

        set.insert(Rect::ZERO);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_rect_set_clip_and_translate() {
        let set: RectSet = [Rect::new(0.0, 0.0, 20.0, 20.0), Rect::new(100.0, 100.0, 5.0, 5.0)]
            .into_iter()
            .collect();
        let bounds = Rect::new(10.0, 10.0, 50.0, 30.0);

        assert!(set.intersects(&bounds));
        let local = set.intersection(&bounds).translate(-bounds.min());
        assert_eq!(local.as_slice(), &[Rect::new(0.0, 0.0, 10.0, 10.0)]);
    }

    #[test]
    fn test_bounding_rect() {
        let set: RectSet = [Rect::new(0.0, 0.0, 5.0, 5.0), Rect::new(10.0, 10.0, 5.0, 5.0)]
            .into_iter()
            .collect();
        assert_eq!(set.bounding_rect(), Some(Rect::new(0.0, 0.0, 15.0, 15.0)));
        assert_eq!(RectSet::new().bounding_rect(), None);
    }
}
