use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self { Point { x, y } }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self { Size { width, height } }

    pub fn is_empty(&self) -> bool { self.width <= 0 || self.height <= 0 }
}

/// An axis-aligned rectangle in physical screen pixels.
///
/// Containment is half-open: the left and top edges are inside, the right and
/// bottom edges are not. Two rectangles that only share an edge do not
/// intersect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Rect { x, y, width, height }
    }

    pub const fn from_parts(origin: Point, size: Size) -> Self {
        Rect { x: origin.x, y: origin.y, width: size.width, height: size.height }
    }

    pub fn origin(&self) -> Point { Point::new(self.x, self.y) }

    pub fn size(&self) -> Size { Size::new(self.width, self.height) }

    pub fn max_x(&self) -> i32 { self.x + self.width }

    pub fn max_y(&self) -> i32 { self.y + self.height }

    pub fn is_empty(&self) -> bool { self.size().is_empty() }

    /// Area in square pixels; negative extents count as zero.
    pub fn area(&self) -> u64 { (self.width.max(0) as u64) * (self.height.max(0) as u64) }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.max_x() && point.y >= self.y && point.y < self.max_y()
    }

    /// True if `other` lies entirely within `self`. Empty rectangles are
    /// contained as long as their origin is within the closed bounds.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.max_x() <= self.max_x()
            && other.max_y() <= self.max_y()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.x < other.max_x()
            && other.x < self.max_x()
            && self.y < other.max_y()
            && other.y < self.max_y()
    }

    /// Shrinks the rectangle by `amount` on every side, never below zero size.
    pub fn inset(&self, amount: i32) -> Rect {
        let amount = amount.max(0);
        let width = self.width.saturating_sub(amount.saturating_mul(2)).max(0);
        let height = self.height.saturating_sub(amount.saturating_mul(2)).max(0);
        let x = if width == 0 { self.x + self.width / 2 } else { self.x + amount };
        let y = if height == 0 { self.y + self.height / 2 } else { self.y + amount };
        Rect::new(x, y, width, height)
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let max_x = self.max_x().max(other.max_x());
        let max_y = self.max_y().max(other.max_y());
        Rect::new(x, y, max_x - x, max_y - y)
    }

    /// Re-expresses this rectangle relative to `origin`.
    pub fn relative_to(&self, origin: Point) -> Rect {
        Rect::new(self.x - origin.x, self.y - origin.y, self.width, self.height)
    }

    pub fn center(&self) -> Point { Point::new(self.x + self.width / 2, self.y + self.height / 2) }
}
