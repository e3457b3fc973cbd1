use serde::Serialize;

/// Axis-aligned integer rectangle in image pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rectangle {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a rectangle from exclusive `right` / `bottom` edges.
    pub fn from_edges(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    /// `(left, top, right, bottom)` with `right = x + width`, `bottom = y + height`.
    pub fn edges(&self) -> (i32, i32, i32, i32) {
        (self.x, self.y, self.right(), self.bottom())
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            return 0;
        }
        self.width as i64 * self.height as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Overlap of two rectangles; an all-zero rectangle when disjoint.
    pub fn intersect(&self, other: &Rectangle) -> Rectangle {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        if x2 <= x1 || y2 <= y1 {
            return Rectangle::default();
        }
        Rectangle::from_edges(x1, y1, x2, y2)
    }

    /// True when `self` lies entirely within `other` (or equals it).
    pub fn is_inside(&self, other: &Rectangle) -> bool {
        !self.is_empty() && self.intersect(other) == *self
    }

    /// True when the rectangle is non-empty and fits in `[0, w) x [0, h)`.
    pub fn is_within(&self, width: u32, height: u32) -> bool {
        !self.is_empty()
            && self.x >= 0
            && self.y >= 0
            && self.right() <= width as i32
            && self.bottom() <= height as i32
    }

    /// Clips the rectangle to the image bounds.
    pub fn clamp_to(&self, width: u32, height: u32) -> Rectangle {
        self.intersect(&Rectangle::new(0, 0, width as i32, height as i32))
    }

    /// Multiplies every coordinate by `factor`, rounding to the nearest pixel.
    pub fn scale(&self, factor: f64) -> Rectangle {
        Rectangle::new(
            (self.x as f64 * factor).round() as i32,
            (self.y as f64 * factor).round() as i32,
            (self.width as f64 * factor).round() as i32,
            (self.height as f64 * factor).round() as i32,
        )
    }
}
