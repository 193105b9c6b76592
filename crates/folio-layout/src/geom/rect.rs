use std::fmt::{self, Debug, Formatter};

use crate::geom::{Abs, Dir, Point, Side, Sides, Size};

/// An axis-aligned rectangle in absolute document coordinates.
#[derive(Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Rect {
    /// The top-left corner.
    pub origin: Point,
    /// The extent towards the bottom-right.
    pub size: Size,
}

impl Rect {
    /// The empty rectangle at the origin.
    pub const fn zero() -> Self {
        Self { origin: Point::zero(), size: Size::zero() }
    }

    /// Create a new rectangle from an origin and a size.
    pub const fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    /// Create a rectangle spanning two corner points.
    pub fn from_points(a: Point, b: Point) -> Self {
        let origin = a.min(b);
        Self { origin, size: (a.max(b) - origin).to_size() }
    }

    /// The rectangle's width.
    pub fn width(self) -> Abs {
        self.size.x
    }

    /// The rectangle's height.
    pub fn height(self) -> Abs {
        self.size.y
    }

    /// The coordinate of the left edge.
    pub fn left(self) -> Abs {
        self.origin.x
    }

    /// The coordinate of the top edge.
    pub fn top(self) -> Abs {
        self.origin.y
    }

    /// The coordinate of the right edge.
    pub fn right(self) -> Abs {
        self.origin.x + self.size.x
    }

    /// The coordinate of the bottom edge.
    pub fn bottom(self) -> Abs {
        self.origin.y + self.size.y
    }

    /// The coordinate of the given edge.
    pub fn edge(self, side: Side) -> Abs {
        match side {
            Side::Left => self.left(),
            Side::Top => self.top(),
            Side::Right => self.right(),
            Side::Bottom => self.bottom(),
        }
    }

    /// The edge at which content flowing in the given direction enters the
    /// rectangle.
    pub fn start_edge(self, dir: Dir) -> Abs {
        self.edge(dir.start())
    }

    /// The edge at which content flowing in the given direction leaves the
    /// rectangle.
    pub fn end_edge(self, dir: Dir) -> Abs {
        self.edge(dir.end())
    }

    /// The bottom-right corner.
    pub fn end_point(self) -> Point {
        self.origin + self.size.to_point()
    }

    /// Whether the rectangle has zero or negative extent on either axis.
    pub fn is_empty(self) -> bool {
        self.size.x.approx_empty() || self.size.y.approx_empty()
    }

    /// Whether the point lies within the rectangle.
    pub fn contains(self, point: Point) -> bool {
        point.x >= self.left()
            && point.x <= self.right()
            && point.y >= self.top()
            && point.y <= self.bottom()
    }

    /// Whether the other rectangle lies fully within this one, with a bit of
    /// slack.
    pub fn contains_rect(self, other: Self) -> bool {
        other.left().fits(self.left())
            && other.top().fits(self.top())
            && self.right().fits(other.right())
            && self.bottom().fits(other.bottom())
    }

    /// Whether this rectangle and the other overlap.
    pub fn intersects(self, other: Self) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.top() < other.bottom()
            && other.top() < self.bottom()
    }

    /// Move the rectangle by the given offset.
    pub fn translate(self, offset: Point) -> Self {
        Self { origin: self.origin + offset, size: self.size }
    }

    /// Shrink the rectangle by the given insets, clamping the size at zero.
    pub fn inset(self, insets: Sides<Abs>) -> Self {
        let origin = Point::new(self.origin.x + insets.left, self.origin.y + insets.top);
        let shrink = insets.sum_by_axis();
        let size = Size::new(
            (self.size.x - shrink.x).max(Abs::zero()),
            (self.size.y - shrink.y).max(Abs::zero()),
        );
        Self { origin, size }
    }

    /// Grow the rectangle by the given outsets.
    pub fn outset(self, outsets: Sides<Abs>) -> Self {
        let origin =
            Point::new(self.origin.x - outsets.left, self.origin.y - outsets.top);
        Self { origin, size: self.size + outsets.sum_by_axis() }
    }
}

impl Debug for Rect {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Rect({:?}, {:?})", self.origin, self.size)
    }
}
