//! Integer plane geometry shared by the tile plane and the legalizer.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Length along one axis, in database units.
pub type Len = i32;

/// Area, in square database units. Wider than [Len] so products never overflow.
pub type Area = i64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cord {
    pub x: Len,
    pub y: Len,
}

impl Cord {
    pub fn new(x: Len, y: Len) -> Self {
        Self { x, y }
    }
}

impl Display for Cord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Outward normal of a boundary, or the side of a tile being scanned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// +Y
    Top,
    /// +X
    Right,
    /// -Y
    Down,
    /// -X
    Left,
}

impl Direction {
    #[inline]
    pub fn mirror(self) -> Self {
        match self {
            Direction::Top => Direction::Down,
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Top,
            Direction::Left => Direction::Right,
        }
    }

    /// True for Top and Down, whose boundaries run along the X axis.
    #[inline]
    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::Top | Direction::Down)
    }
}

pub const PLANAR_DIRECTIONS: [Direction; 4] = [
    Direction::Top,
    Direction::Right,
    Direction::Down,
    Direction::Left,
];

/// Half-open axis aligned rectangle `[xl, xh) x [yl, yh)`.
///
/// A rectangle with `xl == xh` or `yl == yh` is empty. Constructors never produce `xl > xh` or
/// `yl > yh`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub xl: Len,
    pub yl: Len,
    pub xh: Len,
    pub yh: Len,
}

impl Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]-[{}, {}]", self.xl, self.yl, self.xh, self.yh)
    }
}

impl Rect {
    pub fn new(xl: Len, yl: Len, xh: Len, yh: Len) -> Self {
        Self {
            xl: xl.min(xh),
            yl: yl.min(yh),
            xh: xl.max(xh),
            yh: yl.max(yh),
        }
    }

    /// Rectangle with the lower left corner at `(x, y)` and the given size.
    pub fn with_size(x: Len, y: Len, width: Len, height: Len) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    #[inline]
    pub fn width(&self) -> Len {
        self.xh - self.xl
    }

    #[inline]
    pub fn height(&self) -> Len {
        self.yh - self.yl
    }

    #[inline]
    pub fn area(&self) -> Area {
        self.width() as Area * self.height() as Area
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.xl >= self.xh || self.yl >= self.yh
    }

    /// Width over height. Empty rectangles report 1.0 so callers never divide by zero.
    pub fn aspect_ratio(&self) -> f64 {
        if self.is_empty() {
            1.0
        } else {
            self.width() as f64 / self.height() as f64
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.xl as f64 + self.xh as f64) / 2.0,
            (self.yl as f64 + self.yh as f64) / 2.0,
        )
    }

    /// Positive-area intersection, or `None` if the rectangles only touch or are disjoint.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let xl = self.xl.max(other.xl);
        let yl = self.yl.max(other.yl);
        let xh = self.xh.min(other.xh);
        let yh = self.yh.min(other.yh);
        if xl < xh && yl < yh {
            Some(Rect { xl, yl, xh, yh })
        } else {
            None
        }
    }

    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.xl < other.xh && other.xl < self.xh && self.yl < other.yh && other.yl < self.yh
    }

    pub fn contains(&self, other: &Rect) -> bool {
        self.xl <= other.xl && other.xh <= self.xh && self.yl <= other.yl && other.yh <= self.yh
    }

    /// Smallest rectangle covering both.
    pub fn union_bbox(&self, other: &Rect) -> Rect {
        Rect {
            xl: self.xl.min(other.xl),
            yl: self.yl.min(other.yl),
            xh: self.xh.max(other.xh),
            yh: self.yh.max(other.yh),
        }
    }

    /// The pieces of `self` left after removing `other`. At most four, none overlapping.
    ///
    /// Full-width bands above and below are emitted first, then the left and right pieces of the
    /// middle band.
    pub fn subtract(&self, other: &Rect) -> Vec<Rect> {
        let cut = match self.intersection(other) {
            Some(cut) => cut,
            None => return vec![*self],
        };

        let mut out = Vec::with_capacity(4);
        if cut.yh < self.yh {
            out.push(Rect::new(self.xl, cut.yh, self.xh, self.yh));
        }
        if self.yl < cut.yl {
            out.push(Rect::new(self.xl, self.yl, self.xh, cut.yl));
        }
        if self.xl < cut.xl {
            out.push(Rect::new(self.xl, cut.yl, cut.xl, cut.yh));
        }
        if cut.xh < self.xh {
            out.push(Rect::new(cut.xh, cut.yl, self.xh, cut.yh));
        }
        out
    }

    /// The side of this rectangle facing `d`, as `(fixed coordinate, low, high)`. For Top and Down
    /// the fixed coordinate is a Y value and the span runs along X; for Left and Right the reverse.
    pub fn side(&self, d: Direction) -> (Len, Len, Len) {
        match d {
            Direction::Top => (self.yh, self.xl, self.xh),
            Direction::Down => (self.yl, self.xl, self.xh),
            Direction::Right => (self.xh, self.yl, self.yh),
            Direction::Left => (self.xl, self.yl, self.yh),
        }
    }

    /// True if `other` sits directly against the `d` side of `self` with a shared edge of
    /// positive length.
    pub fn abuts(&self, other: &Rect, d: Direction) -> bool {
        let (fixed, lo, hi) = self.side(d);
        let (other_fixed, olo, ohi) = other.side(d.mirror());
        fixed == other_fixed && lo.max(olo) < hi.min(ohi)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn subtract_center_leaves_four_pieces() {
        let outer = Rect::new(0, 0, 6, 6);
        let pieces = outer.subtract(&Rect::new(2, 2, 4, 4));
        assert_eq!(pieces.len(), 4);
        assert_eq!(pieces.iter().map(|r| r.area()).sum::<Area>(), 32);
        for (i, a) in pieces.iter().enumerate() {
            for b in pieces.iter().skip(i + 1) {
                assert!(!a.intersects(b), "{} overlaps {}", a, b);
            }
        }
    }

    #[test]
    fn subtract_disjoint_is_identity() {
        let r = Rect::new(0, 0, 2, 2);
        assert_eq!(r.subtract(&Rect::new(2, 0, 4, 2)), vec![r]);
    }

    #[test]
    fn abutting_sides() {
        let a = Rect::new(0, 0, 2, 2);
        assert!(a.abuts(&Rect::new(2, 1, 3, 5), Direction::Right));
        assert!(a.abuts(&Rect::new(-1, 0, 0, 1), Direction::Left));
        // corner contact only
        assert!(!a.abuts(&Rect::new(2, 2, 3, 3), Direction::Right));
        assert!(!a.abuts(&Rect::new(0, 2, 2, 3), Direction::Down));
        assert!(a.abuts(&Rect::new(0, 2, 2, 3), Direction::Top));
    }
}
