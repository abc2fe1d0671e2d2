//! Tangent segments: the straight pieces of boundary where a region touches a neighbor, and the
//! rectangles that can be grown outward from them.

use fplan_common::{Area, Cord, Direction, Floorplan, Len, Rect, RectSet};
use std::fmt::Display;

/// An axis aligned boundary interval. `dir` is the outward normal of the region the segment was
/// scanned from, so growing "through" the segment moves in `dir`.
///
/// For Top and Down segments `fixed` is a Y coordinate and `[lo, hi)` runs along X. For Left and
/// Right segments it is the other way around.
///
/// Ordering sorts by direction, then fixed coordinate, then start, which is what splicing needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Segment {
    pub dir: Direction,
    pub fixed: Len,
    pub lo: Len,
    pub hi: Len,
}

impl Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} {}-{}", self.dir, self.start(), self.end())
    }
}

impl Segment {
    pub fn new(dir: Direction, fixed: Len, lo: Len, hi: Len) -> Self {
        Self { dir, fixed, lo, hi }
    }

    /// Segment covering side `dir` of `rect` between `lo` and `hi`.
    pub fn on_side(rect: &Rect, dir: Direction, lo: Len, hi: Len) -> Self {
        let (fixed, _, _) = rect.side(dir);
        Self::new(dir, fixed, lo, hi)
    }

    pub fn len(&self) -> Len {
        self.hi - self.lo
    }

    pub fn is_empty(&self) -> bool {
        self.hi <= self.lo
    }

    pub fn start(&self) -> Cord {
        if self.dir.is_vertical() {
            Cord::new(self.lo, self.fixed)
        } else {
            Cord::new(self.fixed, self.lo)
        }
    }

    pub fn end(&self) -> Cord {
        if self.dir.is_vertical() {
            Cord::new(self.hi, self.fixed)
        } else {
            Cord::new(self.fixed, self.hi)
        }
    }

    /// Sort `segments` and merge collinear pieces where one ends exactly where the next starts.
    pub fn splice(mut segments: Vec<Segment>) -> Vec<Segment> {
        segments.retain(|s| !s.is_empty());
        segments.sort();
        let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
        for s in segments {
            match out.last_mut() {
                Some(prev) if prev.dir == s.dir && prev.fixed == s.fixed && prev.hi == s.lo => {
                    prev.hi = s.hi
                }
                _ => out.push(s),
            }
        }
        out
    }

    /// The band between `near` and `far` units away from the segment, restricted to `[lo, hi)`
    /// along it.
    fn band(&self, near: Len, far: Len, lo: Len, hi: Len) -> Rect {
        let f = self.fixed;
        match self.dir {
            Direction::Top => Rect::new(lo, f + near, hi, f + far),
            Direction::Down => Rect::new(lo, f - far, hi, f - near),
            Direction::Right => Rect::new(f + near, lo, f + far, hi),
            Direction::Left => Rect::new(f - far, lo, f - near, hi),
        }
    }

    /// Full-length rectangle reaching `depth` units out from the segment.
    pub fn project(&self, depth: Len) -> Rect {
        self.band(0, depth.max(0), self.lo, self.hi)
    }

    /// Depth in whole rows needed to cover `area`, rounding up.
    pub fn depth_for_area(&self, area: Area) -> Len {
        let len = self.len() as Area;
        if len <= 0 || area <= 0 {
            return 0;
        }
        ((area + len - 1) / len) as Len
    }

    /// Rectangles covering exactly `area`, anchored at the start of the segment. Unless `rows`
    /// is set, a single rectangle at the smallest covering depth is used when the area divides
    /// evenly into it; otherwise the area is laid out as in [`Segment::rects_exact`].
    pub fn carve(&self, area: Area, rows: bool) -> Vec<Rect> {
        if self.len() <= 0 || area <= 0 {
            return Vec::new();
        }
        if !rows {
            let depth = self.depth_for_area(area);
            let width = area / depth as Area;
            if width * depth as Area == area {
                return vec![self.band(0, depth, self.lo, self.lo + width as Len)];
            }
        }
        self.rects_exact(area)
    }

    /// Rectangles covering exactly `area`: whole rows, then a one unit thick strip along the
    /// start of the segment for the remainder. Empty pieces are left out.
    pub fn rects_exact(&self, area: Area) -> Vec<Rect> {
        let len = self.len() as Area;
        if len <= 0 || area <= 0 {
            return Vec::new();
        }
        let depth = (area / len) as Len;
        let rem = (area % len) as Len;
        let mut out = Vec::with_capacity(2);
        if depth > 0 {
            out.push(self.project(depth));
        }
        if rem > 0 {
            out.push(self.band(depth, depth + 1, self.lo, self.lo + rem));
        }
        out
    }

    /// Distance to the nearest boundary edge of `shape` that faces the same way as the segment,
    /// lies strictly beyond it, and shares part of its span. `None` if nothing bounds the
    /// segment.
    pub fn nearest_wall(&self, shape: &RectSet) -> Option<Len> {
        shape
            .boundary(self.dir)
            .into_iter()
            .filter(|(_, lo, hi)| *lo < self.hi && self.lo < *hi)
            .filter_map(|(fixed, _, _)| {
                let dist = match self.dir {
                    Direction::Top | Direction::Right => fixed - self.fixed,
                    Direction::Down | Direction::Left => self.fixed - fixed,
                };
                Some(dist).filter(|d| *d > 0)
            })
            .min()
    }

    /// Grow a rectangle of roughly `area` out of the segment into blank space, stopping at the
    /// chip edge and at the first tile in the way. `None` if no space is available.
    pub fn extend_into_blank(&self, area: Area, fp: &Floorplan) -> Option<Rect> {
        let chip = fp.chip();
        let (chip_fixed, _, _) = chip.side(self.dir);
        let room = match self.dir {
            Direction::Top | Direction::Right => chip_fixed - self.fixed,
            Direction::Down | Direction::Left => self.fixed - chip_fixed,
        };
        let mut depth = self.depth_for_area(area).min(room);
        if depth <= 0 {
            return None;
        }

        let goal = self.project(depth);
        for (_, tile) in fp.plane().query(goal) {
            let (near, _, _) = tile.rect.side(self.dir.mirror());
            let dist = match self.dir {
                Direction::Top | Direction::Right => near - self.fixed,
                Direction::Down | Direction::Left => self.fixed - near,
            };
            depth = depth.min(dist.max(0));
        }

        if depth > 0 {
            Some(self.project(depth))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use fplan_common::Region;

    #[test]
    fn splice_merges_touching_pieces_only() {
        let spliced = Segment::splice(vec![
            Segment::new(Direction::Top, 4, 2, 3),
            Segment::new(Direction::Top, 4, 0, 2),
            Segment::new(Direction::Top, 4, 5, 6),
            Segment::new(Direction::Right, 4, 3, 5),
            Segment::new(Direction::Top, 7, 3, 5),
        ]);
        assert_eq!(
            spliced,
            vec![
                Segment::new(Direction::Top, 4, 0, 3),
                Segment::new(Direction::Top, 4, 5, 6),
                Segment::new(Direction::Top, 7, 3, 5),
                Segment::new(Direction::Right, 4, 3, 5),
            ]
        );
    }

    #[test]
    fn projection_follows_direction() {
        let top = Segment::new(Direction::Top, 4, 0, 2);
        assert_eq!(top.project(2), Rect::new(0, 4, 2, 6));
        let left = Segment::new(Direction::Left, 4, 0, 2);
        assert_eq!(left.project(3), Rect::new(1, 0, 4, 2));
        assert_eq!(left.start(), Cord::new(4, 0));
        assert_eq!(left.end(), Cord::new(4, 2));
    }

    #[test]
    fn exact_rects_cover_area() {
        let down = Segment::new(Direction::Down, 10, 0, 4);
        let rects = down.rects_exact(10);
        assert_eq!(rects, vec![Rect::new(0, 8, 4, 10), Rect::new(0, 7, 2, 8)]);
        assert_eq!(rects.iter().map(|r| r.area()).sum::<Area>(), 10);
        assert_eq!(down.rects_exact(3), vec![Rect::new(0, 9, 3, 10)]);
    }

    #[test]
    fn carving_never_overshoots() {
        let right = Segment::new(Direction::Right, 3, 0, 3);
        assert_eq!(right.carve(1, false), vec![Rect::new(3, 0, 4, 1)]);
        assert_eq!(right.carve(4, false), vec![Rect::new(3, 0, 5, 2)]);
        assert_eq!(
            right.carve(5, false),
            vec![Rect::new(3, 0, 4, 3), Rect::new(4, 0, 5, 2)]
        );
        assert_eq!(right.carve(4, true), right.rects_exact(4));
        for area in 1..12 {
            let total: Area = right.carve(area, false).iter().map(|r| r.area()).sum();
            assert_eq!(total, area);
        }
        assert!(right.carve(0, false).is_empty());
    }

    #[test]
    fn wall_is_nearest_overlapping_edge() {
        let shape: RectSet = vec![Rect::new(0, 4, 2, 7), Rect::new(2, 4, 4, 9)]
            .into_iter()
            .collect();
        let seg = Segment::new(Direction::Top, 4, 0, 4);
        assert_eq!(seg.nearest_wall(&shape), Some(3));
        let seg = Segment::new(Direction::Top, 4, 2, 4);
        assert_eq!(seg.nearest_wall(&shape), Some(5));
        let seg = Segment::new(Direction::Top, 9, 0, 4);
        assert_eq!(seg.nearest_wall(&shape), None);
    }

    #[test]
    fn blank_extension_stops_at_obstacles() {
        let mut fp = Floorplan::new(Rect::new(0, 0, 10, 10));
        let a = fp.add_region(Region::soft("a", 4)).unwrap();
        fp.add_block_tile(a, Rect::new(0, 7, 2, 8)).unwrap();

        let seg = Segment::new(Direction::Top, 4, 0, 2);
        assert_eq!(seg.extend_into_blank(4, &fp), Some(Rect::new(0, 4, 2, 6)));
        assert_eq!(seg.extend_into_blank(20, &fp), Some(Rect::new(0, 4, 2, 7)));

        let seg = Segment::new(Direction::Right, 8, 0, 2);
        assert_eq!(seg.extend_into_blank(20, &fp), Some(Rect::new(8, 0, 10, 2)));
        let seg = Segment::new(Direction::Right, 10, 0, 2);
        assert_eq!(seg.extend_into_blank(2, &fp), None);
    }
}
