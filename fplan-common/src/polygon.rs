//! Rectilinear polygon sets, stored as collections of disjoint rectangles.
//!
//! Nothing here is clever. Every operation is quadratic in the number of rectangles, which is
//! fine for the handful of tiles a single region is made of.

use itertools::Itertools;

use crate::geometry::{Area, Direction, Len, Rect};

/// A set of points in the plane, represented as pairwise disjoint, non-empty rectangles.
///
/// The decomposition is not canonical: two sets covering the same points may store different
/// rectangles. Use [RectSet::dice] to get a canonical decomposition.
#[derive(Clone, Debug, Default)]
pub struct RectSet {
    rects: Vec<Rect>,
}

impl PartialEq for RectSet {
    fn eq(&self, other: &Self) -> bool {
        self.dice() == other.dice()
    }
}

impl Eq for RectSet {}

impl FromIterator<Rect> for RectSet {
    fn from_iter<T: IntoIterator<Item = Rect>>(iter: T) -> Self {
        let mut set = RectSet::new();
        for r in iter {
            set.add(r);
        }
        set
    }
}

impl RectSet {
    pub fn new() -> Self {
        Self { rects: Vec::new() }
    }

    pub fn from_rect(r: Rect) -> Self {
        let mut set = Self::new();
        set.add(r);
        set
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn area(&self) -> Area {
        self.rects.iter().map(|r| r.area()).sum()
    }

    pub fn bounding_box(&self) -> Option<Rect> {
        self.rects.iter().copied().reduce(|a, b| a.union_bbox(&b))
    }

    /// Add the points of `r` to the set.
    pub fn add(&mut self, r: Rect) {
        if r.is_empty() {
            return;
        }
        let mut pieces = vec![r];
        for existing in self.rects.iter() {
            pieces = pieces
                .into_iter()
                .flat_map(|p| p.subtract(existing))
                .collect();
            if pieces.is_empty() {
                return;
            }
        }
        self.rects.extend(pieces);
    }

    /// Remove the points of `r` from the set.
    pub fn subtract(&mut self, r: &Rect) {
        if r.is_empty() {
            return;
        }
        self.rects = self
            .rects
            .iter()
            .flat_map(|existing| existing.subtract(r))
            .collect();
    }

    pub fn union(&self, other: &RectSet) -> RectSet {
        let mut out = self.clone();
        for r in other.rects.iter() {
            out.add(*r);
        }
        out
    }

    pub fn difference(&self, other: &RectSet) -> RectSet {
        let mut out = self.clone();
        for r in other.rects.iter() {
            out.subtract(r);
        }
        out
    }

    pub fn intersect_rect(&self, r: &Rect) -> RectSet {
        RectSet {
            rects: self
                .rects
                .iter()
                .filter_map(|existing| existing.intersection(r))
                .collect(),
        }
    }

    pub fn intersection(&self, other: &RectSet) -> RectSet {
        RectSet {
            rects: self
                .rects
                .iter()
                .cartesian_product(other.rects.iter())
                .filter_map(|(a, b)| a.intersection(b))
                .collect(),
        }
    }

    pub fn intersects_rect(&self, r: &Rect) -> bool {
        self.rects.iter().any(|existing| existing.intersects(r))
    }

    /// Bounding box width over height. An empty set reports 1.0.
    pub fn aspect_ratio(&self) -> f64 {
        self.bounding_box().map(|b| b.aspect_ratio()).unwrap_or(1.0)
    }

    /// Fraction of the bounding box covered by the set. An empty set reports 1.0.
    pub fn utilization(&self) -> f64 {
        match self.bounding_box() {
            Some(b) if b.area() > 0 => self.area() as f64 / b.area() as f64,
            _ => 1.0,
        }
    }

    /// Split into edge-connected components. Rectangles touching only at a corner are not
    /// connected.
    pub fn components(&self) -> Vec<RectSet> {
        let n = self.rects.len();
        let mut parent: Vec<usize> = (0..n).collect();

        fn find(parent: &mut Vec<usize>, mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        for i in 0..n {
            for j in (i + 1)..n {
                if edge_connected(&self.rects[i], &self.rects[j]) {
                    let a = find(&mut parent, i);
                    let b = find(&mut parent, j);
                    if a != b {
                        parent[a] = b;
                    }
                }
            }
        }

        let mut groups: Vec<(usize, RectSet)> = Vec::new();
        for i in 0..n {
            let root = find(&mut parent, i);
            match groups.iter_mut().find(|(g, _)| *g == root) {
                Some((_, set)) => set.rects.push(self.rects[i]),
                None => groups.push((
                    root,
                    RectSet {
                        rects: vec![self.rects[i]],
                    },
                )),
            }
        }
        groups.into_iter().map(|(_, set)| set).collect()
    }

    /// True if the set is a single edge-connected piece. The empty set counts as one shape.
    pub fn one_shape(&self) -> bool {
        self.components().len() <= 1
    }

    /// True if the set encloses no region of the plane that is not reachable from outside its
    /// bounding box.
    pub fn no_hole(&self) -> bool {
        let bbox = match self.bounding_box() {
            Some(b) => b,
            None => return true,
        };
        let frame = Rect::new(bbox.xl - 1, bbox.yl - 1, bbox.xh + 1, bbox.yh + 1);
        let complement = RectSet::from_rect(frame).difference(self);
        complement.components().len() <= 1
    }

    /// Canonical decomposition: horizontal slabs, each covering maximal x intervals, with slabs
    /// of identical x extent merged vertically. Sorted by `(yl, xl)`.
    pub fn dice(&self) -> Vec<Rect> {
        let ys: Vec<Len> = self
            .rects
            .iter()
            .flat_map(|r| [r.yl, r.yh])
            .sorted()
            .dedup()
            .collect();

        // (xl, xh) -> open rectangle still growing upward
        let mut open: Vec<Rect> = Vec::new();
        let mut done: Vec<Rect> = Vec::new();

        for (&y0, &y1) in ys.iter().tuple_windows() {
            let spans = merged_spans(
                self.rects
                    .iter()
                    .filter(|r| r.yl <= y0 && y1 <= r.yh)
                    .map(|r| (r.xl, r.xh)),
            );

            let mut next_open = Vec::with_capacity(spans.len());
            for (xl, xh) in spans {
                match open
                    .iter()
                    .position(|o| o.xl == xl && o.xh == xh && o.yh == y0)
                {
                    Some(i) => {
                        let mut grown = open.swap_remove(i);
                        grown.yh = y1;
                        next_open.push(grown);
                    }
                    None => next_open.push(Rect::new(xl, y0, xh, y1)),
                }
            }
            done.extend(open.drain(..));
            open = next_open;
        }
        done.extend(open);
        done.sort_by_key(|r| (r.yl, r.xl, r.yh, r.xh));
        done
    }

    /// Boundary edges of the set facing `d`, as `(fixed, lo, hi)` triples in the same convention
    /// as [Rect::side]. Collinear touching pieces are merged.
    pub fn boundary(&self, d: Direction) -> Vec<(Len, Len, Len)> {
        let mut edges = Vec::new();
        for r in self.rects.iter() {
            let (fixed, lo, hi) = r.side(d);
            let covered = merged_spans(self.rects.iter().filter_map(|o| {
                let (ofixed, olo, ohi) = o.side(d.mirror());
                if ofixed == fixed && olo < hi && lo < ohi {
                    Some((olo.max(lo), ohi.min(hi)))
                } else {
                    None
                }
            }));
            let mut cursor = lo;
            for (clo, chi) in covered {
                if cursor < clo {
                    edges.push((fixed, cursor, clo));
                }
                cursor = cursor.max(chi);
            }
            if cursor < hi {
                edges.push((fixed, cursor, hi));
            }
        }

        edges.sort();
        let mut merged: Vec<(Len, Len, Len)> = Vec::with_capacity(edges.len());
        for e in edges {
            match merged.last_mut() {
                Some(last) if last.0 == e.0 && last.2 == e.1 => last.2 = e.2,
                _ => merged.push(e),
            }
        }
        merged
    }
}

/// Sort and merge overlapping or touching `(lo, hi)` intervals.
pub fn merged_spans(spans: impl Iterator<Item = (Len, Len)>) -> Vec<(Len, Len)> {
    let mut out: Vec<(Len, Len)> = Vec::new();
    for (lo, hi) in spans.sorted() {
        match out.last_mut() {
            Some(last) if lo <= last.1 => last.1 = last.1.max(hi),
            _ => out.push((lo, hi)),
        }
    }
    out
}

fn edge_connected(a: &Rect, b: &Rect) -> bool {
    a.intersects(b)
        || a.abuts(b, Direction::Top)
        || a.abuts(b, Direction::Right)
        || a.abuts(b, Direction::Down)
        || a.abuts(b, Direction::Left)
}

#[cfg(test)]
mod test;
