use super::{Tile, TileId, TilePlane};
use crate::geometry::Rect;

pub struct TileIter<'a> {
    inner: std::iter::Enumerate<std::slice::Iter<'a, Option<Tile>>>,
}

impl<'a> TileIter<'a> {
    pub(super) fn new(parent: &'a TilePlane) -> Self {
        Self {
            inner: parent.tiles.iter().enumerate(),
        }
    }
}

impl<'a> Iterator for TileIter<'a> {
    type Item = (TileId, &'a Tile);

    fn next(&mut self) -> Option<Self::Item> {
        // Skip over freed slots
        for (i, slot) in self.inner.by_ref() {
            if let Some(t) = slot {
                return Some((TileId(i as u32), t));
            }
        }
        None
    }
}

pub struct TileQueryIter<'a> {
    rect: Rect,
    inner: TileIter<'a>,
}

impl<'a> TileQueryIter<'a> {
    pub(super) fn new(parent: &'a TilePlane, rect: Rect) -> Self {
        Self {
            rect,
            inner: TileIter::new(parent),
        }
    }
}

impl<'a> Iterator for TileQueryIter<'a> {
    type Item = (TileId, &'a Tile);

    fn next(&mut self) -> Option<Self::Item> {
        let rect = self.rect;
        self.inner.by_ref().find(|(_, t)| t.rect.intersects(&rect))
    }
}
