//! Spatial index of non-overlapping, owned rectangular tiles.
//!
//! Blank space is never stored: any point of the chip not covered by a tile is blank. Tiles are
//! addressed by [TileId], which stays stable until the tile is removed. Removed slots are reused.

pub mod iter;

use std::fmt::Display;

use crate::floorplan::RegionId;
use crate::geometry::{Direction, Len, Rect};

#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileId(pub u32);

impl Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Who owns a tile.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TilePayload {
    /// Owned by exactly one region.
    Block(RegionId),
    /// Claimed by two or more regions. Always sorted and free of duplicates.
    Overlap(Vec<RegionId>),
}

impl TilePayload {
    /// Build a payload from a list of owners, collapsing to [TilePayload::Block] when only one
    /// remains. Returns `None` for an empty owner list.
    pub fn from_owners(mut owners: Vec<RegionId>) -> Option<Self> {
        owners.sort_unstable();
        owners.dedup();
        match owners.len() {
            0 => None,
            1 => Some(TilePayload::Block(owners[0])),
            _ => Some(TilePayload::Overlap(owners)),
        }
    }

    pub fn owners(&self) -> &[RegionId] {
        match self {
            TilePayload::Block(r) => std::slice::from_ref(r),
            TilePayload::Overlap(v) => &v[..],
        }
    }

    pub fn is_owned_by(&self, region: RegionId) -> bool {
        self.owners().contains(&region)
    }

    pub fn is_overlap(&self) -> bool {
        matches!(self, TilePayload::Overlap(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    pub rect: Rect,
    pub payload: TilePayload,
}

/// A piece of one side of a tile, and what lies across it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NeighborSpan {
    pub lo: Len,
    pub hi: Len,
    /// `None` for blank space.
    pub tile: Option<TileId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TilePlaneError {
    NoSuchTile(TileId),
    EmptyRect(Rect),
    OutOfBounds(Rect),
    Overlapping { rect: Rect, existing: TileId },
    NotContained { tile: TileId, sub: Rect },
}

impl Display for TilePlaneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSuchTile(t) => write!(f, "TilePlaneError::NoSuchTile({})", t),
            Self::EmptyRect(r) => write!(f, "TilePlaneError::EmptyRect({})", r),
            Self::OutOfBounds(r) => write!(f, "TilePlaneError::OutOfBounds({})", r),
            Self::Overlapping { rect, existing } => write!(
                f,
                "TilePlaneError::Overlapping({} collides with {})",
                rect, existing
            ),
            Self::NotContained { tile, sub } => {
                write!(f, "TilePlaneError::NotContained({} not inside {})", sub, tile)
            }
        }
    }
}

impl std::error::Error for TilePlaneError {}

pub struct TilePlane {
    chip: Rect,
    tiles: Vec<Option<Tile>>,
    free: Vec<u32>,
}

impl TilePlane {
    pub fn new(chip: Rect) -> Self {
        Self {
            chip,
            tiles: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn chip(&self) -> Rect {
        self.chip
    }

    pub fn len(&self) -> usize {
        self.tiles.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id.0 as usize).and_then(|t| t.as_ref())
    }

    pub fn tile(&self, id: TileId) -> Result<&Tile, TilePlaneError> {
        self.get(id).ok_or(TilePlaneError::NoSuchTile(id))
    }

    fn tile_mut(&mut self, id: TileId) -> Result<&mut Tile, TilePlaneError> {
        self.tiles
            .get_mut(id.0 as usize)
            .and_then(|t| t.as_mut())
            .ok_or(TilePlaneError::NoSuchTile(id))
    }

    pub fn iter(&self) -> iter::TileIter {
        iter::TileIter::new(self)
    }

    /// All tiles sharing positive area with `rect`.
    pub fn query<'a>(&'a self, rect: Rect) -> iter::TileQueryIter<'a> {
        iter::TileQueryIter::new(self, rect)
    }

    pub fn insert(&mut self, rect: Rect, payload: TilePayload) -> Result<TileId, TilePlaneError> {
        if rect.is_empty() {
            return Err(TilePlaneError::EmptyRect(rect));
        }
        if !self.chip.contains(&rect) {
            return Err(TilePlaneError::OutOfBounds(rect));
        }
        if let Some((existing, _)) = self.query(rect).next() {
            return Err(TilePlaneError::Overlapping { rect, existing });
        }
        Ok(self.insert_unchecked(Tile { rect, payload }))
    }

    fn insert_unchecked(&mut self, tile: Tile) -> TileId {
        match self.free.pop() {
            Some(slot) => {
                self.tiles[slot as usize] = Some(tile);
                TileId(slot)
            }
            None => {
                self.tiles.push(Some(tile));
                TileId((self.tiles.len() - 1) as u32)
            }
        }
    }

    pub fn remove(&mut self, id: TileId) -> Result<Tile, TilePlaneError> {
        let tile = self
            .tiles
            .get_mut(id.0 as usize)
            .and_then(|t| t.take())
            .ok_or(TilePlaneError::NoSuchTile(id))?;
        self.free.push(id.0);
        Ok(tile)
    }

    pub fn set_payload(&mut self, id: TileId, payload: TilePayload) -> Result<(), TilePlaneError> {
        self.tile_mut(id)?.payload = payload;
        Ok(())
    }

    /// Shrink tile `id` down to `sub`, creating new tiles with the same payload for the rest of
    /// its old area. `id` keeps covering `sub`; the returned ids are the leftover fragments.
    pub fn split(&mut self, id: TileId, sub: Rect) -> Result<Vec<TileId>, TilePlaneError> {
        let tile = self.tile(id)?.clone();
        if sub.is_empty() || !tile.rect.contains(&sub) {
            return Err(TilePlaneError::NotContained { tile: id, sub });
        }
        if sub == tile.rect {
            return Ok(Vec::new());
        }

        self.tile_mut(id)?.rect = sub;
        Ok(tile
            .rect
            .subtract(&sub)
            .into_iter()
            .map(|rect| {
                self.insert_unchecked(Tile {
                    rect,
                    payload: tile.payload.clone(),
                })
            })
            .collect())
    }

    /// Everything across side `d` of tile `id`, ordered along the side. Gaps between tiles are
    /// reported as blank spans. Sides lying on the chip boundary have no neighbors.
    pub fn neighbors(&self, id: TileId, d: Direction) -> Result<Vec<NeighborSpan>, TilePlaneError> {
        let rect = self.tile(id)?.rect;
        let (fixed, lo, hi) = rect.side(d);
        let (chip_fixed, _, _) = self.chip.side(d);
        if fixed == chip_fixed {
            return Ok(Vec::new());
        }

        let mut touching: Vec<NeighborSpan> = self
            .iter()
            .filter_map(|(other, t)| {
                let (ofixed, olo, ohi) = t.rect.side(d.mirror());
                if other != id && ofixed == fixed && olo < hi && lo < ohi {
                    Some(NeighborSpan {
                        lo: olo.max(lo),
                        hi: ohi.min(hi),
                        tile: Some(other),
                    })
                } else {
                    None
                }
            })
            .collect();
        touching.sort_by_key(|s| s.lo);

        let mut out = Vec::with_capacity(touching.len() * 2 + 1);
        let mut cursor = lo;
        for span in touching {
            if cursor < span.lo {
                out.push(NeighborSpan {
                    lo: cursor,
                    hi: span.lo,
                    tile: None,
                });
            }
            cursor = span.hi;
            out.push(span);
        }
        if cursor < hi {
            out.push(NeighborSpan {
                lo: cursor,
                hi,
                tile: None,
            });
        }
        Ok(out)
    }

    /// Parts of `rect` (clipped to the chip) not covered by any tile.
    pub fn blank_in(&self, rect: Rect) -> Vec<Rect> {
        let mut blank = match rect.intersection(&self.chip) {
            Some(r) => vec![r],
            None => return Vec::new(),
        };
        for (_, t) in self.query(rect) {
            blank = blank.into_iter().flat_map(|b| b.subtract(&t.rect)).collect();
        }
        blank
    }
}
