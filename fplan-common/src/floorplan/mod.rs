//! Regions placed on a [TilePlane], and the ownership edits the legalizer performs on them.
//!
//! Every tile is owned by one region (a block tile) or claimed by several (an overlap tile). Each
//! region keeps the ids of both kinds of tile so ownership can be walked from either side; the
//! two views are kept in sync by every edit in this module.

mod serialization;

pub use serialization::{FloorplanSpec, RegionSpec};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;

use crate::geometry::{Area, Rect};
use crate::polygon::RectSet;
use crate::tile_plane::{Tile, TileId, TilePayload, TilePlane};

#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionId(pub u32);

impl Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    /// Resizable and movable.
    Soft,
    /// Preplaced. Never donates or receives area.
    Fixed,
}

/// One of the five legality predicates a region can fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    Area,
    AspectRatio,
    Utilization,
    Hole,
    Fragmented,
}

#[derive(Clone, Debug)]
pub struct Region {
    pub name: String,
    pub kind: RegionKind,
    /// Minimum area the region must cover.
    pub legal_area: Area,
    /// Bounds on bounding box width over height.
    pub aspect_ratio_min: f64,
    pub aspect_ratio_max: f64,
    /// Minimum fraction of the bounding box the region must cover.
    pub utilization_min: f64,
    block_tiles: BTreeSet<TileId>,
    overlap_tiles: BTreeSet<TileId>,
}

impl Region {
    pub const DEFAULT_ASPECT_RATIO_MIN: f64 = 0.5;
    pub const DEFAULT_ASPECT_RATIO_MAX: f64 = 2.0;
    pub const DEFAULT_UTILIZATION_MIN: f64 = 0.8;

    pub fn soft(name: impl Into<String>, legal_area: Area) -> Self {
        Self {
            name: name.into(),
            kind: RegionKind::Soft,
            legal_area,
            aspect_ratio_min: Self::DEFAULT_ASPECT_RATIO_MIN,
            aspect_ratio_max: Self::DEFAULT_ASPECT_RATIO_MAX,
            utilization_min: Self::DEFAULT_UTILIZATION_MIN,
            block_tiles: BTreeSet::new(),
            overlap_tiles: BTreeSet::new(),
        }
    }

    /// Fixed regions are whatever shape they were placed as, so only area and connectivity are
    /// checked by default.
    pub fn fixed(name: impl Into<String>, legal_area: Area) -> Self {
        Self {
            kind: RegionKind::Fixed,
            aspect_ratio_min: 0.0,
            aspect_ratio_max: f64::INFINITY,
            utilization_min: 0.0,
            ..Self::soft(name, legal_area)
        }
    }

    pub fn with_aspect_ratio(mut self, min: f64, max: f64) -> Self {
        self.aspect_ratio_min = min;
        self.aspect_ratio_max = max;
        self
    }

    pub fn with_utilization(mut self, min: f64) -> Self {
        self.utilization_min = min;
        self
    }

    pub fn is_soft(&self) -> bool {
        self.kind == RegionKind::Soft
    }

    pub fn block_tiles(&self) -> &BTreeSet<TileId> {
        &self.block_tiles
    }

    pub fn overlap_tiles(&self) -> &BTreeSet<TileId> {
        &self.overlap_tiles
    }

    fn tiles_mut(&mut self, overlap: bool) -> &mut BTreeSet<TileId> {
        if overlap {
            &mut self.overlap_tiles
        } else {
            &mut self.block_tiles
        }
    }
}

pub struct Floorplan {
    plane: TilePlane,
    /// Soft regions first, then fixed ones.
    regions: Vec<Region>,
    soft_count: usize,
}

impl Floorplan {
    pub fn new(chip: Rect) -> Self {
        Self {
            plane: TilePlane::new(chip),
            regions: Vec::new(),
            soft_count: 0,
        }
    }

    pub fn chip(&self) -> Rect {
        self.plane.chip()
    }

    pub fn plane(&self) -> &TilePlane {
        &self.plane
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn soft_count(&self) -> usize {
        self.soft_count
    }

    pub fn fixed_count(&self) -> usize {
        self.regions.len() - self.soft_count
    }

    pub fn region_ids(&self) -> impl Iterator<Item = RegionId> {
        (0..self.regions.len() as u32).map(RegionId)
    }

    pub fn soft_ids(&self) -> impl Iterator<Item = RegionId> {
        (0..self.soft_count as u32).map(RegionId)
    }

    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.0 as usize]
    }

    pub fn find_region(&self, name: &str) -> Option<RegionId> {
        self.regions
            .iter()
            .position(|r| r.name == name)
            .map(|i| RegionId(i as u32))
    }

    /// Constraints of a region can be changed freely. Its tiles can only change through the
    /// edits below.
    pub fn region_mut(&mut self, id: RegionId) -> Result<&mut Region> {
        self.regions
            .get_mut(id.0 as usize)
            .ok_or_else(|| anyhow!("No such region {}", id))
    }

    /// Register a region with no tiles yet. Soft regions must all be added before the first fixed
    /// one so ids stay partitioned by kind.
    pub fn add_region(&mut self, mut region: Region) -> Result<RegionId> {
        if region.is_soft() && self.fixed_count() > 0 {
            bail!(
                "Soft region {:?} added after {} fixed regions",
                region.name,
                self.fixed_count()
            );
        }
        region.block_tiles.clear();
        region.overlap_tiles.clear();
        if region.is_soft() {
            self.soft_count += 1;
        }
        self.regions.push(region);
        Ok(RegionId((self.regions.len() - 1) as u32))
    }

    pub fn tile(&self, id: TileId) -> Result<&Tile> {
        Ok(self.plane.tile(id)?)
    }

    pub fn tile_rect(&self, id: TileId) -> Result<Rect> {
        Ok(self.plane.tile(id)?.rect)
    }

    fn rects_of<'a>(&self, tiles: impl Iterator<Item = &'a TileId>) -> RectSet {
        tiles
            .filter_map(|t| self.plane.get(*t).map(|t| t.rect))
            .collect()
    }

    /// Everything the region covers, overlaps included.
    pub fn shape(&self, id: RegionId) -> RectSet {
        let r = self.region(id);
        self.rects_of(r.block_tiles.iter().chain(r.overlap_tiles.iter()))
    }

    /// Only the tiles the region owns alone.
    pub fn block_shape(&self, id: RegionId) -> RectSet {
        self.rects_of(self.region(id).block_tiles.iter())
    }

    pub fn actual_area(&self, id: RegionId) -> Area {
        let r = self.region(id);
        r.block_tiles
            .iter()
            .chain(r.overlap_tiles.iter())
            .filter_map(|t| self.plane.get(*t))
            .map(|t| t.rect.area())
            .sum()
    }

    pub fn bounding_box(&self, id: RegionId) -> Option<Rect> {
        self.shape(id).bounding_box()
    }

    pub fn is_legal_enough_area(&self, id: RegionId) -> bool {
        self.actual_area(id) >= self.region(id).legal_area
    }

    pub fn is_legal_aspect_ratio(&self, id: RegionId) -> bool {
        let r = self.region(id);
        let ar = self.shape(id).aspect_ratio();
        r.aspect_ratio_min <= ar && ar <= r.aspect_ratio_max
    }

    pub fn is_legal_utilization(&self, id: RegionId) -> bool {
        self.shape(id).utilization() >= self.region(id).utilization_min
    }

    pub fn is_legal_no_hole(&self, id: RegionId) -> bool {
        self.shape(id).no_hole()
    }

    pub fn is_legal_one_shape(&self, id: RegionId) -> bool {
        self.shape(id).one_shape()
    }

    /// Every predicate the region currently fails, in a fixed order.
    pub fn violations(&self, id: RegionId) -> Vec<Violation> {
        let shape = self.shape(id);
        let r = self.region(id);
        let mut out = Vec::new();
        if shape.area() < r.legal_area {
            out.push(Violation::Area);
        }
        let ar = shape.aspect_ratio();
        if ar < r.aspect_ratio_min || ar > r.aspect_ratio_max {
            out.push(Violation::AspectRatio);
        }
        if shape.utilization() < r.utilization_min {
            out.push(Violation::Utilization);
        }
        if !shape.no_hole() {
            out.push(Violation::Hole);
        }
        if !shape.one_shape() {
            out.push(Violation::Fragmented);
        }
        out
    }

    pub fn is_legal(&self, id: RegionId) -> bool {
        self.violations(id).is_empty()
    }

    /// Overlap tiles claimed by both `a` and `b` (and possibly others).
    pub fn overlap_tiles_between(&self, a: RegionId, b: RegionId) -> Vec<TileId> {
        self.region(a)
            .overlap_tiles
            .iter()
            .copied()
            .filter(|t| {
                self.plane
                    .get(*t)
                    .map(|t| t.payload.is_owned_by(b))
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn total_overlap_area(&self) -> Area {
        self.plane
            .iter()
            .filter(|(_, t)| t.payload.is_overlap())
            .map(|(_, t)| t.rect.area())
            .sum()
    }

    fn register(&mut self, tile: TileId, payload: &TilePayload) -> Result<()> {
        let overlap = payload.is_overlap();
        for owner in payload.owners() {
            self.region_mut(*owner)?.tiles_mut(overlap).insert(tile);
        }
        Ok(())
    }

    fn unregister(&mut self, tile: TileId, payload: &TilePayload) -> Result<()> {
        let overlap = payload.is_overlap();
        for owner in payload.owners() {
            self.region_mut(*owner)?.tiles_mut(overlap).remove(&tile);
        }
        Ok(())
    }

    fn set_payload(&mut self, tile: TileId, payload: TilePayload) -> Result<()> {
        let old = self.plane.tile(tile)?.payload.clone();
        self.unregister(tile, &old)?;
        self.register(tile, &payload)?;
        self.plane.set_payload(tile, payload)?;
        Ok(())
    }

    /// Place a tile owned only by `region` on blank space.
    pub fn add_block_tile(&mut self, region: RegionId, rect: Rect) -> Result<TileId> {
        let payload = TilePayload::Block(region);
        let id = self
            .plane
            .insert(rect, payload.clone())
            .with_context(|| anyhow!("Adding block tile {} to {}", rect, region))?;
        self.register(id, &payload)?;
        Ok(id)
    }

    /// Claim `rect` for `region` regardless of what is already there. Blank parts become block
    /// tiles; parts of other regions' tiles become overlap tiles.
    pub fn paint_region(&mut self, region: RegionId, rect: Rect) -> Result<()> {
        let rect = rect
            .intersection(&self.chip())
            .ok_or_else(|| anyhow!("Rect {} for {} lies outside the chip", rect, region))?;

        let hits: Vec<(TileId, Rect)> = self
            .plane
            .query(rect)
            .filter(|(_, t)| !t.payload.is_owned_by(region))
            .filter_map(|(id, t)| t.rect.intersection(&rect).map(|i| (id, i)))
            .collect();

        for (tile, sub) in hits {
            self.split_tile(tile, sub)?;
            let mut owners = self.plane.tile(tile)?.payload.owners().to_vec();
            owners.push(region);
            let payload = TilePayload::from_owners(owners)
                .ok_or_else(|| anyhow!("Tile {} lost all owners", tile))?;
            self.set_payload(tile, payload)?;
        }

        for blank in self.plane.blank_in(rect) {
            self.add_block_tile(region, blank)?;
        }
        Ok(())
    }

    /// Shrink `tile` to `sub`. Leftover fragments keep the tile's owners. Returns `tile`, which
    /// now covers exactly `sub`.
    pub fn split_tile(&mut self, tile: TileId, sub: Rect) -> Result<TileId> {
        let payload = self.plane.tile(tile)?.payload.clone();
        let fragments = self
            .plane
            .split(tile, sub)
            .with_context(|| anyhow!("Splitting {} at {}", tile, sub))?;
        for f in fragments {
            self.register(f, &payload)?;
        }
        Ok(tile)
    }

    /// Drop `region` from the owners of an overlap tile. A tile left with one owner becomes that
    /// owner's block tile.
    pub fn decrease_tile_overlap(&mut self, tile: TileId, region: RegionId) -> Result<()> {
        let payload = self.plane.tile(tile)?.payload.clone();
        match payload {
            TilePayload::Overlap(owners) if owners.contains(&region) => {
                let rest = owners.into_iter().filter(|o| *o != region).collect();
                let payload = TilePayload::from_owners(rest)
                    .ok_or_else(|| anyhow!("Overlap tile {} had a single owner", tile))?;
                self.set_payload(tile, payload)
            }
            p => bail!("Tile {} ({:?}) is not an overlap claimed by {}", tile, p, region),
        }
    }

    /// Hand a block tile of `from` over to `to`.
    pub fn move_tile_parent(&mut self, tile: TileId, from: RegionId, to: RegionId) -> Result<()> {
        let payload = self.plane.tile(tile)?.payload.clone();
        match payload {
            TilePayload::Block(owner) if owner == from => {
                self.set_payload(tile, TilePayload::Block(to))
            }
            p => bail!("Tile {} ({:?}) is not a block tile of {}", tile, p, from),
        }
    }

    pub fn delete_tile(&mut self, tile: TileId) -> Result<Tile> {
        let payload = self.plane.tile(tile)?.payload.clone();
        self.unregister(tile, &payload)?;
        Ok(self.plane.remove(tile)?)
    }

    /// Add block tiles for `region` over the blank parts of `rect`. Returns the area gained.
    pub fn grow_region(&mut self, region: RegionId, rect: Rect) -> Result<Area> {
        let mut gained = 0;
        for blank in self.plane.blank_in(rect) {
            self.add_block_tile(region, blank)?;
            gained += blank.area();
        }
        Ok(gained)
    }

    /// Give up every part of `rect` that `region` covers. Block tiles there are deleted, overlap
    /// tiles lose `region` as an owner. Returns the area lost.
    pub fn shrink_region(&mut self, region: RegionId, rect: Rect) -> Result<Area> {
        let r = self.region(region);
        let hits: Vec<(TileId, Rect)> = r
            .block_tiles
            .iter()
            .chain(r.overlap_tiles.iter())
            .filter_map(|t| {
                self.plane
                    .get(*t)
                    .and_then(|tile| tile.rect.intersection(&rect))
                    .map(|i| (*t, i))
            })
            .collect();

        let mut lost = 0;
        for (tile, sub) in hits {
            self.split_tile(tile, sub)?;
            if self.plane.tile(tile)?.payload.is_overlap() {
                self.decrease_tile_overlap(tile, region)?;
            } else {
                self.delete_tile(tile)?;
            }
            lost += sub.area();
        }
        Ok(lost)
    }

    /// Shrink `region` to the points inside `keep`.
    pub fn retain_region(&mut self, region: RegionId, keep: &RectSet) -> Result<Area> {
        let drop = self.shape(region).difference(keep);
        let mut lost = 0;
        for r in drop.rects() {
            lost += self.shrink_region(region, *r)?;
        }
        Ok(lost)
    }

    /// Replace the block tiles of `region` with the canonical dicing of their union.
    pub fn reshape_region(&mut self, region: RegionId) -> Result<()> {
        let tiles: Vec<TileId> = self.region(region).block_tiles.iter().copied().collect();
        if tiles.len() < 2 {
            return Ok(());
        }
        let shape = self.block_shape(region);
        for t in tiles {
            self.delete_tile(t)?;
        }
        for r in shape.dice() {
            self.add_block_tile(region, r)?;
        }
        Ok(())
    }

    /// Check that the per-region tile sets and the plane agree.
    pub fn check_consistency(&self) -> Result<()> {
        for (id, tile) in self.plane.iter() {
            let overlap = tile.payload.is_overlap();
            for owner in tile.payload.owners() {
                let r = self
                    .regions
                    .get(owner.0 as usize)
                    .ok_or_else(|| anyhow!("Tile {} owned by unknown region {}", id, owner))?;
                let set = if overlap {
                    &r.overlap_tiles
                } else {
                    &r.block_tiles
                };
                if !set.contains(&id) {
                    bail!("Region {} does not list its tile {}", owner, id);
                }
            }
        }
        for (i, r) in self.regions.iter().enumerate() {
            let id = RegionId(i as u32);
            for t in r.block_tiles.iter() {
                match self.plane.get(*t).map(|t| &t.payload) {
                    Some(TilePayload::Block(o)) if *o == id => {}
                    p => bail!("{} lists block tile {} but plane has {:?}", id, t, p),
                }
            }
            for t in r.overlap_tiles.iter() {
                match self.plane.get(*t).map(|t| &t.payload) {
                    Some(TilePayload::Overlap(o)) if o.contains(&id) => {}
                    p => bail!("{} lists overlap tile {} but plane has {:?}", id, t, p),
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test;
