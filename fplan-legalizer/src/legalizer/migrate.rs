//! Applying a resolved [MigrationPath] to the floorplan.
//!
//! Hops are applied in order and are not rolled back: if a later hop fails, the earlier ones stay
//! applied and the caller is expected to rebuild the graph.

use std::collections::BTreeSet;
use std::fmt::Display;

use anyhow::{anyhow, Context};
use itertools::Itertools;

use fplan_common::{Area, Direction, Floorplan, Len, Rect, RegionId, TileId};

use super::cost::Hop;
use super::graph::{Graph, NodeIndex, NodeKind};
use super::search::MigrationPath;
use super::segment::Segment;
use crate::config::LegalizerConfig;

/// What a single migration did.
#[derive(Clone, Debug)]
pub struct MigrationReport {
    pub overlap: NodeIndex,
    pub owners: (RegionId, RegionId),
    /// Area the whole path was sized for.
    pub resolvable_area: Area,
    /// Area actually moved by each hop, in path order.
    pub moved: Vec<Area>,
    /// Soft blocks left in more than one piece.
    pub fragmented: Vec<RegionId>,
    /// Every region whose tiles changed.
    pub touched: BTreeSet<RegionId>,
}

#[derive(Debug)]
pub enum MigrationError {
    EmptyPath,
    /// The path does not start by leaving an overlap node.
    NotAnOverlap(NodeIndex),
    /// Nothing could be carved out of the overlap.
    NoProgress(NodeIndex),
    /// A floorplan edit failed at hop `hop`. Earlier hops remain applied.
    Edit { hop: usize, source: anyhow::Error },
}

impl Display for MigrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "MigrationError::EmptyPath"),
            Self::NotAnOverlap(n) => write!(f, "MigrationError::NotAnOverlap({})", n),
            Self::NoProgress(n) => write!(f, "MigrationError::NoProgress({})", n),
            Self::Edit { hop, source } => {
                write!(f, "MigrationError::Edit(hop {}: {:#})", hop, source)
            }
        }
    }
}

impl std::error::Error for MigrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Edit { source, .. } => Some(&**source),
            _ => None,
        }
    }
}

pub struct MigrationExecutor<'a> {
    fp: &'a mut Floorplan,
    graph: &'a Graph,
    config: &'a LegalizerConfig,
}

impl<'a> MigrationExecutor<'a> {
    pub fn new(fp: &'a mut Floorplan, graph: &'a Graph, config: &'a LegalizerConfig) -> Self {
        Self { fp, graph, config }
    }

    pub fn execute(&mut self, path: &MigrationPath) -> Result<MigrationReport, MigrationError> {
        let first = path.edges.first().ok_or(MigrationError::EmptyPath)?;
        let (overlap, block, sides) = match &first.hop {
            Hop::OverlapToBlock {
                overlap,
                block,
                sides,
            } => (*overlap, *block, sides),
            _ => return Err(MigrationError::NotAnOverlap(path.overlap)),
        };
        let owners = match self.graph.node(overlap).kind {
            NodeKind::Overlap(a, b) => (a, b),
            _ => return Err(MigrationError::NotAnOverlap(overlap)),
        };

        let overlap_area: Area = self
            .fp
            .overlap_tiles_between(owners.0, owners.1)
            .iter()
            .filter_map(|t| self.fp.plane().get(*t))
            .map(|t| t.rect.area())
            .sum();
        let resolvable_area = path.carried.min(overlap_area);

        let stripped = self
            .strip_overlap(owners, block, resolvable_area, sides)
            .map_err(|source| MigrationError::Edit { hop: 0, source })?;
        if stripped == 0 {
            return Err(MigrationError::NoProgress(overlap));
        }

        let mut report = MigrationReport {
            overlap,
            owners,
            resolvable_area,
            moved: vec![stripped],
            fragmented: Vec::new(),
            touched: [owners.0, owners.1].into_iter().collect(),
        };

        for (i, step) in path.edges.iter().enumerate().skip(1) {
            let moved = match &step.hop {
                Hop::BlockToBlock {
                    from,
                    to,
                    segment,
                    rect,
                } => {
                    report.touched.insert(*from);
                    report.touched.insert(*to);
                    self.take_from_block(*from, *to, segment, *rect, stripped)
                }
                Hop::BlockToBlank {
                    from,
                    segment,
                    rect,
                } => {
                    report.touched.insert(*from);
                    self.grow_into_blank(*from, segment, *rect, stripped)
                }
                Hop::OverlapToBlock { .. } => Err(anyhow!("Overlap hop in the middle of a path")),
            }
            .map_err(|source| MigrationError::Edit { hop: i, source })?;

            if moved != stripped {
                log::warn!(
                    "Hop {} of migration for {} moved {} instead of {}",
                    i,
                    overlap,
                    moved,
                    stripped
                );
            }
            report.moved.push(moved);
        }

        report.fragmented = report
            .touched
            .iter()
            .copied()
            .filter(|r| self.fp.region(*r).is_soft() && !self.fp.is_legal_one_shape(*r))
            .collect();
        for r in report.fragmented.iter() {
            log::warn!("Migration for {} left {} in pieces", overlap, r);
        }

        Ok(report)
    }

    /// Drop `block`'s claim on up to `area` of the overlap between `owners`. Whole tiles are
    /// released smallest first; the first tile too big to release whole has a piece carved
    /// off one of the sides `block` does not touch. Returns the area released.
    fn strip_overlap(
        &mut self,
        owners: (RegionId, RegionId),
        block: RegionId,
        area: Area,
        occupied: &[Direction],
    ) -> anyhow::Result<Area> {
        let tiles: Vec<(TileId, Rect)> = self
            .fp
            .overlap_tiles_between(owners.0, owners.1)
            .into_iter()
            .map(|t| self.fp.tile_rect(t).map(|r| (t, r)))
            .collect::<anyhow::Result<Vec<_>>>()?
            .into_iter()
            .sorted_by_key(|(t, r)| (r.area(), *t))
            .collect();

        let mut remaining = area;
        for (tile, rect) in tiles {
            if remaining <= 0 {
                break;
            }
            if rect.area() <= remaining {
                self.fp.decrease_tile_overlap(tile, block)?;
                remaining -= rect.area();
                continue;
            }

            let mut carve: Option<Rect> = None;
            for d in fplan_common::PLANAR_DIRECTIONS {
                if occupied.contains(&d) {
                    continue;
                }
                let candidate = carve_from_side(&rect, d, remaining);
                if candidate.area() > carve.map(|c| c.area()).unwrap_or(0) {
                    carve = Some(candidate);
                }
            }
            if let Some(carve) = carve {
                let piece = self
                    .fp
                    .split_tile(tile, carve)
                    .with_context(|| anyhow!("Carving {} out of overlap", carve))?;
                self.fp.decrease_tile_overlap(piece, block)?;
                remaining -= carve.area();
            }
            break;
        }
        Ok(area - remaining)
    }

    /// Rectangles to move for a hop sized for `area`, kept inside the rectangle the search
    /// scored.
    fn hop_rects(&self, segment: &Segment, scored: Rect, area: Area) -> Vec<Rect> {
        segment
            .carve(area, self.config.exact_area_migration)
            .into_iter()
            .filter_map(|r| r.intersection(&scored))
            .collect()
    }

    /// Hand the block tiles of `to` inside the hop rectangles over to `from`.
    fn take_from_block(
        &mut self,
        from: RegionId,
        to: RegionId,
        segment: &Segment,
        scored: Rect,
        area: Area,
    ) -> anyhow::Result<Area> {
        let mut moved = 0;
        for rect in self.hop_rects(segment, scored, area) {
            let hits: Vec<(TileId, Rect)> = self
                .fp
                .region(to)
                .block_tiles()
                .iter()
                .filter_map(|t| {
                    self.fp
                        .plane()
                        .get(*t)
                        .and_then(|tile| tile.rect.intersection(&rect))
                        .map(|i| (*t, i))
                })
                .collect();
            for (tile, sub) in hits {
                let piece = self.fp.split_tile(tile, sub)?;
                self.fp
                    .move_tile_parent(piece, to, from)
                    .with_context(|| anyhow!("Moving {} from {} to {}", sub, to, from))?;
                moved += sub.area();
            }
        }
        Ok(moved)
    }

    fn grow_into_blank(
        &mut self,
        from: RegionId,
        segment: &Segment,
        scored: Rect,
        area: Area,
    ) -> anyhow::Result<Area> {
        let mut grown = 0;
        for rect in self.hop_rects(segment, scored, area) {
            grown += self
                .fp
                .grow_region(from, rect)
                .with_context(|| anyhow!("Growing {} into {}", from, rect))?;
        }
        Ok(grown)
    }
}

/// The deepest full-width slab of `rect` along side `d` whose area does not exceed `area`.
fn carve_from_side(rect: &Rect, d: Direction, area: Area) -> Rect {
    let (_, lo, hi) = rect.side(d);
    let len = (hi - lo) as Area;
    if len <= 0 {
        return Rect::new(rect.xl, rect.yl, rect.xl, rect.yl);
    }
    let depth = (area / len) as Len;
    match d {
        Direction::Top => Rect::new(rect.xl, rect.yh - depth, rect.xh, rect.yh),
        Direction::Right => Rect::new(rect.xh - depth, rect.yl, rect.xh, rect.yh),
        Direction::Down => Rect::new(rect.xl, rect.yl, rect.xh, rect.yl + depth),
        Direction::Left => Rect::new(rect.xl, rect.yl, rect.xl + depth, rect.yh),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::legalizer::test::floorplan;

    fn rects_of<'t>(fp: &Floorplan, tiles: impl IntoIterator<Item = &'t TileId>) -> Vec<Rect> {
        tiles
            .into_iter()
            .map(|t| fp.tile_rect(*t).unwrap())
            .sorted()
            .collect()
    }

    #[test]
    fn partial_strip_carves_away_from_the_block() {
        let _ = tracing_subscriber::fmt::try_init();
        let mut fp = floorplan![
            chip: (0, 0, 7, 4),
            soft: [
                a => 16, [(0, 0, 4, 4)];
                b => 8, [(2, 0, 6, 2)];
            ],
            fixed: [
                g => [(4, 2, 7, 4)];
            ]
        ];
        let (a, b) = (RegionId(0), RegionId(1));
        let graph = Graph::build(&fp).unwrap();
        let config = LegalizerConfig::default();

        // b continues to the right of the overlap, so the piece comes off the top
        let released = MigrationExecutor::new(&mut fp, &graph, &config)
            .strip_overlap((a, b), b, 2, &[Direction::Right])
            .unwrap();
        assert_eq!(released, 2);
        assert!(rects_of(&fp, fp.region(a).block_tiles()).contains(&Rect::new(2, 1, 4, 2)));
        assert_eq!(
            rects_of(&fp, &fp.overlap_tiles_between(a, b)),
            vec![Rect::new(2, 0, 4, 1)]
        );
        assert_eq!(fp.actual_area(a), 16);
        assert_eq!(fp.actual_area(b), 6);
        fp.check_consistency().unwrap();

        // with every free side taken nothing can be carved
        let released = MigrationExecutor::new(&mut fp, &graph, &config)
            .strip_overlap((a, b), a, 1, &fplan_common::PLANAR_DIRECTIONS)
            .unwrap();
        assert_eq!(released, 0);

        // asking for more than is left releases the whole tile
        let released = MigrationExecutor::new(&mut fp, &graph, &config)
            .strip_overlap((a, b), b, 5, &[Direction::Right])
            .unwrap();
        assert_eq!(released, 2);
        assert!(fp.overlap_tiles_between(a, b).is_empty());
        assert_eq!(fp.actual_area(b), 4);
        fp.check_consistency().unwrap();
    }

    #[test]
    fn carving_takes_whole_rows() {
        let r = Rect::new(0, 0, 4, 3);
        assert_eq!(carve_from_side(&r, Direction::Top, 9), Rect::new(0, 1, 4, 3));
        assert_eq!(carve_from_side(&r, Direction::Left, 7), Rect::new(0, 0, 2, 3));
        assert_eq!(carve_from_side(&r, Direction::Down, 3).area(), 0);
    }
}
