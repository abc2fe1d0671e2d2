//! Patching the graph after a migration instead of rebuilding it.

use anyhow::{anyhow, Context, Result};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use fplan_common::{Floorplan, RegionId, TileId};

use super::construct::{block_edges, overlap_edges};
use super::graph::{Edge, EdgeKind, Graph, NodeKind};
use super::migrate::MigrationReport;
use super::segment::Segment;

/// BB neighbors whose edge toward them appeared, disappeared or changed shape.
fn changed_neighbors(old: &[Edge], new: &[Edge]) -> BTreeSet<RegionId> {
    let keyed = |edges: &[Edge]| -> BTreeMap<EdgeKind, Vec<Segment>> {
        edges
            .iter()
            .map(|e| (e.kind, e.segments.clone()))
            .collect()
    };
    let old = keyed(old);
    let new = keyed(new);
    old.keys()
        .chain(new.keys())
        .filter(|k| old.get(k) != new.get(k))
        .filter_map(|k| match k {
            EdgeKind::BlockToBlock { to, .. } => Some(*to),
            _ => None,
        })
        .collect()
}

impl Graph {
    /// Bring the graph back in line with `fp` after the migration described by `report`.
    ///
    /// Every touched block has its edges recomputed. Any soft neighbor whose shared boundary
    /// with a recomputed block changed is recomputed in turn. Overlap nodes are refreshed and
    /// the ones next to a recomputed block, or whose tiles changed, get new edges.
    pub fn update(&mut self, fp: &Floorplan, report: &MigrationReport) -> Result<()> {
        let mut queue: VecDeque<RegionId> = report.touched.iter().copied().collect();
        let mut processed: BTreeSet<RegionId> = BTreeSet::new();

        while let Some(region) = queue.pop_front() {
            if !processed.insert(region) {
                continue;
            }
            let index = region.0 as usize;
            if !matches!(self.nodes[index].kind, NodeKind::Soft(_)) {
                continue;
            }
            let edges = block_edges(fp, region)
                .with_context(|| anyhow!("Updating neighbors of {}", region))?;
            let changed = changed_neighbors(&self.nodes[index].edges, &edges);
            self.nodes[index].edges = edges;
            for n in changed {
                if !processed.contains(&n) {
                    log::trace!("{} changed next to {}, queueing", region, n);
                    queue.push_back(n);
                }
            }
        }

        let before: BTreeMap<_, Vec<TileId>> = self
            .overlap_nodes()
            .map(|n| (n, self.node(n).tiles.clone()))
            .collect();
        self.refresh_overlap_tiles(fp);

        for index in self.overlap_nodes().collect_vec() {
            let node = self.node(index);
            let near = match node.kind {
                NodeKind::Overlap(a, b) => processed.contains(&a) || processed.contains(&b),
                _ => false,
            };
            let moved = before.get(&index).map(|t| *t != node.tiles).unwrap_or(true);
            if near || moved {
                self.nodes[index.0 as usize].edges = overlap_edges(fp, self, index)?;
            }
        }

        log::debug!(
            "Updated graph after {}: {} blocks recomputed",
            report.overlap,
            processed.len()
        );
        Ok(())
    }
}
