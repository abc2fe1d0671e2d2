//! Building the migration graph from scratch by walking tile adjacency.

use anyhow::{anyhow, Context, Result};
use itertools::Itertools;
use std::collections::BTreeMap;

use fplan_common::{Direction, Floorplan, RegionId, TileId, TilePayload, PLANAR_DIRECTIONS};

use super::graph::{Edge, EdgeKind, Graph, Node, NodeIndex, NodeKind};
use super::segment::Segment;

impl Graph {
    /// Derive every node and edge from the current state of `fp`.
    pub fn build(fp: &Floorplan) -> Result<Graph> {
        let _span = tracing::info_span!("graph_rebuild").entered();

        let mut nodes: Vec<Node> = fp
            .region_ids()
            .map(|r| {
                if fp.region(r).is_soft() {
                    Node::new(NodeKind::Soft(r))
                } else {
                    Node::new(NodeKind::Fixed(r))
                }
            })
            .collect();

        let mut overlap_index = BTreeMap::new();
        for ((a, b), tiles) in overlap_pairs(fp) {
            let index = NodeIndex(nodes.len() as u32);
            let mut node = Node::new(NodeKind::Overlap(a, b));
            node.tiles = tiles;
            nodes.push(node);
            overlap_index.insert((a, b), index);
        }

        let mut graph = Graph {
            nodes,
            soft_count: fp.soft_count(),
            fixed_count: fp.fixed_count(),
            overlap_index,
        };

        for index in graph.overlap_nodes().collect_vec() {
            graph.nodes[index.0 as usize].edges = overlap_edges(fp, &graph, index)?;
        }
        for r in fp.soft_ids() {
            graph.nodes[r.0 as usize].edges =
                block_edges(fp, r).with_context(|| anyhow!("Scanning neighbors of {}", r))?;
        }

        log::debug!(
            "Built graph: {} blocks, {} overlaps, {} edges",
            graph.block_count(),
            graph.nodes.len() - graph.block_count(),
            graph.nodes.iter().map(|n| n.edges.len()).sum::<usize>()
        );
        Ok(graph)
    }

    /// Re-read the tiles of every overlap node from the floorplan. Pairs that stopped
    /// overlapping keep their node with no tiles.
    pub(crate) fn refresh_overlap_tiles(&mut self, fp: &Floorplan) {
        for index in self.overlap_nodes().collect_vec() {
            let node = &mut self.nodes[index.0 as usize];
            if let NodeKind::Overlap(a, b) = node.kind {
                node.tiles = fp.overlap_tiles_between(a, b);
            }
        }
    }
}

/// Every pair of regions sharing at least one overlap tile, with those tiles. A tile claimed by
/// three or more regions shows up under each pair of its owners.
fn overlap_pairs(fp: &Floorplan) -> BTreeMap<(RegionId, RegionId), Vec<TileId>> {
    let mut pairs: BTreeMap<(RegionId, RegionId), Vec<TileId>> = BTreeMap::new();
    for (id, tile) in fp.plane().iter() {
        if let TilePayload::Overlap(owners) = &tile.payload {
            for (a, b) in owners.iter().copied().tuple_combinations() {
                pairs.entry((a, b)).or_default().push(id);
            }
        }
    }
    pairs
}

/// Edges from an overlap node to each of its soft owners, one per owner. An owner only touching
/// the overlap at corners still gets an edge, with no segments.
pub(crate) fn overlap_edges(fp: &Floorplan, graph: &Graph, overlap: NodeIndex) -> Result<Vec<Edge>> {
    let node = graph.node(overlap);
    let (a, b) = match node.kind {
        NodeKind::Overlap(a, b) => (a, b),
        _ => return Err(anyhow!("{} is not an overlap node", overlap)),
    };
    if graph.node_area(fp, overlap) == 0 {
        return Ok(Vec::new());
    }

    let mut edges = Vec::with_capacity(2);
    for block in [a, b] {
        if !fp.region(block).is_soft() || graph.node_area(fp, block.into()) == 0 {
            continue;
        }
        let mut segments = Vec::new();
        for tile in node.tiles.iter() {
            let rect = fp.tile_rect(*tile)?;
            for d in PLANAR_DIRECTIONS {
                for span in fp.plane().neighbors(*tile, d)? {
                    let owned = span
                        .tile
                        .and_then(|t| fp.plane().get(t))
                        .map(|t| t.payload == TilePayload::Block(block))
                        .unwrap_or(false);
                    if owned {
                        segments.push(Segment::on_side(&rect, d, span.lo, span.hi));
                    }
                }
            }
        }
        edges.push(Edge {
            from: overlap,
            kind: EdgeKind::OverlapToBlock { block },
            segments: Segment::splice(segments),
        });
    }
    Ok(edges)
}

/// Edges out of a soft block: toward every other soft block its block tiles touch, and toward
/// blank space, one edge per neighbor per side. Overlap tiles and fixed blocks are not
/// neighbors. A block with no block tiles has no edges.
pub(crate) fn block_edges(fp: &Floorplan, region: RegionId) -> Result<Vec<Edge>> {
    let mut pieces: BTreeMap<(Option<RegionId>, Direction), Vec<Segment>> = BTreeMap::new();
    for tile in fp.region(region).block_tiles().iter() {
        let rect = fp.tile_rect(*tile)?;
        for d in PLANAR_DIRECTIONS {
            for span in fp.plane().neighbors(*tile, d)? {
                let neighbor = match span.tile {
                    None => None,
                    Some(t) => match fp.tile(t)?.payload {
                        TilePayload::Block(o) if o != region && fp.region(o).is_soft() => Some(o),
                        _ => continue,
                    },
                };
                pieces
                    .entry((neighbor, d))
                    .or_default()
                    .push(Segment::on_side(&rect, d, span.lo, span.hi));
            }
        }
    }

    let from = NodeIndex::from(region);
    Ok(pieces
        .into_iter()
        .map(|((neighbor, dir), segments)| Edge {
            from,
            kind: match neighbor {
                Some(to) => EdgeKind::BlockToBlock { to, dir },
                None => EdgeKind::BlockToBlank { dir },
            },
            segments: Segment::splice(segments),
        })
        .collect())
}
