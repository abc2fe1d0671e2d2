//! Scoring candidate edge traversals. Nothing here mutates the floorplan.

use fplan_common::{Area, Direction, Floorplan, Rect, RectSet, RegionId};

use super::graph::{Edge, EdgeKind, Graph, NodeIndex, NodeKind};
use super::segment::Segment;
use crate::config::LegalizerConfig;

/// A concrete choice for one edge: which segment, which rectangle.
#[derive(Clone, Debug, PartialEq)]
pub enum Hop {
    OverlapToBlock {
        overlap: NodeIndex,
        block: RegionId,
        /// Sides of the overlap the block touches.
        sides: Vec<Direction>,
    },
    BlockToBlock {
        from: RegionId,
        to: RegionId,
        segment: Segment,
        rect: Rect,
    },
    BlockToBlank {
        from: RegionId,
        segment: Segment,
        rect: Rect,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct MigrationEdge {
    pub hop: Hop,
    pub cost: f64,
    /// Most area this hop can carry.
    pub capacity: Area,
}

/// Largest of `ar` and its inverse, so tall and wide shapes are scored alike.
fn normalized_aspect_ratio(shape: &RectSet) -> f64 {
    let ar = shape.aspect_ratio();
    if ar > 0.0 {
        ar.max(1.0 / ar)
    } else {
        1.0
    }
}

pub struct CostModel<'a> {
    fp: &'a Floorplan,
    graph: &'a Graph,
    config: &'a LegalizerConfig,
}

impl<'a> CostModel<'a> {
    pub fn new(fp: &'a Floorplan, graph: &'a Graph, config: &'a LegalizerConfig) -> Self {
        Self { fp, graph, config }
    }

    /// Best way to push `carried` area across `edge`, or `None` if the edge cannot carry any.
    pub fn evaluate(&self, edge: &Edge, carried: Area) -> Option<MigrationEdge> {
        if carried <= 0 {
            return None;
        }
        let from = self.graph.node(edge.from);
        match (from.kind, edge.kind) {
            (NodeKind::Overlap(..), EdgeKind::OverlapToBlock { block }) => {
                self.overlap_to_block(edge, block)
            }
            (NodeKind::Soft(r), EdgeKind::BlockToBlock { to, .. }) => {
                self.block_to_block(edge, r, to, carried)
            }
            (NodeKind::Soft(r), EdgeKind::BlockToBlank { .. }) => {
                self.block_to_blank(edge, r, carried)
            }
            (kind, _) => {
                log::warn!("Edge {:?} does not belong to node {:?}", edge.kind, kind);
                None
            }
        }
    }

    fn overlap_to_block(&self, edge: &Edge, block: RegionId) -> Option<MigrationEdge> {
        let c = self.config;
        let overlap = self.graph.node_shape(self.fp, edge.from);
        let overlap_area = overlap.area();
        let with = self.fp.shape(block);
        let without = with.difference(&overlap);
        if overlap_area == 0 || without.area() == 0 {
            return None;
        }

        let area_cost = overlap_area as f64 / without.area() as f64 * c.ob_area_weight;

        let with_util = with.utilization();
        let without_util = without.utilization();
        let util_cost = if with_util < without_util {
            (without_util - with_util) * c.ob_util_pos_rein
        } else {
            (1.0 - without_util) * c.ob_util_weight
        };

        let asp_cost = (normalized_aspect_ratio(&without) - 1.0).powi(4) * c.ob_asp_weight;

        let mut sides: Vec<Direction> = edge.segments.iter().map(|s| s.dir).collect();
        sides.sort();
        sides.dedup();

        let cost = (area_cost + util_cost + asp_cost).max(0.0);
        log::trace!(
            "OB {} -> {}: area {:.2} util {:.2} asp {:.2}",
            edge.from,
            block,
            area_cost,
            util_cost,
            asp_cost
        );
        Some(MigrationEdge {
            hop: Hop::OverlapToBlock {
                overlap: edge.from,
                block,
                sides,
            },
            cost,
            capacity: overlap_area,
        })
    }

    fn block_to_block(
        &self,
        edge: &Edge,
        from: RegionId,
        to: RegionId,
        carried: Area,
    ) -> Option<MigrationEdge> {
        let c = self.config;
        let from_shape = self.fp.shape(from);
        let to_shape = self.fp.shape(to);
        let to_blocks = self.fp.block_shape(to);
        if from_shape.is_empty() || to_shape.is_empty() {
            return None;
        }

        let mut best: Option<MigrationEdge> = None;
        for segment in edge.segments.iter() {
            let wall = match segment.nearest_wall(&to_blocks) {
                Some(w) => w,
                None => continue,
            };
            let depth = segment.depth_for_area(carried).min(wall);
            if depth <= 0 {
                continue;
            }
            let rect = segment.project(depth);
            let capacity = to_blocks.intersect_rect(&rect).area();
            if capacity == 0 {
                continue;
            }

            let mut new_from = from_shape.clone();
            new_from.add(rect);
            let mut new_to = to_shape.clone();
            new_to.subtract(&rect);

            let area_cost = from_shape.area() as f64 / to_shape.area() as f64 * c.bb_area_weight;

            let old_from_util = from_shape.utilization();
            let new_from_util = new_from.utilization();
            let from_util_cost = if new_from_util > old_from_util {
                (new_from_util - old_from_util) * c.bb_from_util_pos_rein
            } else {
                (1.0 - new_from_util) * c.bb_from_util_weight
            };

            let old_to_util = to_shape.utilization();
            let new_to_util = new_to.utilization();
            let to_util_cost = if new_to_util > old_to_util {
                (new_to_util - old_to_util) * c.bb_to_util_pos_rein
            } else {
                (1.0 - new_to_util).powi(2) * c.bb_to_util_weight
            };

            let asp_cost = (normalized_aspect_ratio(&new_from) - 1.0) * c.bb_asp_weight;

            let mut cost = area_cost + from_util_cost + to_util_cost + asp_cost;
            if new_to.components().len() > 1 {
                cost += c.fragment_penalty;
            }
            let cost = cost.max(0.0);

            if best.as_ref().map(|b| cost < b.cost).unwrap_or(true) {
                best = Some(MigrationEdge {
                    hop: Hop::BlockToBlock {
                        from,
                        to,
                        segment: *segment,
                        rect,
                    },
                    cost,
                    capacity,
                });
            }
        }

        best.map(|mut b| {
            b.cost += c.bb_flat_cost;
            b
        })
    }

    fn block_to_blank(&self, edge: &Edge, from: RegionId, carried: Area) -> Option<MigrationEdge> {
        let c = self.config;
        let from_shape = self.fp.shape(from);
        if from_shape.is_empty() {
            return None;
        }

        let mut best: Option<MigrationEdge> = None;
        for segment in edge.segments.iter() {
            let rect = match segment.extend_into_blank(carried, self.fp) {
                Some(r) => r,
                None => continue,
            };
            let mut new_from = from_shape.clone();
            new_from.add(rect);

            let old_util = from_shape.utilization();
            let new_util = new_from.utilization();
            let util_cost = if new_util > old_util {
                (new_util - old_util) * c.bw_util_pos_rein
            } else {
                (1.0 - new_util) * c.bw_util_weight
            };
            let asp_cost = (normalized_aspect_ratio(&new_from) - 1.0).powi(4) * c.bw_asp_weight;
            let cost = (util_cost + asp_cost).max(0.0);

            if best.as_ref().map(|b| cost < b.cost).unwrap_or(true) {
                best = Some(MigrationEdge {
                    hop: Hop::BlockToBlank {
                        from,
                        segment: *segment,
                        rect,
                    },
                    cost,
                    capacity: rect.area(),
                });
            }
        }
        best
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::legalizer::test::floorplan;
    use approx::assert_relative_eq;

    fn edge_to(graph: &Graph, from: NodeIndex, pred: impl Fn(&EdgeKind) -> bool) -> Edge {
        graph
            .node(from)
            .edges
            .iter()
            .find(|e| pred(&e.kind))
            .cloned()
            .expect("edge exists")
    }

    #[test]
    fn overlap_to_block_cost() {
        let _ = tracing_subscriber::fmt::try_init();
        let fp = floorplan![
            chip: (0, 0, 20, 20),
            soft: [
                a => 16, [(0, 0, 4, 4)];
                b => 16, [(2, 2, 6, 6)];
            ],
            fixed: []
        ];
        let config = LegalizerConfig::default();
        let graph = Graph::build(&fp).unwrap();
        let model = CostModel::new(&fp, &graph, &config);
        let overlap = graph.overlap_node(RegionId(0), RegionId(1)).unwrap();

        let edge = edge_to(&graph, overlap, |k| {
            *k == EdgeKind::OverlapToBlock { block: RegionId(0) }
        });
        let step = model.evaluate(&edge, 4).unwrap();
        // 4 / 12 of the area, utilization drops to 0.75, square bounding box
        assert_relative_eq!(step.cost, 250.0 + 250.0, epsilon = 1e-9);
        assert_eq!(step.capacity, 4);
        match step.hop {
            Hop::OverlapToBlock { block, sides, .. } => {
                assert_eq!(block, RegionId(0));
                assert_eq!(sides, vec![Direction::Down, Direction::Left]);
            }
            h => panic!("Unexpected hop {:?}", h),
        }
    }

    #[test]
    fn block_to_blank_cost() {
        let _ = tracing_subscriber::fmt::try_init();
        let fp = floorplan![
            chip: (0, 0, 10, 10),
            soft: [
                a => 16, [(0, 0, 4, 4)];
            ],
            fixed: []
        ];
        let config = LegalizerConfig::default();
        let graph = Graph::build(&fp).unwrap();
        let model = CostModel::new(&fp, &graph, &config);

        let edge = edge_to(&graph, NodeIndex(0), |k| {
            *k == EdgeKind::BlockToBlank { dir: Direction::Top }
        });
        let step = model.evaluate(&edge, 8).unwrap();
        assert_eq!(step.capacity, 8);
        match step.hop {
            Hop::BlockToBlank { rect, .. } => assert_eq!(rect, Rect::new(0, 4, 4, 6)),
            h => panic!("Unexpected hop {:?}", h),
        }
        // Still a full rectangle, 4x6: only the aspect ratio term remains
        assert_relative_eq!(step.cost, 0.5f64.powi(4) * 90.0, epsilon = 1e-9);
    }

    #[test]
    fn block_to_block_stops_at_wall_and_penalizes_fragmenting() {
        let _ = tracing_subscriber::fmt::try_init();
        let fp = floorplan![
            chip: (0, 0, 20, 20),
            soft: [
                a => 16, [(0, 0, 4, 4)];
                b => 8, [(0, 4, 4, 6)];
            ],
            fixed: []
        ];
        let config = LegalizerConfig::default();
        let graph = Graph::build(&fp).unwrap();
        let model = CostModel::new(&fp, &graph, &config);

        let edge = edge_to(&graph, NodeIndex(0), |k| {
            *k == EdgeKind::BlockToBlock {
                to: RegionId(1),
                dir: Direction::Top,
            }
        });
        let step = model.evaluate(&edge, 100).unwrap();
        assert_eq!(step.capacity, 8);
        match &step.hop {
            Hop::BlockToBlock { rect, .. } => assert_eq!(*rect, Rect::new(0, 4, 4, 6)),
            h => panic!("Unexpected hop {:?}", h),
        }
        assert!(step.cost >= config.bb_flat_cost);
        assert!(step.cost < config.fragment_penalty);

        // A thin victim wider than the donor splits in two when a middle bite is taken
        let fp = floorplan![
            chip: (0, 0, 20, 20),
            soft: [
                a => 4, [(2, 0, 4, 2)];
                b => 12, [(0, 2, 6, 4)];
            ],
            fixed: []
        ];
        let graph = Graph::build(&fp).unwrap();
        let model = CostModel::new(&fp, &graph, &config);
        let edge = edge_to(&graph, NodeIndex(0), |k| {
            *k == EdgeKind::BlockToBlock {
                to: RegionId(1),
                dir: Direction::Top,
            }
        });
        let step = model.evaluate(&edge, 4).unwrap();
        assert!(step.cost >= config.fragment_penalty);
    }
}
