//! Bounded depth first search for the cheapest chain of migrations draining an overlap.

use fplan_common::{Area, Floorplan};

use super::cost::{CostModel, MigrationEdge};
use super::graph::{Edge, EdgeTarget, Graph, NodeIndex, NodeKind};
use crate::config::LegalizerConfig;

/// A resolved path out of an overlap node. No node appears twice.
#[derive(Clone, Debug)]
pub struct MigrationPath {
    pub overlap: NodeIndex,
    pub edges: Vec<MigrationEdge>,
    pub cost: f64,
    /// Area every hop of the path can carry. Never more than the overlap area.
    pub carried: Area,
}

/// Where the search currently is, and the best complete path so far.
struct SearchContext {
    path: Vec<MigrationEdge>,
    on_path: Vec<NodeIndex>,
    best: Option<MigrationPath>,
}

impl SearchContext {
    fn best_cost(&self) -> f64 {
        self.best.as_ref().map(|b| b.cost).unwrap_or(f64::INFINITY)
    }
}

pub struct PathSearch<'a> {
    fp: &'a Floorplan,
    graph: &'a Graph,
    config: &'a LegalizerConfig,
    model: CostModel<'a>,
}

impl<'a> PathSearch<'a> {
    pub fn new(fp: &'a Floorplan, graph: &'a Graph, config: &'a LegalizerConfig) -> Self {
        Self {
            fp,
            graph,
            config,
            model: CostModel::new(fp, graph, config),
        }
    }

    /// Cheapest path from `overlap` to blank space or to a block with enough spare area to
    /// absorb what it loses. `None` if every branch costs too much or dead-ends.
    pub fn find_path(&self, overlap: NodeIndex) -> Option<MigrationPath> {
        if !self.graph.node(overlap).kind.is_overlap() {
            return None;
        }
        let area = self.graph.node_area(self.fp, overlap);
        if area == 0 {
            return None;
        }

        let mut ctx = SearchContext {
            path: Vec::new(),
            on_path: vec![overlap],
            best: None,
        };
        for edge in self.graph.node(overlap).edges.iter() {
            self.visit(overlap, edge, 0.0, area, &mut ctx);
        }

        match &ctx.best {
            Some(best) => log::debug!(
                "Path for {}: {} hops, cost {:.2}, carrying {}",
                overlap,
                best.edges.len(),
                best.cost,
                best.carried
            ),
            None => log::debug!("No path for {}", overlap),
        }
        ctx.best
    }

    /// A block that can lose `carried` and still meet its legal area ends the path.
    fn absorbs(&self, node: NodeIndex, carried: Area) -> bool {
        match self.graph.node(node).kind {
            NodeKind::Soft(r) => {
                self.fp.actual_area(r) - self.fp.region(r).legal_area >= carried
            }
            _ => false,
        }
    }

    fn record(&self, overlap: NodeIndex, cost: f64, carried: Area, ctx: &mut SearchContext) {
        if cost < self.config.max_cost_cutoff && cost < ctx.best_cost() {
            log::trace!("New best for {}: cost {:.2}", overlap, cost);
            ctx.best = Some(MigrationPath {
                overlap,
                edges: ctx.path.clone(),
                cost,
                carried,
            });
        }
    }

    fn visit(
        &self,
        overlap: NodeIndex,
        edge: &Edge,
        cost_so_far: f64,
        carried: Area,
        ctx: &mut SearchContext,
    ) {
        let step = match self.model.evaluate(edge, carried) {
            Some(s) => s,
            None => return,
        };
        let cost = cost_so_far + step.cost;
        let carried = carried.min(step.capacity);
        if carried <= 0 {
            return;
        }

        ctx.path.push(step);
        match edge.to() {
            EdgeTarget::Blank => self.record(overlap, cost, carried, ctx),
            EdgeTarget::Node(next) => {
                if self.absorbs(next, carried) {
                    self.record(overlap, cost, carried, ctx);
                } else if cost < self.config.max_cost_cutoff && cost < ctx.best_cost() {
                    ctx.on_path.push(next);
                    for e in self.graph.node(next).edges.iter() {
                        let seen = match e.to() {
                            EdgeTarget::Node(n) => ctx.on_path.contains(&n),
                            EdgeTarget::Blank => false,
                        };
                        if !seen {
                            self.visit(overlap, e, cost, carried, ctx);
                        }
                    }
                    ctx.on_path.pop();
                }
            }
        }
        ctx.path.pop();
    }
}
