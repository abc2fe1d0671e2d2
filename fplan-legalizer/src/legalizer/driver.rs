//! The outer loop: pick an overlap, search, migrate, update, repeat.

use anyhow::{anyhow, Context, Result};
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Reverse;
use std::collections::BTreeSet;

use fplan_common::{Area, Floorplan, RegionId, Violation};

use super::graph::{Graph, NodeIndex, NodeKind};
use super::migrate::{MigrationExecutor, MigrationReport};
use super::repair;
use super::search::PathSearch;
use super::{LegalizeResult, Legalizer, SelectionPolicy};
use crate::config::LegalizerConfig;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LegalizerStats {
    pub iterations: usize,
    pub searches: usize,
    pub migrations: usize,
    pub failed_migrations: usize,
    pub rebuilds: usize,
}

#[derive(Debug)]
pub enum StepOutcome {
    Migrated(MigrationReport),
    /// No overlap left.
    Done,
    /// Every remaining overlap was tried this round and none could be moved.
    Stuck,
}

pub struct DfsLegalizer {
    fp: Floorplan,
    graph: Graph,
    config: LegalizerConfig,
    rng: StdRng,
    iteration: usize,
    stats: LegalizerStats,
}

impl DfsLegalizer {
    pub fn new(fp: Floorplan, config: LegalizerConfig) -> Result<Self> {
        let graph = Graph::build(&fp).context("Building initial migration graph")?;
        Ok(Self {
            rng: StdRng::seed_from_u64(config.random_seed),
            fp,
            graph,
            config,
            iteration: 0,
            stats: LegalizerStats::default(),
        })
    }

    pub fn floorplan(&self) -> &Floorplan {
        &self.fp
    }

    pub fn into_floorplan(self) -> Floorplan {
        self.fp
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn config(&self) -> &LegalizerConfig {
        &self.config
    }

    pub fn stats(&self) -> &LegalizerStats {
        &self.stats
    }

    /// Overlap nodes with area left to resolve.
    pub fn overlaps_remaining(&self) -> usize {
        self.graph.live_overlaps(&self.fp).count()
    }

    pub fn overlap_area(&self) -> Area {
        self.fp.total_overlap_area()
    }

    fn log_stats(&self) {
        let overlap = self.overlap_area() as f64;
        let die = self.fp.chip().area().max(1) as f64;
        let physical = self
            .fp
            .region_ids()
            .map(|r| self.fp.actual_area(r))
            .sum::<Area>()
            .max(1) as f64;
        log::info!(
            "Iteration {}: {} overlaps, overlap area {}, o/d {:.4}%, o/p {:.4}%",
            self.iteration,
            self.overlaps_remaining(),
            overlap,
            overlap / die * 100.0,
            overlap / physical * 100.0
        );
    }

    /// Re-dice every soft block and rebuild the graph from scratch.
    pub fn rebuild(&mut self) -> Result<()> {
        for r in self.fp.soft_ids().collect_vec() {
            if self.fp.actual_area(r) > 0 {
                self.fp
                    .reshape_region(r)
                    .with_context(|| anyhow!("Reshaping {}", r))?;
            }
        }
        self.graph = Graph::build(&self.fp)?;
        self.stats.rebuilds += 1;
        Ok(())
    }

    /// Position in `candidates` of the overlap `policy` would attack next.
    fn select(&mut self, candidates: &[NodeIndex], policy: SelectionPolicy) -> Option<usize> {
        let fp = &self.fp;
        let graph = &self.graph;
        let area = |n: &NodeIndex| graph.node_area(fp, *n);
        let chip = fp.chip();
        let (cx, cy) = ((chip.xl + chip.xh) / 2, (chip.yl + chip.yh) / 2);
        let offset = |n: &NodeIndex| -> (i64, i64) {
            match graph.node_shape(fp, *n).bounding_box() {
                Some(b) => (
                    ((b.xl + b.xh) / 2 - cx) as i64,
                    ((b.yl + b.yh) / 2 - cy) as i64,
                ),
                None => (0, 0),
            }
        };
        let euclid = |n: &NodeIndex| {
            let (dx, dy) = offset(n);
            dx * dx + dy * dy
        };

        match policy {
            SelectionPolicy::LargestArea => {
                candidates.iter().position_min_by_key(|n| Reverse(area(*n)))
            }
            SelectionPolicy::SmallestArea => candidates.iter().position_min_by_key(|n| area(*n)),
            SelectionPolicy::NearestCenter => {
                candidates.iter().position_min_by_key(|n| euclid(*n))
            }
            SelectionPolicy::NearestCenterManhattan => {
                candidates.iter().position_min_by_key(|n| {
                    let (dx, dy) = offset(*n);
                    dx.abs() + dy.abs()
                })
            }
            SelectionPolicy::FarthestFromCenter => {
                candidates.iter().position_min_by_key(|n| Reverse(euclid(*n)))
            }
            SelectionPolicy::Random => {
                if candidates.is_empty() {
                    None
                } else {
                    Some(self.rng.gen_range(0..candidates.len()))
                }
            }
        }
    }

    /// One round: choose an overlap, find a path for it, apply it and patch the graph.
    /// Overlaps with no path are set aside for the rest of the round.
    pub fn step(&mut self, policy: SelectionPolicy) -> Result<StepOutcome> {
        if self.config.stats_interval > 0 && self.iteration % self.config.stats_interval == 0 {
            self.log_stats();
        }
        if self.iteration != 0
            && self.config.rebuild_interval > 0
            && self.iteration % self.config.rebuild_interval == 0
        {
            log::debug!("Periodic rebuild at iteration {}", self.iteration);
            self.rebuild()?;
        }
        self.iteration += 1;
        self.stats.iterations += 1;

        let mut tried: BTreeSet<(RegionId, RegionId)> = BTreeSet::new();
        loop {
            let candidates = self
                .graph
                .live_overlaps(&self.fp)
                .filter(|n| match self.graph.node(*n).kind {
                    NodeKind::Overlap(a, b) => !tried.contains(&(a, b)),
                    _ => false,
                })
                .collect_vec();
            if candidates.is_empty() {
                return Ok(if tried.is_empty() {
                    StepOutcome::Done
                } else {
                    StepOutcome::Stuck
                });
            }

            let chosen = match self.select(&candidates, policy) {
                Some(i) => candidates[i],
                None => return Ok(StepOutcome::Stuck),
            };
            if let NodeKind::Overlap(a, b) = self.graph.node(chosen).kind {
                tried.insert((a, b));
            }

            self.stats.searches += 1;
            let path = match PathSearch::new(&self.fp, &self.graph, &self.config).find_path(chosen) {
                Some(p) => p,
                None => {
                    log::debug!("{} has no path this round", chosen);
                    continue;
                }
            };

            let outcome =
                MigrationExecutor::new(&mut self.fp, &self.graph, &self.config).execute(&path);
            match outcome {
                Ok(report) => {
                    self.graph
                        .update(&self.fp, &report)
                        .with_context(|| anyhow!("Updating graph after migrating {}", chosen))?;
                    self.stats.migrations += 1;
                    log::debug!(
                        "Migrated {} of {} via {} hops",
                        report.resolvable_area,
                        chosen,
                        report.moved.len()
                    );
                    return Ok(StepOutcome::Migrated(report));
                }
                Err(e) => {
                    log::warn!("Migration for {} failed: {}", chosen, e);
                    self.stats.failed_migrations += 1;
                    self.rebuild()?;
                }
            }
        }
    }

    /// Legality of every block once overlaps are gone. Fixed blocks skip the aspect ratio check.
    fn final_check(&self) -> LegalizeResult {
        let mut area_fail = false;
        let mut other_fail = false;
        for r in self.fp.region_ids() {
            let region = self.fp.region(r);
            if region.legal_area == 0 {
                continue;
            }
            for v in self.fp.violations(r) {
                match v {
                    Violation::AspectRatio if !region.is_soft() => {}
                    Violation::Area => area_fail = true,
                    _ => other_fail = true,
                }
            }
        }
        if other_fail {
            LegalizeResult::OtherConstraintFail
        } else if area_fail {
            LegalizeResult::AreaConstraintFail
        } else {
            LegalizeResult::Success
        }
    }
}

impl Legalizer for DfsLegalizer {
    fn legalize(&mut self, policy: SelectionPolicy) -> Result<LegalizeResult> {
        let _span = tracing::info_span!("dfsl_legalize").entered();
        log::info!(
            "Legalizing with {} policy: {} overlaps, overlap area {}",
            policy,
            self.overlaps_remaining(),
            self.overlap_area()
        );

        loop {
            match self.step(policy)? {
                StepOutcome::Migrated(_) => {}
                StepOutcome::Done => break,
                StepOutcome::Stuck => {
                    log::error!(
                        "No remaining overlap can be resolved ({} left, area {})",
                        self.overlaps_remaining(),
                        self.overlap_area()
                    );
                    return Ok(LegalizeResult::OverlapNotResolved);
                }
            }
        }
        self.log_stats();

        let still_illegal = repair::repair_all(&mut self.fp)?;
        if !still_illegal.is_empty() {
            log::warn!("{} blocks still illegal after repair", still_illegal.len());
        }

        let result = self.final_check();
        log::info!("Legalization finished: {}", result);
        Ok(result)
    }
}
