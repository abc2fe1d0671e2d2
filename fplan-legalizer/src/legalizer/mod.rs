use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

pub mod construct;
pub mod cost;
pub mod driver;
pub mod graph;
pub mod migrate;
pub mod repair;
pub mod search;
pub mod segment;
mod update;

pub use cost::{CostModel, Hop, MigrationEdge};
pub use driver::{DfsLegalizer, LegalizerStats, StepOutcome};
pub use graph::{Edge, EdgeKind, EdgeTarget, Graph, Node, NodeIndex, NodeKind, SignatureEntry};
pub use migrate::{MigrationError, MigrationExecutor, MigrationReport};
pub use search::{MigrationPath, PathSearch};
pub use segment::Segment;

/// How a legalization run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegalizeResult {
    Success,
    /// Some overlap had no affordable path.
    OverlapNotResolved,
    /// No overlaps remain, but some block is below its legal area.
    AreaConstraintFail,
    /// No overlaps remain, but some block fails a shape check.
    OtherConstraintFail,
}

impl Display for LegalizeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LegalizeResult::Success => "success",
            LegalizeResult::OverlapNotResolved => "overlap not resolved",
            LegalizeResult::AreaConstraintFail => "area constraint failed",
            LegalizeResult::OtherConstraintFail => "other constraint failed",
        };
        f.write_str(s)
    }
}

/// Which overlap the driver attacks next.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionPolicy {
    #[default]
    LargestArea,
    SmallestArea,
    /// Closest to the chip center, by euclidean distance.
    NearestCenter,
    NearestCenterManhattan,
    FarthestFromCenter,
    /// Uniformly at random, from the configured seed.
    Random,
}

impl Display for SelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SelectionPolicy::LargestArea => "largest",
            SelectionPolicy::SmallestArea => "smallest",
            SelectionPolicy::NearestCenter => "nearest",
            SelectionPolicy::NearestCenterManhattan => "nearest-manhattan",
            SelectionPolicy::FarthestFromCenter => "farthest",
            SelectionPolicy::Random => "random",
        };
        f.write_str(s)
    }
}

impl FromStr for SelectionPolicy {
    type Err = anyhow::Error;

    /// Accepts the policy names and the numeric modes 0 to 5.
    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim() {
            "0" | "largest" => SelectionPolicy::LargestArea,
            "1" | "smallest" => SelectionPolicy::SmallestArea,
            "2" | "nearest" => SelectionPolicy::NearestCenter,
            "3" | "random" => SelectionPolicy::Random,
            "4" | "nearest-manhattan" => SelectionPolicy::NearestCenterManhattan,
            "5" | "farthest" => SelectionPolicy::FarthestFromCenter,
            other => bail!("Unknown selection policy {:?}", other),
        })
    }
}

/// Abstract interface over legalizers. Removes every overlap from the floorplan it owns and
/// reports whether the result is legal.
pub trait Legalizer {
    /// Collaborator failures are errors. Failing to legalize is a [LegalizeResult].
    fn legalize(&mut self, policy: SelectionPolicy) -> Result<LegalizeResult>;
}
