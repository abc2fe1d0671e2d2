//! The migration graph: one node per block, one per pair of blocks that overlap, and edges for
//! every way area can flow between them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use fplan_common::{Area, Direction, Floorplan, Rect, RectSet, RegionId, TileId};

use super::segment::Segment;

/// Stable index of a node. Soft blocks come first, then fixed blocks, then overlaps. A block's
/// node index equals its [RegionId].
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(pub u32);

impl Display for NodeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<RegionId> for NodeIndex {
    fn from(r: RegionId) -> Self {
        NodeIndex(r.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKind {
    Soft(RegionId),
    Fixed(RegionId),
    /// Area claimed by both owners, lower id first.
    Overlap(RegionId, RegionId),
}

impl NodeKind {
    pub fn region(&self) -> Option<RegionId> {
        match self {
            NodeKind::Soft(r) | NodeKind::Fixed(r) => Some(*r),
            NodeKind::Overlap(..) => None,
        }
    }

    pub fn is_overlap(&self) -> bool {
        matches!(self, NodeKind::Overlap(..))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeKind {
    /// The block gives up its claim on the overlap.
    OverlapToBlock { block: RegionId },
    /// The `from` block takes area from `to` across its `dir` side.
    BlockToBlock { to: RegionId, dir: Direction },
    /// The `from` block grows into blank space across its `dir` side.
    BlockToBlank { dir: Direction },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeTarget {
    Node(NodeIndex),
    Blank,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub from: NodeIndex,
    pub kind: EdgeKind,
    /// Spliced tangent segments, sorted.
    pub segments: Vec<Segment>,
}

impl Edge {
    pub fn to(&self) -> EdgeTarget {
        match self.kind {
            EdgeKind::OverlapToBlock { block } => EdgeTarget::Node(block.into()),
            EdgeKind::BlockToBlock { to, .. } => EdgeTarget::Node(to.into()),
            EdgeKind::BlockToBlank { .. } => EdgeTarget::Blank,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    /// Tiles making up an overlap node. Empty for blocks, which read their tiles from the
    /// floorplan.
    pub(crate) tiles: Vec<TileId>,
    pub edges: Vec<Edge>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            tiles: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn tiles(&self) -> &[TileId] {
        &self.tiles
    }
}

/// One entry of [Graph::signature].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SignatureEntry {
    Overlap {
        owners: (RegionId, RegionId),
        rects: Vec<Rect>,
    },
    Edge {
        from: NodeKind,
        kind: EdgeKind,
        segments: Vec<Segment>,
    },
}

pub struct Graph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) soft_count: usize,
    pub(crate) fixed_count: usize,
    pub(crate) overlap_index: BTreeMap<(RegionId, RegionId), NodeIndex>,
}

impl Graph {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.0 as usize]
    }

    pub fn soft_count(&self) -> usize {
        self.soft_count
    }

    pub fn fixed_count(&self) -> usize {
        self.fixed_count
    }

    pub fn block_count(&self) -> usize {
        self.soft_count + self.fixed_count
    }

    /// Indices of every overlap node, including ones that have been drained to zero area.
    pub fn overlap_nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        (self.block_count()..self.nodes.len()).map(|i| NodeIndex(i as u32))
    }

    pub fn overlap_node(&self, a: RegionId, b: RegionId) -> Option<NodeIndex> {
        let key = if a < b { (a, b) } else { (b, a) };
        self.overlap_index.get(&key).copied()
    }

    /// Geometry behind a node: the block tiles of a block, the tiles of an overlap.
    pub fn node_shape(&self, fp: &Floorplan, index: NodeIndex) -> RectSet {
        let node = self.node(index);
        match node.kind {
            NodeKind::Soft(r) | NodeKind::Fixed(r) => fp.block_shape(r),
            NodeKind::Overlap(..) => node
                .tiles
                .iter()
                .filter_map(|t| fp.plane().get(*t).map(|t| t.rect))
                .collect(),
        }
    }

    pub fn node_area(&self, fp: &Floorplan, index: NodeIndex) -> Area {
        let node = self.node(index);
        match node.kind {
            NodeKind::Soft(r) | NodeKind::Fixed(r) => fp
                .region(r)
                .block_tiles()
                .iter()
                .filter_map(|t| fp.plane().get(*t))
                .map(|t| t.rect.area())
                .sum(),
            NodeKind::Overlap(..) => node
                .tiles
                .iter()
                .filter_map(|t| fp.plane().get(*t))
                .map(|t| t.rect.area())
                .sum(),
        }
    }

    /// Overlap nodes that still have area to resolve.
    pub fn live_overlaps<'a>(&'a self, fp: &'a Floorplan) -> impl Iterator<Item = NodeIndex> + 'a {
        self.overlap_nodes()
            .filter(move |n| self.node_area(fp, *n) > 0)
    }

    /// Order independent description of the graph, used to compare two graphs built different
    /// ways. Overlaps with no area and their edges are left out. Overlaps are identified by their
    /// owners rather than their index, which depends on when the node was created.
    pub fn signature(&self, fp: &Floorplan) -> BTreeSet<SignatureEntry> {
        let mut out = BTreeSet::new();
        for (i, node) in self.nodes.iter().enumerate() {
            let index = NodeIndex(i as u32);
            if let NodeKind::Overlap(a, b) = node.kind {
                let shape = self.node_shape(fp, index);
                if shape.is_empty() {
                    continue;
                }
                out.insert(SignatureEntry::Overlap {
                    owners: (a, b),
                    rects: shape.dice(),
                });
            }
            for edge in node.edges.iter() {
                let mut segments = edge.segments.clone();
                segments.sort();
                out.insert(SignatureEntry::Edge {
                    from: node.kind,
                    kind: edge.kind,
                    segments,
                });
            }
        }
        out
    }
}
