//! Geometric collaborator for the floorplan legalizer: integer geometry, rectilinear polygon
//! sets, a tile plane spatial index, and the floorplan ownership model built on top of it.

pub mod floorplan;
pub mod geometry;
pub mod polygon;
pub mod tile_plane;

pub use floorplan::{Floorplan, FloorplanSpec, Region, RegionId, RegionKind, RegionSpec, Violation};
pub use geometry::{Area, Cord, Direction, Len, Rect, PLANAR_DIRECTIONS};
pub use polygon::RectSet;
pub use tile_plane::{TileId, TilePayload, TilePlane, TilePlaneError};
