//! Overlap legalization for chip floorplans, by migrating overlap area along cheapest paths in
//! a graph of blocks and blank space.

pub mod config;
pub mod legalizer;
