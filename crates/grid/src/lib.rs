//! Spatial partition: a fixed 2D array of sectors spanning the playable world.
//!
//! # Invariants
//! - An inserted entity is primary in exactly one sector (the one holding the
//!   midpoint of its bounding rectangle) and overlap in every other sector its
//!   rectangle spans.
//! - Insertion outside the grid is a logic error upstream and panics.
//! - Removal must be given the same rectangle used at insertion.

mod config;
mod grid;

pub use config::GridConfig;
pub use grid::{Membership, Sector, SectorCoord, SectorGrid, SectorSpan};
