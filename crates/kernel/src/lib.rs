//! World kernel: entities, their pools, weak back-references and the world
//! that owns them all.
//!
//! # Invariants
//! - An entity's bounding rectangle is always derived from its current
//!   transform; the grid is updated whenever the world moves an entity.
//! - Grid removal uses the rectangle recorded at insertion, so an entity
//!   moved behind the world's back still leaves no stale sector entries.
//! - Destroying an entity nulls every registered holder still naming it
//!   before its pool slot can be reused.
//! - All bookkeeping is preallocated. Exhaustion drops the request.

pub mod config;
pub mod entity;
pub mod flags;
pub mod pool;
pub mod references;
pub mod world;

pub use config::{ConfigError, PoolConfig, WorldConfig};
pub use entity::{Entity, Physical};
pub use flags::{EntityFlags, EntityStatus, FlagsError};
pub use pool::{Pool, Pools};
pub use references::{HolderId, HolderTable, RefChain, ReferenceRegistry};
pub use world::{World, WorldError};
