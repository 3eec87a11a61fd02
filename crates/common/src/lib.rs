//! Shared value types for the worldtrack crates.
//!
//! Identity, placement and 2D bounds are plain `Copy` values so every other
//! crate can pass them around without touching entity storage.

mod types;

pub use types::{EntityId, EntityType, PoolHandle, Rect, Transform};
