//! Fixed-capacity watchdog registries driven once per simulation tick.
//!
//! None of these registries own the entities they track. They hold pool
//! handles and re-resolve them through a collaborator each time they look,
//! clearing their own slot when the handle has gone stale.
//!
//! - [`MissionCleanup`]: entities to hand back to the simulation when a
//!   mission ends.
//! - [`UpsideDownCheck`]: how long each tracked vehicle has rested on its roof.
//! - [`StuckCheck`]: whether each tracked vehicle has stayed put over a
//!   sampling interval.
//!
//! Capacity is fixed at compile time. A registration that finds no free slot
//! is dropped and logged.

pub mod cleanup;
pub mod hooks;
pub mod host;
pub mod mission;
pub mod stuck;
pub mod upside_down;

pub use cleanup::{CleanupEntry, CleanupKind, MissionCleanup, MAX_CLEANUP};
pub use hooks::{
    EntityCleanup, GlobalReset, SimulationControl, SimulationParams, VehicleSample, VehicleSource,
    MISSION_END_RESETS,
};
pub use mission::MissionWatch;
pub use stuck::{StuckCheck, StuckEntry, MAX_STUCK_CHECKS};
pub use upside_down::{FlipEntry, UpsideDownCheck, MAX_UPSIDE_DOWN_CHECKS};
