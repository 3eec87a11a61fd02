use crate::cleanup::MissionCleanup;
use crate::hooks::{EntityCleanup, SimulationControl, VehicleSource};
use crate::stuck::StuckCheck;
use crate::upside_down::UpsideDownCheck;

/// The three per-mission registries, driven together.
#[derive(Debug, Clone, Default)]
pub struct MissionWatch {
    pub cleanup: MissionCleanup,
    pub upside_down: UpsideDownCheck,
    pub stuck: StuckCheck,
}

impl MissionWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-tick update. `delta_ms` feeds the flip timers, `now_ms` the
    /// stuck sampling clock.
    pub fn update(&mut self, delta_ms: u32, now_ms: u32, vehicles: &impl VehicleSource) {
        self.upside_down.tick(delta_ms, vehicles);
        self.stuck.tick(now_ms, vehicles);
    }

    /// Mission end: both watchdogs start over and the cleanup list is swept.
    /// Returns how many entities were cleaned up.
    pub fn end_mission(
        &mut self,
        sim: &mut impl SimulationControl,
        entities: &mut impl EntityCleanup,
    ) -> usize {
        self.upside_down.reset();
        self.stuck.reset();
        self.cleanup.sweep(sim, entities)
    }
}
