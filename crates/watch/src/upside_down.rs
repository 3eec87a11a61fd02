use worldtrack_common::PoolHandle;

use crate::hooks::{VehicleSample, VehicleSource};

pub const MAX_UPSIDE_DOWN_CHECKS: usize = 6;

/// Up-vector Z at or below which a vehicle counts as on its roof.
const FLIPPED_UP_Z: f32 = -0.97;
const RESTING_MOVE_SPEED: f32 = 0.01;
const RESTING_TURN_SPEED: f32 = 0.02;
/// A vehicle must stay flipped strictly longer than this.
const FLIPPED_FOR_MS: u32 = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlipEntry {
    pub vehicle: Option<PoolHandle>,
    /// Milliseconds spent resting upside down without interruption.
    pub timer_ms: u32,
}

impl FlipEntry {
    fn flipped_long_enough(&self) -> bool {
        self.vehicle.is_some() && self.timer_ms > FLIPPED_FOR_MS
    }
}

/// Whether a vehicle is resting on its roof. A tumbling vehicle does not
/// count, only one that is nearly still.
pub fn is_resting_upside_down(sample: &VehicleSample) -> bool {
    sample.up.z <= FLIPPED_UP_Z
        && sample.move_speed.length() < RESTING_MOVE_SPEED
        && sample.turn_speed.length() < RESTING_TURN_SPEED
}

/// Tracks how long each of a few vehicles has rested upside down.
#[derive(Debug, Clone, Default)]
pub struct UpsideDownCheck {
    entries: [FlipEntry; MAX_UPSIDE_DOWN_CHECKS],
}

impl UpsideDownCheck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `vehicle` with a zero timer. Dropped when full.
    pub fn add(&mut self, vehicle: PoolHandle) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.vehicle.is_none()) else {
            tracing::warn!(?vehicle, "upside-down check full, vehicle dropped");
            return false;
        };
        *entry = FlipEntry {
            vehicle: Some(vehicle),
            timer_ms: 0,
        };
        true
    }

    /// Advance every timer by `delta_ms`. A vehicle that is no longer live
    /// frees its slot; one that is not resting upside down restarts at zero.
    pub fn tick(&mut self, delta_ms: u32, source: &impl VehicleSource) {
        for entry in &mut self.entries {
            let Some(vehicle) = entry.vehicle else {
                continue;
            };
            match source.sample_vehicle(vehicle) {
                Some(sample) if is_resting_upside_down(&sample) => {
                    entry.timer_ms = entry.timer_ms.saturating_add(delta_ms);
                }
                Some(_) => entry.timer_ms = 0,
                None => {
                    tracing::trace!(?vehicle, "upside-down check dropped stale vehicle");
                    *entry = FlipEntry::default();
                }
            }
        }
    }

    pub fn is_any_flipped_long_enough(&self) -> bool {
        self.entries.iter().any(FlipEntry::flipped_long_enough)
    }

    /// `false` for vehicles not being tracked.
    pub fn has_been_flipped_long_enough(&self, vehicle: PoolHandle) -> bool {
        self.entries
            .iter()
            .find(|e| e.vehicle == Some(vehicle))
            .is_some_and(FlipEntry::flipped_long_enough)
    }

    pub fn remove(&mut self, vehicle: PoolHandle) {
        for entry in &mut self.entries {
            if entry.vehicle == Some(vehicle) {
                *entry = FlipEntry::default();
            }
        }
    }

    pub fn reset(&mut self) {
        self.entries = [FlipEntry::default(); MAX_UPSIDE_DOWN_CHECKS];
    }

    pub fn entries(&self) -> &[FlipEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.vehicle.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
