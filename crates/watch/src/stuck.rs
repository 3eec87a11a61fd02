use glam::Vec3;
use worldtrack_common::PoolHandle;

use crate::hooks::VehicleSource;

pub const MAX_STUCK_CHECKS: usize = 16;

/// Position an unused slot holds, far outside any playable world.
const UNUSED_POSITION: Vec3 = Vec3::splat(-5000.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StuckEntry {
    pub vehicle: Option<PoolHandle>,
    /// Position at the last sample.
    pub position: Vec3,
    /// Movement below this distance between samples counts as stuck.
    pub radius: f32,
    /// Sampling interval.
    pub required_ms: u32,
    pub last_check_ms: u32,
    pub stuck: bool,
}

impl Default for StuckEntry {
    fn default() -> Self {
        Self {
            vehicle: None,
            position: UNUSED_POSITION,
            radius: 0.0,
            required_ms: 0,
            last_check_ms: 0,
            stuck: false,
        }
    }
}

/// Samples a few vehicles at a fixed interval each and flags those that
/// moved less than their radius since the previous sample.
#[derive(Debug, Clone)]
pub struct StuckCheck {
    entries: [StuckEntry; MAX_STUCK_CHECKS],
}

impl Default for StuckCheck {
    fn default() -> Self {
        Self {
            entries: [StuckEntry::default(); MAX_STUCK_CHECKS],
        }
    }
}

impl StuckCheck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start sampling `vehicle` from its current position at time `now_ms`.
    ///
    /// Returns `false` if the vehicle is not live or every slot is taken.
    pub fn add(
        &mut self,
        vehicle: PoolHandle,
        radius: f32,
        required_ms: u32,
        now_ms: u32,
        source: &impl VehicleSource,
    ) -> bool {
        let Some(sample) = source.sample_vehicle(vehicle) else {
            tracing::trace!(?vehicle, "stuck check ignoring missing vehicle");
            return false;
        };
        let Some(entry) = self.entries.iter_mut().find(|e| e.vehicle.is_none()) else {
            tracing::warn!(?vehicle, "stuck check full, vehicle dropped");
            return false;
        };
        *entry = StuckEntry {
            vehicle: Some(vehicle),
            position: sample.position,
            radius,
            required_ms,
            last_check_ms: now_ms,
            stuck: false,
        };
        true
    }

    /// Re-sample every slot whose interval has elapsed by `now_ms`. Slots
    /// still inside their interval are left alone. The clock may wrap.
    pub fn tick(&mut self, now_ms: u32, source: &impl VehicleSource) {
        for entry in &mut self.entries {
            let Some(vehicle) = entry.vehicle else {
                continue;
            };
            if now_ms.wrapping_sub(entry.last_check_ms) < entry.required_ms {
                continue;
            }
            let Some(sample) = source.sample_vehicle(vehicle) else {
                tracing::trace!(?vehicle, "stuck check dropped stale vehicle");
                *entry = StuckEntry::default();
                continue;
            };
            entry.stuck = sample.position.distance(entry.position) < entry.radius;
            entry.position = sample.position;
            entry.last_check_ms = now_ms;
        }
    }

    /// Result of the latest sample. `false` for vehicles not being tracked.
    pub fn is_stuck(&self, vehicle: PoolHandle) -> bool {
        self.entries
            .iter()
            .find(|e| e.vehicle == Some(vehicle))
            .is_some_and(|e| e.stuck)
    }

    pub fn remove(&mut self, vehicle: PoolHandle) {
        for entry in &mut self.entries {
            if entry.vehicle == Some(vehicle) {
                *entry = StuckEntry::default();
            }
        }
    }

    pub fn reset(&mut self) {
        self.entries = [StuckEntry::default(); MAX_STUCK_CHECKS];
    }

    pub fn entries(&self) -> &[StuckEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.vehicle.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    use crate::hooks::VehicleSample;

    #[derive(Default)]
    struct Garage(RefCell<HashMap<PoolHandle, Vec3>>);

    impl Garage {
        fn park(&self, handle: PoolHandle, position: Vec3) {
            self.0.borrow_mut().insert(handle, position);
        }
    }

    impl VehicleSource for Garage {
        fn sample_vehicle(&self, handle: PoolHandle) -> Option<VehicleSample> {
            self.0.borrow().get(&handle).map(|&position| VehicleSample {
                position,
                up: Vec3::Z,
                move_speed: Vec3::ZERO,
                turn_speed: Vec3::ZERO,
            })
        }
    }

    fn v(index: u32) -> PoolHandle {
        PoolHandle::new(index, 0)
    }

    #[test]
    fn stationary_vehicle_is_stuck_at_first_check_after_interval() {
        let garage = Garage::default();
        garage.park(v(0), Vec3::new(10.0, 10.0, 0.0));
        let mut check = StuckCheck::new();
        assert!(check.add(v(0), 0.5, 2000, 0, &garage));

        for now in (100..=2000).step_by(100) {
            // Drift within 0.1 units.
            let wobble = if now % 200 == 0 { 0.05 } else { -0.05 };
            garage.park(v(0), Vec3::new(10.0 + wobble, 10.0, 0.0));
            check.tick(now, &garage);
            assert_eq!(check.is_stuck(v(0)), now >= 2000, "at {now} ms");
        }
        assert_eq!(check.entries()[0].last_check_ms, 2000);
    }

    #[test]
    fn moving_vehicle_is_not_stuck() {
        let garage = Garage::default();
        garage.park(v(0), Vec3::ZERO);
        let mut check = StuckCheck::new();
        check.add(v(0), 0.5, 1000, 0, &garage);
        garage.park(v(0), Vec3::new(3.0, 0.0, 0.0));
        check.tick(1000, &garage);
        assert!(!check.is_stuck(v(0)));

        // The next interval measures from the new position.
        check.tick(2000, &garage);
        assert!(check.is_stuck(v(0)));
    }

    #[test]
    fn interval_survives_clock_wrap() {
        let garage = Garage::default();
        garage.park(v(0), Vec3::ZERO);
        let mut check = StuckCheck::new();
        check.add(v(0), 1.0, 500, u32::MAX - 100, &garage);
        check.tick(200, &garage);
        assert!(!check.is_stuck(v(0)));
        check.tick(399, &garage);
        assert!(check.is_stuck(v(0)));
    }

    #[test]
    fn missing_vehicle_is_not_added() {
        let garage = Garage::default();
        let mut check = StuckCheck::new();
        assert!(!check.add(v(3), 1.0, 100, 0, &garage));
        assert!(check.is_empty());
    }

    #[test]
    fn vanished_vehicle_resets_slot_when_due() {
        let garage = Garage::default();
        garage.park(v(0), Vec3::ZERO);
        let mut check = StuckCheck::new();
        check.add(v(0), 1.0, 1000, 0, &garage);
        garage.0.borrow_mut().clear();

        check.tick(500, &garage);
        assert_eq!(check.len(), 1);
        check.tick(1000, &garage);
        assert_eq!(check.entries()[0], StuckEntry::default());
    }

    #[test]
    fn full_registry_rejects() {
        let garage = Garage::default();
        let mut check = StuckCheck::new();
        for i in 0..=MAX_STUCK_CHECKS as u32 {
            garage.park(v(i), Vec3::ZERO);
        }
        for i in 0..MAX_STUCK_CHECKS as u32 {
            assert!(check.add(v(i), 1.0, 100, 0, &garage));
        }
        assert!(!check.add(v(MAX_STUCK_CHECKS as u32), 1.0, 100, 0, &garage));
        assert_eq!(check.len(), MAX_STUCK_CHECKS);
    }

    #[test]
    fn add_then_remove_restores_unused_slot() {
        let garage = Garage::default();
        garage.park(v(0), Vec3::ONE);
        let mut check = StuckCheck::new();
        check.add(v(0), 1.0, 100, 50, &garage);
        check.remove(v(0));
        assert_eq!(check.entries(), StuckCheck::new().entries());
        assert_eq!(check.entries()[0].position, Vec3::splat(-5000.0));
        assert!(!check.is_stuck(v(0)));
    }
}
