//! [`World`] as the collaborator behind every watchdog.

use glam::Vec3;
use worldtrack_common::{EntityId, EntityType, PoolHandle};
use worldtrack_kernel::{EntityStatus, World};

use crate::hooks::{EntityCleanup, VehicleSample, VehicleSource};

impl VehicleSource for World {
    fn sample_vehicle(&self, handle: PoolHandle) -> Option<VehicleSample> {
        let vehicle = self.vehicle(handle)?;
        Some(VehicleSample {
            position: vehicle.position(),
            up: vehicle.up(),
            move_speed: vehicle.move_speed,
            turn_speed: vehicle.turn_speed,
        })
    }
}

impl EntityCleanup for World {
    fn is_resident(&self, id: EntityId) -> bool {
        self.entity(id).is_some()
    }

    /// Vehicles are also brought to rest and, unless wrecked, left abandoned
    /// so the traffic simulation can reclaim them.
    fn cleanup_vehicle(&mut self, handle: PoolHandle) {
        let id = EntityId::new(EntityType::Vehicle, handle);
        release(self, id);
        if let Some(entity) = self.entity_mut(id) {
            if entity.status != EntityStatus::Wrecked {
                entity.status = EntityStatus::Abandoned;
            }
        }
        if self.set_velocity(id, Vec3::ZERO, Vec3::ZERO).is_ok() {
            tracing::trace!(%id, "mission vehicle stopped");
        }
    }

    fn cleanup_ped(&mut self, handle: PoolHandle) {
        release(self, EntityId::new(EntityType::Ped, handle));
    }

    fn cleanup_object(&mut self, handle: PoolHandle) {
        release(self, EntityId::new(EntityType::Object, handle));
    }
}

/// Hand a mission entity back to the simulation: streaming may evict it again.
fn release(world: &mut World, id: EntityId) {
    if let Some(entity) = world.entity_mut(id) {
        entity.flags.streaming_dont_delete = false;
        tracing::debug!(%id, "released mission entity");
    }
}
