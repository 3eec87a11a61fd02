use glam::{Mat3, Vec3};
use worldtrack_assets::{ColModel, GraphicsInstance, ModelId, ModelStore};
use worldtrack_common::{EntityId, EntityType, PoolHandle, Rect, Transform};
use worldtrack_grid::SectorGrid;

use crate::config::WorldConfig;
use crate::entity::{Entity, Physical};
use crate::pool::Pools;
use crate::references::{HolderId, HolderTable, ReferenceRegistry};

/// Errors from world operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("{0} pool is full")]
    PoolFull(EntityType),
    #[error("unknown model {0:?}")]
    UnknownModel(ModelId),
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),
    #[error("entity {0} does not move")]
    NotPhysical(EntityId),
}

/// The authoritative world state.
///
/// Owns every entity pool, the sector grid, the weak reference registry and
/// the holder locations it points at. All mutations that change an entity's
/// bounds go through here so grid membership always matches the current
/// transform.
pub struct World {
    config: WorldConfig,
    models: ModelStore,
    grid: SectorGrid,
    references: ReferenceRegistry,
    holders: HolderTable,
    pools: Pools,
    instanced_buildings: usize,
    /// Simulation clock in milliseconds. Wraps.
    time_ms: u32,
    tick: u64,
}

impl World {
    /// Create an empty world. Every pool and the reference registry are
    /// allocated upfront.
    ///
    /// # Panics
    /// If the config's grid has no extent or a pool has zero capacity. Use
    /// [`WorldConfig::validate`] on untrusted input first.
    pub fn new(config: WorldConfig, models: ModelStore) -> Self {
        let _span = tracing::info_span!("world_new").entered();
        let world = Self {
            grid: SectorGrid::new(config.grid),
            references: ReferenceRegistry::new(config.reference_capacity),
            holders: HolderTable::new(),
            pools: Pools::new(&config.pools),
            models,
            config,
            instanced_buildings: 0,
            time_ms: 0,
            tick: 0,
        };
        tracing::debug!(
            sectors = world.config.grid.sector_count(),
            references = world.config.reference_capacity,
            models = world.models.len(),
            "world created"
        );
        world
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn models(&self) -> &ModelStore {
        &self.models
    }

    pub fn models_mut(&mut self) -> &mut ModelStore {
        &mut self.models
    }

    pub fn grid(&self) -> &SectorGrid {
        &self.grid
    }

    pub fn references(&self) -> &ReferenceRegistry {
        &self.references
    }

    pub fn holders(&self) -> &HolderTable {
        &self.holders
    }

    pub fn pools(&self) -> &Pools {
        &self.pools
    }

    /// Current simulation tick.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Milliseconds since the world was created, wrapping at `u32::MAX`.
    pub fn time_ms(&self) -> u32 {
        self.time_ms
    }

    /// Buildings that currently own a graphics instance.
    pub fn instanced_buildings(&self) -> usize {
        self.instanced_buildings
    }

    pub fn entity_count(&self) -> usize {
        self.pools.len()
    }

    pub fn ids(&self, kind: EntityType) -> Vec<EntityId> {
        self.pools.ids(kind)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.pools.get(id)
    }

    /// Mutable access for flags and status. Moving an entity through this
    /// reference leaves its grid membership where it was until the next
    /// [`World::set_transform`]; destruction still clears the old sectors.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.pools.get_mut(id)
    }

    pub fn physical(&self, id: EntityId) -> Option<&Physical> {
        self.pools.physical(id.kind)?.get(id.handle)
    }

    pub fn vehicle(&self, handle: PoolHandle) -> Option<&Physical> {
        self.pools.vehicles.get(handle)
    }

    /// Current bounding rectangle of a live entity.
    pub fn bound_rect(&self, id: EntityId) -> Option<Rect> {
        let entity = self.pools.get(id)?;
        let col = self.models.col_model(entity.model())?;
        Some(entity.bound_rect(col))
    }

    /// Allocate an entity of `kind` and insert it into the grid.
    ///
    /// # Panics
    /// If the entity's bounds fall outside the grid.
    pub fn spawn(
        &mut self,
        kind: EntityType,
        model: ModelId,
        transform: Transform,
    ) -> Result<EntityId, WorldError> {
        let col = self.col_model(model)?;
        let id = self
            .pools
            .allocate(kind, |id| Entity::new(id, model, transform))
            .ok_or(WorldError::PoolFull(kind))?;
        let entity = self.pools.get_mut(id).ok_or(WorldError::EntityNotFound(id))?;
        let rect = entity.bound_rect(&col);
        self.grid.insert(id, &rect);
        entity.grid_rect = Some(rect);
        tracing::debug!(%id, ?model, position = ?transform.position, "spawned");
        Ok(id)
    }

    /// Remove an entity from the world.
    ///
    /// Grid membership goes first, then every holder still naming the entity
    /// is cleared, then the graphics instance is dropped, and only then is
    /// the pool slot released for reuse.
    pub fn destroy(&mut self, id: EntityId) -> Result<(), WorldError> {
        let entity = self.pools.get_mut(id).ok_or(WorldError::EntityNotFound(id))?;
        if let Some(rect) = entity.grid_rect.take() {
            self.grid.remove(id, &rect);
        }
        let cleared = self.references.resolve_all(entity, &mut self.holders);
        if entity.has_instance() && id.kind.is_building() {
            self.instanced_buildings -= 1;
        }
        entity.delete_instance(&mut self.models);
        self.pools.free(id);
        tracing::debug!(%id, cleared, "destroyed");
        Ok(())
    }

    /// Move an entity, keeping its grid membership in step.
    pub fn set_transform(&mut self, id: EntityId, transform: Transform) -> Result<(), WorldError> {
        self.regrid(id, |entity, _| entity.set_transform(transform))
    }

    pub fn set_velocity(
        &mut self,
        id: EntityId,
        move_speed: Vec3,
        turn_speed: Vec3,
    ) -> Result<(), WorldError> {
        let physical = self
            .pools
            .physical_mut(id.kind)
            .ok_or(WorldError::NotPhysical(id))?
            .get_mut(id.handle)
            .ok_or(WorldError::EntityNotFound(id))?;
        physical.move_speed = move_speed;
        physical.turn_speed = turn_speed;
        Ok(())
    }

    /// Give an entity a graphics instance built from its model. Returns
    /// `false` if it already had one.
    pub fn create_instance(&mut self, id: EntityId) -> Result<bool, WorldError> {
        let entity = self.pools.get_mut(id).ok_or(WorldError::EntityNotFound(id))?;
        let created = entity.create_instance(&mut self.models);
        if created && id.kind.is_building() {
            self.instanced_buildings += 1;
        }
        Ok(created)
    }

    pub fn delete_instance(&mut self, id: EntityId) -> Result<(), WorldError> {
        let entity = self.pools.get_mut(id).ok_or(WorldError::EntityNotFound(id))?;
        if entity.has_instance() && id.kind.is_building() {
            self.instanced_buildings -= 1;
        }
        entity.delete_instance(&mut self.models);
        Ok(())
    }

    /// Hand an externally built instance to an entity. The entity moves to
    /// the instance's transform.
    pub fn attach_instance(
        &mut self,
        id: EntityId,
        instance: GraphicsInstance,
    ) -> Result<(), WorldError> {
        let had_instance = self.entity(id).is_some_and(Entity::has_instance);
        self.regrid(id, |entity, models| entity.attach_instance(instance, models))?;
        if !had_instance && id.kind.is_building() {
            self.instanced_buildings += 1;
        }
        Ok(())
    }

    pub fn detach_instance(&mut self, id: EntityId) -> Result<Option<GraphicsInstance>, WorldError> {
        let entity = self.pools.get_mut(id).ok_or(WorldError::EntityNotFound(id))?;
        let instance = entity.detach_instance(&mut self.models);
        if instance.is_some() && id.kind.is_building() {
            self.instanced_buildings -= 1;
        }
        Ok(instance)
    }

    /// Create a new holder location, initially holding `value`. Not
    /// registered with any entity.
    pub fn alloc_holder(&mut self, value: Option<EntityId>) -> HolderId {
        self.holders.alloc(value)
    }

    /// Release a holder location for reuse. Reference slots still pointing
    /// at it are released on the next prune of their entity.
    pub fn free_holder(&mut self, holder: HolderId) -> bool {
        self.holders.free(holder)
    }

    /// Overwrite a holder without touching any registration.
    pub fn set_holder(&mut self, holder: HolderId, value: Option<EntityId>) {
        self.holders.set(holder, value);
    }

    /// The live entity a holder names, if any.
    pub fn resolve_holder(&self, holder: HolderId) -> Option<&Entity> {
        self.pools.get(self.holders.get(holder)?)
    }

    /// Point `holder` at `id` and register it so destruction clears it.
    /// Returns whether the registration was recorded.
    pub fn store_reference(&mut self, holder: HolderId, id: EntityId) -> Result<bool, WorldError> {
        let entity = self.pools.get_mut(id).ok_or(WorldError::EntityNotFound(id))?;
        self.holders.set(holder, Some(id));
        Ok(self.references.register(entity, holder))
    }

    /// Register an existing holder against `id` without writing it.
    pub fn register_reference(&mut self, id: EntityId, holder: HolderId) -> Result<bool, WorldError> {
        let entity = self.pools.get_mut(id).ok_or(WorldError::EntityNotFound(id))?;
        Ok(self.references.register(entity, holder))
    }

    /// Release slots of holders that no longer name `id`.
    pub fn prune_references(&mut self, id: EntityId) -> Result<usize, WorldError> {
        let entity = self.pools.get_mut(id).ok_or(WorldError::EntityNotFound(id))?;
        Ok(self.references.prune(entity, &self.holders))
    }

    /// Prune every live entity's chain. Returns slots released.
    pub fn prune_all_references(&mut self) -> usize {
        let mut released = 0;
        for kind in EntityType::ALL {
            for id in self.pools.ids(kind) {
                if let Some(entity) = self.pools.get_mut(id) {
                    released += self.references.prune(entity, &self.holders);
                }
            }
        }
        if released > 0 {
            tracing::debug!(released, "pruned stale references");
        }
        released
    }

    /// Advance the clock by `delta_ms` and move every moving entity by one
    /// tick of its velocity.
    pub fn step(&mut self, delta_ms: u32) {
        self.tick += 1;
        self.time_ms = self.time_ms.wrapping_add(delta_ms);

        let mut moving = Vec::new();
        for kind in [EntityType::Vehicle, EntityType::Ped, EntityType::Object] {
            let Some(pool) = self.pools.physical(kind) else {
                continue;
            };
            moving.extend(
                pool.iter()
                    .filter(|(_, p)| p.move_speed != Vec3::ZERO || p.turn_speed != Vec3::ZERO)
                    .map(|(h, p)| (EntityId::new(kind, h), advance(p))),
            );
        }
        for (id, transform) in moving {
            if let Err(err) = self.set_transform(id, transform) {
                tracing::warn!(%id, %err, "could not advance entity");
            }
        }
        tracing::trace!(tick = self.tick, time_ms = self.time_ms, "stepped");
    }

    fn col_model(&self, model: ModelId) -> Result<ColModel, WorldError> {
        self.models
            .col_model(model)
            .copied()
            .ok_or(WorldError::UnknownModel(model))
    }

    /// Run `f` with the entity taken out of the grid, then re-insert it
    /// under its new bounds.
    fn regrid<R>(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut Entity, &mut ModelStore) -> R,
    ) -> Result<R, WorldError> {
        let entity = self.pools.get_mut(id).ok_or(WorldError::EntityNotFound(id))?;
        let model = entity.model();
        let col = *self
            .models
            .col_model(model)
            .ok_or(WorldError::UnknownModel(model))?;
        if let Some(rect) = entity.grid_rect.take() {
            self.grid.remove(id, &rect);
        }
        let result = f(entity, &mut self.models);
        let rect = entity.bound_rect(&col);
        self.grid.insert(id, &rect);
        entity.grid_rect = Some(rect);
        Ok(result)
    }
}

/// Transform after one tick of linear and angular velocity.
fn advance(physical: &Physical) -> Transform {
    let mut transform = physical.entity.transform();
    transform.position += physical.move_speed;
    let angle = physical.turn_speed.length();
    if angle > 0.0 {
        transform.rotation = Mat3::from_axis_angle(physical.turn_speed / angle, angle) * transform.rotation;
    }
    transform
}
