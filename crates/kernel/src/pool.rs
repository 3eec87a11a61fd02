//! Fixed-capacity entity pools.
//!
//! Every slot carries a generation that is bumped when the slot is freed, so
//! a [`PoolHandle`] kept past its owner's destruction stops resolving even
//! after the slot is reused.

use worldtrack_common::{EntityId, EntityType, PoolHandle};

use crate::config::PoolConfig;
use crate::entity::{Entity, Physical};

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// A pool of `T` with a capacity fixed at construction.
pub struct Pool<T> {
    slots: Box<[Slot<T>]>,
    /// Indices of free slots. Popped from the back.
    free_list: Vec<u32>,
}

impl<T> Pool<T> {
    /// Creates a pool with all storage allocated upfront.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "pool capacity must be greater than zero");
        let slots: Vec<Slot<T>> = (0..capacity)
            .map(|_| Slot {
                generation: 0,
                value: None,
            })
            .collect();
        Self {
            slots: slots.into_boxed_slice(),
            free_list: (0..capacity as u32).rev().collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.free_list.is_empty()
    }

    /// Claim a free slot and fill it with the value built from its handle.
    ///
    /// Returns `None` when the pool is full.
    pub fn allocate_with(&mut self, build: impl FnOnce(PoolHandle) -> T) -> Option<PoolHandle> {
        let index = self.free_list.pop()?;
        let slot = &mut self.slots[index as usize];
        let handle = PoolHandle::new(index, slot.generation);
        slot.value = Some(build(handle));
        Some(handle)
    }

    /// The live value for `handle`, or `None` if it was freed since.
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    /// Whatever currently lives at `index`, regardless of generation.
    pub fn get_at(&self, index: u32) -> Option<(PoolHandle, &T)> {
        let slot = self.slots.get(index as usize)?;
        slot.value
            .as_ref()
            .map(|v| (PoolHandle::new(index, slot.generation), v))
    }

    pub fn contains(&self, handle: PoolHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Release the slot held by `handle` and return its value.
    pub fn free(&mut self, handle: PoolHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index());
        Some(value)
    }

    /// Live slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value
                .as_ref()
                .map(|v| (PoolHandle::new(i as u32, slot.generation), v))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PoolHandle, &mut T)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|v| (PoolHandle::new(i as u32, generation), v))
        })
    }

    pub fn handles(&self) -> Vec<PoolHandle> {
        self.iter().map(|(h, _)| h).collect()
    }
}

/// One pool per entity type.
pub struct Pools {
    pub buildings: Pool<Entity>,
    pub dummies: Pool<Entity>,
    pub vehicles: Pool<Physical>,
    pub peds: Pool<Physical>,
    pub objects: Pool<Physical>,
}

impl Pools {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            buildings: Pool::new(config.buildings),
            dummies: Pool::new(config.dummies),
            vehicles: Pool::new(config.vehicles),
            peds: Pool::new(config.peds),
            objects: Pool::new(config.objects),
        }
    }

    /// Pool holding moving entities of `kind`, if that kind moves.
    pub fn physical(&self, kind: EntityType) -> Option<&Pool<Physical>> {
        match kind {
            EntityType::Vehicle => Some(&self.vehicles),
            EntityType::Ped => Some(&self.peds),
            EntityType::Object => Some(&self.objects),
            EntityType::Building | EntityType::Dummy => None,
        }
    }

    pub fn physical_mut(&mut self, kind: EntityType) -> Option<&mut Pool<Physical>> {
        match kind {
            EntityType::Vehicle => Some(&mut self.vehicles),
            EntityType::Ped => Some(&mut self.peds),
            EntityType::Object => Some(&mut self.objects),
            EntityType::Building | EntityType::Dummy => None,
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        match id.kind {
            EntityType::Building => self.buildings.get(id.handle),
            EntityType::Dummy => self.dummies.get(id.handle),
            kind => self.physical(kind)?.get(id.handle).map(|p| &p.entity),
        }
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        match id.kind {
            EntityType::Building => self.buildings.get_mut(id.handle),
            EntityType::Dummy => self.dummies.get_mut(id.handle),
            kind => self
                .physical_mut(kind)?
                .get_mut(id.handle)
                .map(|p| &mut p.entity),
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// Allocate a new entity of `kind`. `None` if that pool is full.
    pub fn allocate(&mut self, kind: EntityType, build: impl FnOnce(EntityId) -> Entity) -> Option<EntityId> {
        let handle = match kind {
            EntityType::Building => self.buildings.allocate_with(|h| build(EntityId::new(kind, h))),
            EntityType::Dummy => self.dummies.allocate_with(|h| build(EntityId::new(kind, h))),
            kind => self
                .physical_mut(kind)?
                .allocate_with(|h| Physical::new(build(EntityId::new(kind, h)))),
        }?;
        Some(EntityId::new(kind, handle))
    }

    /// Release `id`'s slot, returning the entity that lived there.
    pub fn free(&mut self, id: EntityId) -> Option<Entity> {
        match id.kind {
            EntityType::Building => self.buildings.free(id.handle),
            EntityType::Dummy => self.dummies.free(id.handle),
            kind => self.physical_mut(kind)?.free(id.handle).map(|p| p.entity),
        }
    }

    /// Ids of every live entity of `kind`, in index order.
    pub fn ids(&self, kind: EntityType) -> Vec<EntityId> {
        let handles = match kind {
            EntityType::Building => self.buildings.handles(),
            EntityType::Dummy => self.dummies.handles(),
            kind => self.physical(kind).map(Pool::handles).unwrap_or_default(),
        };
        handles.into_iter().map(|h| EntityId::new(kind, h)).collect()
    }

    pub fn len(&self) -> usize {
        self.buildings.len() + self.dummies.len() + self.vehicles.len() + self.peds.len() + self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_fills_lowest_index_first() {
        let mut pool: Pool<u32> = Pool::new(4);
        let a = pool.allocate_with(|_| 10).unwrap();
        let b = pool.allocate_with(|_| 20).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(b), Some(&20));
    }

    #[test]
    fn full_pool_refuses() {
        let mut pool: Pool<u8> = Pool::new(1);
        assert!(pool.allocate_with(|_| 1).is_some());
        assert!(pool.is_full());
        assert!(pool.allocate_with(|_| 2).is_none());
    }

    #[test]
    fn freed_handle_goes_stale_after_reuse() {
        let mut pool: Pool<&str> = Pool::new(2);
        let old = pool.allocate_with(|_| "old").unwrap();
        assert_eq!(pool.free(old), Some("old"));
        let new = pool.allocate_with(|_| "new").unwrap();

        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());
        assert!(pool.get(old).is_none());
        assert_eq!(pool.get(new), Some(&"new"));
        assert_eq!(pool.get_at(old.index()), Some((new, &"new")));
        assert!(pool.free(old).is_none());
    }

    #[test]
    fn build_closure_sees_own_handle() {
        let mut pool: Pool<PoolHandle> = Pool::new(3);
        let h = pool.allocate_with(|h| h).unwrap();
        assert_eq!(pool.get(h), Some(&h));
    }

    #[test]
    fn iter_skips_free_slots() {
        let mut pool: Pool<u32> = Pool::new(3);
        let a = pool.allocate_with(|_| 1).unwrap();
        pool.allocate_with(|_| 2).unwrap();
        pool.free(a);
        let values: Vec<u32> = pool.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![2]);
        for (_, v) in pool.iter_mut() {
            *v += 1;
        }
        assert_eq!(pool.iter().map(|(_, v)| *v).sum::<u32>(), 3);
    }
}
