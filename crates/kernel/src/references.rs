//! Weak back-references from external holders to entities.
//!
//! A holder is a storage location somewhere outside the entity that names an
//! entity by id. When a holder is registered against an entity, one slot from
//! a fixed process-wide pool is linked into that entity's chain. The slot
//! records which holder to visit, not the entity.
//!
//! Every slot is either on exactly one entity chain or on the free list.
//! On destruction the chain is walked, holders that still name the entity are
//! cleared, and the whole chain is spliced back onto the free list.

use worldtrack_common::EntityId;

use crate::entity::Entity;

/// Address of an external storage location holding an optional entity id.
///
/// Carries the generation of its cell, so an id kept after
/// [`HolderTable::free`] neither reads nor writes the cell's next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HolderId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct HolderCell {
    value: Option<EntityId>,
    generation: u32,
    live: bool,
}

/// Storage for the external locations weak slots point at. Freed cells are
/// recycled, so the table only grows to the peak number of live holders.
#[derive(Debug, Clone, Default)]
pub struct HolderTable {
    cells: Vec<HolderCell>,
    free: Vec<u32>,
}

impl HolderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new location holding `value`, reusing a freed cell if any.
    pub fn alloc(&mut self, value: Option<EntityId>) -> HolderId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.cells.push(HolderCell::default());
                (self.cells.len() - 1) as u32
            }
        };
        let cell = &mut self.cells[index as usize];
        cell.value = value;
        cell.live = true;
        HolderId {
            index,
            generation: cell.generation,
        }
    }

    /// Release a location. Registry slots still pointing at it read it as
    /// empty and are released by the next prune. Returns `false` for stale ids.
    pub fn free(&mut self, holder: HolderId) -> bool {
        let Some(cell) = self.cell_mut(holder) else {
            return false;
        };
        cell.value = None;
        cell.live = false;
        cell.generation = cell.generation.wrapping_add(1);
        self.free.push(holder.index);
        true
    }

    pub fn get(&self, holder: HolderId) -> Option<EntityId> {
        self.cells
            .get(holder.index as usize)
            .filter(|c| c.live && c.generation == holder.generation)
            .and_then(|c| c.value)
    }

    /// Overwrite a location. Unknown or freed holders are ignored.
    pub fn set(&mut self, holder: HolderId, value: Option<EntityId>) {
        if let Some(cell) = self.cell_mut(holder) {
            cell.value = value;
        }
    }

    /// Live holders.
    pub fn len(&self) -> usize {
        self.cells.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cells allocated so far, live or free.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn cell_mut(&mut self, holder: HolderId) -> Option<&mut HolderCell> {
        self.cells
            .get_mut(holder.index as usize)
            .filter(|c| c.live && c.generation == holder.generation)
    }
}

/// Head of an entity's chain of reference slots. Owned by the entity.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RefChain {
    head: Option<u32>,
}

impl RefChain {
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

#[derive(Debug, Clone, Copy)]
struct RefNode {
    holder: Option<HolderId>,
    next: Option<u32>,
}

/// Fixed pool of reference slots shared by every entity.
pub struct ReferenceRegistry {
    nodes: Box<[RefNode]>,
    free_head: Option<u32>,
    free_len: usize,
}

impl ReferenceRegistry {
    /// Creates a registry with every slot on the free list.
    pub fn new(capacity: usize) -> Self {
        let nodes: Vec<RefNode> = (0..capacity)
            .map(|i| RefNode {
                holder: None,
                next: (i + 1 < capacity).then(|| (i + 1) as u32),
            })
            .collect();
        Self {
            nodes: nodes.into_boxed_slice(),
            free_head: (capacity > 0).then_some(0),
            free_len: capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Slots still available for registration.
    pub fn free_len(&self) -> usize {
        self.free_len
    }

    pub fn in_use(&self) -> usize {
        self.nodes.len() - self.free_len
    }

    /// Link `holder` into `entity`'s chain.
    ///
    /// Buildings never take back-references. Registering a holder twice is a
    /// no-op. When every slot is in use the registration is dropped. Returns
    /// whether the holder is on the chain afterwards.
    pub fn register(&mut self, entity: &mut Entity, holder: HolderId) -> bool {
        if entity.kind().is_building() {
            return false;
        }
        if self.chain(&entity.references).any(|h| h == holder) {
            return true;
        }
        let Some(slot) = self.free_head else {
            tracing::warn!(id = %entity.id(), ?holder, "reference slots exhausted, registration dropped");
            return false;
        };
        let node = &mut self.nodes[slot as usize];
        self.free_head = node.next;
        self.free_len -= 1;
        node.holder = Some(holder);
        node.next = entity.references.head;
        entity.references.head = Some(slot);
        true
    }

    /// Clear every holder that still names `entity`, then return the whole
    /// chain to the free list. Returns how many holders were cleared.
    pub fn resolve_all(&mut self, entity: &mut Entity, holders: &mut HolderTable) -> usize {
        let Some(head) = entity.references.head.take() else {
            return 0;
        };
        let owner = entity.id();
        let mut cleared = 0;
        let mut len = 0;
        let mut tail = head;
        let mut cursor = Some(head);
        while let Some(slot) = cursor {
            let node = &mut self.nodes[slot as usize];
            if let Some(holder) = node.holder.take() {
                if holders.get(holder) == Some(owner) {
                    holders.set(holder, None);
                    cleared += 1;
                }
            }
            len += 1;
            tail = slot;
            cursor = node.next;
        }
        self.nodes[tail as usize].next = self.free_head;
        self.free_head = Some(head);
        self.free_len += len;
        tracing::trace!(id = %owner, slots = len, cleared, "resolved references");
        cleared
    }

    /// Return to the free list every slot whose holder no longer names
    /// `entity`. Returns how many slots were released.
    pub fn prune(&mut self, entity: &mut Entity, holders: &HolderTable) -> usize {
        let owner = entity.id();
        let mut released = 0;
        let mut prev: Option<u32> = None;
        let mut cursor = entity.references.head;
        while let Some(slot) = cursor {
            let node = self.nodes[slot as usize];
            cursor = node.next;
            let still_named = node.holder.is_some_and(|h| holders.get(h) == Some(owner));
            if still_named {
                prev = Some(slot);
                continue;
            }
            match prev {
                Some(p) => self.nodes[p as usize].next = node.next,
                None => entity.references.head = node.next,
            }
            self.release(slot);
            released += 1;
        }
        released
    }

    /// Holders on a chain, most recently registered first.
    pub fn chain<'a>(&'a self, chain: &RefChain) -> impl Iterator<Item = HolderId> + 'a {
        let mut cursor = chain.head;
        std::iter::from_fn(move || {
            let slot = cursor?;
            let node = &self.nodes[slot as usize];
            cursor = node.next;
            node.holder
        })
    }

    pub fn chain_len(&self, chain: &RefChain) -> usize {
        self.chain(chain).count()
    }

    fn release(&mut self, slot: u32) {
        let node = &mut self.nodes[slot as usize];
        node.holder = None;
        node.next = self.free_head;
        self.free_head = Some(slot);
        self.free_len += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldtrack_assets::ModelId;
    use worldtrack_common::{EntityType, PoolHandle, Transform};

    fn entity(kind: EntityType, index: u32) -> Entity {
        Entity::new(
            EntityId::new(kind, PoolHandle::new(index, 0)),
            ModelId(0),
            Transform::default(),
        )
    }

    #[test]
    fn register_links_and_dedupes() {
        let mut registry = ReferenceRegistry::new(4);
        let mut holders = HolderTable::new();
        let mut e = entity(EntityType::Vehicle, 0);
        let h = holders.alloc(Some(e.id()));

        assert!(registry.register(&mut e, h));
        assert!(registry.register(&mut e, h));
        assert_eq!(registry.chain_len(e.references()), 1);
        assert_eq!(registry.free_len(), 3);
    }

    #[test]
    fn buildings_take_no_references() {
        let mut registry = ReferenceRegistry::new(4);
        let mut holders = HolderTable::new();
        let mut b = entity(EntityType::Building, 0);
        let h = holders.alloc(Some(b.id()));
        assert!(!registry.register(&mut b, h));
        assert!(b.references().is_empty());
        assert_eq!(registry.free_len(), 4);
    }

    #[test]
    fn exhaustion_drops_registration() {
        let mut registry = ReferenceRegistry::new(1);
        let mut holders = HolderTable::new();
        let mut e = entity(EntityType::Ped, 0);
        let a = holders.alloc(Some(e.id()));
        let b = holders.alloc(Some(e.id()));
        assert!(registry.register(&mut e, a));
        assert!(!registry.register(&mut e, b));
        assert_eq!(registry.chain_len(e.references()), 1);

        // The unregistered holder is left dangling: a known limitation.
        registry.resolve_all(&mut e, &mut holders);
        assert_eq!(holders.get(a), None);
        assert_eq!(holders.get(b), Some(e.id()));
    }

    #[test]
    fn resolve_clears_only_holders_still_naming_entity() {
        let mut registry = ReferenceRegistry::new(8);
        let mut holders = HolderTable::new();
        let mut e = entity(EntityType::Vehicle, 0);
        let other = entity(EntityType::Vehicle, 1);
        let a = holders.alloc(Some(e.id()));
        let b = holders.alloc(Some(e.id()));
        let c = holders.alloc(Some(e.id()));
        for h in [a, b, c] {
            registry.register(&mut e, h);
        }
        holders.set(c, Some(other.id()));

        assert_eq!(registry.resolve_all(&mut e, &mut holders), 2);
        assert_eq!(holders.get(a), None);
        assert_eq!(holders.get(b), None);
        assert_eq!(holders.get(c), Some(other.id()));
        assert!(e.references().is_empty());
        assert_eq!(registry.free_len(), 8);
    }

    #[test]
    fn freed_slots_do_not_resurrect_old_chain() {
        let mut registry = ReferenceRegistry::new(4);
        let mut holders = HolderTable::new();
        let mut e = entity(EntityType::Object, 0);
        let a = holders.alloc(Some(e.id()));
        let b = holders.alloc(Some(e.id()));
        registry.register(&mut e, a);
        registry.register(&mut e, b);
        registry.resolve_all(&mut e, &mut holders);

        let mut fresh = entity(EntityType::Object, 1);
        let c = holders.alloc(Some(fresh.id()));
        registry.register(&mut fresh, c);
        assert_eq!(registry.chain(fresh.references()).collect::<Vec<_>>(), vec![c]);
    }

    #[test]
    fn prune_releases_repointed_holders() {
        let mut registry = ReferenceRegistry::new(4);
        let mut holders = HolderTable::new();
        let mut e = entity(EntityType::Ped, 0);
        let other = entity(EntityType::Ped, 1);
        let a = holders.alloc(Some(e.id()));
        let b = holders.alloc(Some(e.id()));
        let c = holders.alloc(Some(e.id()));
        for h in [a, b, c] {
            registry.register(&mut e, h);
        }
        holders.set(a, Some(other.id()));
        holders.set(c, None);

        assert_eq!(registry.prune(&mut e, &holders), 2);
        assert_eq!(registry.chain(e.references()).collect::<Vec<_>>(), vec![b]);
        assert_eq!(registry.free_len(), 3);
        assert_eq!(registry.prune(&mut e, &holders), 0);
    }

    #[test]
    fn freed_holder_cells_are_recycled() {
        let mut holders = HolderTable::new();
        let e = entity(EntityType::Ped, 0);
        let first = holders.alloc(Some(e.id()));
        assert!(holders.free(first));
        assert!(!holders.free(first));

        let second = holders.alloc(None);
        assert_eq!(holders.cell_count(), 1);
        assert_ne!(first, second);
        holders.set(first, Some(e.id()));
        assert_eq!(holders.get(second), None);
        assert_eq!(holders.get(first), None);
    }

    #[test]
    fn freed_holder_is_pruned_from_chain() {
        let mut registry = ReferenceRegistry::new(2);
        let mut holders = HolderTable::new();
        let mut e = entity(EntityType::Vehicle, 0);
        let h = holders.alloc(Some(e.id()));
        registry.register(&mut e, h);
        holders.free(h);

        assert_eq!(registry.prune(&mut e, &holders), 1);
        assert_eq!(registry.free_len(), 2);
        assert_eq!(holders.len(), 0);
    }

    #[test]
    fn zero_capacity_registry_never_registers() {
        let mut registry = ReferenceRegistry::new(0);
        let mut holders = HolderTable::new();
        let mut e = entity(EntityType::Vehicle, 0);
        let h = holders.alloc(Some(e.id()));
        assert!(!registry.register(&mut e, h));
    }
}
