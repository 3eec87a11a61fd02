//! Entities a mission created and must release when it ends.

use serde::{Deserialize, Serialize};
use worldtrack_common::{EntityId, EntityType, PoolHandle};

use crate::hooks::{EntityCleanup, SimulationControl, MISSION_END_RESETS};

pub const MAX_CLEANUP: usize = 50;

/// Entity kinds a mission can leave behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CleanupKind {
    Vehicle,
    Ped,
    Object,
}

impl CleanupKind {
    pub fn entity_type(self) -> EntityType {
        match self {
            Self::Vehicle => EntityType::Vehicle,
            Self::Ped => EntityType::Ped,
            Self::Object => EntityType::Object,
        }
    }

    pub fn from_entity_type(kind: EntityType) -> Option<Self> {
        match kind {
            EntityType::Vehicle => Some(Self::Vehicle),
            EntityType::Ped => Some(Self::Ped),
            EntityType::Object => Some(Self::Object),
            EntityType::Building | EntityType::Dummy => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupEntry {
    pub handle: PoolHandle,
    pub kind: CleanupKind,
}

impl CleanupEntry {
    pub fn id(&self) -> EntityId {
        EntityId::new(self.kind.entity_type(), self.handle)
    }
}

/// Fixed list of mission-owned entities.
///
/// Entries are not deduplicated; adding the same entity twice takes two
/// slots and it will be cleaned up twice.
#[derive(Debug, Clone)]
pub struct MissionCleanup {
    slots: [Option<CleanupEntry>; MAX_CLEANUP],
}

impl Default for MissionCleanup {
    fn default() -> Self {
        Self {
            slots: [None; MAX_CLEANUP],
        }
    }
}

impl MissionCleanup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the first free slot. Returns `false` and drops the entry when
    /// the list is full.
    pub fn add(&mut self, handle: PoolHandle, kind: CleanupKind) -> bool {
        let Some(slot) = self.slots.iter_mut().find(|s| s.is_none()) else {
            tracing::warn!(?handle, ?kind, "mission cleanup list full, entry dropped");
            return false;
        };
        *slot = Some(CleanupEntry { handle, kind });
        true
    }

    /// Register any entity of a kind a mission can leave behind.
    pub fn add_entity(&mut self, id: EntityId) -> bool {
        match CleanupKind::from_entity_type(id.kind) {
            Some(kind) => self.add(id.handle, kind),
            None => false,
        }
    }

    /// Clear every slot holding this handle and kind. Returns whether any
    /// slot matched.
    pub fn remove(&mut self, handle: PoolHandle, kind: CleanupKind) -> bool {
        let target = CleanupEntry { handle, kind };
        let mut removed = false;
        for slot in &mut self.slots {
            if *slot == Some(target) {
                *slot = None;
                removed = true;
            }
        }
        removed
    }

    pub fn contains(&self, handle: PoolHandle, kind: CleanupKind) -> bool {
        self.slots.contains(&Some(CleanupEntry { handle, kind }))
    }

    pub fn entries(&self) -> impl Iterator<Item = &CleanupEntry> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn clear(&mut self) {
        self.slots = [None; MAX_CLEANUP];
    }

    /// Mission-end sweep.
    ///
    /// Applies every global reset, then runs the matching cleanup routine for
    /// each entry whose entity is still resident. Stale entries are skipped.
    /// The list is empty afterwards. Returns how many entities were cleaned.
    pub fn sweep(
        &mut self,
        sim: &mut impl SimulationControl,
        entities: &mut impl EntityCleanup,
    ) -> usize {
        let _span = tracing::info_span!("mission_cleanup").entered();
        for reset in MISSION_END_RESETS {
            sim.apply(reset);
        }

        let mut cleaned = 0;
        for entry in self.slots.iter().flatten() {
            if !entities.is_resident(entry.id()) {
                tracing::trace!(id = %entry.id(), "cleanup entry no longer resident");
                continue;
            }
            match entry.kind {
                CleanupKind::Vehicle => entities.cleanup_vehicle(entry.handle),
                CleanupKind::Ped => entities.cleanup_ped(entry.handle),
                CleanupKind::Object => entities.cleanup_object(entry.handle),
            }
            cleaned += 1;
        }
        self.clear();
        tracing::debug!(cleaned, "mission cleanup swept");
        cleaned
    }
}
