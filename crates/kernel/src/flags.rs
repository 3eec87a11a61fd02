//! Per-entity status flags and their saved bit layout.
//!
//! Every flag is an independent toggle. For persistence they pack, together
//! with the entity's type and status codes, into two `u32` words.

use serde::{Deserialize, Serialize};
use worldtrack_common::EntityType;

/// Who or what is driving an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityStatus {
    Player,
    PlayerPlaybackFromBuffer,
    Simple,
    Physics,
    Abandoned,
    Wrecked,
    TrainMoving,
    TrainNotMoving,
    Heli,
    Plane,
    PlayerRemote,
    PlayerDisabled,
}

impl EntityStatus {
    const ALL: [EntityStatus; 12] = [
        Self::Player,
        Self::PlayerPlaybackFromBuffer,
        Self::Simple,
        Self::Physics,
        Self::Abandoned,
        Self::Wrecked,
        Self::TrainMoving,
        Self::TrainNotMoving,
        Self::Heli,
        Self::Plane,
        Self::PlayerRemote,
        Self::PlayerDisabled,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }
}

/// Errors decoding saved flag words.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FlagsError {
    #[error("unknown entity type code {0}")]
    UnknownType(u8),
    #[error("unknown entity status code {0}")]
    UnknownStatus(u8),
    #[error("saved flags belong to a {saved}, not a {actual}")]
    TypeMismatch {
        saved: EntityType,
        actual: EntityType,
    },
}

const TYPE_BITS: u32 = 0b111;
const STATUS_SHIFT: u32 = 3;
const STATUS_BITS: u32 = 0b1_1111;

macro_rules! entity_flags {
    (
        first { $($(#[$m0:meta])* $f0:ident = $b0:literal,)* }
        second { $($(#[$m1:meta])* $f1:ident = $b1:literal,)* }
    ) => {
        /// Independent boolean toggles carried by every entity.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub struct EntityFlags {
            $($(#[$m0])* pub $f0: bool,)*
            $($(#[$m1])* pub $f1: bool,)*
        }

        impl EntityFlags {
            fn pack_bits(&self) -> (u32, u32) {
                let mut first = 0u32;
                let mut second = 0u32;
                $(if self.$f0 { first |= 1u32 << $b0; })*
                $(if self.$f1 { second |= 1u32 << $b1; })*
                (first, second)
            }

            fn unpack_bits(first: u32, second: u32) -> Self {
                Self {
                    $($f0: first & (1u32 << $b0) != 0,)*
                    $($f1: second & (1u32 << $b1) != 0,)*
                }
            }

            /// All flags cleared, including visibility.
            pub fn cleared() -> Self {
                Self::unpack_bits(0, 0)
            }
        }
    };
}

entity_flags! {
    first {
        /// Takes part in collision tests.
        uses_collision = 8,
        collision_processed = 9,
        is_static = 10,
        has_contacted = 11,
        ped_physics = 12,
        is_stuck = 13,
        is_in_safe_position = 14,
        use_collision_records = 15,
        was_postponed = 16,
        explosion_proof = 17,
        is_visible = 18,
        has_collided = 19,
        render_scorched = 20,
        has_blip = 21,
        is_big_building = 22,
        render_damaged = 23,
        bullet_proof = 24,
        fire_proof = 25,
        collision_proof = 26,
        melee_proof = 27,
        only_damaged_by_player = 28,
        /// Streaming may not evict this entity's model.
        streaming_dont_delete = 29,
        zone_culled = 30,
        zone_culled2 = 31,
    }
    second {
        remove_from_world = 0,
        has_hit_wall = 1,
        im_being_rendered = 2,
        touching_water = 3,
        is_subway = 4,
        /// Rendered after everything else.
        draw_last = 5,
        no_bright_headlights = 6,
        do_not_render = 7,
        distance_fade = 8,
        offscreen_fade = 9,
    }
}

impl Default for EntityFlags {
    fn default() -> Self {
        Self {
            is_visible: true,
            ..Self::cleared()
        }
    }
}

impl EntityFlags {
    /// Pack flags, type and status into the two saved words.
    pub fn to_words(&self, kind: EntityType, status: EntityStatus) -> [u32; 2] {
        let (mut first, second) = self.pack_bits();
        first |= u32::from(kind.code()) & TYPE_BITS;
        first |= (u32::from(status.code()) & STATUS_BITS) << STATUS_SHIFT;
        [first, second]
    }

    /// Decode saved words into (type, status, flags).
    pub fn from_words(words: [u32; 2]) -> Result<(EntityType, EntityStatus, Self), FlagsError> {
        let [first, second] = words;
        let type_code = (first & TYPE_BITS) as u8;
        let status_code = ((first >> STATUS_SHIFT) & STATUS_BITS) as u8;
        let kind = EntityType::from_code(type_code).ok_or(FlagsError::UnknownType(type_code))?;
        let status =
            EntityStatus::from_code(status_code).ok_or(FlagsError::UnknownStatus(status_code))?;
        Ok((kind, status, Self::unpack_bits(first, second)))
    }
}
