use glam::{Mat3, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a tracked entity. Each kind lives in its own pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    Building,
    Vehicle,
    Ped,
    Object,
    Dummy,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Building,
        EntityType::Vehicle,
        EntityType::Ped,
        EntityType::Object,
        EntityType::Dummy,
    ];

    /// Numeric code used in saved flag words. Zero is reserved for "nothing".
    pub fn code(self) -> u8 {
        match self {
            Self::Building => 1,
            Self::Vehicle => 2,
            Self::Ped => 3,
            Self::Object => 4,
            Self::Dummy => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Building),
            2 => Some(Self::Vehicle),
            3 => Some(Self::Ped),
            4 => Some(Self::Object),
            5 => Some(Self::Dummy),
            _ => None,
        }
    }

    pub fn is_building(self) -> bool {
        self == Self::Building
    }

    /// Position of this kind in per-type arrays (0..5).
    pub fn slot(self) -> usize {
        self.code() as usize - 1
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Building => "building",
            Self::Vehicle => "vehicle",
            Self::Ped => "ped",
            Self::Object => "object",
            Self::Dummy => "dummy",
        };
        f.write_str(name)
    }
}

/// Generation-counted index into a fixed-capacity pool.
///
/// The generation changes every time the slot is freed, so a handle kept
/// past the owner's destruction no longer resolves.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolHandle {
    index: u32,
    generation: u32,
}

impl PoolHandle {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PoolHandle({}v{})", self.index, self.generation)
    }
}

/// World-wide identity of an entity: its kind plus its handle in that kind's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    pub kind: EntityType,
    pub handle: PoolHandle,
}

impl EntityId {
    pub fn new(kind: EntityType, handle: PoolHandle) -> Self {
        Self { kind, handle }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}v{}",
            self.kind,
            self.handle.index(),
            self.handle.generation()
        )
    }
}

/// Position plus orientation matrix. Z is the vertical axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Mat3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Mat3::IDENTITY,
        }
    }
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Map a point from model space into world space.
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation * p + self.position
    }

    pub fn right(&self) -> Vec3 {
        self.rotation.x_axis
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation.y_axis
    }

    pub fn up(&self) -> Vec3 {
        self.rotation.z_axis
    }
}

/// Axis-aligned rectangle on the XY plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    /// Inverted rectangle that any contained point will overwrite.
    pub const EMPTY: Rect = Rect {
        min: Vec2::splat(f32::INFINITY),
        max: Vec2::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Grow the rectangle so it contains `p`.
    pub fn contain_point(&mut self, p: Vec2) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Self {
        let mut rect = Self::EMPTY;
        for p in points {
            rect.contain_point(p);
        }
        rect
    }

    pub fn centre(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}
