use std::cell::Cell;
use std::rc::Rc;

use glam::{Vec2, Vec3};
use worldtrack_assets::{ColModel, GraphicsInstance, ModelId, ModelStore};
use worldtrack_common::{EntityId, EntityType, Rect, Transform};

use crate::flags::{EntityFlags, EntityStatus, FlagsError};
use crate::references::RefChain;

/// Where an entity's transform lives.
#[derive(Debug)]
enum Placement {
    Owned(Transform),
    /// Shared with the root frame of the attached graphics instance.
    Attached(Rc<Cell<Transform>>),
}

/// The tracked unit: identity, transform, flags and the head of its weak
/// reference chain.
///
/// Bounds are derived on demand from the current transform and the model's
/// static collision box. The one exception is `grid_rect`, the rectangle the
/// world last inserted the entity under, which removal must reuse verbatim.
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    pub status: EntityStatus,
    pub flags: EntityFlags,
    model: ModelId,
    placement: Placement,
    instance: Option<GraphicsInstance>,
    pub(crate) references: RefChain,
    pub(crate) grid_rect: Option<Rect>,
}

impl Entity {
    pub fn new(id: EntityId, model: ModelId, transform: Transform) -> Self {
        Self {
            id,
            status: EntityStatus::Abandoned,
            flags: EntityFlags::default(),
            model,
            placement: Placement::Owned(transform),
            instance: None,
            references: RefChain::default(),
            grid_rect: None,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityType {
        self.id.kind
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn transform(&self) -> Transform {
        match &self.placement {
            Placement::Owned(t) => *t,
            Placement::Attached(frame) => frame.get(),
        }
    }

    /// Overwrite the transform. Outside the world this does not update grid
    /// membership; callers moving an inserted entity must re-insert it.
    pub fn set_transform(&mut self, transform: Transform) {
        match &mut self.placement {
            Placement::Owned(t) => *t = transform,
            Placement::Attached(frame) => frame.set(transform),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.transform().position
    }

    pub fn references(&self) -> &RefChain {
        &self.references
    }

    /// XY rectangle enclosing the model box under the current transform.
    pub fn bound_rect(&self, col: &ColModel) -> Rect {
        let t = self.transform();
        Rect::from_points(
            col.footprint()
                .into_iter()
                .map(|corner| t.transform_point(corner).truncate()),
        )
    }

    pub fn bound_centre(&self, col: &ColModel) -> Vec3 {
        self.transform().transform_point(col.bounding_sphere.center)
    }

    pub fn bound_radius(&self, col: &ColModel) -> f32 {
        col.bounding_sphere.radius
    }

    /// Whether the bounding sphere intersects the sphere at `centre`.
    pub fn is_touching(&self, col: &ColModel, centre: Vec3, radius: f32) -> bool {
        let reach = self.bound_radius(col) + radius;
        (self.bound_centre(col) - centre).length_squared() < reach * reach
    }

    /// Horizontal midpoint of the bounds, the point that picks the home sector.
    pub fn bound_midpoint(&self, col: &ColModel) -> Vec2 {
        self.bound_rect(col).centre()
    }

    pub fn instance(&self) -> Option<&GraphicsInstance> {
        self.instance.as_ref()
    }

    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    /// Whether the transform is currently shared with a graphics instance.
    pub fn is_attached(&self) -> bool {
        matches!(self.placement, Placement::Attached(_))
    }

    /// Build a graphics instance from the entity's model, seed it with the
    /// entity's transform and share that transform from now on.
    ///
    /// Returns `false` if an instance already exists or the model is unknown.
    pub fn create_instance(&mut self, models: &mut ModelStore) -> bool {
        if self.instance.is_some() {
            return false;
        }
        let Some(instance) = models.instantiate(self.model, self.transform()) else {
            return false;
        };
        self.placement = Placement::Attached(Rc::clone(instance.frame()));
        self.instance = Some(instance);
        if let Some(info) = models.get_mut(self.model) {
            info.add_ref();
        }
        true
    }

    /// Destroy the graphics instance, keeping the last shared transform.
    pub fn delete_instance(&mut self, models: &mut ModelStore) {
        if self.detach_instance(models).is_some() {
            tracing::trace!(id = %self.id, "deleted graphics instance");
        }
    }

    /// Take ownership of an instance created elsewhere. The entity adopts the
    /// instance's transform.
    pub fn attach_instance(&mut self, instance: GraphicsInstance, models: &mut ModelStore) {
        self.detach_instance(models);
        self.placement = Placement::Attached(Rc::clone(instance.frame()));
        if let Some(info) = models.get_mut(instance.model()) {
            info.add_ref();
        }
        self.instance = Some(instance);
    }

    /// Hand back the instance without destroying it.
    pub fn detach_instance(&mut self, models: &mut ModelStore) -> Option<GraphicsInstance> {
        let transform = self.transform();
        self.placement = Placement::Owned(transform);
        let instance = self.instance.take()?;
        if let Some(info) = models.get_mut(instance.model()) {
            info.remove_ref();
        }
        Some(instance)
    }

    /// Flags, type and status packed into the two saved words.
    pub fn save_flags(&self) -> [u32; 2] {
        self.flags.to_words(self.kind(), self.status)
    }

    /// Restore flags and status from saved words. The saved type must match.
    pub fn load_flags(&mut self, words: [u32; 2]) -> Result<(), FlagsError> {
        let (kind, status, flags) = EntityFlags::from_words(words)?;
        if kind != self.kind() {
            return Err(FlagsError::TypeMismatch {
                saved: kind,
                actual: self.kind(),
            });
        }
        self.status = status;
        self.flags = flags;
        Ok(())
    }
}

/// An entity that moves: vehicles, peds and objects.
#[derive(Debug)]
pub struct Physical {
    pub entity: Entity,
    /// Linear velocity in world units per tick.
    pub move_speed: Vec3,
    /// Angular velocity.
    pub turn_speed: Vec3,
}

impl Physical {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            move_speed: Vec3::ZERO,
            turn_speed: Vec3::ZERO,
        }
    }

    pub fn up(&self) -> Vec3 {
        self.entity.transform().up()
    }

    pub fn position(&self) -> Vec3 {
        self.entity.position()
    }
}
