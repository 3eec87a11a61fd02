//! Model descriptors shared by every entity built from the same model.
//!
//! Entities never own a descriptor. They look it up by [`ModelId`] for their
//! collision bounds and bump its use count while a graphics instance of the
//! model exists.
//!
//! # Layout
//! The registry can be persisted to disk as JSON for inspection. Use counts
//! are runtime state and are not saved.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;
use worldtrack_common::Transform;

/// Index of a model in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId(pub u32);

/// Model-space axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

/// Model-space bounding sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

/// Static collision description of a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColModel {
    pub bounding_box: BoundingBox,
    pub bounding_sphere: BoundingSphere,
}

impl ColModel {
    /// Build a collision model from a box, enclosing it in the smallest sphere
    /// centred on the box centre.
    pub fn from_box(min: Vec3, max: Vec3) -> Self {
        let center = (min + max) * 0.5;
        Self {
            bounding_box: BoundingBox { min, max },
            bounding_sphere: BoundingSphere {
                center,
                radius: (max - center).length(),
            },
        }
    }

    /// The four XY corners of the box, each at the Z the box reaches there.
    pub fn footprint(&self) -> [Vec3; 4] {
        let BoundingBox { min, max } = self.bounding_box;
        [
            min,
            max,
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, max.z),
        ]
    }
}

/// Shape of the graphics object a model instantiates into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceKind {
    /// Single mesh with one frame.
    Atomic,
    /// Hierarchy of meshes sharing a root frame.
    Clump,
}

/// Descriptor shared by all entities of one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub col_model: ColModel,
    pub instance_kind: InstanceKind,
    #[serde(skip)]
    ref_count: u32,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>, col_model: ColModel, instance_kind: InstanceKind) -> Self {
        Self {
            name: name.into(),
            col_model,
            instance_kind,
            ref_count: 0,
        }
    }

    /// Number of live graphics instances of this model.
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub fn add_ref(&mut self) {
        self.ref_count += 1;
    }

    pub fn remove_ref(&mut self) {
        if self.ref_count == 0 {
            tracing::warn!(model = %self.name, "remove_ref on unused model");
            return;
        }
        self.ref_count -= 1;
    }
}

/// A graphics-side object created from a model.
///
/// The frame is shared with the entity it is attached to: both read and write
/// the same transform buffer until the entity detaches.
#[derive(Debug, Clone)]
pub struct GraphicsInstance {
    model: ModelId,
    kind: InstanceKind,
    frame: Rc<Cell<Transform>>,
}

impl GraphicsInstance {
    pub fn new(model: ModelId, kind: InstanceKind, transform: Transform) -> Self {
        Self {
            model,
            kind,
            frame: Rc::new(Cell::new(transform)),
        }
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn kind(&self) -> InstanceKind {
        self.kind
    }

    /// Shared transform buffer of the instance's root frame.
    pub fn frame(&self) -> &Rc<Cell<Transform>> {
        &self.frame
    }
}

/// Errors from model registry operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Registry of model descriptors keyed by [`ModelId`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelStore {
    models: BTreeMap<ModelId, ModelInfo>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the descriptor for `id`.
    pub fn register(&mut self, id: ModelId, info: ModelInfo) {
        if let Some(old) = self.models.insert(id, info) {
            if old.ref_count > 0 {
                tracing::warn!(?id, uses = old.ref_count, "replaced model still in use");
            }
        }
    }

    pub fn get(&self, id: ModelId) -> Option<&ModelInfo> {
        self.models.get(&id)
    }

    pub fn get_mut(&mut self, id: ModelId) -> Option<&mut ModelInfo> {
        self.models.get_mut(&id)
    }

    pub fn col_model(&self, id: ModelId) -> Option<&ColModel> {
        self.models.get(&id).map(|m| &m.col_model)
    }

    pub fn contains(&self, id: ModelId) -> bool {
        self.models.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Build a new graphics instance of `id` placed at `transform`.
    ///
    /// Does not touch the use count; the entity taking ownership does that.
    pub fn instantiate(&self, id: ModelId, transform: Transform) -> Option<GraphicsInstance> {
        self.models
            .get(&id)
            .map(|m| GraphicsInstance::new(id, m.instance_kind, transform))
    }

    /// Save the registry to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AssetError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Load a registry from a JSON file. Use counts start at zero.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let file = std::fs::File::open(path)?;
        let store: Self = serde_json::from_reader(file)?;
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> ModelInfo {
        ModelInfo::new(
            "cube",
            ColModel::from_box(Vec3::splat(-1.0), Vec3::splat(1.0)),
            InstanceKind::Atomic,
        )
    }

    #[test]
    fn from_box_encloses_box() {
        let col = ColModel::from_box(Vec3::new(-2.0, -1.0, 0.0), Vec3::new(2.0, 1.0, 2.0));
        assert_eq!(col.bounding_sphere.center, Vec3::new(0.0, 0.0, 1.0));
        let corner = Vec3::new(2.0, 1.0, 2.0);
        assert!((corner - col.bounding_sphere.center).length() <= col.bounding_sphere.radius + 1e-5);
    }

    #[test]
    fn ref_counting() {
        let mut info = cube();
        info.add_ref();
        info.add_ref();
        assert_eq!(info.ref_count(), 2);
        info.remove_ref();
        info.remove_ref();
        info.remove_ref();
        assert_eq!(info.ref_count(), 0);
    }

    #[test]
    fn instantiate_unknown_model() {
        let store = ModelStore::new();
        assert!(store.instantiate(ModelId(9), Transform::default()).is_none());
    }

    #[test]
    fn instance_frame_is_shared() {
        let mut store = ModelStore::new();
        store.register(ModelId(1), cube());
        let inst = store.instantiate(ModelId(1), Transform::default()).unwrap();
        let alias = Rc::clone(inst.frame());
        alias.set(Transform::at(Vec3::X));
        assert_eq!(inst.frame().get().position, Vec3::X);
        assert_eq!(inst.kind(), InstanceKind::Atomic);
    }

    #[test]
    fn save_and_load_resets_use_counts() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut store = ModelStore::new();
        store.register(ModelId(1), cube());
        store.get_mut(ModelId(1)).unwrap().add_ref();
        store.save(tmp.path()).unwrap();

        let loaded = ModelStore::load(tmp.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(ModelId(1)).unwrap().ref_count(), 0);
        assert_eq!(loaded.get(ModelId(1)).unwrap().name, "cube");
    }
}
