//! The model registry: schema discovery and the compiled-description cache.
//!
//! The registry hands out one [`ModelDescription`] per model type, compiled
//! on first use and shared behind an [`Arc`]. Concurrent first callers block
//! on the cache entry while one of them compiles, so every kind is compiled
//! at most once until it is explicitly [refreshed](ModelRegistry::refresh).

use dashmap::{DashMap, mapref::entry::Entry};
use once_cell::sync::Lazy;
use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
};
use tracing::debug;

use crate::{
    description::ModelDescription,
    entity::Entity,
    error::{DatastoreError, DatastoreResult},
    model::{AnyModel, Field, Model},
};

type DecodeFn = fn(&ModelRegistry, &Entity) -> DatastoreResult<Box<dyn AnyModel>>;

#[derive(Clone, Copy)]
struct KindEntry {
    type_id: TypeId,
    decode: DecodeFn,
}

static GLOBAL: Lazy<Arc<ModelRegistry>> = Lazy::new(|| Arc::new(ModelRegistry::new()));

/// A cache of compiled model descriptions keyed by model type, plus the
/// kind names of registered models.
///
/// # Example
///
/// ```ignore
/// use entlayer::registry::ModelRegistry;
///
/// let registry = ModelRegistry::new();
/// registry.register::<Person>()?;
///
/// let description = registry.description::<Person>()?;
/// let model = registry.decode_any(&entity)?;
/// assert!(model.downcast_ref::<Person>().is_some());
/// ```
#[derive(Default)]
pub struct ModelRegistry {
    descriptions: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    kinds: DashMap<&'static str, KindEntry>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> Arc<ModelRegistry> {
        GLOBAL.clone()
    }

    /// The ordered accessor table of `M`.
    pub fn fields_for_kind<M: Model>(&self) -> Vec<Field<M>> {
        M::fields()
    }

    /// A blank instance of `M`.
    pub fn new_instance<M: Model>(&self) -> M {
        M::default()
    }

    /// Returns the cached description of `M`, compiling it on first use.
    ///
    /// # Errors
    ///
    /// Returns the compile error if `M`'s accessor table is invalid. Nothing
    /// is cached in that case.
    pub fn description<M: Model>(&self) -> DatastoreResult<Arc<ModelDescription<M>>> {
        let type_id = TypeId::of::<M>();

        if let Some(cached) = self.descriptions.get(&type_id) {
            return downcast::<M>(cached.value().clone());
        }

        // The vacant entry holds the shard lock, so concurrent callers wait
        // here instead of compiling again.
        let cached = match self.descriptions.entry(type_id) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let description: Arc<dyn Any + Send + Sync> =
                    Arc::new(ModelDescription::<M>::from_fields(self.fields_for_kind::<M>())?);
                entry.insert(description.clone());
                description
            }
        };

        downcast::<M>(cached)
    }

    /// Recompiles the description of `M` and replaces the cached one.
    ///
    /// Holders of the previous `Arc` keep using it unchanged.
    pub fn refresh<M: Model>(&self) -> DatastoreResult<Arc<ModelDescription<M>>> {
        let description = Arc::new(ModelDescription::<M>::from_fields(self.fields_for_kind::<M>())?);
        self.descriptions
            .insert(TypeId::of::<M>(), description.clone() as Arc<dyn Any + Send + Sync>);

        debug!(target: "entlayer::registry", kind = M::KIND, "Refreshed model description");

        Ok(description)
    }

    /// Compiles `M` and records its kind name for [`decode_any`](Self::decode_any).
    ///
    /// # Errors
    ///
    /// Returns [`DatastoreError::Initialization`] if a different model type
    /// is already registered under `M::KIND`.
    pub fn register<M: Model>(&self) -> DatastoreResult<Arc<ModelDescription<M>>> {
        let description = self.description::<M>()?;

        match self.kinds.entry(M::KIND) {
            Entry::Occupied(entry) if entry.get().type_id != TypeId::of::<M>() => {
                return Err(DatastoreError::Initialization(format!(
                    "model kind '{}' is already registered to another type",
                    M::KIND
                )));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(entry) => {
                entry.insert(KindEntry {
                    type_id: TypeId::of::<M>(),
                    decode: decode_as::<M>,
                });
                debug!(target: "entlayer::registry", kind = M::KIND, "Registered model");
            }
        }

        Ok(description)
    }

    /// The kind names of all registered models, sorted.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.kinds.iter().map(|entry| *entry.key()).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Returns `true` if a model is registered under `kind`.
    pub fn is_registered(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Decodes `entity` into the registered model named by its key's kind.
    ///
    /// # Errors
    ///
    /// Returns [`DatastoreError::UnknownKind`] if no model is registered for
    /// the kind, or the decode error of the model's description.
    pub fn decode_any(&self, entity: &Entity) -> DatastoreResult<Box<dyn AnyModel>> {
        let kind = entity.key().kind();
        let entry = self
            .kinds
            .get(kind)
            .map(|entry| *entry.value())
            .ok_or_else(|| DatastoreError::UnknownKind(kind.to_string()))?;

        (entry.decode)(self, entity)
    }
}

fn decode_as<M: Model>(registry: &ModelRegistry, entity: &Entity) -> DatastoreResult<Box<dyn AnyModel>> {
    let description = registry.description::<M>()?;
    let model = description
        .decode_entity(entity.key(), Some(entity))?
        .ok_or_else(|| DatastoreError::EntityNotFound(entity.key().to_string()))?;

    Ok(Box::new(model))
}

fn downcast<M: Model>(cached: Arc<dyn Any + Send + Sync>) -> DatastoreResult<Arc<ModelDescription<M>>> {
    cached.downcast::<ModelDescription<M>>().map_err(|_| {
        DatastoreError::Initialization(format!("cached description type mismatch for kind '{}'", M::KIND))
    })
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("descriptions", &self.descriptions.len())
            .field("kinds", &self.kinds())
            .finish()
    }
}
