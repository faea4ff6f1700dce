//! The typed store facade.
//!
//! A [`ModelStore`] owns a backend, a shared [`ModelRegistry`] and a
//! [`StoreConfig`]. It hands out [`ModelCollection`]s that encode and decode
//! one model type through the registry's cached descriptions.
//!
//! # Example
//!
//! ```ignore
//! use entlayer::memory::InMemoryDatastore;
//! use entlayer::store::ModelStore;
//!
//! let store = ModelStore::builder(InMemoryDatastore::new())
//!     .project_id("demo")
//!     .namespace("staging")
//!     .build();
//!
//! let people = store.collection::<Person>()?;
//! let keys = people.insert(&[ada]).await?;
//! ```

use std::sync::Arc;

use crate::{
    backend::{DatastoreBackend, DynBackend},
    collection::ModelCollection,
    entity::Entity,
    error::DatastoreResult,
    key::{Key, PartitionId},
    model::{AnyModel, Model},
    query::{Expr, KEY_PROPERTY},
    registry::ModelRegistry,
    value::Value,
};

/// Store-wide settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreConfig {
    /// The partition assigned to keys that carry none.
    pub partition: PartitionId,
}

#[derive(Debug)]
pub struct ModelStore<B: DatastoreBackend> {
    backend: B,
    registry: Arc<ModelRegistry>,
    config: StoreConfig,
}

impl<B: DatastoreBackend> ModelStore<B> {
    /// Creates a store over `backend` using the global registry and the
    /// default partition.
    pub fn new(backend: B) -> Self {
        Self::builder(backend).build()
    }

    /// Starts configuring a store over `backend`.
    pub fn builder(backend: B) -> ModelStoreBuilder<B> {
        ModelStoreBuilder::new(backend)
    }

    /// The backend this store talks to.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The registry holding the compiled descriptions.
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// The store-wide settings.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the collection of model type `M`, registering `M` on first use.
    ///
    /// # Errors
    ///
    /// Returns the compile error of `M`'s description.
    pub fn collection<M: Model>(&self) -> DatastoreResult<ModelCollection<'_, M, B>> {
        let description = self.registry.register::<M>()?;
        Ok(ModelCollection::new(self, description))
    }

    /// Fetches the entity under `key` and decodes it into whichever
    /// registered model its kind names.
    pub async fn get_any(&self, key: &Key) -> DatastoreResult<Option<Box<dyn AnyModel>>> {
        let key = self.localize(key.clone());
        let entity = self
            .backend
            .lookup(vec![key.clone()])
            .await?
            .into_iter()
            .find(|entity| entity.key() == &key);

        entity.map(|entity| self.registry.decode_any(&entity)).transpose()
    }

    /// Moves `key` into the configured partition if it carries none.
    pub(crate) fn localize(&self, key: Key) -> Key {
        if key.partition().is_unset() && !self.config.partition.is_unset() {
            key.in_partition(self.config.partition.clone())
        } else {
            key
        }
    }

    /// Moves the keys compared against `__key__` in `expr`, ancestor
    /// filters included, into the configured partition.
    pub(crate) fn localize_filter(&self, expr: Expr) -> Expr {
        match expr {
            Expr::And(exprs) => Expr::And(exprs.into_iter().map(|expr| self.localize_filter(expr)).collect()),
            Expr::Or(exprs) => Expr::Or(exprs.into_iter().map(|expr| self.localize_filter(expr)).collect()),
            Expr::Property { property, op, value } if property == KEY_PROPERTY => Expr::Property {
                property,
                op,
                value: self.localize_value(value),
            },
            expr => expr,
        }
    }

    fn localize_value(&self, value: Value) -> Value {
        match value {
            Value::Key(key) => Value::Key(self.localize(key)),
            Value::Array(items) => Value::Array(items.into_iter().map(|item| self.localize_value(item)).collect()),
            value => value,
        }
    }

    pub(crate) fn localize_entity(&self, entity: Entity) -> Entity {
        let key = self.localize(entity.key().clone());
        entity.with_key(key)
    }

    /// Erases the backend type.
    pub fn into_dyn(self) -> ModelStore<DynBackend>
    where
        B: 'static,
    {
        ModelStore {
            backend: DynBackend::new(self.backend),
            registry: self.registry,
            config: self.config,
        }
    }

    /// Shuts down the backend.
    pub async fn shutdown(self) -> DatastoreResult<()> {
        self.backend.shutdown().await
    }
}

/// Builder for [`ModelStore`].
#[derive(Debug)]
pub struct ModelStoreBuilder<B: DatastoreBackend> {
    backend: B,
    registry: Option<Arc<ModelRegistry>>,
    config: StoreConfig,
}

impl<B: DatastoreBackend> ModelStoreBuilder<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            registry: None,
            config: StoreConfig::default(),
        }
    }

    /// Sets the project of the store partition.
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.config.partition.project_id = project_id.into();
        self
    }

    /// Sets the namespace of the store partition.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.partition.namespace_id = Some(namespace.into());
        self
    }

    /// Uses `registry` instead of the global one.
    pub fn registry(mut self, registry: Arc<ModelRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> ModelStore<B> {
        ModelStore {
            backend: self.backend,
            registry: self.registry.unwrap_or_else(ModelRegistry::global),
            config: self.config,
        }
    }
}
