//! The datastore-access contract.
//!
//! The mapping engine turns models into entities and back; a
//! [`DatastoreBackend`] moves those entities in and out of a datastore. The
//! trait exposes the four operations the engine's callers need: key lookup,
//! id allocation, atomic commit of mutations, and query execution.
//!
//! # Traits
//!
//! - [`DatastoreBackend`]: the core async trait for datastore backends
//! - [`DynDatastoreBackend`]: an object-safe counterpart for dynamic dispatch
//! - [`BackendBuilder`]: factory trait for creating backend instances
//!
//! # Example
//!
//! ```ignore
//! use entlayer::backend::{DatastoreBackend, Mutation};
//! use entlayer::entity::Entity;
//! use entlayer::key::Key;
//!
//! let backend = MyBackendImpl::new();
//!
//! let entity = Entity::new(Key::new("Person", None)).with_property("name", "Ada");
//! let keys = backend.commit(vec![Mutation::Insert(entity)]).await?;
//! let found = backend.lookup(keys).await?;
//! ```

use async_trait::async_trait;
use std::{any::Any, fmt::Debug};

use crate::{entity::Entity, error::DatastoreResult, key::Key, query::Query};

/// One write in a commit.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Stores a new entity; fails if its key is taken.
    Insert(Entity),
    /// Replaces an existing entity; fails if its key holds nothing.
    Update(Entity),
    /// Stores an entity whether or not its key is taken.
    Upsert(Entity),
    /// Removes the entity under a key, if any.
    Delete(Key),
}

impl Mutation {
    /// The key this mutation targets.
    pub fn key(&self) -> &Key {
        match self {
            Mutation::Insert(entity) | Mutation::Update(entity) | Mutation::Upsert(entity) => entity.key(),
            Mutation::Delete(key) => key,
        }
    }
}

/// Core trait for datastore backends.
///
/// Implementations must be thread-safe and support concurrent calls.
#[async_trait]
pub trait DatastoreBackend: Send + Sync + Debug {
    /// Fetches the entities stored under `keys`. Keys with no entity are
    /// omitted from the result.
    async fn lookup(&self, keys: Vec<Key>) -> DatastoreResult<Vec<Entity>>;

    /// Allocates ids for incomplete `keys`, returning the completed keys in order.
    async fn allocate_ids(&self, keys: Vec<Key>) -> DatastoreResult<Vec<Key>>;

    /// Applies `mutations` atomically.
    ///
    /// Returns one complete key per mutation, in order. Incomplete keys of
    /// inserted entities are completed by the backend.
    ///
    /// # Errors
    ///
    /// If any mutation fails no mutation is applied.
    async fn commit(&self, mutations: Vec<Mutation>) -> DatastoreResult<Vec<Key>>;

    /// Runs `query`, returning the matching entities.
    async fn run_query(&self, query: Query) -> DatastoreResult<Vec<Entity>>;

    /// Shuts down the backend, releasing any held resources.
    async fn shutdown(self) -> DatastoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> DatastoreBackend for &B
where
    B: DatastoreBackend,
{
    async fn lookup(&self, keys: Vec<Key>) -> DatastoreResult<Vec<Entity>> {
        (*self).lookup(keys).await
    }

    async fn allocate_ids(&self, keys: Vec<Key>) -> DatastoreResult<Vec<Key>> {
        (*self).allocate_ids(keys).await
    }

    async fn commit(&self, mutations: Vec<Mutation>) -> DatastoreResult<Vec<Key>> {
        (*self).commit(mutations).await
    }

    async fn run_query(&self, query: Query) -> DatastoreResult<Vec<Entity>> {
        (*self).run_query(query).await
    }
}

/// Object-safe counterpart of [`DatastoreBackend`].
///
/// Implemented for every `DatastoreBackend`; use it to hold backends of
/// different types behind one `Box<dyn DynDatastoreBackend>`.
#[async_trait]
pub trait DynDatastoreBackend: Send + Sync + Debug {
    async fn lookup(&self, keys: Vec<Key>) -> DatastoreResult<Vec<Entity>>;
    async fn allocate_ids(&self, keys: Vec<Key>) -> DatastoreResult<Vec<Key>>;
    async fn commit(&self, mutations: Vec<Mutation>) -> DatastoreResult<Vec<Key>>;
    async fn run_query(&self, query: Query) -> DatastoreResult<Vec<Entity>>;
    async fn shutdown_boxed(self: Box<Self>) -> DatastoreResult<()>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

#[async_trait]
impl<B: DatastoreBackend + 'static> DynDatastoreBackend for B {
    async fn lookup(&self, keys: Vec<Key>) -> DatastoreResult<Vec<Entity>> {
        DatastoreBackend::lookup(self, keys).await
    }

    async fn allocate_ids(&self, keys: Vec<Key>) -> DatastoreResult<Vec<Key>> {
        DatastoreBackend::allocate_ids(self, keys).await
    }

    async fn commit(&self, mutations: Vec<Mutation>) -> DatastoreResult<Vec<Key>> {
        DatastoreBackend::commit(self, mutations).await
    }

    async fn run_query(&self, query: Query) -> DatastoreResult<Vec<Entity>> {
        DatastoreBackend::run_query(self, query).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DatastoreResult<()> {
        DatastoreBackend::shutdown(*self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A type-erased backend that is itself a [`DatastoreBackend`].
#[derive(Debug)]
pub struct DynBackend(Box<dyn DynDatastoreBackend>);

impl DynBackend {
    /// Erases the type of `backend`.
    pub fn new(backend: impl DatastoreBackend + 'static) -> Self {
        Self(Box::new(backend))
    }

    /// Wraps an already boxed backend.
    pub fn from_boxed(backend: Box<dyn DynDatastoreBackend>) -> Self {
        Self(backend)
    }

    /// Returns `Some(&B)` if the erased backend is a `B`.
    pub fn downcast_ref<B: DatastoreBackend + 'static>(&self) -> Option<&B> {
        self.0.as_any().downcast_ref::<B>()
    }

    /// Returns `Some(&mut B)` if the erased backend is a `B`.
    pub fn downcast_mut<B: DatastoreBackend + 'static>(&mut self) -> Option<&mut B> {
        self.0.as_any_mut().downcast_mut::<B>()
    }

    /// Unwraps the boxed backend.
    pub fn into_inner(self) -> Box<dyn DynDatastoreBackend> {
        self.0
    }
}

#[async_trait]
impl DatastoreBackend for DynBackend {
    async fn lookup(&self, keys: Vec<Key>) -> DatastoreResult<Vec<Entity>> {
        self.0.lookup(keys).await
    }

    async fn allocate_ids(&self, keys: Vec<Key>) -> DatastoreResult<Vec<Key>> {
        self.0.allocate_ids(keys).await
    }

    async fn commit(&self, mutations: Vec<Mutation>) -> DatastoreResult<Vec<Key>> {
        self.0.commit(mutations).await
    }

    async fn run_query(&self, query: Query) -> DatastoreResult<Vec<Entity>> {
        self.0.run_query(query).await
    }

    async fn shutdown(self) -> DatastoreResult<()> {
        self.0.shutdown_boxed().await
    }
}

/// Factory trait for creating backend instances.
#[async_trait]
pub trait BackendBuilder {
    type Backend: DatastoreBackend;

    async fn build(self) -> DatastoreResult<Self::Backend>;
}
