//! Typed collections of models.
//!
//! A [`ModelCollection`] is the view of a [`ModelStore`] for one model type.
//! Writes encode models through the type's cached description before
//! anything is sent to the backend, so a validation failure aborts the whole
//! batch. Reads decode the returned entities through the same description.
//!
//! # Example
//!
//! ```ignore
//! let people = store.collection::<Person>()?;
//!
//! let keys = people.insert(&[ada, grace]).await?;
//! let ada = people.get(&keys[0]).await?;
//!
//! let adults = people.query(people.filter().gte("age", 18).build()?).await?;
//! ```

use std::{collections::HashMap, sync::Arc};
use tracing::trace;

use crate::{
    backend::{DatastoreBackend, Mutation},
    description::ModelDescription,
    entity::Entity,
    error::{DatastoreError, DatastoreResult},
    key::{Key, KeyId},
    model::Model,
    query::{ModelQueryBuilder, Query},
    store::ModelStore,
    value::ValueKind,
};

/// The typed view of a [`ModelStore`] for model type `M`.
pub struct ModelCollection<'a, M: Model, B: DatastoreBackend> {
    store: &'a ModelStore<B>,
    description: Arc<ModelDescription<M>>,
}

impl<'a, M: Model, B: DatastoreBackend> ModelCollection<'a, M, B> {
    pub(crate) fn new(store: &'a ModelStore<B>, description: Arc<ModelDescription<M>>) -> Self {
        Self { store, description }
    }

    /// The entity kind of `M`.
    pub fn kind(&self) -> &'static str {
        M::KIND
    }

    /// The cached description encoding and decoding `M`.
    pub fn description(&self) -> &Arc<ModelDescription<M>> {
        &self.description
    }

    /// The key of the root entity of this kind with `id`.
    pub fn key(&self, id: impl Into<KeyId>) -> Key {
        self.store.localize(Key::new(M::KIND, Some(id.into())))
    }

    /// The key of the entity of this kind with `id` below `parent`.
    pub fn child_key(&self, parent: &Key, id: impl Into<KeyId>) -> Key {
        self.store
            .localize(Key::with_parent(parent, M::KIND, Some(id.into())))
    }

    /// Encodes `model` into the entity this collection would store.
    pub fn encode(&self, model: &M) -> DatastoreResult<Entity> {
        let entity = self.description.encode_model(model)?;
        Ok(self.store.localize_entity(entity))
    }

    async fn write(&self, models: &[M], mutation: fn(Entity) -> Mutation) -> DatastoreResult<Vec<Key>> {
        let mutations = models
            .iter()
            .map(|model| self.encode(model).map(mutation))
            .collect::<DatastoreResult<Vec<_>>>()?;

        trace!(
            target: "entlayer::collection",
            kind = M::KIND,
            mutations = mutations.len(),
            "Committing models"
        );

        self.store.backend().commit(mutations).await
    }

    /// Stores new models. Models without an id get one allocated.
    ///
    /// # Errors
    ///
    /// Fails without writing anything if any model fails validation or if
    /// any key is already taken.
    pub async fn insert(&self, models: &[M]) -> DatastoreResult<Vec<Key>> {
        self.write(models, Mutation::Insert).await
    }

    /// Replaces existing models.
    pub async fn update(&self, models: &[M]) -> DatastoreResult<Vec<Key>> {
        self.write(models, Mutation::Update).await
    }

    /// Stores models whether or not they exist.
    pub async fn put(&self, models: &[M]) -> DatastoreResult<Vec<Key>> {
        self.write(models, Mutation::Upsert).await
    }

    /// Stores one model and writes the allocated id back into it.
    pub async fn save(&self, model: &mut M) -> DatastoreResult<Key> {
        let entity = self.encode(model)?;
        let keys = self
            .store
            .backend()
            .commit(vec![Mutation::Upsert(entity)])
            .await?;
        let key = keys
            .into_iter()
            .next()
            .ok_or_else(|| DatastoreError::Backend("commit returned no key".to_string()))?;

        model.set_id(key.id().cloned()).map_err(|id| DatastoreError::TypeMismatch {
            kind: M::KIND.to_string(),
            field: M::ID_FIELD.to_string(),
            found: match id {
                KeyId::Id(_) => ValueKind::Integer,
                KeyId::Name(_) => ValueKind::String,
            },
        })?;

        Ok(key)
    }

    /// Fetches the model stored under `key`.
    pub async fn get(&self, key: &Key) -> DatastoreResult<Option<M>> {
        let key = self.store.localize(key.clone());
        let entity = self
            .store
            .backend()
            .lookup(vec![key.clone()])
            .await?
            .into_iter()
            .find(|entity| entity.key() == &key);

        self.description.decode_entity(&key, entity.as_ref())
    }

    /// Fetches the models stored under `keys`, in request order.
    ///
    /// A key requested more than once yields the model in every slot.
    pub async fn get_multi(&self, keys: &[Key]) -> DatastoreResult<Vec<Option<M>>> {
        let keys: Vec<Key> = keys.iter().map(|key| self.store.localize(key.clone())).collect();
        let found: HashMap<Key, Entity> = self
            .store
            .backend()
            .lookup(keys.clone())
            .await?
            .into_iter()
            .map(|entity| (entity.key().clone(), entity))
            .collect();

        keys.iter()
            .map(|key| self.description.decode_entity(key, found.get(key)))
            .collect()
    }

    /// Deletes the models stored under `keys`. Missing keys are ignored.
    pub async fn delete(&self, keys: &[Key]) -> DatastoreResult<()> {
        let mutations = keys
            .iter()
            .map(|key| Mutation::Delete(self.store.localize(key.clone())))
            .collect();

        self.store.backend().commit(mutations).await?;
        Ok(())
    }

    /// Runs `query` against this kind and decodes the results.
    ///
    /// Keys in `__key__` and ancestor filters are moved into the store's
    /// partition like the keys passed to [`get`](Self::get).
    pub async fn query(&self, mut query: Query) -> DatastoreResult<Vec<M>> {
        query.kind = Some(M::KIND.to_string());
        query.filter = query.filter.map(|filter| self.store.localize_filter(filter));

        let entities = self.store.backend().run_query(query).await?;
        let mut models = Vec::with_capacity(entities.len());
        for entity in &entities {
            models.extend(self.description.decode_entity(entity.key(), Some(entity))?);
        }

        Ok(models)
    }

    /// Starts a query over this kind by field name.
    pub fn filter(&self) -> ModelQueryBuilder<M> {
        ModelQueryBuilder::new(self.description.clone())
    }

    /// Reserves `count` ids for this kind without storing anything.
    pub async fn allocate_ids(&self, count: usize) -> DatastoreResult<Vec<Key>> {
        let key = self.store.localize(Key::new(M::KIND, None));
        self.store.backend().allocate_ids(vec![key; count]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fixtures::{Person, ada},
        registry::ModelRegistry,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Recorder {
        commits: Mutex<Vec<Vec<Mutation>>>,
    }

    #[async_trait]
    impl DatastoreBackend for Recorder {
        async fn lookup(&self, _keys: Vec<Key>) -> DatastoreResult<Vec<Entity>> {
            Ok(Vec::new())
        }

        async fn allocate_ids(&self, keys: Vec<Key>) -> DatastoreResult<Vec<Key>> {
            Ok(keys.into_iter().enumerate().map(|(i, key)| key.completed(KeyId::Id(i as i64 + 1))).collect())
        }

        async fn commit(&self, mutations: Vec<Mutation>) -> DatastoreResult<Vec<Key>> {
            let keys = mutations.iter().map(|mutation| mutation.key().clone()).collect();
            self.commits.lock().unwrap().push(mutations);
            Ok(keys)
        }

        async fn run_query(&self, _query: Query) -> DatastoreResult<Vec<Entity>> {
            Ok(Vec::new())
        }
    }

    fn store() -> ModelStore<Recorder> {
        ModelStore::builder(Recorder::default())
            .project_id("demo")
            .registry(Arc::new(ModelRegistry::new()))
            .build()
    }

    #[tokio::test]
    async fn writes_abort_before_commit_on_validation_failure() {
        let store = store();
        let people = store.collection::<Person>().unwrap();
        let bad = Person { score: -3.0, ..ada() };

        let err = people.insert(&[ada(), bad]).await.unwrap_err();
        assert_eq!(err, DatastoreError::validation("Person", "score"));
        assert!(store.backend().commits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn written_keys_carry_the_configured_partition() {
        let store = store();
        let people = store.collection::<Person>().unwrap();

        let keys = people.put(&[ada()]).await.unwrap();
        assert_eq!(keys[0].partition().project_id, "demo");
        assert_eq!(keys[0], people.key(7i64));

        let commits = store.backend().commits.lock().unwrap();
        assert!(matches!(&commits[0][0], Mutation::Upsert(entity) if entity.key() == &keys[0]));
    }

    #[tokio::test]
    async fn missing_entities_read_as_none() {
        let store = store();
        let people = store.collection::<Person>().unwrap();

        assert_eq!(people.get(&people.key(1i64)).await.unwrap(), None);
        assert_eq!(
            people.get_multi(&[people.key(1i64), people.key(2i64)]).await.unwrap(),
            vec![None, None]
        );
    }

    #[tokio::test]
    async fn allocated_ids_are_in_this_kind_and_partition() {
        let store = store();
        let people = store.collection::<Person>().unwrap();

        let keys = people.allocate_ids(2).await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|key| key.kind() == "Person" && key.is_complete()));
        assert!(keys.iter().all(|key| key.partition().project_id == "demo"));
    }
}
