//! In-memory datastore backend.
//!
//! Entities live in a `HashMap` keyed by their complete [`Key`] behind an
//! async-aware read-write lock. Integer ids are handed out from a shared
//! counter.

use async_trait::async_trait;
use mea::rwlock::RwLock;
use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering as AtomicOrdering},
    },
};
use tracing::debug;

use entlayer_core::{
    backend::{BackendBuilder, DatastoreBackend, Mutation},
    entity::Entity,
    error::{DatastoreError, DatastoreResult},
    key::{Key, KeyId},
    query::{Direction, Order, Query},
};

use crate::evaluator::{EntityEvaluator, key_cmp, sort_value};

type EntityMap = HashMap<Key, Entity>;

/// Thread-safe in-memory datastore.
///
/// `InMemoryDatastore` is cloneable; clones share the same entities and the
/// same id counter.
///
/// Queries scan every stored entity. Filters and orders see indexed
/// properties only, so an entity stored with an unindexed `bio` property is
/// never returned by a filter on `bio`.
///
/// # Example
///
/// ```ignore
/// use entlayer_memory::InMemoryDatastore;
/// use entlayer::backend::{DatastoreBackend, Mutation};
///
/// let datastore = InMemoryDatastore::new();
///
/// let entity = Entity::new(Key::new("Person", None)).with_property("name", "Ada");
/// let keys = datastore.commit(vec![Mutation::Insert(entity)]).await?;
/// assert_eq!(datastore.lookup(keys).await?.len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryDatastore {
    entities: Arc<RwLock<EntityMap>>,
    next_id: Arc<AtomicI64>,
}

impl Default for InMemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDatastore {
    /// Creates an empty datastore that allocates ids from 1.
    pub fn new() -> Self {
        Self::with_first_id(1)
    }

    fn with_first_id(first_id: i64) -> Self {
        Self {
            entities: Arc::new(RwLock::new(EntityMap::new())),
            next_id: Arc::new(AtomicI64::new(first_id)),
        }
    }

    /// Starts configuring a datastore.
    pub fn builder() -> InMemoryDatastoreBuilder {
        InMemoryDatastoreBuilder::default()
    }

    /// The number of stored entities.
    pub async fn len(&self) -> usize {
        self.entities.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entities.read().await.is_empty()
    }

    /// Removes every stored entity. The id counter keeps counting.
    pub async fn clear(&self) {
        self.entities.write().await.clear();
    }

    /// Gives `key` an id if its last element has none.
    ///
    /// Fails if an ancestor of `key` is itself incomplete.
    fn complete(&self, key: &Key) -> DatastoreResult<Key> {
        let key = match key.id() {
            Some(_) => key.clone(),
            None => key.completed(KeyId::Id(self.next_id.fetch_add(1, AtomicOrdering::SeqCst))),
        };

        if !key.is_complete() {
            return Err(DatastoreError::IncompleteKey(key.to_string()));
        }

        Ok(key)
    }
}

fn require_complete(key: &Key) -> DatastoreResult<()> {
    if key.is_complete() {
        Ok(())
    } else {
        Err(DatastoreError::IncompleteKey(key.to_string()))
    }
}

fn compare_entities(a: &Entity, b: &Entity, orders: &[Order]) -> Ordering {
    for order in orders {
        let ordering = match (sort_value(a, order), sort_value(b, order)) {
            (Some(left), Some(right)) => left.total_cmp(&right),
            _ => Ordering::Equal,
        };
        let ordering = match order.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    key_cmp(a.key(), b.key())
}

#[async_trait]
impl DatastoreBackend for InMemoryDatastore {
    async fn lookup(&self, keys: Vec<Key>) -> DatastoreResult<Vec<Entity>> {
        let entities = self.entities.read().await;

        Ok(keys.iter().filter_map(|key| entities.get(key).cloned()).collect())
    }

    async fn allocate_ids(&self, keys: Vec<Key>) -> DatastoreResult<Vec<Key>> {
        keys.iter().map(|key| self.complete(key)).collect()
    }

    async fn commit(&self, mutations: Vec<Mutation>) -> DatastoreResult<Vec<Key>> {
        let mut entities = self.entities.write().await;

        // Staged writes shadow the stored entities so later mutations in the
        // batch see earlier ones. Nothing is applied until all of them pass.
        let mut staged: HashMap<Key, Option<Entity>> = HashMap::new();
        let mut keys = Vec::with_capacity(mutations.len());
        let exists = |staged: &HashMap<Key, Option<Entity>>, key: &Key| match staged.get(key) {
            Some(slot) => slot.is_some(),
            None => entities.contains_key(key),
        };

        for mutation in mutations {
            match mutation {
                Mutation::Insert(entity) => {
                    let key = self.complete(entity.key())?;
                    if exists(&staged, &key) {
                        return Err(DatastoreError::EntityAlreadyExists(key.to_string()));
                    }
                    staged.insert(key.clone(), Some(entity.with_key(key.clone())));
                    keys.push(key);
                }
                Mutation::Update(entity) => {
                    let key = entity.key().clone();
                    require_complete(&key)?;
                    if !exists(&staged, &key) {
                        return Err(DatastoreError::EntityNotFound(key.to_string()));
                    }
                    staged.insert(key.clone(), Some(entity));
                    keys.push(key);
                }
                Mutation::Upsert(entity) => {
                    let key = self.complete(entity.key())?;
                    staged.insert(key.clone(), Some(entity.with_key(key.clone())));
                    keys.push(key);
                }
                Mutation::Delete(key) => {
                    require_complete(&key)?;
                    staged.insert(key.clone(), None);
                    keys.push(key);
                }
            }
        }

        let written = staged.values().filter(|slot| slot.is_some()).count();
        let deleted = staged.len() - written;
        for (key, slot) in staged {
            match slot {
                Some(entity) => {
                    entities.insert(key, entity);
                }
                None => {
                    entities.remove(&key);
                }
            }
        }

        debug!(
            target: "entlayer::memory",
            written,
            deleted,
            stored = entities.len(),
            "Committed mutations"
        );

        Ok(keys)
    }

    async fn run_query(&self, query: Query) -> DatastoreResult<Vec<Entity>> {
        let entities = self.entities.read().await;

        let candidates = entities.values().filter(|entity| match &query.kind {
            Some(kind) => entity.key().kind() == kind,
            None => true,
        });
        let mut matched = match &query.filter {
            Some(filter) => EntityEvaluator::filter_entities(candidates, filter)?,
            None => candidates.collect::<Vec<_>>(),
        };

        // Entities lacking an indexed value for an order property drop out.
        matched.retain(|entity| query.orders.iter().all(|order| sort_value(entity, order).is_some()));
        matched.sort_by(|a, b| compare_entities(a, b, &query.orders));

        let results: Vec<Entity> = matched
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();

        debug!(
            target: "entlayer::memory",
            kind = query.kind.as_deref().unwrap_or("*"),
            results = results.len(),
            "Ran query"
        );

        Ok(results)
    }
}

/// Builder for [`InMemoryDatastore`] instances.
///
/// # Example
///
/// ```ignore
/// use entlayer::backend::BackendBuilder;
///
/// let datastore = InMemoryDatastore::builder().first_id(1000).build().await?;
/// ```
#[derive(Debug)]
pub struct InMemoryDatastoreBuilder {
    first_id: i64,
}

impl Default for InMemoryDatastoreBuilder {
    fn default() -> Self {
        Self { first_id: 1 }
    }
}

impl InMemoryDatastoreBuilder {
    /// The first id handed to an incomplete key.
    pub fn first_id(mut self, first_id: i64) -> Self {
        self.first_id = first_id;
        self
    }
}

#[async_trait]
impl BackendBuilder for InMemoryDatastoreBuilder {
    type Backend = InMemoryDatastore;

    /// Fails if the first id is not positive.
    async fn build(self) -> DatastoreResult<Self::Backend> {
        if self.first_id < 1 {
            return Err(DatastoreError::Initialization(format!(
                "first id must be positive, got {}",
                self.first_id
            )));
        }

        Ok(InMemoryDatastore::with_first_id(self.first_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entlayer_core::query::Filter;

    fn person(id: Option<i64>, name: &str, age: i64) -> Entity {
        Entity::new(Key::new("Person", id.map(KeyId::Id)))
            .with_property("name", name)
            .with_property("age", age)
    }

    fn names(entities: &[Entity]) -> Vec<&str> {
        entities
            .iter()
            .filter_map(|entity| entity.get("name").and_then(|value| value.as_str()))
            .collect()
    }

    async fn seeded() -> InMemoryDatastore {
        let datastore = InMemoryDatastore::new();
        datastore
            .commit(vec![
                Mutation::Insert(person(Some(1), "Ada", 36)),
                Mutation::Insert(person(Some(2), "Grace", 45)),
                Mutation::Insert(person(Some(3), "Edsger", 28)),
                Mutation::Insert(Entity::new(Key::new("Pet", Some(KeyId::Id(1)))).with_property("name", "Rex")),
            ])
            .await
            .unwrap();
        datastore
    }

    #[tokio::test]
    async fn insert_completes_keys_and_lookup_skips_missing() {
        let datastore = InMemoryDatastore::new();
        let keys = datastore
            .commit(vec![Mutation::Insert(person(None, "Ada", 36)), Mutation::Insert(person(None, "Grace", 45))])
            .await
            .unwrap();

        assert_eq!(keys[0].id(), Some(&KeyId::Id(1)));
        assert_eq!(keys[1].id(), Some(&KeyId::Id(2)));

        let mut requested = keys.clone();
        requested.push(Key::new("Person", Some(KeyId::Id(99))));
        let found = datastore.lookup(requested).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].key(), &keys[0]);
    }

    #[tokio::test]
    async fn failed_commits_apply_nothing() {
        let datastore = seeded().await;

        let err = datastore
            .commit(vec![
                Mutation::Upsert(person(Some(4), "Barbara", 50)),
                Mutation::Insert(person(Some(1), "Ada again", 1)),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, DatastoreError::EntityAlreadyExists(_)));
        assert_eq!(datastore.len().await, 4);
        assert!(datastore.lookup(vec![Key::new("Person", Some(KeyId::Id(4)))]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_requires_an_existing_complete_key() {
        let datastore = seeded().await;

        let err = datastore.commit(vec![Mutation::Update(person(Some(9), "Nobody", 0))]).await.unwrap_err();
        assert!(matches!(err, DatastoreError::EntityNotFound(_)));

        let err = datastore.commit(vec![Mutation::Update(person(None, "Nobody", 0))]).await.unwrap_err();
        assert!(matches!(err, DatastoreError::IncompleteKey(_)));

        let err = datastore.commit(vec![Mutation::Delete(Key::new("Person", None))]).await.unwrap_err();
        assert!(matches!(err, DatastoreError::IncompleteKey(_)));

        datastore.commit(vec![Mutation::Update(person(Some(1), "Ada", 37))]).await.unwrap();
        let found = datastore.lookup(vec![Key::new("Person", Some(KeyId::Id(1)))]).await.unwrap();
        assert_eq!(found[0].get("age"), Some(&37i64.into()));
    }

    #[tokio::test]
    async fn deleting_missing_keys_is_a_no_op() {
        let datastore = seeded().await;

        datastore
            .commit(vec![
                Mutation::Delete(Key::new("Person", Some(KeyId::Id(1)))),
                Mutation::Delete(Key::new("Person", Some(KeyId::Id(42)))),
            ])
            .await
            .unwrap();

        assert_eq!(datastore.len().await, 3);
    }

    #[tokio::test]
    async fn later_mutations_see_earlier_ones() {
        let datastore = InMemoryDatastore::new();
        let key = Key::new("Person", Some(KeyId::Id(1)));

        datastore
            .commit(vec![
                Mutation::Insert(person(Some(1), "Ada", 36)),
                Mutation::Update(person(Some(1), "Ada", 37)),
                Mutation::Delete(key.clone()),
                Mutation::Insert(person(Some(1), "Ada", 38)),
            ])
            .await
            .unwrap();

        let found = datastore.lookup(vec![key]).await.unwrap();
        assert_eq!(found[0].get("age"), Some(&38i64.into()));
    }

    #[tokio::test]
    async fn queries_filter_by_kind_and_sort_by_orders() {
        let datastore = seeded().await;

        let everyone = datastore.run_query(Query::kind("Person")).await.unwrap();
        assert_eq!(names(&everyone), ["Ada", "Grace", "Edsger"]);

        let query = Query::builder()
            .kind("Person")
            .filter(Filter::gt("age", 30i64))
            .order("age", Direction::Descending)
            .build();
        assert_eq!(names(&datastore.run_query(query).await.unwrap()), ["Grace", "Ada"]);

        let query = Query::builder().kind("Person").order("name", Direction::Ascending).offset(1).limit(1).build();
        assert_eq!(names(&datastore.run_query(query).await.unwrap()), ["Edsger"]);

        let all = datastore.run_query(Query::new()).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn unindexed_properties_are_invisible_to_queries() {
        let datastore = InMemoryDatastore::new();
        datastore
            .commit(vec![
                Mutation::Insert(person(Some(1), "Ada", 36).with_unindexed_property("bio", "Analyst")),
                Mutation::Insert(person(Some(2), "Grace", 45).with_property("bio", "Admiral")),
            ])
            .await
            .unwrap();

        let query = Query::builder().kind("Person").filter(Filter::eq("bio", "Analyst")).build();
        assert!(datastore.run_query(query).await.unwrap().is_empty());

        let query = Query::builder().kind("Person").order("bio", Direction::Ascending).build();
        assert_eq!(names(&datastore.run_query(query).await.unwrap()), ["Grace"]);
    }

    #[tokio::test]
    async fn ancestor_queries_return_descendants() {
        let datastore = InMemoryDatastore::new();
        let owner = Key::new("Person", Some(KeyId::Id(1)));
        let other = Key::new("Person", Some(KeyId::Id(2)));

        let keys = datastore
            .commit(vec![
                Mutation::Insert(Entity::new(Key::with_parent(&owner, "Pet", None)).with_property("name", "Rex")),
                Mutation::Insert(Entity::new(Key::with_parent(&other, "Pet", None)).with_property("name", "Tom")),
            ])
            .await
            .unwrap();
        assert_eq!(keys[0].parent(), Some(owner.clone()));

        let query = Query::builder().kind("Pet").filter(Filter::has_ancestor(owner)).build();
        assert_eq!(names(&datastore.run_query(query).await.unwrap()), ["Rex"]);
    }

    #[tokio::test]
    async fn allocation_rejects_incomplete_ancestors() {
        let datastore = InMemoryDatastore::new();
        let orphan = Key::with_parent(&Key::new("Person", None), "Pet", None);

        let err = datastore.allocate_ids(vec![orphan]).await.unwrap_err();
        assert!(matches!(err, DatastoreError::IncompleteKey(_)));
    }

    #[tokio::test]
    async fn builder_sets_the_first_allocated_id() {
        let datastore = InMemoryDatastore::builder().first_id(1000).build().await.unwrap();
        let keys = datastore
            .allocate_ids(vec![Key::new("Person", None), Key::new("Person", None)])
            .await
            .unwrap();

        assert_eq!(keys[0].id(), Some(&KeyId::Id(1000)));
        assert_eq!(keys[1].id(), Some(&KeyId::Id(1001)));

        let err = InMemoryDatastore::builder().first_id(0).build().await.unwrap_err();
        assert!(matches!(err, DatastoreError::Initialization(_)));
    }

    #[tokio::test]
    async fn clones_share_entities() {
        let datastore = seeded().await;
        let clone = datastore.clone();

        clone.clear().await;
        assert!(datastore.is_empty().await);
    }
}
