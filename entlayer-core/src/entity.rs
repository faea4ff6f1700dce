//! The wire-level entity record.
//!
//! An [`Entity`] is what the datastore stores: a [`Key`], a name-to-value
//! property map, and the set of property names excluded from indexes. The
//! mapping engine builds a fresh entity per encode and never mutates one
//! afterwards.

use indexmap::IndexMap;
use std::collections::BTreeSet;

use crate::{key::Key, value::Value};

/// A key plus a property map plus the names of its unindexed properties.
///
/// # Example
///
/// ```ignore
/// use entlayer::{entity::Entity, key::Key, value::Value};
///
/// let entity = Entity::new(Key::new("Person", Some(7.into())))
///     .with_property("name", "Ada")
///     .with_unindexed_property("bio", "Wrote the first program.");
///
/// assert_eq!(entity.get("name"), Some(&Value::from("Ada")));
/// assert!(!entity.is_indexed("bio"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub(crate) key: Key,
    pub(crate) properties: IndexMap<String, Value>,
    pub(crate) unindexed: BTreeSet<String>,
}

impl Entity {
    /// Creates an entity with no properties.
    pub fn new(key: Key) -> Self {
        Self {
            key,
            properties: IndexMap::new(),
            unindexed: BTreeSet::new(),
        }
    }

    /// Creates an entity from all of its parts.
    pub fn from_parts(
        key: Key,
        properties: IndexMap<String, Value>,
        unindexed: BTreeSet<String>,
    ) -> Self {
        Self { key, properties, unindexed }
    }

    /// Adds an indexed property.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        self.unindexed.remove(&name);
        self.properties.insert(name, value.into());
        self
    }

    /// Adds a property excluded from indexes.
    pub fn with_unindexed_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        self.unindexed.insert(name.clone());
        self.properties.insert(name, value.into());
        self
    }

    /// The key this entity is stored under.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Replaces the key, e.g. once the datastore has allocated an id.
    pub fn with_key(mut self, key: Key) -> Self {
        self.key = key;
        self
    }

    /// All properties, indexed or not, in insertion order.
    pub fn properties(&self) -> &IndexMap<String, Value> {
        &self.properties
    }

    /// The value of property `name`, if present.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Names of the properties excluded from indexes.
    pub fn unindexed(&self) -> &BTreeSet<String> {
        &self.unindexed
    }

    /// Returns `true` if `name` is present and indexed.
    pub fn is_indexed(&self, name: &str) -> bool {
        self.properties.contains_key(name) && !self.unindexed.contains(name)
    }

    /// Splits the entity into key, properties and unindexed names.
    pub fn into_parts(self) -> (Key, IndexMap<String, Value>, BTreeSet<String>) {
        (self.key, self.properties, self.unindexed)
    }
}
