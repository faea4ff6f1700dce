//! Convenient re-exports of commonly used types from entlayer.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use entlayer::prelude::*;
//! ```
//!
//! This provides access to:
//! - Models, fields and the derive macro
//! - Keys, values and entities
//! - Property descriptors and the mapping engine
//! - Store, collections and backends
//! - Query construction and filtering
//! - Error types

pub use entlayer_core::{
    backend::{BackendBuilder, DatastoreBackend, DynBackend, DynDatastoreBackend, Mutation},
    collection::ModelCollection,
    description::ModelDescription,
    entity::Entity,
    error::{DatastoreError, DatastoreResult},
    key::{Key, KeyId, PartitionId},
    model::{AnyModel, DynamicProperties, Expando, Field, KeyIdentifier, Model},
    property::{JsonProperty, ListProperty, Property, TypedProperty},
    query::{Direction, Expr, Filter, ModelQueryBuilder, Order, PropertyOp, Query, QueryBuilder, QueryVisitor},
    registry::ModelRegistry,
    store::{ModelStore, ModelStoreBuilder, StoreConfig},
    value::{Blob, GeoPoint, PropertyValue, Value, ValueKind},
};
pub use entlayer_macros::Model;
