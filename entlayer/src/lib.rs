//! Main entlayer crate providing typed models over a schema-less datastore.
//!
//! This crate is the primary entry point for users of the entlayer framework.
//! It re-exports the core types and functionality from the sub-crates and
//! provides access to the bundled backends.
//!
//! # Features
//!
//! - **Typed models** - Declare a struct, derive `Model`, and map it onto datastore entities
//! - **Property descriptors** - Choose wire names, indexing, validation and encoding per field
//! - **Expando models** - Carry properties the struct does not declare through a dynamic bag
//! - **Composable queries** - Filter and order by field name, translated to wire names
//! - **Pluggable backends** - An async datastore-access trait with an in-memory implementation
//!
//! # Quick Start
//!
//! ```ignore
//! use entlayer::{prelude::*, memory::InMemoryDatastore};
//!
//! #[derive(Debug, Default, Model)]
//! #[model(kind = "Person")]
//! pub struct Person {
//!     pub id: Option<i64>,
//!     #[model(property = TypedProperty::string().required())]
//!     pub name: String,
//!     pub age: i64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> DatastoreResult<()> {
//!     let store = ModelStore::new(InMemoryDatastore::builder().build().await?);
//!     let people = store.collection::<Person>()?;
//!
//!     let mut ada = Person { name: "Ada".to_string(), age: 36, ..Default::default() };
//!     let key = people.save(&mut ada).await?;
//!
//!     let adults = people.query(people.filter().gte("age", 18i64).build()?).await?;
//!     println!("{:?} {:?}", people.get(&key).await?, adults);
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! A typed `ModelStore` can be converted with `into_dyn` into a store whose
//! backend type is erased, for selecting backends at runtime. Entities of any
//! registered kind can then be fetched with `get_any` and downcast:
//!
//! ```ignore
//! let store = ModelStore::new(InMemoryDatastore::new()).into_dyn();
//! store.collection::<Person>()?.put(&[ada]).await?;
//!
//! let model = store.get_any(&key).await?.unwrap();
//! let ada = model.downcast_ref::<Person>().unwrap();
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing

#[allow(unused_extern_crates)]
extern crate self as entlayer;

pub mod prelude;

pub use entlayer_core::{
    backend, collection, description, entity, error, key, model, property, query, registry, store, value, wire,
};
pub use entlayer_macros::Model;

/// In-memory datastore backend.
pub mod memory {
    pub use entlayer_memory::{InMemoryDatastore, InMemoryDatastoreBuilder};
}
