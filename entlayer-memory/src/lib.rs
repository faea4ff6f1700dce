//! In-memory datastore backend for entlayer.
//!
//! This crate provides [`InMemoryDatastore`], an implementation of the
//! [`DatastoreBackend`](entlayer_core::backend::DatastoreBackend) contract that
//! keeps entities in process memory. It is meant for development and tests.
//!
//! # Example
//!
//! ```ignore
//! use entlayer::{memory::InMemoryDatastore, store::ModelStore};
//!
//! let store = ModelStore::new(InMemoryDatastore::new());
//! let people = store.collection::<Person>()?;
//! people.insert(&[ada]).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as entlayer_memory;

mod evaluator;
pub mod store;

pub use store::{InMemoryDatastore, InMemoryDatastoreBuilder};
