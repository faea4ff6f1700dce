//! A typed model-to-entity mapping layer for document-oriented datastores.
//!
//! This crate is the core of the entlayer project and provides:
//!
//! - **Value model** ([`value`], [`key`], [`entity`]) - Primitive values, keys and the wire-level entity record
//! - **Wire codec** ([`wire`]) - The datastore's JSON record format
//! - **Property descriptors** ([`property`]) - Per-field naming, indexing, validation and encoding
//! - **Models** ([`model`]) - The model trait and explicit field accessor tables
//! - **Mapping engine** ([`description`]) - Compiled mapping state plus encode/decode, with expando support
//! - **Model registry** ([`registry`]) - The per-kind compiled description cache
//! - **Queries** ([`query`]) - Filter, order and query construction by property or field name
//! - **Backend abstraction** ([`backend`]) - The async datastore-access contract
//! - **Store and collections** ([`store`], [`collection`]) - The typed facade over a backend
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use entlayer::{Model, model::Expando, key::Key};
//!
//! #[derive(Debug, Default, Model)]
//! #[model(kind = "Person")]
//! pub struct Person {
//!     #[model(id)]
//!     pub id: Option<i64>,
//!     #[model(property = TypedProperty::string().required())]
//!     pub name: String,
//!     pub age: i64,
//! }
//!
//! let description = ModelDescription::<Person>::compile()?;
//! let entity = description.encode_model(&person)?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as entlayer_core;

pub mod backend;
pub mod collection;
pub mod description;
pub mod entity;
pub mod error;
pub mod key;
pub mod model;
pub mod property;
pub mod query;
pub mod registry;
pub mod store;
pub mod value;
pub mod wire;

#[cfg(test)]
mod fixtures;
