//! Procedural macros for the entlayer project.
//!
//! This crate provides `#[derive(Model)]`, which generates a model's field
//! accessor table and key hooks from struct attributes.

#[allow(unused_extern_crates)]
extern crate self as entlayer_macros;

use proc_macro::TokenStream;

mod model;

/// Derives `entlayer::model::Model` for a struct with named fields.
///
/// Container attribute:
///
/// - `#[model(kind = "Person")]`: the entity kind, defaulting to the struct name.
///
/// Field attributes:
///
/// - `#[model(id)]`: the identifier field (`Option<i64>`, `Option<String>` or
///   `Option<KeyId>`). Without it, a field named `id` is used.
/// - `#[model(parent)]`: an `Option<Key>` field holding the parent key.
/// - `#[model(expando)]`: an `Expando` field collecting dynamic properties;
///   makes the model an expando model.
/// - `#[model(property = expr)]`: the property descriptor for the field,
///   e.g. `TypedProperty::string().required()`.
/// - `#[model(skip)]`: leaves the field out of the mapping.
///
/// Every other field is mapped with the default descriptor of its type.
///
/// # Example
///
/// ```ignore
/// use entlayer::{Model, model::Expando, property::TypedProperty};
///
/// #[derive(Debug, Default, Model)]
/// #[model(kind = "Note")]
/// pub struct Note {
///     #[model(id)]
///     pub id: Option<String>,
///     #[model(property = TypedProperty::string().name("t"))]
///     pub title: String,
///     #[model(expando)]
///     pub extra: Expando,
/// }
/// ```
#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    model::derive_model(input.into()).into()
}
