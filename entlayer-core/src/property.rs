//! Property descriptors.
//!
//! A descriptor is the per-field metadata the mapping engine consults for
//! wire naming, indexing, validation and primitive (en/de)coding. The engine
//! only ever talks to the [`Property`] trait; [`TypedProperty`],
//! [`ListProperty`] and [`JsonProperty`] are the descriptors shipped with the
//! crate, and applications may implement the trait for their own types.
//!
//! # Example
//!
//! ```ignore
//! use entlayer::property::{Property, TypedProperty};
//! use entlayer::value::Value;
//!
//! let email = TypedProperty::string().name("e").required();
//!
//! assert_eq!(email.name(), Some("e"));
//! assert!(email.validate(&Value::from("a@example.com")));
//! assert!(!email.validate(&Value::Null));
//! ```

use std::fmt::Debug;

use crate::{
    value::{Value, ValueKind},
    wire,
};

/// Per-field metadata governing wire naming, indexing, validation and encoding.
pub trait Property: Send + Sync + Debug {
    /// Explicit wire property name, overriding the field name.
    fn name(&self) -> Option<&str>;

    /// Whether values of this property are indexed by the datastore.
    fn indexed(&self) -> bool;

    /// Acceptance test applied before encoding and after decoding.
    fn validate(&self, value: &Value) -> bool;

    /// Converts an application-level value into its wire form.
    fn encode_value(&self, value: Value) -> Value;

    /// Converts a wire value back into its application-level form.
    fn decode_value(&self, raw: Value) -> Value;
}

/// A descriptor for single values of one [`ValueKind`].
///
/// `Null` is accepted unless the property is [`required`](TypedProperty::required).
/// Float properties accept integers and store them as doubles.
#[derive(Debug, Clone)]
pub struct TypedProperty {
    kind: Option<ValueKind>,
    name: Option<String>,
    indexed: bool,
    required: bool,
    choices: Option<Vec<Value>>,
    validator: Option<fn(&Value) -> bool>,
}

impl TypedProperty {
    /// Creates an indexed descriptor for `kind`. Blobs are unindexed.
    pub fn of_kind(kind: ValueKind) -> Self {
        Self {
            kind: Some(kind),
            name: None,
            indexed: kind != ValueKind::Blob,
            required: false,
            choices: None,
            validator: None,
        }
    }

    /// A descriptor accepting values of any kind.
    pub fn any() -> Self {
        Self {
            kind: None,
            ..Self::of_kind(ValueKind::Null)
        }
    }

    /// An indexed string.
    pub fn string() -> Self {
        Self::of_kind(ValueKind::String)
    }

    /// An unindexed string, for long text.
    pub fn text() -> Self {
        Self::of_kind(ValueKind::String).unindexed()
    }

    /// A 64-bit integer.
    pub fn integer() -> Self {
        Self::of_kind(ValueKind::Integer)
    }

    /// A double. Integers are accepted and stored as doubles.
    pub fn float() -> Self {
        Self::of_kind(ValueKind::Double)
    }

    /// A boolean.
    pub fn boolean() -> Self {
        Self::of_kind(ValueKind::Boolean)
    }

    /// A UTC timestamp.
    pub fn timestamp() -> Self {
        Self::of_kind(ValueKind::Timestamp)
    }

    /// Unindexed bytes.
    pub fn blob() -> Self {
        Self::of_kind(ValueKind::Blob)
    }

    /// A key referencing another entity.
    pub fn key() -> Self {
        Self::of_kind(ValueKind::Key)
    }

    /// A latitude/longitude pair.
    pub fn geo_point() -> Self {
        Self::of_kind(ValueKind::GeoPoint)
    }

    /// Stores the field under `name` instead of the field name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets whether the property is indexed.
    pub fn indexed(mut self, indexed: bool) -> Self {
        self.indexed = indexed;
        self
    }

    /// Excludes the property from indexes.
    pub fn unindexed(self) -> Self {
        self.indexed(false)
    }

    /// Rejects `Null`, which also rejects properties missing from a decoded entity.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Restricts accepted non-null values to `choices`.
    pub fn choices<V: Into<Value>>(mut self, choices: impl IntoIterator<Item = V>) -> Self {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    /// Adds a custom acceptance test run after the kind and choice checks.
    pub fn validator(mut self, validator: fn(&Value) -> bool) -> Self {
        self.validator = Some(validator);
        self
    }

    fn accepts_kind(&self, found: ValueKind) -> bool {
        match self.kind {
            None => true,
            Some(ValueKind::Double) => matches!(found, ValueKind::Double | ValueKind::Integer),
            Some(kind) => kind == found,
        }
    }

    fn widen(&self, value: Value) -> Value {
        match (self.kind, value) {
            (Some(ValueKind::Double), Value::Integer(i)) => Value::Double(i as f64),
            (_, value) => value,
        }
    }
}

impl Property for TypedProperty {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn indexed(&self) -> bool {
        self.indexed
    }

    fn validate(&self, value: &Value) -> bool {
        if value.is_null() {
            return !self.required;
        }
        if !self.accepts_kind(value.kind()) {
            return false;
        }
        if let Some(choices) = &self.choices {
            if !choices.contains(value) {
                return false;
            }
        }

        self.validator.is_none_or(|validator| validator(value))
    }

    fn encode_value(&self, value: Value) -> Value {
        self.widen(value)
    }

    fn decode_value(&self, raw: Value) -> Value {
        self.widen(raw)
    }
}

/// A descriptor for arrays whose elements share one item descriptor.
///
/// Encoding a scalar runs it through the item descriptor, so list members
/// can be encoded on their own for equality filters.
#[derive(Debug)]
pub struct ListProperty {
    item: Box<dyn Property>,
    name: Option<String>,
    indexed: bool,
}

impl ListProperty {
    /// A list whose elements are described by `item`.
    pub fn new(item: Box<dyn Property>) -> Self {
        let indexed = item.indexed();
        Self { item, name: None, indexed }
    }

    /// A list of `item`, boxing it.
    pub fn of(item: impl Property + 'static) -> Self {
        Self::new(Box::new(item))
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Excludes the whole list from indexes.
    pub fn unindexed(mut self) -> Self {
        self.indexed = false;
        self
    }
}

impl Property for ListProperty {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn indexed(&self) -> bool {
        self.indexed
    }

    fn validate(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Array(items) => items.iter().all(|item| self.item.validate(item)),
            _ => false,
        }
    }

    fn encode_value(&self, value: Value) -> Value {
        match value {
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.item.encode_value(item))
                    .collect(),
            ),
            Value::Null => Value::Null,
            scalar => self.item.encode_value(scalar),
        }
    }

    fn decode_value(&self, raw: Value) -> Value {
        match raw {
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.item.decode_value(item))
                    .collect(),
            ),
            Value::Null => Value::Null,
            scalar => Value::Array(vec![self.item.decode_value(scalar)]),
        }
    }
}

/// Stores any value as the text of its wire-JSON representation.
///
/// The stored string is unindexed; a stored string that does not parse
/// decodes to itself.
#[derive(Debug, Clone, Default)]
pub struct JsonProperty {
    name: Option<String>,
    required: bool,
}

impl JsonProperty {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Rejects a missing value.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

impl Property for JsonProperty {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn indexed(&self) -> bool {
        false
    }

    fn validate(&self, value: &Value) -> bool {
        !(self.required && value.is_null())
    }

    fn encode_value(&self, value: Value) -> Value {
        match value {
            Value::Null => Value::Null,
            value => Value::String(wire::value_to_json(&value, true).to_string()),
        }
    }

    fn decode_value(&self, raw: Value) -> Value {
        match raw {
            Value::String(text) => serde_json::from_str(&text)
                .ok()
                .and_then(|json| wire::value_from_json(&json).ok())
                .unwrap_or(Value::String(text)),
            other => other,
        }
    }
}
