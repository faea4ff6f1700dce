//! Primitive wire values and their conversion to and from application types.
//!
//! [`Value`] is the closed set of primitive values a datastore property can
//! hold. Application field types reach it through [`PropertyValue`], which
//! the accessor tables in [`crate::model`] use to read and write fields.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::fmt;

use crate::{
    key::Key,
    property::{ListProperty, Property, TypedProperty},
};

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Opaque binary data.
///
/// A newtype rather than `Vec<u8>` so that byte strings and arrays of small
/// integers stay distinguishable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob(pub Vec<u8>);

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Blob(bytes)
    }
}

/// A primitive datastore value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Timestamp(DateTime<Utc>),
    String(String),
    Blob(Vec<u8>),
    Key(Key),
    GeoPoint(GeoPoint),
    Array(Vec<Value>),
    /// An embedded entity: named properties without a key.
    Map(IndexMap<String, Value>),
}

/// The type tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    Double,
    Timestamp,
    String,
    Blob,
    Key,
    GeoPoint,
    Array,
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Double => "double",
            ValueKind::Timestamp => "timestamp",
            ValueKind::String => "string",
            ValueKind::Blob => "blob",
            ValueKind::Key => "key",
            ValueKind::GeoPoint => "geo point",
            ValueKind::Array => "array",
            ValueKind::Map => "map",
        })
    }
}

impl Value {
    /// The type tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Integer(_) => ValueKind::Integer,
            Value::Double(_) => ValueKind::Double,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::String(_) => ValueKind::String,
            Value::Blob(_) => ValueKind::Blob,
            Value::Key(_) => ValueKind::Key,
            Value::GeoPoint(_) => ValueKind::GeoPoint,
            Value::Array(_) => ValueKind::Array,
            Value::Map(_) => ValueKind::Map,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The string, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The integer, if this is an integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

impl_value_from! {
    bool => Boolean,
    i64 => Integer,
    i32 => Integer,
    f64 => Double,
    String => String,
    &str => String,
    DateTime<Utc> => Timestamp,
    Key => Key,
    GeoPoint => GeoPoint,
    Vec<Value> => Array,
}

/// Conversion between an application field type and a [`Value`].
///
/// `from_value` never sees [`Value::Null`] for non-optional types: the
/// accessor table resets such fields to their default instead.
pub trait PropertyValue: Sized {
    /// Converts a field value into its primitive form.
    fn to_value(&self) -> Value;

    /// Converts a primitive value back, returning it unchanged if it has the wrong type.
    fn from_value(value: Value) -> Result<Self, Value>;

    /// The descriptor used when a field of this type is registered without one.
    fn default_property() -> Box<dyn Property>;
}

macro_rules! impl_property_value {
    ($ty:ty, $kind:ident, |$v:ident| $to:expr) => {
        impl PropertyValue for $ty {
            fn to_value(&self) -> Value {
                let $v = self;
                $to
            }

            fn from_value(value: Value) -> Result<Self, Value> {
                match value {
                    Value::$kind(inner) => Ok(inner.into()),
                    other => Err(other),
                }
            }

            fn default_property() -> Box<dyn Property> {
                Box::new(TypedProperty::of_kind(ValueKind::$kind))
            }
        }
    };
}

impl_property_value!(bool, Boolean, |v| Value::Boolean(*v));
impl_property_value!(i64, Integer, |v| Value::Integer(*v));
impl_property_value!(String, String, |v| Value::String(v.clone()));
impl_property_value!(DateTime<Utc>, Timestamp, |v| Value::Timestamp(*v));
impl_property_value!(Key, Key, |v| Value::Key(v.clone()));
impl_property_value!(GeoPoint, GeoPoint, |v| Value::GeoPoint(*v));
impl_property_value!(Blob, Blob, |v| Value::Blob(v.0.clone()));

impl PropertyValue for i32 {
    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Integer(i) => i32::try_from(i).map_err(|_| Value::Integer(i)),
            other => Err(other),
        }
    }

    fn default_property() -> Box<dyn Property> {
        Box::new(TypedProperty::integer())
    }
}

impl PropertyValue for f64 {
    fn to_value(&self) -> Value {
        Value::Double(*self)
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Double(d) => Ok(d),
            Value::Integer(i) => Ok(i as f64),
            other => Err(other),
        }
    }

    fn default_property() -> Box<dyn Property> {
        Box::new(TypedProperty::float())
    }
}

impl PropertyValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        Ok(value)
    }

    fn default_property() -> Box<dyn Property> {
        Box::new(TypedProperty::any())
    }
}

impl<T: PropertyValue> PropertyValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn default_property() -> Box<dyn Property> {
        T::default_property()
    }
}

impl<T: PropertyValue> PropertyValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(PropertyValue::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(other),
        }
    }

    fn default_property() -> Box<dyn Property> {
        Box::new(ListProperty::new(T::default_property()))
    }
}
