//! Model traits and explicit field accessor tables.
//!
//! A [`Model`] is a typed application object mapped to and from an
//! [`Entity`](crate::entity::Entity). Instead of reading fields by name at
//! runtime, every model kind registers an ordered list of [`Field`]s, each
//! pairing a field name with a property descriptor and a type-checked getter
//! and setter. `#[derive(Model)]` generates this table from struct
//! attributes; it can also be written by hand.
//!
//! # Example
//!
//! ```ignore
//! use entlayer::model::{Field, KeyIdentifier, Model};
//! use entlayer::key::KeyId;
//! use entlayer::property::TypedProperty;
//!
//! #[derive(Debug, Default)]
//! pub struct Person {
//!     pub id: Option<i64>,
//!     pub name: String,
//!     pub email: Option<String>,
//! }
//!
//! impl Model for Person {
//!     const KIND: &'static str = "Person";
//!
//!     fn fields() -> Vec<Field<Self>> {
//!         vec![
//!             Field::new("name", TypedProperty::string().required(), |p: &Self| &p.name, |p: &mut Self| &mut p.name),
//!             Field::inferred("email", |p: &Self| &p.email, |p: &mut Self| &mut p.email),
//!         ]
//!     }
//!
//!     fn id(&self) -> Option<KeyId> {
//!         self.id.to_key_id()
//!     }
//!
//!     fn set_id(&mut self, id: Option<KeyId>) -> Result<(), KeyId> {
//!         self.id = KeyIdentifier::from_key_id(id)?;
//!         Ok(())
//!     }
//! }
//! ```

use indexmap::IndexMap;
use std::{any::Any, fmt};

use crate::{
    key::{Key, KeyId},
    property::Property,
    value::{PropertyValue, Value},
};

/// A typed application object stored as an entity.
pub trait Model: Default + Send + Sync + 'static {
    /// The entity kind instances of this model are stored under.
    const KIND: &'static str;

    /// The name of the identifier field. A field registered under this name
    /// is never stored as a property.
    const ID_FIELD: &'static str = "id";

    /// Whether this model carries dynamically named extra properties.
    const EXPANDO: bool = false;

    /// The ordered field accessor table of this model kind.
    fn fields() -> Vec<Field<Self>>;

    /// The identifier, or `None` if the datastore should allocate one.
    fn id(&self) -> Option<KeyId>;

    /// Assigns the identifier, handing it back if the identifier field
    /// cannot hold it.
    fn set_id(&mut self, id: Option<KeyId>) -> Result<(), KeyId>;

    /// The key of this instance's ancestor, if it has one.
    fn parent(&self) -> Option<&Key> {
        None
    }

    fn set_parent(&mut self, _parent: Option<Key>) {}

    /// The bag of dynamic properties of an expando model.
    fn dynamic_properties(&self) -> Option<&dyn DynamicProperties> {
        None
    }

    fn dynamic_properties_mut(&mut self) -> Option<&mut dyn DynamicProperties> {
        None
    }
}

type Getter<M> = Box<dyn Fn(&M) -> Value + Send + Sync>;
type Setter<M> = Box<dyn Fn(&mut M, Value) -> Result<(), Value> + Send + Sync>;

/// One entry of a model's accessor table: a field name, its property
/// descriptor, and a getter and setter converting through [`Value`].
pub struct Field<M> {
    name: &'static str,
    property: Box<dyn Property>,
    getter: Getter<M>,
    setter: Setter<M>,
}

impl<M: 'static> Field<M> {
    /// Registers a field with an explicit descriptor.
    pub fn new<T, P>(
        name: &'static str,
        property: P,
        get: fn(&M) -> &T,
        get_mut: fn(&mut M) -> &mut T,
    ) -> Self
    where
        T: PropertyValue + Default + 'static,
        P: Property + 'static,
    {
        Self::with_property(name, Box::new(property), get, get_mut)
    }

    /// Registers a field whose descriptor is the default for its type.
    pub fn inferred<T>(name: &'static str, get: fn(&M) -> &T, get_mut: fn(&mut M) -> &mut T) -> Self
    where
        T: PropertyValue + Default + 'static,
    {
        Self::with_property(name, T::default_property(), get, get_mut)
    }

    /// Registers a field with an already boxed descriptor.
    ///
    /// Setting [`Value::Null`] resets the field to `T::default()`.
    pub fn with_property<T>(
        name: &'static str,
        property: Box<dyn Property>,
        get: fn(&M) -> &T,
        get_mut: fn(&mut M) -> &mut T,
    ) -> Self
    where
        T: PropertyValue + Default + 'static,
    {
        Self {
            name,
            property,
            getter: Box::new(move |model: &M| get(model).to_value()),
            setter: Box::new(move |model: &mut M, value: Value| {
                let field = if value.is_null() {
                    T::default()
                } else {
                    T::from_value(value)?
                };
                *get_mut(model) = field;
                Ok(())
            }),
        }
    }
}

impl<M> Field<M> {
    /// The Rust field name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The descriptor governing this field on the wire.
    pub fn property(&self) -> &dyn Property {
        self.property.as_ref()
    }

    /// The wire property name: the descriptor's override or the field name.
    pub fn property_name(&self) -> &str {
        self.property.name().unwrap_or(self.name)
    }

    /// Reads the field of `model` as a primitive value.
    pub fn get(&self, model: &M) -> Value {
        (self.getter)(model)
    }

    /// Writes `value` into the field of `model`, handing it back if the
    /// field's type cannot hold it.
    pub fn set(&self, model: &mut M, value: Value) -> Result<(), Value> {
        (self.setter)(model, value)
    }
}

impl<M> fmt::Debug for Field<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("property", &self.property)
            .finish_non_exhaustive()
    }
}

/// Conversion between an identifier field type and a key id.
pub trait KeyIdentifier: Sized {
    fn to_key_id(&self) -> Option<KeyId>;

    /// Converts a key id back, handing it back if this type cannot hold it.
    fn from_key_id(id: Option<KeyId>) -> Result<Self, KeyId>;
}

impl KeyIdentifier for Option<KeyId> {
    fn to_key_id(&self) -> Option<KeyId> {
        self.clone()
    }

    fn from_key_id(id: Option<KeyId>) -> Result<Self, KeyId> {
        Ok(id)
    }
}

impl KeyIdentifier for Option<i64> {
    fn to_key_id(&self) -> Option<KeyId> {
        self.map(KeyId::Id)
    }

    fn from_key_id(id: Option<KeyId>) -> Result<Self, KeyId> {
        match id {
            None => Ok(None),
            Some(KeyId::Id(id)) => Ok(Some(id)),
            Some(other) => Err(other),
        }
    }
}

impl KeyIdentifier for Option<String> {
    fn to_key_id(&self) -> Option<KeyId> {
        self.clone().map(KeyId::Name)
    }

    fn from_key_id(id: Option<KeyId>) -> Result<Self, KeyId> {
        match id {
            None => Ok(None),
            Some(KeyId::Name(name)) => Ok(Some(name)),
            Some(other) => Err(other),
        }
    }
}

/// The extension point through which expando models expose their dynamic
/// properties to the mapping engine.
pub trait DynamicProperties: Send + Sync {
    /// Receives a decoded property the static schema does not claim.
    fn absorb_unused(&mut self, name: String, value: Value);

    /// Yields the dynamic properties to encode alongside the declared ones.
    fn produce_unused(&self) -> Box<dyn Iterator<Item = (&str, &Value)> + '_>;
}

/// An ordered bag of dynamically named properties.
///
/// # Example
///
/// ```ignore
/// use entlayer::model::Expando;
///
/// let mut extra = Expando::new();
/// extra.insert("colour", "teal");
///
/// assert_eq!(extra.get("colour").and_then(|v| v.as_str()), Some("teal"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expando(IndexMap<String, Value>);

impl Expando {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// The value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Sets a dynamic property, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// Removes `name`, keeping the order of the rest.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.shift_remove(name)
    }

    /// Returns `true` if `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Iterates over the properties in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// The number of dynamic properties.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl DynamicProperties for Expando {
    fn absorb_unused(&mut self, name: String, value: Value) {
        self.0.insert(name, value);
    }

    fn produce_unused(&self) -> Box<dyn Iterator<Item = (&str, &Value)> + '_> {
        Box::new(self.iter())
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for Expando {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(name, value)| (name.into(), value.into())).collect())
    }
}

/// Type-erased model, for decoding entities whose kind is only known at runtime.
///
/// Use [`downcast_ref`](dyn AnyModel::downcast_ref) or
/// [`downcast`](dyn AnyModel::downcast) to recover the concrete model.
pub trait AnyModel: Send + Sync {
    /// The kind of the underlying model.
    fn model_kind(&self) -> &'static str;

    /// The identifier of the underlying model.
    fn model_id(&self) -> Option<KeyId>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl dyn AnyModel {
    /// Returns `Some(&M)` if this trait object holds an `M`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let model = registry.decode_any(&entity)?;
    /// if let Some(person) = model.downcast_ref::<Person>() {
    ///     println!("{}", person.name);
    /// }
    /// ```
    pub fn downcast_ref<M: Model>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }

    /// Returns `Some(&mut M)` if this model is an `M`.
    pub fn downcast_mut<M: Model>(&mut self) -> Option<&mut M> {
        self.as_any_mut().downcast_mut::<M>()
    }

    /// Unboxes the underlying model if it is an `M`.
    pub fn downcast<M: Model>(self: Box<Self>) -> Option<M> {
        self.into_any().downcast::<M>().ok().map(|model| *model)
    }
}

impl<M: Model> AnyModel for M {
    fn model_kind(&self) -> &'static str {
        M::KIND
    }

    fn model_id(&self) -> Option<KeyId> {
        self.id()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Person;

    #[test]
    fn setters_reset_fields_on_null() {
        let fields = Person::fields();
        let age = fields.iter().find(|field| field.name() == "age").unwrap();
        let mut person = Person { age: 41, ..Person::default() };

        age.set(&mut person, Value::Null).unwrap();
        assert_eq!(person.age, 0);
    }

    #[test]
    fn setters_hand_back_mistyped_values() {
        let fields = Person::fields();
        let name = fields.iter().find(|field| field.name() == "name").unwrap();
        let mut person = Person::default();

        assert_eq!(name.set(&mut person, Value::Integer(3)), Err(Value::Integer(3)));
        assert_eq!(name.get(&person), Value::from(""));
    }

    #[test]
    fn property_names_default_to_field_names() {
        let fields = Person::fields();
        let names: Vec<_> = fields.iter().map(|field| (field.name(), field.property_name())).collect();

        assert!(names.contains(&("email", "e")));
        assert!(names.contains(&("age", "age")));
    }

    #[test]
    fn key_identifiers_reject_the_other_id_type() {
        assert_eq!(Option::<i64>::from_key_id(Some(KeyId::Id(3))), Ok(Some(3)));
        assert_eq!(
            Option::<i64>::from_key_id(Some("x".into())),
            Err(KeyId::Name("x".to_string()))
        );
        assert_eq!(Option::<String>::from_key_id(None), Ok(None));
    }

    #[test]
    fn any_models_downcast_to_their_type() {
        let model: Box<dyn AnyModel> = Box::new(Person { id: Some(9), ..Person::default() });

        assert_eq!(model.model_kind(), "Person");
        assert_eq!(model.model_id(), Some(KeyId::Id(9)));
        assert!(model.downcast_ref::<crate::fixtures::Note>().is_none());
        assert_eq!(model.downcast::<Person>().map(|person| person.id), Some(Some(9)));
    }
}
