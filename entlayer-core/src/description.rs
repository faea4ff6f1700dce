//! The model-to-entity mapping engine.
//!
//! A [`ModelDescription`] is compiled once per model kind from the model's
//! accessor table. Compilation produces an immutable [`MappingState`] (the
//! two field/property name maps and the indexed/unindexed classification)
//! and, for expando models, an [`ExpandoState`] with the set of names the
//! static schema claims. Every later encode and decode reads that state
//! without recomputing it.
//!
//! Static and expando models share one code path: the expando behavior is a
//! fallback consulted only when the static lookup comes up empty, and only
//! when the description carries an [`ExpandoState`].
//!
//! # Example
//!
//! ```ignore
//! use entlayer::description::ModelDescription;
//!
//! let description = ModelDescription::<Person>::compile()?;
//! let entity = description.encode_model(&person)?;
//! let decoded = description.decode_entity(entity.key(), Some(&entity))?;
//!
//! assert_eq!(decoded, Some(person));
//! ```

use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, trace};

use crate::{
    entity::Entity,
    error::{DatastoreError, DatastoreResult},
    key::{Key, KeyId},
    model::{Field, Model},
    value::{Value, ValueKind},
};

/// The compiled name maps and index classification of one model kind.
///
/// The identifier field appears in none of the four collections. Every other
/// property name is in exactly one of [`indexed`](Self::indexed) and
/// [`unindexed`](Self::unindexed).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingState {
    field_to_property: HashMap<String, String>,
    property_to_field: HashMap<String, String>,
    indexed: BTreeSet<String>,
    unindexed: BTreeSet<String>,
}

impl MappingState {
    /// Compiles the mapping state for `fields`, skipping the field named `id_field`.
    ///
    /// # Errors
    ///
    /// Returns [`DatastoreError::DuplicateProperty`] if two fields share a
    /// wire property name.
    pub fn compile<M>(kind: &str, id_field: &str, fields: &[Field<M>]) -> DatastoreResult<Self> {
        let mut state = Self::default();

        for field in fields.iter().filter(|field| field.name() != id_field) {
            let property = field.property_name();
            if state.property_to_field.contains_key(property) {
                return Err(DatastoreError::DuplicateProperty {
                    kind: kind.to_string(),
                    property: property.to_string(),
                });
            }
            state
                .field_to_property
                .insert(field.name().to_string(), property.to_string());
            state
                .property_to_field
                .insert(property.to_string(), field.name().to_string());
        }

        for field in fields.iter().filter(|field| field.name() != id_field) {
            let property = field.property_name().to_string();
            if field.property().indexed() {
                state.indexed.insert(property);
            } else {
                state.unindexed.insert(property);
            }
        }

        Ok(state)
    }

    /// The wire property name of `field`, if mapped.
    pub fn field_to_property(&self, field: &str) -> Option<&str> {
        self.field_to_property.get(field).map(String::as_str)
    }

    /// The field name stored under `property`, if mapped.
    pub fn property_to_field(&self, property: &str) -> Option<&str> {
        self.property_to_field.get(property).map(String::as_str)
    }

    /// Names of the indexed properties.
    pub fn indexed(&self) -> &BTreeSet<String> {
        &self.indexed
    }

    /// Names of the properties excluded from indexes.
    pub fn unindexed(&self) -> &BTreeSet<String> {
        &self.unindexed
    }

    /// Number of mapped (non-identifier) fields.
    pub fn len(&self) -> usize {
        self.field_to_property.len()
    }

    /// Returns `true` if no field is mapped.
    pub fn is_empty(&self) -> bool {
        self.field_to_property.is_empty()
    }
}

/// The names an expando model's static schema claims.
///
/// A dynamic property whose name is in [`used_names`](Self::used_names) is
/// neither encoded nor absorbed on decode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpandoState {
    used_names: HashSet<String>,
}

impl ExpandoState {
    /// Collects every field name and property name of `mapping`.
    pub fn compile(mapping: &MappingState) -> Self {
        let used_names = mapping
            .field_to_property
            .keys()
            .chain(mapping.property_to_field.keys())
            .cloned()
            .collect();

        Self { used_names }
    }

    /// Every field and property name the static schema claims.
    pub fn used_names(&self) -> &HashSet<String> {
        &self.used_names
    }

    /// Returns `true` if `name` is claimed by the static schema.
    pub fn is_used(&self, name: &str) -> bool {
        self.used_names.contains(name)
    }
}

/// Compiled mapping metadata for one model type, and the encode/decode
/// operations driven by it.
pub struct ModelDescription<M: Model> {
    fields: Vec<Field<M>>,
    field_index: HashMap<&'static str, usize>,
    mapping: MappingState,
    expando: Option<ExpandoState>,
}

impl<M: Model> ModelDescription<M> {
    /// Compiles the description from `M`'s accessor table.
    pub fn compile() -> DatastoreResult<Self> {
        Self::from_fields(M::fields())
    }

    /// Compiles the description from an explicit accessor table.
    pub fn from_fields(fields: Vec<Field<M>>) -> DatastoreResult<Self> {
        let mapping = MappingState::compile(M::KIND, M::ID_FIELD, &fields)?;
        let expando = M::EXPANDO.then(|| ExpandoState::compile(&mapping));
        let field_index = fields
            .iter()
            .enumerate()
            .filter(|(_, field)| field.name() != M::ID_FIELD)
            .map(|(index, field)| (field.name(), index))
            .collect();

        debug!(
            target: "entlayer::description",
            kind = M::KIND,
            fields = mapping.len(),
            indexed = mapping.indexed().len(),
            unindexed = mapping.unindexed().len(),
            expando = expando.is_some(),
            "Compiled model description"
        );

        Ok(Self {
            fields,
            field_index,
            mapping,
            expando,
        })
    }

    /// The entity kind this description maps.
    pub fn kind(&self) -> &'static str {
        M::KIND
    }

    /// The compiled name maps and index classification.
    pub fn mapping(&self) -> &MappingState {
        &self.mapping
    }

    /// The expando state, present only for expando models.
    pub fn expando(&self) -> Option<&ExpandoState> {
        self.expando.as_ref()
    }

    /// Returns `true` if the model carries dynamic properties.
    pub fn is_expando(&self) -> bool {
        self.expando.is_some()
    }

    /// The full accessor table, identifier field included.
    pub fn fields(&self) -> &[Field<M>] {
        &self.fields
    }

    fn mapped_fields(&self) -> impl Iterator<Item = &Field<M>> {
        self.fields.iter().filter(|field| field.name() != M::ID_FIELD)
    }

    /// The key `model` is stored under: its id below its parent, if any.
    pub fn key_for(&self, model: &M) -> Key {
        match model.parent() {
            Some(parent) => Key::with_parent(parent, M::KIND, model.id()),
            None => Key::new(M::KIND, model.id()),
        }
    }

    /// Encodes `model` into a fresh entity.
    ///
    /// Dynamic properties of an expando model are added as indexed
    /// properties unless their name is claimed by the static schema, in
    /// which case they are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`DatastoreError::Validation`] naming the first field whose
    /// descriptor rejects its value. No entity is produced.
    pub fn encode_model(&self, model: &M) -> DatastoreResult<Entity> {
        let key = self.key_for(model);
        let mut properties = IndexMap::with_capacity(self.mapping.len());

        for field in self.mapped_fields() {
            let value = field.get(model);
            if !field.property().validate(&value) {
                return Err(DatastoreError::validation(M::KIND, field.name()));
            }
            properties.insert(
                field.property_name().to_string(),
                field.property().encode_value(value),
            );
        }

        if let (Some(expando), Some(dynamic)) = (&self.expando, model.dynamic_properties()) {
            for (name, value) in dynamic.produce_unused() {
                if expando.is_used(name) {
                    debug!(
                        target: "entlayer::description",
                        kind = M::KIND,
                        property = name,
                        "Dropped dynamic property shadowing a declared one"
                    );
                    continue;
                }
                properties.insert(name.to_string(), value.clone());
            }
        }

        trace!(
            target: "entlayer::description",
            kind = M::KIND,
            key = %key,
            properties = properties.len(),
            "Encoded model"
        );

        Ok(Entity::from_parts(key, properties, self.mapping.unindexed().clone()))
    }

    /// Decodes `entity` into a fresh model whose id and parent come from `key`.
    ///
    /// An absent entity decodes to `Ok(None)`. A property missing from the
    /// entity decodes from [`Value::Null`]. Properties of an expando model
    /// that the static schema does not claim are absorbed verbatim into its
    /// dynamic properties.
    ///
    /// # Errors
    ///
    /// - [`DatastoreError::KindMismatch`] if `key` names another kind
    /// - [`DatastoreError::Validation`] if a descriptor rejects a decoded value
    /// - [`DatastoreError::TypeMismatch`] if a field cannot hold a decoded value
    pub fn decode_entity(&self, key: &Key, entity: Option<&Entity>) -> DatastoreResult<Option<M>> {
        let Some(entity) = entity else {
            return Ok(None);
        };
        if key.kind() != M::KIND {
            return Err(DatastoreError::KindMismatch {
                expected: M::KIND.to_string(),
                found: key.kind().to_string(),
            });
        }

        let mut model = M::default();
        model
            .set_id(key.id().cloned())
            .map_err(|id| self.type_mismatch(M::ID_FIELD, id_kind(&id)))?;
        model.set_parent(key.parent());

        for field in self.mapped_fields() {
            let raw = entity
                .get(field.property_name())
                .cloned()
                .unwrap_or_default();
            let value = field.property().decode_value(raw);
            if !field.property().validate(&value) {
                return Err(DatastoreError::validation(M::KIND, field.name()));
            }
            field
                .set(&mut model, value)
                .map_err(|rejected| self.type_mismatch(field.name(), rejected.kind()))?;
        }

        if let Some(expando) = &self.expando {
            if let Some(dynamic) = model.dynamic_properties_mut() {
                for (name, value) in entity.properties() {
                    if !expando.is_used(name) {
                        dynamic.absorb_unused(name.clone(), value.clone());
                    }
                }
            }
        }

        trace!(
            target: "entlayer::description",
            kind = M::KIND,
            key = %key,
            "Decoded entity"
        );

        Ok(Some(model))
    }

    fn type_mismatch(&self, field: &str, found: ValueKind) -> DatastoreError {
        DatastoreError::TypeMismatch {
            kind: M::KIND.to_string(),
            field: field.to_string(),
            found,
        }
    }

    /// Translates a field name into its wire property name.
    ///
    /// Unknown names yield `None`, or the name itself for expando models.
    pub fn field_name_to_property_name<'a>(&'a self, field: &'a str) -> Option<&'a str> {
        match self.mapping.field_to_property(field) {
            Some(property) => Some(property),
            None if self.is_expando() => Some(field),
            None => None,
        }
    }

    /// Translates a wire property name into its field name.
    ///
    /// Unknown names yield `None`, or the name itself for expando models.
    pub fn property_name_to_field_name<'a>(&'a self, property: &'a str) -> Option<&'a str> {
        match self.mapping.property_to_field(property) {
            Some(field) => Some(field),
            None if self.is_expando() => Some(property),
            None => None,
        }
    }

    /// Encodes a single value through the descriptor of `field`, e.g. to
    /// build a query filter value. The value is not validated.
    ///
    /// Unknown fields yield `None`; expando models pass the value through
    /// unchanged.
    pub fn encode_field(&self, field: &str, value: Value) -> Option<Value> {
        match self.field_index.get(field) {
            Some(&index) => Some(self.fields[index].property().encode_value(value)),
            None if self.is_expando() => Some(value),
            None => None,
        }
    }
}

fn id_kind(id: &KeyId) -> ValueKind {
    match id {
        KeyId::Id(_) => ValueKind::Integer,
        KeyId::Name(_) => ValueKind::String,
    }
}

impl<M: Model> std::fmt::Debug for ModelDescription<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDescription")
            .field("kind", &M::KIND)
            .field("mapping", &self.mapping)
            .field("expando", &self.expando)
            .finish()
    }
}
