//! JSON wire representation of keys, values and entities.
//!
//! The shapes follow the document datastore's REST record format:
//!
//! ```text
//! {
//!   "key": {
//!     "partitionId": { "projectId": "demo", "namespaceId": "prod" },
//!     "path": [ { "kind": "Person", "id": "7" } ]
//!   },
//!   "properties": {
//!     "name": { "stringValue": "Ada" },
//!     "bio":  { "stringValue": "...", "excludeFromIndexes": true }
//!   }
//! }
//! ```
//!
//! 64-bit integers travel as decimal strings, timestamps as RFC 3339 and
//! blobs as standard base64.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use serde_json::{Map, Value as Json, json};
use std::collections::BTreeSet;

use crate::{
    entity::Entity,
    error::{DatastoreError, DatastoreResult},
    key::{Key, KeyId, PartitionId, PathElement},
    value::{GeoPoint, Value},
};

fn malformed(what: &str) -> DatastoreError {
    DatastoreError::Serialization(format!("malformed {}", what))
}

/// Encodes a key.
pub fn key_to_json(key: &Key) -> Json {
    let mut partition = Map::new();
    if !key.partition().project_id.is_empty() {
        partition.insert("projectId".into(), json!(key.partition().project_id));
    }
    if let Some(namespace) = &key.partition().namespace_id {
        partition.insert("namespaceId".into(), json!(namespace));
    }

    let path = key
        .path()
        .iter()
        .map(|element| {
            let mut out = Map::new();
            out.insert("kind".into(), json!(element.kind));
            match &element.id {
                Some(KeyId::Id(id)) => {
                    out.insert("id".into(), json!(id.to_string()));
                }
                Some(KeyId::Name(name)) => {
                    out.insert("name".into(), json!(name));
                }
                None => {}
            }
            Json::Object(out)
        })
        .collect::<Vec<_>>();

    json!({ "partitionId": partition, "path": path })
}

/// Decodes a key.
pub fn key_from_json(json: &Json) -> DatastoreResult<Key> {
    let partition = match json.get("partitionId") {
        Some(partition) => PartitionId {
            project_id: partition
                .get("projectId")
                .and_then(Json::as_str)
                .unwrap_or_default()
                .to_string(),
            namespace_id: partition
                .get("namespaceId")
                .and_then(Json::as_str)
                .map(str::to_string),
        },
        None => PartitionId::default(),
    };

    let path = json
        .get("path")
        .and_then(Json::as_array)
        .ok_or_else(|| malformed("key path"))?
        .iter()
        .map(|element| {
            let kind = element
                .get("kind")
                .and_then(Json::as_str)
                .ok_or_else(|| malformed("key path element"))?;
            let id = match (element.get("id"), element.get("name")) {
                (Some(id), _) => Some(KeyId::Id(integer_from_json(id)?)),
                (None, Some(name)) => Some(KeyId::Name(
                    name.as_str()
                        .ok_or_else(|| malformed("key name"))?
                        .to_string(),
                )),
                (None, None) => None,
            };
            Ok(PathElement::new(kind, id))
        })
        .collect::<DatastoreResult<Vec<_>>>()?;

    Key::from_path(partition, path).ok_or_else(|| malformed("key: empty path"))
}

fn integer_from_json(json: &Json) -> DatastoreResult<i64> {
    match json {
        Json::String(s) => s.parse().map_err(|_| malformed("integer")),
        Json::Number(n) => n.as_i64().ok_or_else(|| malformed("integer")),
        _ => Err(malformed("integer")),
    }
}

fn properties_to_json(properties: &IndexMap<String, Value>, unindexed: &BTreeSet<String>) -> Json {
    Json::Object(
        properties
            .iter()
            .map(|(name, value)| (name.clone(), value_to_json(value, !unindexed.contains(name))))
            .collect(),
    )
}

fn properties_from_json(json: &Json) -> DatastoreResult<(IndexMap<String, Value>, BTreeSet<String>)> {
    let mut properties = IndexMap::new();
    let mut unindexed = BTreeSet::new();

    if let Some(object) = json.as_object() {
        for (name, value) in object {
            if value.get("excludeFromIndexes").and_then(Json::as_bool) == Some(true) {
                unindexed.insert(name.clone());
            }
            properties.insert(name.clone(), value_from_json(value)?);
        }
    }

    Ok((properties, unindexed))
}

/// Encodes one property value, flagging it when it is excluded from indexes.
pub fn value_to_json(value: &Value, indexed: bool) -> Json {
    let mut out = match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Boolean(b) => json!({ "booleanValue": b }),
        Value::Integer(i) => json!({ "integerValue": i.to_string() }),
        Value::Double(d) => json!({ "doubleValue": double_to_json(*d) }),
        Value::Timestamp(ts) => json!({
            "timestampValue": ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
        }),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Blob(bytes) => json!({ "blobValue": STANDARD.encode(bytes) }),
        Value::Key(key) => json!({ "keyValue": key_to_json(key) }),
        Value::GeoPoint(point) => json!({
            "geoPointValue": { "latitude": point.latitude, "longitude": point.longitude }
        }),
        Value::Array(items) => json!({
            "arrayValue": {
                "values": items.iter().map(|item| value_to_json(item, true)).collect::<Vec<_>>()
            }
        }),
        Value::Map(map) => json!({
            "entityValue": { "properties": properties_to_json(map, &BTreeSet::new()) }
        }),
    };

    if !indexed {
        if let Some(object) = out.as_object_mut() {
            object.insert("excludeFromIndexes".into(), json!(true));
        }
    }

    out
}

/// JSON numbers cannot hold non-finite doubles; those travel as the
/// strings `"NaN"`, `"Infinity"` and `"-Infinity"`.
fn double_to_json(d: f64) -> Json {
    if d.is_nan() {
        json!("NaN")
    } else if d == f64::INFINITY {
        json!("Infinity")
    } else if d == f64::NEG_INFINITY {
        json!("-Infinity")
    } else {
        json!(d)
    }
}

fn double_from_json(json: &Json) -> DatastoreResult<f64> {
    match json {
        Json::Number(number) => number.as_f64().ok_or_else(|| malformed("doubleValue")),
        Json::String(text) => match text.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            _ => Err(malformed("doubleValue")),
        },
        _ => Err(malformed("doubleValue")),
    }
}

/// Decodes one property value.
///
/// `excludeFromIndexes` flags are only meaningful on top-level entity
/// properties. Flags on array elements or on properties of an embedded
/// entity are accepted and ignored, since a [`Value`] carries no index flag.
pub fn value_from_json(json: &Json) -> DatastoreResult<Value> {
    let object = json.as_object().ok_or_else(|| malformed("value"))?;

    if object.contains_key("nullValue") {
        return Ok(Value::Null);
    }
    if let Some(b) = object.get("booleanValue") {
        return b.as_bool().map(Value::Boolean).ok_or_else(|| malformed("booleanValue"));
    }
    if let Some(i) = object.get("integerValue") {
        return integer_from_json(i).map(Value::Integer);
    }
    if let Some(d) = object.get("doubleValue") {
        return double_from_json(d).map(Value::Double);
    }
    if let Some(ts) = object.get("timestampValue") {
        let text = ts.as_str().ok_or_else(|| malformed("timestampValue"))?;
        return DateTime::parse_from_rfc3339(text)
            .map(|ts| Value::Timestamp(ts.with_timezone(&Utc)))
            .map_err(|_| malformed("timestampValue"));
    }
    if let Some(s) = object.get("stringValue") {
        return s
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| malformed("stringValue"));
    }
    if let Some(b) = object.get("blobValue") {
        let text = b.as_str().ok_or_else(|| malformed("blobValue"))?;
        return STANDARD
            .decode(text)
            .map(Value::Blob)
            .map_err(|_| malformed("blobValue"));
    }
    if let Some(key) = object.get("keyValue") {
        return key_from_json(key).map(Value::Key);
    }
    if let Some(point) = object.get("geoPointValue") {
        let coordinate = |name: &str| point.get(name).and_then(Json::as_f64).unwrap_or_default();
        return Ok(Value::GeoPoint(GeoPoint::new(coordinate("latitude"), coordinate("longitude"))));
    }
    if let Some(array) = object.get("arrayValue") {
        return match array.get("values").and_then(Json::as_array) {
            Some(values) => values
                .iter()
                .map(value_from_json)
                .collect::<DatastoreResult<Vec<_>>>()
                .map(Value::Array),
            None => Ok(Value::Array(Vec::new())),
        };
    }
    if let Some(entity) = object.get("entityValue") {
        let (properties, _) = properties_from_json(entity.get("properties").unwrap_or(&Json::Null))?;
        return Ok(Value::Map(properties));
    }

    Err(malformed("value: no recognised value type"))
}

impl Entity {
    /// Encodes this entity in the datastore's JSON record shape.
    pub fn to_json(&self) -> Json {
        json!({
            "key": key_to_json(&self.key),
            "properties": properties_to_json(&self.properties, &self.unindexed),
        })
    }

    /// Decodes an entity from the datastore's JSON record shape.
    pub fn from_json(json: &Json) -> DatastoreResult<Entity> {
        let key = key_from_json(json.get("key").ok_or_else(|| malformed("entity: missing key"))?)?;
        let (properties, unindexed) = properties_from_json(json.get("properties").unwrap_or(&Json::Null))?;

        Ok(Entity::from_parts(key, properties, unindexed))
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        key_to_json(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        key_from_json(&Json::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Entity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Entity::from_json(&Json::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Entity {
        let owner = Key::new("Person", Some(KeyId::Id(7))).in_partition(PartitionId::new("demo", Some("prod".into())));
        let key = Key::with_parent(&owner, "Pet", Some("rex".into()));

        Entity::new(key)
            .with_property("age", 4i64)
            .with_property("weight", 12.5)
            .with_property("born", Utc.with_ymd_and_hms(2020, 5, 17, 8, 30, 0).unwrap())
            .with_property("owner", owner)
            .with_property("home", GeoPoint::new(52.5, 13.25))
            .with_property("tags", vec![Value::from("good"), Value::Boolean(true)])
            .with_property("vet", Value::Null)
            .with_unindexed_property("photo", Value::Blob(vec![0, 159, 146, 150]))
    }

    #[test]
    fn entities_survive_the_wire_format() {
        let entity = sample();
        let json = entity.to_json();

        assert_eq!(json["key"]["path"][0]["id"], json!("7"));
        assert_eq!(json["key"]["path"][1]["name"], json!("rex"));
        assert_eq!(json["key"]["partitionId"]["namespaceId"], json!("prod"));
        assert_eq!(json["properties"]["age"], json!({ "integerValue": "4" }));
        assert_eq!(json["properties"]["photo"]["excludeFromIndexes"], json!(true));
        assert_eq!(json["properties"]["born"]["timestampValue"], json!("2020-05-17T08:30:00Z"));

        assert_eq!(Entity::from_json(&json).unwrap(), entity);
    }

    #[test]
    fn serde_goes_through_the_codec() {
        let entity = sample();
        let text = serde_json::to_string(&entity).unwrap();
        let back: Entity = serde_json::from_str(&text).unwrap();

        assert_eq!(back, entity);
    }

    #[test]
    fn malformed_records_are_serialization_errors() {
        let err = Entity::from_json(&json!({ "key": { "path": [] } })).unwrap_err();
        assert!(matches!(err, DatastoreError::Serialization(_)));

        let err = value_from_json(&json!({ "integerValue": "twelve" })).unwrap_err();
        assert!(matches!(err, DatastoreError::Serialization(_)));
    }
    #[test]
    fn non_finite_doubles_travel_as_strings() {
        let entity = Entity::new(Key::new("Reading", Some(KeyId::Id(1))))
            .with_property("high", f64::INFINITY)
            .with_property("low", f64::NEG_INFINITY)
            .with_property("missing", f64::NAN);
        let json = entity.to_json();

        assert_eq!(json["properties"]["high"], json!({ "doubleValue": "Infinity" }));
        assert_eq!(json["properties"]["low"], json!({ "doubleValue": "-Infinity" }));
        assert_eq!(json["properties"]["missing"], json!({ "doubleValue": "NaN" }));

        let back = Entity::from_json(&json).unwrap();
        assert_eq!(back.get("high"), Some(&Value::Double(f64::INFINITY)));
        assert_eq!(back.get("low"), Some(&Value::Double(f64::NEG_INFINITY)));
        assert!(matches!(back.get("missing"), Some(Value::Double(d)) if d.is_nan()));

        let err = value_from_json(&json!({ "doubleValue": "lots" })).unwrap_err();
        assert!(matches!(err, DatastoreError::Serialization(_)));
    }

    #[test]
    fn nested_index_flags_are_accepted_and_ignored() {
        let json = json!({
            "arrayValue": { "values": [{ "stringValue": "a", "excludeFromIndexes": true }] }
        });
        assert_eq!(value_from_json(&json).unwrap(), Value::Array(vec![Value::from("a")]));

        let json = json!({
            "entityValue": {
                "properties": { "note": { "stringValue": "b", "excludeFromIndexes": true } }
            }
        });
        let Value::Map(map) = value_from_json(&json).unwrap() else {
            panic!("expected an embedded entity");
        };
        assert_eq!(map.get("note"), Some(&Value::from("b")));
    }
}
