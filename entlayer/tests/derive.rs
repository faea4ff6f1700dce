mod common;

use common::{Note, Person, Pet, ada};
use entlayer::prelude::*;

#[test]
fn derive_sets_kind_identifier_and_expando_flags() {
    assert_eq!(Person::KIND, "Person");
    assert_eq!(Person::ID_FIELD, "id");
    assert!(!Person::EXPANDO);

    assert_eq!(Pet::KIND, "Pet");
    assert_eq!(Pet::ID_FIELD, "name");

    assert_eq!(Note::KIND, "Note");
    assert!(Note::EXPANDO);
}

#[test]
fn accessor_table_leaves_out_key_and_skipped_fields() {
    let names: Vec<&str> = Person::fields().iter().map(|field| field.name()).collect();
    assert_eq!(names, ["name", "email", "age", "bio", "tags", "score"]);

    let names: Vec<&str> = Pet::fields().iter().map(|field| field.name()).collect();
    assert_eq!(names, ["species"]);

    let names: Vec<&str> = Note::fields().iter().map(|field| field.name()).collect();
    assert_eq!(names, ["title"]);
}

#[test]
fn derived_models_encode_by_wire_name() {
    let description = ModelDescription::<Person>::compile().unwrap();
    let entity = description.encode_model(&ada()).unwrap();

    assert_eq!(entity.key(), &Key::new("Person", Some(KeyId::Id(7))));
    assert_eq!(entity.get("e"), Some(&Value::from("ada@example.com")));
    assert_eq!(entity.get("email"), None);
    assert_eq!(entity.get("id"), None);
    assert_eq!(entity.get("cached"), None);
    assert!(!entity.is_indexed("bio"));
    assert!(entity.is_indexed("name"));

    assert_eq!(description.field_name_to_property_name("email"), Some("e"));
    assert_eq!(description.property_name_to_field_name("e"), Some("email"));
}

#[test]
fn derived_models_round_trip() {
    let description = ModelDescription::<Person>::compile().unwrap();
    let original = Person {
        cached: Some("dropped".to_string()),
        ..ada()
    };

    let entity = description.encode_model(&original).unwrap();
    let decoded = description.decode_entity(entity.key(), Some(&entity)).unwrap();

    assert_eq!(decoded, Some(Person { cached: None, ..original }));
}

#[test]
fn validators_reject_before_encoding() {
    let description = ModelDescription::<Person>::compile().unwrap();
    let err = description
        .encode_model(&Person { score: -1.0, ..ada() })
        .unwrap_err();

    assert_eq!(
        err,
        DatastoreError::Validation {
            kind: "Person".to_string(),
            field: "score".to_string(),
        }
    );
}

#[test]
fn parent_keys_come_from_the_parent_field() {
    let owner = Key::new("Person", Some(KeyId::Id(7)));
    let pet = Pet {
        name: Some("rex".to_string()),
        owner: Some(owner.clone()),
        species: "dog".to_string(),
    };

    let description = ModelDescription::<Pet>::compile().unwrap();
    let entity = description.encode_model(&pet).unwrap();
    assert_eq!(entity.key(), &Key::with_parent(&owner, "Pet", Some("rex".into())));
    assert_eq!(entity.get("name"), None);

    let decoded = description.decode_entity(entity.key(), Some(&entity)).unwrap();
    assert_eq!(decoded, Some(pet));
}

#[test]
fn expando_models_carry_undeclared_properties() {
    let mut note = Note {
        id: Some("first".to_string()),
        title: "Hello".to_string(),
        extra: Expando::new(),
    };
    note.extra.insert("mood", "calm");
    note.extra.insert("t", "shadowed");

    let description = ModelDescription::<Note>::compile().unwrap();
    assert!(description.is_expando());

    let entity = description.encode_model(&note).unwrap();
    assert_eq!(entity.get("t"), Some(&Value::from("Hello")));
    assert_eq!(entity.get("mood"), Some(&Value::from("calm")));

    let decoded = description
        .decode_entity(entity.key(), Some(&entity))
        .unwrap()
        .unwrap();
    assert_eq!(decoded.title, "Hello");
    assert_eq!(decoded.extra.get("mood"), Some(&Value::from("calm")));
    assert!(!decoded.extra.contains("t"));

    assert_eq!(description.field_name_to_property_name("mood"), Some("mood"));
    assert_eq!(
        description.encode_field("mood", Value::from("calm")),
        Some(Value::from("calm"))
    );
}
