//! Hand-written models shared by the unit tests.

use crate::{
    key::{Key, KeyId},
    model::{DynamicProperties, Expando, Field, KeyIdentifier, Model},
    property::TypedProperty,
    value::Value,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    pub id: Option<i64>,
    pub name: String,
    pub email: Option<String>,
    pub age: i64,
    pub bio: String,
    pub tags: Vec<String>,
    pub score: f64,
}

fn non_negative(value: &Value) -> bool {
    matches!(value, Value::Double(score) if *score >= 0.0)
}

impl Model for Person {
    const KIND: &'static str = "Person";

    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::inferred("id", |p: &Self| &p.id, |p: &mut Self| &mut p.id),
            Field::new("name", TypedProperty::string().required(), |p: &Self| &p.name, |p: &mut Self| &mut p.name),
            Field::new("email", TypedProperty::string().name("e"), |p: &Self| &p.email, |p: &mut Self| &mut p.email),
            Field::inferred("age", |p: &Self| &p.age, |p: &mut Self| &mut p.age),
            Field::new("bio", TypedProperty::text(), |p: &Self| &p.bio, |p: &mut Self| &mut p.bio),
            Field::inferred("tags", |p: &Self| &p.tags, |p: &mut Self| &mut p.tags),
            Field::new(
                "score",
                TypedProperty::float().validator(non_negative),
                |p: &Self| &p.score,
                |p: &mut Self| &mut p.score,
            ),
        ]
    }

    fn id(&self) -> Option<KeyId> {
        self.id.to_key_id()
    }

    fn set_id(&mut self, id: Option<KeyId>) -> Result<(), KeyId> {
        self.id = KeyIdentifier::from_key_id(id)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Note {
    pub id: Option<String>,
    pub parent: Option<Key>,
    pub title: String,
    pub extra: Expando,
}

impl Model for Note {
    const KIND: &'static str = "Note";
    const EXPANDO: bool = true;

    fn fields() -> Vec<Field<Self>> {
        vec![Field::new("title", TypedProperty::string().name("t"), |n: &Self| &n.title, |n: &mut Self| &mut n.title)]
    }

    fn id(&self) -> Option<KeyId> {
        self.id.to_key_id()
    }

    fn set_id(&mut self, id: Option<KeyId>) -> Result<(), KeyId> {
        self.id = KeyIdentifier::from_key_id(id)?;
        Ok(())
    }

    fn parent(&self) -> Option<&Key> {
        self.parent.as_ref()
    }

    fn set_parent(&mut self, parent: Option<Key>) {
        self.parent = parent;
    }

    fn dynamic_properties(&self) -> Option<&dyn DynamicProperties> {
        Some(&self.extra)
    }

    fn dynamic_properties_mut(&mut self) -> Option<&mut dyn DynamicProperties> {
        Some(&mut self.extra)
    }
}

pub fn ada() -> Person {
    Person {
        id: Some(7),
        name: "Ada".to_string(),
        email: Some("ada@example.com".to_string()),
        age: 36,
        bio: "Wrote the first program.".to_string(),
        tags: vec!["maths".to_string(), "poetry".to_string()],
        score: 9.5,
    }
}
