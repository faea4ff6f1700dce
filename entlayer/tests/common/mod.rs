#![allow(dead_code)]

use entlayer::prelude::*;

fn non_negative(value: &Value) -> bool {
    matches!(value, Value::Double(score) if *score >= 0.0)
}

#[derive(Debug, Clone, Default, PartialEq, Model)]
#[model(kind = "Person")]
pub struct Person {
    pub id: Option<i64>,
    #[model(property = TypedProperty::string().required())]
    pub name: String,
    #[model(property = TypedProperty::string().name("e"))]
    pub email: Option<String>,
    pub age: i64,
    #[model(property = TypedProperty::text())]
    pub bio: String,
    pub tags: Vec<String>,
    #[model(property = TypedProperty::float().validator(non_negative))]
    pub score: f64,
    #[model(skip)]
    pub cached: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Model)]
#[model(kind = "Pet")]
pub struct Pet {
    #[model(id)]
    pub name: Option<String>,
    #[model(parent)]
    pub owner: Option<Key>,
    pub species: String,
}

#[derive(Debug, Clone, Default, PartialEq, Model)]
pub struct Note {
    pub id: Option<String>,
    #[model(property = TypedProperty::string().name("t"))]
    pub title: String,
    #[model(expando)]
    pub extra: Expando,
}

pub fn person(id: Option<i64>, name: &str, age: i64) -> Person {
    Person {
        id,
        name: name.to_string(),
        email: Some(format!("{}@example.com", name.to_lowercase())),
        age,
        bio: format!("{name} wrote things down."),
        tags: vec!["maths".to_string()],
        score: 1.5,
        cached: None,
    }
}

pub fn ada() -> Person {
    Person {
        tags: vec!["maths".to_string(), "poetry".to_string()],
        score: 9.5,
        ..person(Some(7), "Ada", 36)
    }
}
