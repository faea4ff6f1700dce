//! Filter evaluation for in-memory entities.
//!
//! Filters see only the indexed properties of an entity, plus its key under
//! the reserved `__key__` property name. An array property matches a filter
//! if any of its elements does.

use chrono::{DateTime, Utc};
use std::{cmp::Ordering, collections::HashMap};

use entlayer_core::{
    entity::Entity,
    error::{DatastoreError, DatastoreResult},
    key::Key,
    query::{Direction, Expr, KEY_PROPERTY, Order, PropertyOp, QueryVisitor},
    value::Value,
};

/// Borrowed, comparable view of a [`Value`].
///
/// Values of different types never compare as ordered; [`Comparable::total_cmp`]
/// falls back to a fixed type rank when sorting.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Integer value, compared numerically with doubles
    Integer(i64),
    /// Double value, compared numerically with integers
    Double(f64),
    /// UTC timestamp
    Timestamp(DateTime<Utc>),
    /// Boolean value
    Bool(bool),
    /// String value
    String(&'a str),
    /// Raw bytes
    Blob(&'a [u8]),
    /// Latitude and longitude, ordered by latitude first
    GeoPoint(f64, f64),
    /// Entity key, ordered along its path
    Key(&'a Key),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Embedded entity, comparable for equality only
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Value> for Comparable<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Comparable::Null,
            Value::Boolean(value) => Comparable::Bool(*value),
            Value::Integer(value) => Comparable::Integer(*value),
            Value::Double(value) => Comparable::Double(*value),
            Value::Timestamp(value) => Comparable::Timestamp(*value),
            Value::String(value) => Comparable::String(value),
            Value::Blob(value) => Comparable::Blob(value),
            Value::Key(key) => Comparable::Key(key),
            Value::GeoPoint(point) => Comparable::GeoPoint(point.latitude, point.longitude),
            Value::Array(values) => Comparable::Array(values.iter().map(Comparable::from).collect()),
            Value::Map(map) => Comparable::Map(
                map.iter()
                    .map(|(name, value)| (name.as_str(), Comparable::from(value)))
                    .collect(),
            ),
        }
    }
}

impl<'a> Comparable<'a> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Integer(_) | Comparable::Double(_) => 1,
            Comparable::Timestamp(_) => 2,
            Comparable::Bool(_) => 3,
            Comparable::String(_) => 4,
            Comparable::Blob(_) => 5,
            Comparable::GeoPoint(..) => 6,
            Comparable::Key(_) => 7,
            Comparable::Array(_) => 8,
            Comparable::Map(_) => 9,
        }
    }

    /// Orders any two values, ranking by type first.
    pub(crate) fn total_cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal))
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Integer(a), Comparable::Integer(b)) => a == b,
            (Comparable::Integer(a), Comparable::Double(b)) => (*a as f64) == *b,
            (Comparable::Double(a), Comparable::Integer(b)) => *a == (*b as f64),
            (Comparable::Double(a), Comparable::Double(b)) => a == b,
            (Comparable::Timestamp(a), Comparable::Timestamp(b)) => a == b,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Blob(a), Comparable::Blob(b)) => a == b,
            (Comparable::GeoPoint(a, b), Comparable::GeoPoint(c, d)) => a == c && b == d,
            (Comparable::Key(a), Comparable::Key(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Integer(a), Comparable::Integer(b)) => a.partial_cmp(b),
            (Comparable::Integer(a), Comparable::Double(b)) => (*a as f64).partial_cmp(b),
            (Comparable::Double(a), Comparable::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Comparable::Double(a), Comparable::Double(b)) => a.partial_cmp(b),
            (Comparable::Timestamp(a), Comparable::Timestamp(b)) => a.partial_cmp(b),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::Blob(a), Comparable::Blob(b)) => a.partial_cmp(b),
            (Comparable::GeoPoint(a, b), Comparable::GeoPoint(c, d)) => {
                match a.partial_cmp(c) {
                    Some(Ordering::Equal) => b.partial_cmp(d),
                    ordering => ordering,
                }
            }
            (Comparable::Key(a), Comparable::Key(b)) => Some(key_cmp(a, b)),
            (Comparable::Array(a), Comparable::Array(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Orders keys element by element along their paths, kind before id.
/// Incomplete elements sort first.
pub(crate) fn key_cmp(a: &Key, b: &Key) -> Ordering {
    for (left, right) in a.path().iter().zip(b.path()) {
        let ordering = left.kind.cmp(&right.kind).then_with(|| left.id.cmp(&right.id));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    a.path().len().cmp(&b.path().len())
}

/// The value `entity` exposes to queries under `property`, if any.
fn visible_value<'a>(entity: &'a Entity, property: &str) -> Option<Comparable<'a>> {
    if property == KEY_PROPERTY {
        return Some(Comparable::Key(entity.key()));
    }

    if !entity.is_indexed(property) {
        return None;
    }

    entity.get(property).map(Comparable::from)
}

/// The value `entity` sorts by under `order`.
///
/// Arrays sort by their smallest element when ascending and their largest
/// when descending. Entities without the property have no sort value.
pub(crate) fn sort_value<'a>(entity: &'a Entity, order: &Order) -> Option<Comparable<'a>> {
    match visible_value(entity, &order.property)? {
        Comparable::Array(items) => match order.direction {
            Direction::Ascending => items.into_iter().min_by(|a, b| a.total_cmp(b)),
            Direction::Descending => items.into_iter().max_by(|a, b| a.total_cmp(b)),
        },
        value => Some(value),
    }
}

fn matches(found: &Comparable<'_>, op: PropertyOp, target: &Comparable<'_>) -> bool {
    match op {
        PropertyOp::Eq => found == target,
        PropertyOp::Ne => found != target,
        PropertyOp::Lt => found.partial_cmp(target) == Some(Ordering::Less),
        PropertyOp::Lte => matches!(found.partial_cmp(target), Some(Ordering::Less | Ordering::Equal)),
        PropertyOp::Gt => found.partial_cmp(target) == Some(Ordering::Greater),
        PropertyOp::Gte => matches!(found.partial_cmp(target), Some(Ordering::Greater | Ordering::Equal)),
        PropertyOp::In => match target {
            Comparable::Array(candidates) => candidates.iter().any(|candidate| candidate == found),
            candidate => candidate == found,
        },
        PropertyOp::NotIn => match target {
            Comparable::Array(candidates) => candidates.iter().all(|candidate| candidate != found),
            candidate => candidate != found,
        },
        PropertyOp::HasAncestor => false,
    }
}

/// Evaluates filter expressions against one entity.
pub(crate) struct EntityEvaluator<'a> {
    entity: &'a Entity,
}

impl<'a> EntityEvaluator<'a> {
    /// Creates an evaluator for `entity`.
    pub(crate) fn new(entity: &'a Entity) -> Self {
        Self { entity }
    }

    /// Returns `true` if the entity matches `expr`.
    pub(crate) fn evaluate(&mut self, expr: &Expr) -> DatastoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Keeps the entities matching `expr`, in iteration order.
    pub(crate) fn filter_entities<I>(entities: I, expr: &Expr) -> DatastoreResult<Vec<&'a Entity>>
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        let mut matched = Vec::new();
        for entity in entities {
            if EntityEvaluator::new(entity).evaluate(expr)? {
                matched.push(entity);
            }
        }

        Ok(matched)
    }
}

impl<'a> QueryVisitor for EntityEvaluator<'a> {
    type Output = bool;
    type Error = DatastoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> DatastoreResult<bool> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> DatastoreResult<bool> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn visit_property(&mut self, property: &str, op: PropertyOp, value: &Value) -> DatastoreResult<bool> {
        if op == PropertyOp::HasAncestor {
            return match value {
                Value::Key(ancestor) => Ok(self.entity.key().has_ancestor(ancestor)),
                other => Err(DatastoreError::Backend(format!(
                    "ancestor filter on '{property}' needs a key, found a {} value",
                    other.kind()
                ))),
            };
        }

        let Some(found) = visible_value(self.entity, property) else {
            return Ok(false);
        };
        let target = Comparable::from(value);

        Ok(match &found {
            Comparable::Array(items) => items.iter().any(|item| matches(item, op, &target)),
            scalar => matches(scalar, op, &target),
        })
    }
}
