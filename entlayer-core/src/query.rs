//! Query value types and construction.
//!
//! A [`Query`] selects entities of one kind by a filter [`Expr`] over wire
//! property names, orders them and pages through them. Backends evaluate or
//! translate filters through a [`QueryVisitor`].
//!
//! # Query Building
//!
//! Raw queries are built with the fluent builder over property names:
//!
//! ```ignore
//! use entlayer::query::{Direction, Filter, Query};
//!
//! let query = Query::builder()
//!     .kind("Person")
//!     .filter(Filter::eq("e", "ada@example.com"))
//!     .order("age", Direction::Descending)
//!     .limit(10)
//!     .build();
//! ```
//!
//! Typed queries are built by field name with [`ModelQueryBuilder`], which
//! translates names and encodes values through the model's description:
//!
//! ```ignore
//! let query = people.filter().eq("email", "ada@example.com").gte("age", 18).build()?;
//! ```

use std::sync::Arc;

use crate::{
    description::ModelDescription,
    error::{DatastoreError, DatastoreResult},
    key::Key,
    model::Model,
    value::Value,
};

/// The pseudo-property naming an entity's key in filters and orders.
pub const KEY_PROPERTY: &str = "__key__";

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// One sort key of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    /// The wire property name to sort by.
    pub property: String,
    pub direction: Direction,
}

/// Property comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    /// The property equals one of the values of an array.
    In,
    /// The property equals none of the values of an array.
    NotIn,
    /// The entity key has the given key as an ancestor.
    HasAncestor,
}

/// A filter expression over wire property names.
///
/// # Example
///
/// ```ignore
/// use entlayer::query::Filter;
///
/// let expr = Filter::and([
///     Filter::eq("status", "active"),
///     Filter::gt("age", 18),
/// ]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// All expressions must match.
    And(Vec<Expr>),
    /// Any expression must match.
    Or(Vec<Expr>),
    /// A property comparison.
    Property {
        property: String,
        op: PropertyOp,
        value: Value,
    },
}

impl Expr {
    /// Creates a property comparison expression.
    pub fn property(property: impl Into<String>, op: PropertyOp, value: Value) -> Self {
        Expr::Property {
            property: property.into(),
            op,
            value,
        }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    ///
    /// If this expression is already an OR, the other expression is appended
    /// to the list.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }
}

/// Helper struct for constructing filter expressions over property names.
pub struct Filter;

impl Filter {
    /// Matches entities whose `property` equals `value`.
    pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::property(property, PropertyOp::Eq, value.into())
    }

    /// Matches entities whose `property` differs from `value`.
    pub fn ne(property: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::property(property, PropertyOp::Ne, value.into())
    }

    /// Matches entities whose `property` is less than `value`.
    pub fn lt(property: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::property(property, PropertyOp::Lt, value.into())
    }

    /// Matches entities whose `property` is at most `value`.
    pub fn lte(property: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::property(property, PropertyOp::Lte, value.into())
    }

    /// Matches entities whose `property` is greater than `value`.
    pub fn gt(property: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::property(property, PropertyOp::Gt, value.into())
    }

    /// Matches entities whose `property` is at least `value`.
    pub fn gte(property: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::property(property, PropertyOp::Gte, value.into())
    }

    /// Matches entities whose property equals any of `values`.
    pub fn in_list<V: Into<Value>>(property: impl Into<String>, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::property(property, PropertyOp::In, collect_array(values))
    }

    /// Matches entities whose property equals none of `values`.
    pub fn not_in<V: Into<Value>>(property: impl Into<String>, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::property(property, PropertyOp::NotIn, collect_array(values))
    }

    /// Matches entities stored at or below `ancestor`.
    pub fn has_ancestor(ancestor: Key) -> Expr {
        Expr::property(KEY_PROPERTY, PropertyOp::HasAncestor, Value::Key(ancestor))
    }

    /// Matches entities matching every expression.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Matches entities matching any expression.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }
}

fn collect_array<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Value {
    Value::Array(values.into_iter().map(Into::into).collect())
}

/// A structured query over the entities of one kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// The entity kind to select; `None` selects every kind.
    pub kind: Option<String>,
    /// Optional filter expression to match entities.
    pub filter: Option<Expr>,
    /// Sort keys, applied in sequence.
    pub orders: Vec<Order>,
    /// Maximum number of entities to return.
    pub limit: Option<usize>,
    /// Number of matching entities to skip.
    pub offset: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query over one kind.
    pub fn kind(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    /// Starts building a query.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the query to entities of `kind`.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.query.kind = Some(kind.into());
        self
    }

    /// Sets the filter expression, ANDing it with any filter already set.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(match self.query.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    /// Appends a sort key.
    pub fn order(mut self, property: impl Into<String>, direction: Direction) -> Self {
        self.query.orders.push(Order {
            property: property.into(),
            direction,
        });
        self
    }

    /// Returns at most `limit` entities.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Skips the first `offset` matching entities.
    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Finishes the query.
    pub fn build(self) -> Query {
        self.query
    }
}

/// Builds a [`Query`] over one model kind by field name.
///
/// Field names are translated into wire property names and values are
/// encoded through the field's descriptor. The first unknown field is
/// reported by [`build`](Self::build).
pub struct ModelQueryBuilder<M: Model> {
    description: Arc<ModelDescription<M>>,
    query: QueryBuilder,
    error: Option<DatastoreError>,
}

impl<M: Model> ModelQueryBuilder<M> {
    /// Starts a query over the kind `description` maps.
    pub fn new(description: Arc<ModelDescription<M>>) -> Self {
        Self {
            description,
            query: QueryBuilder::new().kind(M::KIND),
            error: None,
        }
    }

    fn translate(&mut self, field: &str) -> Option<String> {
        let property = self.description.field_name_to_property_name(field).map(str::to_string);
        if property.is_none() && self.error.is_none() {
            self.error = Some(DatastoreError::UnknownField {
                kind: M::KIND.to_string(),
                field: field.to_string(),
            });
        }
        property
    }

    /// Adds a comparison of `field` against `value`.
    pub fn filter(mut self, field: &str, op: PropertyOp, value: impl Into<Value>) -> Self {
        let value = value.into();
        let Some(property) = self.translate(field) else {
            return self;
        };

        let encoded = match (op, value) {
            (PropertyOp::In | PropertyOp::NotIn, Value::Array(items)) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.encode(field, item))
                    .collect(),
            ),
            (_, value) => self.encode(field, value),
        };

        self.query = self.query.filter(Expr::property(property, op, encoded));
        self
    }

    fn encode(&self, field: &str, value: Value) -> Value {
        match self.description.encode_field(field, value.clone()) {
            Some(encoded) => encoded,
            None => value,
        }
    }

    /// Matches models whose `field` equals `value`.
    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, PropertyOp::Eq, value)
    }

    /// Matches models whose `field` differs from `value`.
    pub fn ne(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, PropertyOp::Ne, value)
    }

    /// Matches models whose `field` is less than `value`.
    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, PropertyOp::Lt, value)
    }

    /// Matches models whose `field` is at most `value`.
    pub fn lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, PropertyOp::Lte, value)
    }

    /// Matches models whose `field` is greater than `value`.
    pub fn gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, PropertyOp::Gt, value)
    }

    /// Matches models whose `field` is at least `value`.
    pub fn gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, PropertyOp::Gte, value)
    }

    /// Matches models whose `field` equals one of `values`.
    pub fn in_list<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.filter(field, PropertyOp::In, collect_array(values))
    }

    /// Matches models whose `field` equals none of `values`.
    pub fn not_in<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.filter(field, PropertyOp::NotIn, collect_array(values))
    }

    /// Restricts the query to entities stored at or below `ancestor`.
    pub fn has_ancestor(mut self, ancestor: Key) -> Self {
        self.query = self.query.filter(Filter::has_ancestor(ancestor));
        self
    }

    /// Appends a sort key on `field`.
    pub fn order(mut self, field: &str, direction: Direction) -> Self {
        if let Some(property) = self.translate(field) {
            self.query = self.query.order(property, direction);
        }
        self
    }

    /// Returns at most `limit` models.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query = self.query.limit(limit);
        self
    }

    /// Skips the first `offset` matching models.
    pub fn offset(mut self, offset: usize) -> Self {
        self.query = self.query.offset(offset);
        self
    }

    /// Builds the query.
    ///
    /// # Errors
    ///
    /// Returns [`DatastoreError::UnknownField`] for the first field the
    /// model does not declare. Expando models accept any field name.
    pub fn build(self) -> DatastoreResult<Query> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.query.build()),
        }
    }
}

/// A visitor over filter expressions, implemented by backends that evaluate
/// or translate them.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DatastoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_property(
        &mut self,
        property: &str,
        op: PropertyOp,
        value: &Value,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Property { property, op, value } => self.visit_property(property, *op, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fixtures::{Note, Person},
        key::KeyId,
    };

    #[test]
    fn builder_ands_successive_filters() {
        let query = Query::builder()
            .kind("Person")
            .filter(Filter::eq("name", "Ada"))
            .filter(Filter::gt("age", 30))
            .filter(Filter::lt("age", 40))
            .build();

        assert_eq!(
            query.filter,
            Some(Filter::and([
                Filter::eq("name", "Ada"),
                Filter::gt("age", 30),
                Filter::lt("age", 40),
            ]))
        );
    }

    #[test]
    fn model_queries_use_wire_names_and_encoded_values() {
        let description = Arc::new(ModelDescription::<Person>::compile().unwrap());
        let owner = Key::new("Team", Some(KeyId::Id(1)));

        let query = ModelQueryBuilder::new(description)
            .eq("email", "ada@example.com")
            .gte("score", 5)
            .in_list("tags", ["maths", "poetry"])
            .has_ancestor(owner.clone())
            .order("age", Direction::Descending)
            .limit(5)
            .build()
            .unwrap();

        assert_eq!(query.kind.as_deref(), Some("Person"));
        assert_eq!(
            query.filter,
            Some(Filter::and([
                Filter::eq("e", "ada@example.com"),
                Filter::gte("score", 5.0),
                Filter::in_list("tags", ["maths", "poetry"]),
                Filter::has_ancestor(owner),
            ]))
        );
        assert_eq!(
            query.orders,
            vec![Order {
                property: "age".to_string(),
                direction: Direction::Descending,
            }]
        );
        assert_eq!(query.limit, Some(5));
    }

    #[test]
    fn model_queries_reject_unknown_static_fields() {
        let description = Arc::new(ModelDescription::<Person>::compile().unwrap());

        let err = ModelQueryBuilder::new(description)
            .eq("nickname", "Ada")
            .eq("shoe_size", 9)
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            DatastoreError::UnknownField {
                kind: "Person".to_string(),
                field: "nickname".to_string(),
            }
        );
    }

    #[test]
    fn expando_queries_pass_unknown_fields_through() {
        let description = Arc::new(ModelDescription::<Note>::compile().unwrap());

        let query = ModelQueryBuilder::new(description)
            .eq("title", "Groceries")
            .eq("colour", "teal")
            .build()
            .unwrap();

        assert_eq!(
            query.filter,
            Some(Filter::and([Filter::eq("t", "Groceries"), Filter::eq("colour", "teal")]))
        );
    }

    struct Render;

    impl QueryVisitor for Render {
        type Output = String;
        type Error = DatastoreError;

        fn visit_and(&mut self, exprs: &[Expr]) -> DatastoreResult<String> {
            let parts = exprs.iter().map(|expr| self.visit_expr(expr)).collect::<DatastoreResult<Vec<_>>>()?;
            Ok(format!("({})", parts.join(" AND ")))
        }

        fn visit_or(&mut self, exprs: &[Expr]) -> DatastoreResult<String> {
            let parts = exprs.iter().map(|expr| self.visit_expr(expr)).collect::<DatastoreResult<Vec<_>>>()?;
            Ok(format!("({})", parts.join(" OR ")))
        }

        fn visit_property(&mut self, property: &str, op: PropertyOp, value: &Value) -> DatastoreResult<String> {
            Ok(format!("{} {:?} {:?}", property, op, value))
        }
    }

    #[test]
    fn visitors_walk_nested_expressions() {
        let expr = Filter::eq("a", 1).and(Filter::eq("b", 2).or(Filter::eq("c", 3)));

        assert_eq!(
            Render.visit_expr(&expr).unwrap(),
            "(a Eq Integer(1) AND (b Eq Integer(2) OR c Eq Integer(3)))"
        );
    }
}
