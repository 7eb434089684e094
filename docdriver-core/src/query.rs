//! Query constraints and the constraint compiler.
//!
//! A [`Query`] is an immutable base (collection or collection group) plus an
//! ordered list of [`QueryConstraint`]s. Compiling folds the constraints onto a
//! [`StructuredQuery`] builder, which is what backends execute.
//!
//! Constraints are applied in a fixed phase order: every `Where`, then `OrderBy`,
//! then `Limit`, then the `StartAt`/`StartAfter` cursor. Inside one phase the
//! encounter order is kept; a later `Limit` or cursor replaces an earlier one.
//!
//! # Example
//!
//! ```ignore
//! use docdriver_core::query::{Query, QueryConstraint, FilterOp, Direction};
//!
//! let cities = database.collection("cities")?;
//! let first_page = Query::new(&cities, [
//!     QueryConstraint::where_field("country", FilterOp::Equal, "PT"),
//!     QueryConstraint::order_by("population", Direction::Descending),
//!     QueryConstraint::limit(10),
//! ]);
//!
//! let snapshot = first_page.get_docs().await?;
//! if let Some(next) = snapshot.continuation() {
//!     let second_page = first_page.with_constraint(next).get_docs().await?;
//! }
//! ```

use std::{fmt, str::FromStr};

use bson::{Bson, Document, ser::serialize_to_bson};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    database::Database,
    error::{DocumentStoreError, DocumentStoreResult},
    path::ResourcePath,
    reference::{CollectionGroupRef, CollectionRef, DocumentRef},
    snapshot::{DocumentSnapshot, QuerySnapshot},
};

/// Comparison operators for `Where` constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    /// The array field contains the value.
    ArrayContains,
    /// The array field contains any element of the value array.
    ArrayContainsAny,
    /// The field equals any element of the value array.
    In,
    /// The field equals no element of the value array.
    NotIn,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Equal => "==",
            FilterOp::NotEqual => "!=",
            FilterOp::LessThan => "<",
            FilterOp::LessThanOrEqual => "<=",
            FilterOp::GreaterThan => ">",
            FilterOp::GreaterThanOrEqual => ">=",
            FilterOp::ArrayContains => "array-contains",
            FilterOp::ArrayContainsAny => "array-contains-any",
            FilterOp::In => "in",
            FilterOp::NotIn => "not-in",
        }
    }
}

impl FromStr for FilterOp {
    type Err = DocumentStoreError;

    fn from_str(op: &str) -> Result<Self, Self::Err> {
        Ok(match op {
            "==" => FilterOp::Equal,
            "!=" => FilterOp::NotEqual,
            "<" => FilterOp::LessThan,
            "<=" => FilterOp::LessThanOrEqual,
            ">" => FilterOp::GreaterThan,
            ">=" => FilterOp::GreaterThanOrEqual,
            "array-contains" => FilterOp::ArrayContains,
            "array-contains-any" => FilterOp::ArrayContainsAny,
            "in" => FilterOp::In,
            "not-in" => FilterOp::NotIn,
            other => {
                return Err(DocumentStoreError::InvalidArgument(format!(
                    "unknown filter operator {other:?}"
                )));
            }
        })
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction for `OrderBy` constraints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl FromStr for Direction {
    type Err = DocumentStoreError;

    fn from_str(direction: &str) -> Result<Self, Self::Err> {
        match direction {
            "asc" => Ok(Direction::Ascending),
            "desc" => Ok(Direction::Descending),
            other => Err(DocumentStoreError::InvalidArgument(format!(
                "unknown order direction {other:?}"
            ))),
        }
    }
}

/// A position to resume a query from.
#[derive(Debug, Clone)]
pub enum Cursor {
    /// A previously fetched document; its order-by field values are used.
    Snapshot(DocumentSnapshot),
    /// Explicit values, one per order-by field, in order.
    Values(Vec<Bson>),
}

impl From<DocumentSnapshot> for Cursor {
    fn from(snapshot: DocumentSnapshot) -> Self {
        Cursor::Snapshot(snapshot)
    }
}

/// One declarative filtering, ordering or pagination directive.
#[derive(Debug, Clone)]
pub enum QueryConstraint {
    Where {
        field: String,
        op: FilterOp,
        value: Bson,
    },
    OrderBy {
        field: String,
        direction: Direction,
    },
    Limit(usize),
    StartAt(Cursor),
    StartAfter(Cursor),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WhereDescriptor {
    field_path: String,
    op_str: String,
    value: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderByDescriptor {
    field_path: String,
    direction_str: Option<String>,
}

#[derive(Deserialize)]
struct LimitDescriptor {
    limit: usize,
}

#[derive(Deserialize)]
struct CursorDescriptor {
    values: Vec<Value>,
}

impl QueryConstraint {
    pub fn where_field(field: impl Into<String>, op: FilterOp, value: impl Into<Bson>) -> Self {
        QueryConstraint::Where { field: field.into(), op, value: value.into() }
    }

    pub fn order_by(field: impl Into<String>, direction: Direction) -> Self {
        QueryConstraint::OrderBy { field: field.into(), direction }
    }

    pub fn limit(count: usize) -> Self {
        QueryConstraint::Limit(count)
    }

    pub fn start_at(cursor: impl Into<Cursor>) -> Self {
        QueryConstraint::StartAt(cursor.into())
    }

    pub fn start_after(cursor: impl Into<Cursor>) -> Self {
        QueryConstraint::StartAfter(cursor.into())
    }

    /// The type discriminator used by descriptors.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryConstraint::Where { .. } => "where",
            QueryConstraint::OrderBy { .. } => "orderBy",
            QueryConstraint::Limit(_) => "limit",
            QueryConstraint::StartAt(_) => "startAt",
            QueryConstraint::StartAfter(_) => "startAfter",
        }
    }

    fn phase(&self) -> u8 {
        match self {
            QueryConstraint::Where { .. } => 0,
            QueryConstraint::OrderBy { .. } => 1,
            QueryConstraint::Limit(_) => 2,
            QueryConstraint::StartAt(_) | QueryConstraint::StartAfter(_) => 3,
        }
    }

    /// Parses a tagged JSON descriptor such as
    /// `{"type": "where", "fieldPath": "a", "opStr": "==", "value": 1}`.
    ///
    /// Cursor descriptors carry explicit `values`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnsupportedConstraint`] naming the type if the
    /// discriminator is missing or unknown.
    pub fn from_descriptor(descriptor: &Value) -> DocumentStoreResult<Self> {
        let kind = descriptor
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| DocumentStoreError::UnsupportedConstraint("<missing type>".into()))?;

        match kind {
            "where" => {
                let body: WhereDescriptor = serde_json::from_value(descriptor.clone())?;
                Ok(QueryConstraint::Where {
                    field: body.field_path,
                    op: body.op_str.parse()?,
                    value: serialize_to_bson(&body.value)?,
                })
            }
            "orderBy" => {
                let body: OrderByDescriptor = serde_json::from_value(descriptor.clone())?;
                Ok(QueryConstraint::OrderBy {
                    field: body.field_path,
                    direction: match body.direction_str {
                        Some(direction) => direction.parse()?,
                        None => Direction::Ascending,
                    },
                })
            }
            "limit" => {
                let body: LimitDescriptor = serde_json::from_value(descriptor.clone())?;
                Ok(QueryConstraint::Limit(body.limit))
            }
            "startAt" | "startAfter" => {
                let body: CursorDescriptor = serde_json::from_value(descriptor.clone())?;
                let cursor = Cursor::Values(
                    body.values
                        .iter()
                        .map(serialize_to_bson)
                        .collect::<Result<Vec<_>, _>>()?,
                );

                Ok(if kind == "startAt" {
                    QueryConstraint::StartAt(cursor)
                } else {
                    QueryConstraint::StartAfter(cursor)
                })
            }
            other => Err(DocumentStoreError::UnsupportedConstraint(other.to_string())),
        }
    }
}

/// What a query scans.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryTarget {
    /// The direct children of one collection.
    Collection(ResourcePath),
    /// Every collection with this id, at any depth.
    CollectionGroup(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Bson,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// A cursor position as seen by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum CursorPosition {
    /// A document; `data` is `None` if it did not exist when read.
    Document {
        path: ResourcePath,
        data: Option<Document>,
    },
    Values(Vec<Bson>),
}

/// Where results start.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub position: CursorPosition,
    /// `true` for `StartAt`, `false` for `StartAfter`.
    pub inclusive: bool,
}

/// The backend-facing query builder.
///
/// Builder calls never fail; backends validate the finished query when executing it.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredQuery {
    pub target: QueryTarget,
    pub filters: Vec<FieldFilter>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub start: Option<Bound>,
}

impl StructuredQuery {
    pub fn new(target: QueryTarget) -> Self {
        Self {
            target,
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            start: None,
        }
    }

    pub fn where_field(mut self, field: impl Into<String>, op: FilterOp, value: Bson) -> Self {
        self.filters.push(FieldFilter { field: field.into(), op, value });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push(OrderBy { field: field.into(), direction });
        self
    }

    pub fn limit(mut self, count: usize) -> Self {
        self.limit = Some(count);
        self
    }

    pub fn start_at(mut self, cursor: &Cursor) -> Self {
        self.start = Some(Bound { position: Self::position(cursor), inclusive: true });
        self
    }

    pub fn start_after(mut self, cursor: &Cursor) -> Self {
        self.start = Some(Bound { position: Self::position(cursor), inclusive: false });
        self
    }

    fn position(cursor: &Cursor) -> CursorPosition {
        match cursor {
            Cursor::Snapshot(snapshot) => CursorPosition::Document {
                path: snapshot.reference().path().clone(),
                data: snapshot.data().cloned(),
            },
            Cursor::Values(values) => CursorPosition::Values(values.clone()),
        }
    }
}

/// The base a query is built on.
#[derive(Debug, Clone)]
pub struct QueryBase {
    database: Database,
    target: QueryTarget,
}

impl From<&CollectionRef> for QueryBase {
    fn from(collection: &CollectionRef) -> Self {
        Self {
            database: collection.database().clone(),
            target: QueryTarget::Collection(collection.path().clone()),
        }
    }
}

impl From<&CollectionGroupRef> for QueryBase {
    fn from(group: &CollectionGroupRef) -> Self {
        Self {
            database: group.database().clone(),
            target: QueryTarget::CollectionGroup(group.collection_id().to_string()),
        }
    }
}

/// An immutable query: a base plus ordered constraints.
#[derive(Debug, Clone)]
pub struct Query {
    database: Database,
    target: QueryTarget,
    constraints: Vec<QueryConstraint>,
}

impl Query {
    pub fn new(
        base: impl Into<QueryBase>,
        constraints: impl IntoIterator<Item = QueryConstraint>,
    ) -> Self {
        let base = base.into();

        Self {
            database: base.database,
            target: base.target,
            constraints: constraints.into_iter().collect(),
        }
    }

    /// A copy of this query with one more constraint appended.
    pub fn with_constraint(&self, constraint: QueryConstraint) -> Self {
        let mut query = self.clone();
        query.constraints.push(constraint);
        query
    }

    pub fn target(&self) -> &QueryTarget {
        &self.target
    }

    pub fn constraints(&self) -> &[QueryConstraint] {
        &self.constraints
    }

    /// Folds the constraints, in phase order, onto a fresh builder.
    pub fn compile(&self) -> StructuredQuery {
        compile_constraints(self.target.clone(), &self.constraints)
    }

    /// Executes the query with exactly one backend call.
    pub async fn get_docs(&self) -> DocumentStoreResult<QuerySnapshot> {
        let structured = self.compile();
        let stored = self
            .database
            .backend()
            .run_query(&structured)
            .await?;

        Ok(QuerySnapshot::new(
            stored
                .into_iter()
                .map(|document| {
                    let reference = DocumentRef::new(self.database.clone(), document.path.clone());
                    DocumentSnapshot::new(reference, Some(document))
                })
                .collect(),
        ))
    }
}

/// Folds `constraints` onto a [`StructuredQuery`] for `target`.
///
/// The sort is stable, so constraints of the same phase keep their relative order.
pub fn compile_constraints(target: QueryTarget, constraints: &[QueryConstraint]) -> StructuredQuery {
    let mut ordered = constraints.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|constraint| constraint.phase());

    ordered
        .into_iter()
        .fold(StructuredQuery::new(target), |builder, constraint| match constraint {
            QueryConstraint::Where { field, op, value } => {
                builder.where_field(field.clone(), *op, value.clone())
            }
            QueryConstraint::OrderBy { field, direction } => {
                builder.order_by(field.clone(), *direction)
            }
            QueryConstraint::Limit(count) => builder.limit(*count),
            QueryConstraint::StartAt(cursor) => builder.start_at(cursor),
            QueryConstraint::StartAfter(cursor) => builder.start_after(cursor),
        })
}

/// Executes `query`. See [`Query::get_docs`].
pub async fn get_docs(query: &Query) -> DocumentStoreResult<QuerySnapshot> {
    query.get_docs().await
}
