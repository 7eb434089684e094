//! Query evaluation for in-memory documents.
//!
//! This module provides filter matching, result ordering and cursor bounds over
//! stored BSON documents.

use std::{cmp::Ordering, collections::BTreeMap};

use bson::{Bson, datetime::DateTime};

use docdriver_core::{
    backend::StoredDocument,
    error::{DocumentStoreError, DocumentStoreResult},
    field::get_field,
    path::ResourcePath,
    query::{Bound, CursorPosition, Direction, FieldFilter, FilterOp, OrderBy, QueryTarget, StructuredQuery},
};

/// Type-erased, comparable representation of BSON values.
///
/// Values of different kinds order by kind:
/// null < booleans < numbers < timestamps < strings < arrays < maps < other.
/// Integers and doubles compare numerically; NaN sorts before every other number.
/// Remaining BSON types (object ids, binary, decimals, ...) group by element type
/// and are equal only when the values are identical.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(BTreeMap<&'a str, Comparable<'a>>),
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(array) => Comparable::Array(array.iter().map(Comparable::from).collect()),
            Bson::Null => Comparable::Null,
            Bson::Document(document) => Comparable::Map(
                document
                    .iter()
                    .map(|(key, value)| (key.as_str(), Comparable::from(value)))
                    .collect(),
            ),
            other => Comparable::Other(other),
        }
    }
}

impl Comparable<'_> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Bool(_) => 1,
            Comparable::Number(_) => 2,
            Comparable::DateTime(_) => 3,
            Comparable::String(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Map(_) => 6,
            Comparable::Other(_) => 7,
        }
    }

    pub(crate) fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Ordering::Equal,
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => match (a.is_nan(), b.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            },
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            (Comparable::Array(a), Comparable::Array(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(left, right)| left.total_cmp(right))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Comparable::Map(a), Comparable::Map(b)) => a
                .iter()
                .zip(b.iter())
                .map(|((left_key, left), (right_key, right))| {
                    left_key.cmp(right_key).then_with(|| left.total_cmp(right))
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Comparable::Other(a), Comparable::Other(b)) => other_cmp(a, b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn is_nan(&self) -> bool {
        matches!(self, Comparable::Number(value) if value.is_nan())
    }

    /// Range operators only compare values of one kind, and never NaN.
    fn range_cmp(&self, other: &Self) -> Option<Ordering> {
        if !self.same_kind(other) || self.is_nan() || other.is_nan() {
            return None;
        }

        Some(self.total_cmp(other))
    }

    fn same_kind(&self, other: &Self) -> bool {
        self.rank() == other.rank()
    }
}

fn other_cmp(a: &Bson, b: &Bson) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    (a.element_type() as u8)
        .cmp(&(b.element_type() as u8))
        .then_with(|| match (a, b) {
            (Bson::ObjectId(a), Bson::ObjectId(b)) => a.bytes().cmp(&b.bytes()),
            (Bson::Timestamp(a), Bson::Timestamp(b)) => {
                (a.time, a.increment).cmp(&(b.time, b.increment))
            }
            (Bson::Binary(a), Bson::Binary(b)) => a.bytes.cmp(&b.bytes),
            _ => Ordering::Equal,
        })
        // distinct values never compare equal
        .then_with(|| format!("{a:?}").cmp(&format!("{b:?}")))
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.total_cmp(other).is_eq()
    }
}

/// Equality as used by filters and array transforms: `1 == 1.0`.
pub(crate) fn values_equal(left: &Bson, right: &Bson) -> bool {
    Comparable::from(left) == Comparable::from(right)
}

fn list_operand<'a>(filter: &'a FieldFilter) -> DocumentStoreResult<&'a [Bson]> {
    match &filter.value {
        Bson::Array(values) => Ok(values),
        other => Err(DocumentStoreError::InvalidArgument(format!(
            "'{}' filter on {} requires an array operand, got {:?}",
            filter.op,
            filter.field,
            other.element_type()
        ))),
    }
}

/// Rejects queries no backend could execute.
pub(crate) fn validate_query(query: &StructuredQuery) -> DocumentStoreResult<()> {
    for filter in &query.filters {
        if matches!(filter.op, FilterOp::ArrayContainsAny | FilterOp::In | FilterOp::NotIn) {
            list_operand(filter)?;
        }
    }

    if let Some(bound) = &query.start {
        if query.order_by.is_empty() {
            return Err(DocumentStoreError::InvalidArgument(
                "a cursor requires at least one order-by field".into(),
            ));
        }

        if let CursorPosition::Values(values) = &bound.position {
            if values.len() > query.order_by.len() {
                return Err(DocumentStoreError::InvalidArgument(format!(
                    "cursor has {} values but the query orders by {} fields",
                    values.len(),
                    query.order_by.len()
                )));
            }
        }
    }

    Ok(())
}

pub(crate) fn in_target(target: &QueryTarget, path: &ResourcePath) -> bool {
    let segments = path.segments();

    match target {
        QueryTarget::Collection(collection) => path.parent().as_ref() == Some(collection),
        QueryTarget::CollectionGroup(id) => {
            segments.len() >= 2 && segments[segments.len() - 2] == *id
        }
    }
}

/// Whether a document matches one filter. Documents missing the field never match.
pub(crate) fn matches_filter(document: &StoredDocument, filter: &FieldFilter) -> DocumentStoreResult<bool> {
    let Some(field_value) = get_field(&document.data, &filter.field) else {
        return Ok(false);
    };

    let left = Comparable::from(field_value);
    let right = Comparable::from(&filter.value);

    Ok(match filter.op {
        FilterOp::Equal => left == right,
        FilterOp::NotEqual => !matches!(left, Comparable::Null) && left != right,
        FilterOp::LessThan => left.range_cmp(&right).is_some_and(Ordering::is_lt),
        FilterOp::LessThanOrEqual => left.range_cmp(&right).is_some_and(Ordering::is_le),
        FilterOp::GreaterThan => left.range_cmp(&right).is_some_and(Ordering::is_gt),
        FilterOp::GreaterThanOrEqual => left.range_cmp(&right).is_some_and(Ordering::is_ge),
        FilterOp::ArrayContains => match &left {
            Comparable::Array(items) => items.iter().any(|item| *item == right),
            _ => false,
        },
        FilterOp::ArrayContainsAny => match &left {
            Comparable::Array(items) => list_operand(filter)?
                .iter()
                .map(Comparable::from)
                .any(|candidate| items.iter().any(|item| *item == candidate)),
            _ => false,
        },
        FilterOp::In => list_operand(filter)?
            .iter()
            .any(|candidate| Comparable::from(candidate) == left),
        FilterOp::NotIn => {
            !matches!(left, Comparable::Null)
                && !list_operand(filter)?
                    .iter()
                    .any(|candidate| Comparable::from(candidate) == left)
        }
    })
}

/// Whether a document matches every filter.
pub(crate) fn matches_all(document: &StoredDocument, filters: &[FieldFilter]) -> DocumentStoreResult<bool> {
    for filter in filters {
        if !matches_filter(document, filter)? {
            return Ok(false);
        }
    }

    Ok(true)
}

pub(crate) fn has_order_fields(document: &StoredDocument, order_by: &[OrderBy]) -> bool {
    order_by
        .iter()
        .all(|order| get_field(&document.data, &order.field).is_some())
}

fn directed(ordering: Ordering, direction: Direction) -> Ordering {
    match direction {
        Direction::Ascending => ordering,
        Direction::Descending => ordering.reverse(),
    }
}

/// Direction of the implicit ordering by document path.
fn path_direction(order_by: &[OrderBy]) -> Direction {
    order_by
        .last()
        .map(|order| order.direction)
        .unwrap_or_default()
}

fn field_value<'a>(document: &'a StoredDocument, field: &str) -> Comparable<'a> {
    get_field(&document.data, field)
        .map(Comparable::from)
        .unwrap_or(Comparable::Null)
}

/// Result order: each order-by field in turn, then the document path.
pub(crate) fn compare_documents(a: &StoredDocument, b: &StoredDocument, order_by: &[OrderBy]) -> Ordering {
    order_by
        .iter()
        .map(|order| {
            directed(
                field_value(a, &order.field).total_cmp(&field_value(b, &order.field)),
                order.direction,
            )
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or_else(|| directed(a.path.cmp(&b.path), path_direction(order_by)))
}

/// A resolved start bound.
pub(crate) struct StartCursor<'a> {
    values: Vec<&'a Bson>,
    path: Option<&'a ResourcePath>,
    inclusive: bool,
}

impl<'a> StartCursor<'a> {
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidArgument`] if a document cursor does not
    /// exist or lacks one of the order-by fields.
    pub(crate) fn resolve(bound: &'a Bound, order_by: &[OrderBy]) -> DocumentStoreResult<Self> {
        match &bound.position {
            CursorPosition::Values(values) => Ok(Self {
                values: values.iter().collect(),
                path: None,
                inclusive: bound.inclusive,
            }),
            CursorPosition::Document { path, data } => {
                let data = data.as_ref().ok_or_else(|| {
                    DocumentStoreError::InvalidArgument(format!(
                        "cursor document {path} does not exist"
                    ))
                })?;

                let values = order_by
                    .iter()
                    .map(|order| {
                        get_field(data, &order.field).ok_or_else(|| {
                            DocumentStoreError::InvalidArgument(format!(
                                "cursor document {path} has no value for order-by field {}",
                                order.field
                            ))
                        })
                    })
                    .collect::<DocumentStoreResult<Vec<_>>>()?;

                Ok(Self { values, path: Some(path), inclusive: bound.inclusive })
            }
        }
    }

    /// Whether `document` lies at or past this cursor in result order.
    pub(crate) fn admits(&self, document: &StoredDocument, order_by: &[OrderBy]) -> bool {
        let mut ordering = order_by
            .iter()
            .zip(self.values.iter())
            .map(|(order, value)| {
                directed(
                    field_value(document, &order.field).total_cmp(&Comparable::from(*value)),
                    order.direction,
                )
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal);

        if let (Ordering::Equal, Some(path)) = (ordering, self.path) {
            ordering = directed(document.path.cmp(path), path_direction(order_by));
        }

        match ordering {
            Ordering::Greater => true,
            Ordering::Equal => self.inclusive,
            Ordering::Less => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{Document, doc};
    use chrono::Utc;

    fn stored(path: &str, data: Document) -> StoredDocument {
        let now = Utc::now();

        StoredDocument {
            path: ResourcePath::parse(path).unwrap(),
            data,
            create_time: now,
            update_time: now,
        }
    }

    fn filter(field: &str, op: FilterOp, value: impl Into<Bson>) -> FieldFilter {
        FieldFilter { field: field.into(), op, value: value.into() }
    }

    #[test]
    fn mixed_numeric_types_compare_by_value() {
        assert!(values_equal(&Bson::Int32(3), &Bson::Double(3.0)));
        assert!(values_equal(&Bson::Int64(7), &Bson::Int32(7)));
        assert!(!values_equal(&Bson::Int32(3), &Bson::String("3".into())));
    }

    #[test]
    fn kinds_order_before_values() {
        let null = Bson::Null;
        let number = Bson::Int32(100);
        let text = Bson::String("a".into());

        assert!(Comparable::from(&null).total_cmp(&Comparable::from(&number)).is_lt());
        assert!(Comparable::from(&number).total_cmp(&Comparable::from(&text)).is_lt());
    }

    #[test]
    fn range_filters_only_match_same_kind() {
        let document = stored("cities/a", doc! { "population": "many" });

        assert!(!matches_filter(&document, &filter("population", FilterOp::GreaterThan, 5)).unwrap());
    }

    #[test]
    fn distinct_object_ids_are_not_equal() {
        let first = Bson::ObjectId(bson::oid::ObjectId::new());
        let second = Bson::ObjectId(bson::oid::ObjectId::new());

        assert!(values_equal(&first, &first.clone()));
        assert!(!values_equal(&first, &second));
        assert!(!values_equal(&first, &Bson::Null));
        assert!(Comparable::from(&first).total_cmp(&Comparable::from(&second)).is_ne());
    }

    #[test]
    fn null_filters_ignore_other_bson_types() {
        let owned = stored("cities/a", doc! { "owner": bson::oid::ObjectId::new() });
        let blob = Bson::Binary(bson::Binary {
            subtype: bson::spec::BinarySubtype::Generic,
            bytes: vec![1, 2, 3],
        });
        let tagged = stored("cities/b", doc! { "blob": blob });

        assert!(!matches_filter(&owned, &filter("owner", FilterOp::Equal, Bson::Null)).unwrap());
        assert!(matches_filter(&tagged, &filter("blob", FilterOp::NotEqual, Bson::Null)).unwrap());
    }

    #[test]
    fn range_filters_skip_nan() {
        let nan = stored("cities/a", doc! { "score": f64::NAN });
        let five = stored("cities/b", doc! { "score": 5.0 });

        for op in [FilterOp::LessThan, FilterOp::LessThanOrEqual, FilterOp::GreaterThan] {
            assert!(!matches_filter(&nan, &filter("score", op, 10.0)).unwrap());
            assert!(!matches_filter(&five, &filter("score", op, f64::NAN)).unwrap());
        }
        assert!(matches_filter(&five, &filter("score", FilterOp::LessThan, 10.0)).unwrap());
    }

    #[test]
    fn not_equal_skips_null_and_missing() {
        let with_null = stored("cities/a", doc! { "region": Bson::Null });
        let missing = stored("cities/b", doc! {});
        let other = stored("cities/c", doc! { "region": "north" });
        let not_south = filter("region", FilterOp::NotEqual, "south");

        assert!(!matches_filter(&with_null, &not_south).unwrap());
        assert!(!matches_filter(&missing, &not_south).unwrap());
        assert!(matches_filter(&other, &not_south).unwrap());
    }

    #[test]
    fn array_filters() {
        let document = stored("posts/a", doc! { "tags": ["rust", "db"], "lang": "en" });

        assert!(matches_filter(&document, &filter("tags", FilterOp::ArrayContains, "db")).unwrap());
        assert!(matches_filter(&document, &filter("tags", FilterOp::ArrayContainsAny, vec!["go", "rust"])).unwrap());
        assert!(matches_filter(&document, &filter("lang", FilterOp::In, vec!["pt", "en"])).unwrap());
        assert!(!matches_filter(&document, &filter("lang", FilterOp::NotIn, vec!["en"])).unwrap());
    }

    #[test]
    fn list_operators_reject_scalars() {
        let document = stored("posts/a", doc! { "lang": "en" });

        assert!(matches!(
            matches_filter(&document, &filter("lang", FilterOp::In, "en")),
            Err(DocumentStoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn collection_group_matches_any_depth() {
        let group = QueryTarget::CollectionGroup("posts".into());
        let direct = QueryTarget::Collection(ResourcePath::parse("posts").unwrap());

        assert!(in_target(&group, &ResourcePath::parse("users/alice/posts/p1").unwrap()));
        assert!(in_target(&group, &ResourcePath::parse("posts/p2").unwrap()));
        assert!(!in_target(&direct, &ResourcePath::parse("users/alice/posts/p1").unwrap()));
        assert!(in_target(&direct, &ResourcePath::parse("posts/p2").unwrap()));
    }

    #[test]
    fn ties_break_by_path() {
        let a = stored("cities/a", doc! { "rank": 1 });
        let b = stored("cities/b", doc! { "rank": 1 });
        let order = [OrderBy { field: "rank".into(), direction: Direction::Ascending }];

        assert_eq!(compare_documents(&a, &b, &order), Ordering::Less);
    }

    #[test]
    fn start_after_document_excludes_the_cursor() {
        let cursor_doc = stored("cities/b", doc! { "rank": 2 });
        let order = [OrderBy { field: "rank".into(), direction: Direction::Ascending }];
        let bound = Bound {
            position: CursorPosition::Document {
                path: cursor_doc.path.clone(),
                data: Some(cursor_doc.data.clone()),
            },
            inclusive: false,
        };
        let cursor = StartCursor::resolve(&bound, &order).unwrap();

        assert!(!cursor.admits(&cursor_doc, &order));
        assert!(cursor.admits(&stored("cities/c", doc! { "rank": 2 }), &order));
        assert!(!cursor.admits(&stored("cities/a", doc! { "rank": 2 }), &order));
        assert!(cursor.admits(&stored("cities/z", doc! { "rank": 3 }), &order));
    }

    #[test]
    fn missing_cursor_document_is_rejected() {
        let bound = Bound {
            position: CursorPosition::Document {
                path: ResourcePath::parse("cities/gone").unwrap(),
                data: None,
            },
            inclusive: true,
        };
        let order = [OrderBy { field: "rank".into(), direction: Direction::Ascending }];

        assert!(matches!(
            StartCursor::resolve(&bound, &order),
            Err(DocumentStoreError::InvalidArgument(_))
        ));
    }
}
