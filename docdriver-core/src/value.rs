//! Field values: literal values and native field mutations.
//!
//! A [`FieldValue`] is either a literal [`Bson`] assignment or a sentinel that the
//! backend resolves against the stored document at commit time (increment, array
//! union/remove, field deletion, server timestamp). [`UpdateData`] maps dotted
//! field paths to field values and is the payload of every `update` call.

use std::collections::BTreeMap;

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

/// A numeric operand for increments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Integer(i64),
    Double(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Integer(value) => *value as f64,
            Number::Double(value) => *value,
        }
    }
}

impl Default for Number {
    fn default() -> Self {
        Number::Integer(0)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number::Integer(value as i64)
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::Integer(value)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Double(value)
    }
}

impl From<Number> for Bson {
    fn from(value: Number) -> Self {
        match value {
            Number::Integer(value) => Bson::Int64(value),
            Number::Double(value) => Bson::Double(value),
        }
    }
}

/// The value written to one field by an update.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Overwrite the field with a literal value.
    Value(Bson),
    /// Remove the field.
    Delete,
    /// Set the field to the commit time.
    ServerTimestamp,
    /// Add the operand to the current numeric value.
    Increment(Number),
    /// Append each element not already present.
    ArrayUnion(Vec<Bson>),
    /// Remove every element equal to one of these.
    ArrayRemove(Vec<Bson>),
}

impl FieldValue {
    pub fn value(value: impl Into<Bson>) -> Self {
        FieldValue::Value(value.into())
    }

    pub fn increment(delta: impl Into<Number>) -> Self {
        FieldValue::Increment(delta.into())
    }

    /// Elements are passed individually, never as one nested array.
    pub fn array_union<I, V>(elements: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        FieldValue::ArrayUnion(elements.into_iter().map(Into::into).collect())
    }

    pub fn array_remove<I, V>(elements: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        FieldValue::ArrayRemove(elements.into_iter().map(Into::into).collect())
    }

    /// Whether the value is resolved by the backend rather than assigned as-is.
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, FieldValue::Value(_))
    }
}

/// Field path → [`FieldValue`] map handed to `update`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateData {
    fields: BTreeMap<String, FieldValue>,
}

impl UpdateData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the entry for `field`.
    pub fn set(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(field.into(), value)
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    /// Shallow merge: entries of `other` replace entries with the same field path.
    pub fn merge(mut self, other: UpdateData) -> Self {
        self.fields.extend(other.fields);
        self
    }
}

impl From<Document> for UpdateData {
    /// Plain field map: every top-level key becomes a literal overwrite.
    fn from(document: Document) -> Self {
        document
            .into_iter()
            .map(|(field, value)| (field, FieldValue::Value(value)))
            .collect()
    }
}

impl FromIterator<(String, FieldValue)> for UpdateData {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self { fields: iter.into_iter().collect() }
    }
}

impl IntoIterator for UpdateData {
    type Item = (String, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a UpdateData {
    type Item = (&'a String, &'a FieldValue);
    type IntoIter = std::collections::btree_map::Iter<'a, String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
