//! Semantic update descriptors and their translation into [`UpdateData`].
//!
//! Callers describe numeric and array mutations as plain maps; the translators
//! turn every described field into exactly one native [`FieldValue`] so the
//! result can be merged with other partial updates and handed to `update`.

use std::collections::BTreeMap;

use bson::Bson;
use log::warn;
use serde::Deserialize;

use crate::value::{FieldValue, Number, UpdateData};

/// Field path → numeric delta. A missing delta increments by zero.
///
/// Deserializes from a JSON object such as `{"visits": 1, "score": null}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct IncrementUpdate(BTreeMap<String, Option<Number>>);

impl IncrementUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: impl Into<String>, delta: impl Into<Number>) -> Self {
        self.0.insert(field.into(), Some(delta.into()));
        self
    }

    /// Adds a field without a delta; it still yields an increment by zero.
    pub fn field_without_delta(mut self, field: impl Into<String>) -> Self {
        self.0.insert(field.into(), None);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Option<Number>)> for IncrementUpdate {
    fn from_iter<I: IntoIterator<Item = (String, Option<Number>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The array mutations requested for one field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ArrayOps {
    #[serde(default)]
    pub union: Option<Vec<Bson>>,
    #[serde(default)]
    pub remove: Option<Vec<Bson>>,
}

impl ArrayOps {
    pub fn union<I, V>(elements: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        Self {
            union: Some(elements.into_iter().map(Into::into).collect()),
            remove: None,
        }
    }

    pub fn remove<I, V>(elements: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        Self {
            union: None,
            remove: Some(elements.into_iter().map(Into::into).collect()),
        }
    }
}

/// Field path → array union/remove request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ArrayUpdate(BTreeMap<String, ArrayOps>);

impl ArrayUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: impl Into<String>, ops: ArrayOps) -> Self {
        self.0.insert(field.into(), ops);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, ArrayOps)> for ArrayUpdate {
    fn from_iter<I: IntoIterator<Item = (String, ArrayOps)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One partial update, in any of the supported shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateDescriptor {
    Fields(UpdateData),
    Increment(IncrementUpdate),
    Array(ArrayUpdate),
}

impl From<UpdateData> for UpdateDescriptor {
    fn from(update: UpdateData) -> Self {
        UpdateDescriptor::Fields(update)
    }
}

impl From<IncrementUpdate> for UpdateDescriptor {
    fn from(update: IncrementUpdate) -> Self {
        UpdateDescriptor::Increment(update)
    }
}

impl From<ArrayUpdate> for UpdateDescriptor {
    fn from(update: ArrayUpdate) -> Self {
        UpdateDescriptor::Array(update)
    }
}

/// Emits one increment per field; a missing delta becomes zero.
pub fn translate_increments(update: IncrementUpdate) -> UpdateData {
    update
        .0
        .into_iter()
        .map(|(field, delta)| (field, FieldValue::Increment(delta.unwrap_or_default())))
        .collect()
}

/// Emits an array union or remove for every field with a non-empty request.
///
/// A field carrying both a union and a remove keeps the remove.
pub fn translate_arrays(update: ArrayUpdate) -> UpdateData {
    let mut translated = UpdateData::new();

    for (field, ops) in update.0 {
        let union = ops.union.filter(|elements| !elements.is_empty());
        let remove = ops.remove.filter(|elements| !elements.is_empty());

        match (union, remove) {
            (Some(_), Some(remove)) => {
                warn!("array update for {field} has both union and remove; applying remove");
                translated.insert(field, FieldValue::ArrayRemove(remove));
            }
            (Some(union), None) => {
                translated.insert(field, FieldValue::ArrayUnion(union));
            }
            (None, Some(remove)) => {
                translated.insert(field, FieldValue::ArrayRemove(remove));
            }
            (None, None) => {}
        }
    }

    translated
}

/// Translates each descriptor and shallow-merges the results left to right.
pub fn translate_all(descriptors: impl IntoIterator<Item = UpdateDescriptor>) -> UpdateData {
    descriptors
        .into_iter()
        .map(|descriptor| match descriptor {
            UpdateDescriptor::Fields(update) => update,
            UpdateDescriptor::Increment(update) => translate_increments(update),
            UpdateDescriptor::Array(update) => translate_arrays(update),
        })
        .fold(UpdateData::new(), UpdateData::merge)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_increment_field_is_emitted() {
        let update: IncrementUpdate =
            serde_json::from_str(r#"{"f1": 5, "f2": null}"#).unwrap();

        let translated = translate_increments(update);

        assert_eq!(translated.len(), 2);
        assert_eq!(translated.get("f1"), Some(&FieldValue::Increment(Number::Integer(5))));
        assert_eq!(translated.get("f2"), Some(&FieldValue::Increment(Number::Integer(0))));
    }

    #[test]
    fn increments_keep_doubles() {
        let translated = translate_increments(IncrementUpdate::new().field("ratio", 0.5));

        assert_eq!(translated.get("ratio"), Some(&FieldValue::increment(0.5)));
    }

    #[test]
    fn array_union_only() {
        let translated = translate_arrays(ArrayUpdate::new().field("tags", ArrayOps::union(["x"])));

        assert_eq!(translated.len(), 1);
        assert_eq!(translated.get("tags"), Some(&FieldValue::array_union(["x"])));
    }

    #[test]
    fn array_remove_only() {
        let translated =
            translate_arrays(ArrayUpdate::new().field("tags", ArrayOps::remove(["y"])));

        assert_eq!(translated.get("tags"), Some(&FieldValue::array_remove(["y"])));
    }

    #[test]
    fn empty_array_requests_are_dropped() {
        let update: ArrayUpdate =
            serde_json::from_str(r#"{"tags": {}, "labels": {"union": []}}"#).unwrap();

        assert!(translate_arrays(update).is_empty());
    }

    #[test]
    fn remove_wins_over_union() {
        let ops = ArrayOps {
            union: Some(vec![Bson::from("a")]),
            remove: Some(vec![Bson::from("b")]),
        };

        let translated = translate_arrays(ArrayUpdate::new().field("tags", ops));

        assert_eq!(translated.get("tags"), Some(&FieldValue::array_remove(["b"])));
    }

    #[test]
    fn translate_all_merges_left_to_right() {
        let merged = translate_all([
            UpdateDescriptor::from(UpdateData::new().set("name", FieldValue::value("Porto"))),
            IncrementUpdate::new().field("visits", 1).into(),
            ArrayUpdate::new().field("tags", ArrayOps::union(["coast"])).into(),
            UpdateData::new().set("visits", FieldValue::Delete).into(),
        ]);

        assert_eq!(merged.len(), 3);
        assert!(merged.contains_field("name"));
        assert!(merged.contains_field("tags"));
        assert_eq!(merged.get("visits"), Some(&FieldValue::Delete));
        assert_eq!(merged.get("tags"), Some(&FieldValue::array_union(["coast"])));
    }
}
