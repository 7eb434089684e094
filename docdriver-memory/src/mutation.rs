//! Applying writes to stored documents.

use bson::{Bson, Document};
use chrono::{DateTime, Utc};

use docdriver_core::{
    backend::StoredDocument,
    error::{DocumentStoreError, DocumentStoreResult},
    field::{get_field, merge_documents, remove_field, set_field},
    path::ResourcePath,
    value::{FieldValue, Number, UpdateData},
    write::{Precondition, SetMode, Write},
};

use crate::evaluator::values_equal;

fn document_id(path: &ResourcePath) -> String {
    path.last_segment().unwrap_or_default().to_string()
}

fn collection_path(path: &ResourcePath) -> String {
    path.parent().unwrap_or_default().to_string()
}

fn check_precondition(
    path: &ResourcePath,
    existing: Option<&StoredDocument>,
    precondition: Option<&Precondition>,
) -> DocumentStoreResult<()> {
    match (precondition, existing) {
        (Some(Precondition::Exists(true)), None) => Err(DocumentStoreError::DocumentNotFound(
            document_id(path),
            collection_path(path),
        )),
        (Some(Precondition::Exists(false)), Some(_)) => Err(
            DocumentStoreError::DocumentAlreadyExists(document_id(path), collection_path(path)),
        ),
        (Some(Precondition::UpdateTime(expected)), Some(stored)) if stored.update_time == *expected => {
            Ok(())
        }
        (Some(Precondition::UpdateTime(expected)), _) => {
            Err(DocumentStoreError::FailedPrecondition(format!(
                "{path} was not last updated at {expected}"
            )))
        }
        _ => Ok(()),
    }
}

/// Adds `delta` to a stored value. Integer sums that overflow fall back to doubles;
/// a missing or non-numeric value is replaced by the delta.
pub(crate) fn increment(current: Option<&Bson>, delta: Number) -> Bson {
    let integer_sum = |value: i64, delta: i64| {
        value
            .checked_add(delta)
            .map(Bson::Int64)
            .unwrap_or(Bson::Double(value as f64 + delta as f64))
    };

    match (current, delta) {
        (Some(Bson::Int32(value)), Number::Integer(delta)) => {
            match integer_sum(*value as i64, delta) {
                Bson::Int64(sum) => i32::try_from(sum)
                    .map(Bson::Int32)
                    .unwrap_or(Bson::Int64(sum)),
                other => other,
            }
        }
        (Some(Bson::Int64(value)), Number::Integer(delta)) => integer_sum(*value, delta),
        (Some(Bson::Int32(value)), Number::Double(delta)) => Bson::Double(*value as f64 + delta),
        (Some(Bson::Int64(value)), Number::Double(delta)) => Bson::Double(*value as f64 + delta),
        (Some(Bson::Double(value)), delta) => Bson::Double(value + delta.as_f64()),
        (_, delta) => delta.into(),
    }
}

fn ensure_flat(field: &str, elements: &[Bson]) -> DocumentStoreResult<()> {
    if elements.iter().any(|element| matches!(element, Bson::Array(_))) {
        return Err(DocumentStoreError::InvalidArgument(format!(
            "array transform on {field} contains a nested array"
        )));
    }

    Ok(())
}

fn current_array(document: &Document, field: &str) -> Vec<Bson> {
    match get_field(document, field) {
        Some(Bson::Array(array)) => array.clone(),
        _ => Vec::new(),
    }
}

fn apply_update(
    document: &mut Document,
    fields: UpdateData,
    commit_time: DateTime<Utc>,
) -> DocumentStoreResult<()> {
    for (field, value) in fields {
        match value {
            FieldValue::Value(value) => set_field(document, &field, value),
            FieldValue::Delete => {
                remove_field(document, &field);
            }
            FieldValue::ServerTimestamp => set_field(
                document,
                &field,
                Bson::DateTime(bson::DateTime::from_chrono(commit_time)),
            ),
            FieldValue::Increment(delta) => {
                let next = increment(get_field(document, &field), delta);
                set_field(document, &field, next);
            }
            FieldValue::ArrayUnion(elements) => {
                ensure_flat(&field, &elements)?;

                let mut array = current_array(document, &field);
                for element in elements {
                    if !array.iter().any(|existing| values_equal(existing, &element)) {
                        array.push(element);
                    }
                }

                set_field(document, &field, Bson::Array(array));
            }
            FieldValue::ArrayRemove(elements) => {
                ensure_flat(&field, &elements)?;

                let array = current_array(document, &field)
                    .into_iter()
                    .filter(|existing| !elements.iter().any(|element| values_equal(existing, element)))
                    .collect();

                set_field(document, &field, Bson::Array(array));
            }
        }
    }

    Ok(())
}

fn apply_set(existing: Option<&Document>, data: Document, mode: SetMode) -> Document {
    match mode {
        SetMode::Overwrite => data,
        SetMode::Merge => {
            let mut merged = existing.cloned().unwrap_or_default();
            merge_documents(&mut merged, data);
            merged
        }
        SetMode::MergeFields(fields) => {
            let mut merged = existing.cloned().unwrap_or_default();

            for field in fields {
                match get_field(&data, &field) {
                    Some(value) => set_field(&mut merged, &field, value.clone()),
                    None => {
                        remove_field(&mut merged, &field);
                    }
                }
            }

            merged
        }
    }
}

/// Applies one write to the current state of its document.
///
/// # Returns
///
/// The new state, or `None` if the document no longer exists.
pub(crate) fn apply_write(
    write: Write,
    existing: Option<StoredDocument>,
    commit_time: DateTime<Utc>,
) -> DocumentStoreResult<Option<StoredDocument>> {
    check_precondition(write.path(), existing.as_ref(), write.precondition())?;

    let create_time = existing
        .as_ref()
        .map(|stored| stored.create_time)
        .unwrap_or(commit_time);

    match write {
        Write::Set { path, data, mode, .. } => Ok(Some(StoredDocument {
            data: apply_set(existing.as_ref().map(|stored| &stored.data), data, mode),
            path,
            create_time,
            update_time: commit_time,
        })),
        Write::Update { path, fields, .. } => {
            let mut data = existing.map(|stored| stored.data).unwrap_or_default();
            apply_update(&mut data, fields, commit_time)?;

            Ok(Some(StoredDocument {
                path,
                data,
                create_time,
                update_time: commit_time,
            }))
        }
        Write::Delete { .. } => Ok(None),
    }
}
