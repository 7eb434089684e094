//! Dotted field-path access into BSON documents.
//!
//! `"address.city"` addresses the `city` key of the nested `address` document.
//! These helpers are shared by snapshots and by backends applying updates.

use bson::{Bson, Document};

/// Looks up the value at a dotted field path.
pub fn get_field<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = document.get(first)?;

    for part in parts {
        current = match current {
            Bson::Document(nested) => nested.get(part)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Writes a value at a dotted field path, creating or replacing intermediate
/// documents as needed.
pub fn set_field(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        }
        Some((head, rest)) => {
            let needs_map = !matches!(document.get(head), Some(Bson::Document(_)));
            if needs_map {
                document.insert(head, Document::new());
            }

            if let Some(Bson::Document(nested)) = document.get_mut(head) {
                set_field(nested, rest, value);
            }
        }
    }
}

/// Removes the value at a dotted field path, returning it if it existed.
pub fn remove_field(document: &mut Document, path: &str) -> Option<Bson> {
    match path.split_once('.') {
        None => document.remove(path),
        Some((head, rest)) => match document.get_mut(head) {
            Some(Bson::Document(nested)) => remove_field(nested, rest),
            _ => None,
        },
    }
}

/// Deep-merges `source` into `target`: nested documents merge recursively,
/// every other value replaces the target's.
pub fn merge_documents(target: &mut Document, source: Document) {
    for (key, value) in source {
        if let (Some(Bson::Document(existing)), Bson::Document(incoming)) =
            (target.get_mut(&key), &value)
        {
            merge_documents(existing, incoming.clone());
            continue;
        }

        target.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn nested_lookup() {
        let document = doc! { "address": { "city": "Braga" }, "zip": 4700 };

        assert_eq!(get_field(&document, "address.city"), Some(&Bson::String("Braga".into())));
        assert_eq!(get_field(&document, "zip.code"), None);
        assert_eq!(get_field(&document, "missing"), None);
    }

    #[test]
    fn set_creates_intermediate_documents() {
        let mut document = doc! { "address": "unknown" };

        set_field(&mut document, "address.city", Bson::from("Faro"));

        assert_eq!(document, doc! { "address": { "city": "Faro" } });
    }

    #[test]
    fn remove_nested_field() {
        let mut document = doc! { "address": { "city": "Faro", "zip": 8000 } };

        assert_eq!(remove_field(&mut document, "address.zip"), Some(Bson::Int32(8000)));
        assert_eq!(document, doc! { "address": { "city": "Faro" } });
        assert_eq!(remove_field(&mut document, "address.zip"), None);
    }

    #[test]
    fn merge_keeps_untouched_nested_keys() {
        let mut target = doc! { "a": { "x": 1, "y": 2 }, "b": 1 };

        merge_documents(&mut target, doc! { "a": { "y": 3 }, "c": true });

        assert_eq!(target, doc! { "a": { "x": 1, "y": 3 }, "b": 1, "c": true });
    }
}
