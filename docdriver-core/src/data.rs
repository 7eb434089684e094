//! Traits for converting typed document data to and from stored BSON documents.
//!
//! Accessors are generic over a data type `T`. Any serde type qualifies; use
//! [`bson::Document`] itself when working untyped.

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Marker trait for data that can be written through a
/// [`DocumentAccessor`](crate::accessor::DocumentAccessor).
///
/// Implemented automatically for every `Serialize + DeserializeOwned` type that
/// is `Send + Sync + 'static`.
///
/// # Example
///
/// ```ignore
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct City {
///     pub name: String,
///     pub population: i64,
/// }
///
/// // `City` is now `DocumentData` and can be used with `DocumentContext::<City>`.
/// ```
pub trait DocumentData: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> DocumentData for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Extension trait providing serialization utilities for document data.
pub trait DocumentDataExt: DocumentData {
    /// Converts this value to a BSON document for storage.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the value does not
    /// serialize to a map, or a serialization error.
    fn to_document(&self) -> DocumentStoreResult<Document>;

    /// Creates a value from a stored BSON document.
    fn from_document(document: Document) -> DocumentStoreResult<Self>;
}

impl<T: DocumentData> DocumentDataExt for T {
    fn to_document(&self) -> DocumentStoreResult<Document> {
        match serialize_to_bson(self)? {
            Bson::Document(document) => Ok(document),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "expected a map of fields, found {:?}",
                other.element_type()
            ))),
        }
    }

    fn from_document(document: Document) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(document))?)
    }
}
