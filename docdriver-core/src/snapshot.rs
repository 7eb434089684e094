//! Document and query snapshots.

use bson::{Bson, Document};
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::{
    backend::StoredDocument,
    data::{DocumentData, DocumentDataExt},
    error::DocumentStoreResult,
    field::get_field,
    query::{Cursor, QueryConstraint},
    reference::DocumentRef,
};

/// A stream of document snapshots produced by
/// [`DocumentAccessor::stream`](crate::accessor::DocumentAccessor::stream).
pub type DocumentSnapshotStream = BoxStream<'static, DocumentStoreResult<DocumentSnapshot>>;

/// The state of one document at the time it was read.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    reference: DocumentRef,
    data: Option<Document>,
    create_time: Option<DateTime<Utc>>,
    update_time: Option<DateTime<Utc>>,
}

impl DocumentSnapshot {
    pub fn new(reference: DocumentRef, stored: Option<StoredDocument>) -> Self {
        match stored {
            Some(stored) => Self {
                reference,
                data: Some(stored.data),
                create_time: Some(stored.create_time),
                update_time: Some(stored.update_time),
            },
            None => Self::missing(reference),
        }
    }

    /// A snapshot of a document that does not exist.
    pub fn missing(reference: DocumentRef) -> Self {
        Self {
            reference,
            data: None,
            create_time: None,
            update_time: None,
        }
    }

    pub fn reference(&self) -> &DocumentRef {
        &self.reference
    }

    pub fn id(&self) -> &str {
        self.reference.id()
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// The stored fields, or `None` if the document does not exist.
    pub fn data(&self) -> Option<&Document> {
        self.data.as_ref()
    }

    /// The value at a dotted field path.
    pub fn get(&self, field_path: &str) -> Option<&Bson> {
        self.data
            .as_ref()
            .and_then(|data| get_field(data, field_path))
    }

    /// Decodes the stored fields into `T`.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if the document does not exist.
    pub fn decode<T: DocumentData>(&self) -> DocumentStoreResult<Option<T>> {
        self.data
            .clone()
            .map(T::from_document)
            .transpose()
    }

    pub fn create_time(&self) -> Option<DateTime<Utc>> {
        self.create_time
    }

    pub fn update_time(&self) -> Option<DateTime<Utc>> {
        self.update_time
    }
}

/// The ordered result of one query execution.
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
    documents: Vec<DocumentSnapshot>,
}

impl QuerySnapshot {
    pub fn new(documents: Vec<DocumentSnapshot>) -> Self {
        Self { documents }
    }

    pub fn documents(&self) -> &[DocumentSnapshot] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn last(&self) -> Option<&DocumentSnapshot> {
        self.documents.last()
    }

    /// The constraint that continues after the last returned document.
    ///
    /// Add it to the same query to fetch the next page. `None` when the snapshot
    /// is empty.
    pub fn continuation(&self) -> Option<QueryConstraint> {
        self.last()
            .map(|last| QueryConstraint::StartAfter(Cursor::Snapshot(last.clone())))
    }

    pub fn into_documents(self) -> Vec<DocumentSnapshot> {
        self.documents
    }
}

impl IntoIterator for QuerySnapshot {
    type Item = DocumentSnapshot;
    type IntoIter = std::vec::IntoIter<DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}
