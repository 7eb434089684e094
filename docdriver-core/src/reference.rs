//! Collection, collection-group and document references.
//!
//! References are cheap, cloneable values binding a [`ResourcePath`] to a
//! [`Database`]. Building them never touches the backend.

use uuid::Uuid;

use crate::{
    database::Database,
    error::{DocumentStoreError, DocumentStoreResult},
    path::ResourcePath,
};

/// Generates a new document id.
pub fn auto_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A reference to a collection.
#[derive(Debug, Clone)]
pub struct CollectionRef {
    database: Database,
    path: ResourcePath,
}

impl CollectionRef {
    pub(crate) fn new(database: Database, path: ResourcePath) -> Self {
        Self { database, path }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    /// The collection id (the last path segment).
    pub fn id(&self) -> &str {
        self.path.last_segment().unwrap_or_default()
    }

    /// The document containing this collection, or `None` for a root collection.
    pub fn parent(&self) -> Option<DocumentRef> {
        self.path
            .parent()
            .filter(ResourcePath::is_document)
            .map(|path| DocumentRef::new(self.database.clone(), path))
    }

    /// A document in this collection. `path` may be a relative path such as
    /// `"alice/posts/first"` as long as it ends on a document.
    pub fn doc(&self, path: &str) -> DocumentStoreResult<DocumentRef> {
        let full = self.path.join(&ResourcePath::parse(path)?);

        if !full.is_document() || full.len() == self.path.len() {
            return Err(DocumentStoreError::InvalidPath(format!(
                "{full} does not name a document"
            )));
        }

        Ok(DocumentRef::new(self.database.clone(), full))
    }

    /// A document with a freshly generated id.
    pub fn new_doc(&self) -> DocumentRef {
        DocumentRef::new(self.database.clone(), self.path.child(auto_id()))
    }

    /// Like [`doc`](Self::doc), but an empty id yields [`new_doc`](Self::new_doc).
    pub fn doc_or_auto(&self, id: &str) -> DocumentStoreResult<DocumentRef> {
        if id.is_empty() {
            return Ok(self.new_doc());
        }

        self.doc(id)
    }
}

impl PartialEq for CollectionRef {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.database.same_backend(&other.database)
    }
}

/// A reference to a single document.
#[derive(Debug, Clone)]
pub struct DocumentRef {
    database: Database,
    path: ResourcePath,
}

impl DocumentRef {
    pub(crate) fn new(database: Database, path: ResourcePath) -> Self {
        Self { database, path }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    /// The document id (the last path segment).
    pub fn id(&self) -> &str {
        self.path.last_segment().unwrap_or_default()
    }

    /// Number of (collection, document) levels in this reference's path.
    pub fn depth(&self) -> usize {
        self.path.len() / 2
    }

    /// The collection containing this document.
    pub fn parent(&self) -> CollectionRef {
        CollectionRef::new(
            self.database.clone(),
            self.path.parent().unwrap_or_default(),
        )
    }

    /// A subcollection of this document. `path` may be a relative path such as
    /// `"posts/first/comments"` as long as it ends on a collection.
    pub fn collection(&self, path: &str) -> DocumentStoreResult<CollectionRef> {
        let full = self.path.join(&ResourcePath::parse(path)?);

        if !full.is_collection() || full.len() == self.path.len() {
            return Err(DocumentStoreError::InvalidPath(format!(
                "{full} does not name a collection"
            )));
        }

        Ok(CollectionRef::new(self.database.clone(), full))
    }
}

impl PartialEq for DocumentRef {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.database.same_backend(&other.database)
    }
}

/// A query scope over every collection with the given id, at any depth.
#[derive(Debug, Clone)]
pub struct CollectionGroupRef {
    database: Database,
    collection_id: String,
}

impl CollectionGroupRef {
    pub(crate) fn new(database: Database, collection_id: String) -> Self {
        Self { database, collection_id }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }
}
