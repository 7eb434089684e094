//! Storage backend abstraction for document access.
//!
//! This module defines the seam between the access layer and the underlying
//! document-database client. Connection management, atomic commit, contention
//! detection and query execution all live behind [`StoreBackend`]; the accessors,
//! transaction and batch handles in this crate only stage [`Write`]s and forward
//! reads.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docdriver_core::{backend::StoreBackend, path::ResourcePath, write::Write};
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//! let path = ResourcePath::parse("cities/lisbon")?;
//!
//! backend.commit(vec![Write::create(path.clone(), doc! { "name": "Lisbon" })], vec![]).await?;
//! let stored = backend.get_document(&path).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::Document;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use std::fmt::Debug;

use crate::{
    error::DocumentStoreResult,
    path::ResourcePath,
    query::StructuredQuery,
    write::{Write, WriteResult},
};

/// A document as held by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub path: ResourcePath,
    pub data: Document,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// The version of one document observed by a transaction read.
///
/// `update_time` is `None` when the document did not exist at read time.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadVersion {
    pub path: ResourcePath,
    pub update_time: Option<DateTime<Utc>>,
}

impl ReadVersion {
    pub fn of(path: ResourcePath, stored: Option<&StoredDocument>) -> Self {
        Self {
            path,
            update_time: stored.map(|document| document.update_time),
        }
    }
}

/// Change notifications for one document. `None` means the document does not exist.
pub type DocumentChangeStream = BoxStream<'static, DocumentStoreResult<Option<StoredDocument>>>;

/// Abstract interface for document-database clients.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from
/// multiple async tasks.
///
/// # Error Handling
///
/// Errors returned here reach callers unmodified. Implementations should use
/// [`DocumentStoreError::Aborted`](crate::error::DocumentStoreError::Aborted) for
/// contention, which is the only error transaction runners retry.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Reads the current state of one document.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if the document does not exist.
    async fn get_document(&self, path: &ResourcePath) -> DocumentStoreResult<Option<StoredDocument>>;

    /// Applies `writes` atomically, in order.
    ///
    /// Before applying anything, every entry of `read_set` must still match the
    /// stored update time of its document; otherwise the commit fails with
    /// `Aborted` and nothing is written. Preconditions on individual writes are
    /// checked against the state produced by the writes before them.
    ///
    /// # Returns
    ///
    /// One [`WriteResult`] per write, carrying the commit time.
    async fn commit(
        &self,
        writes: Vec<Write>,
        read_set: Vec<ReadVersion>,
    ) -> DocumentStoreResult<Vec<WriteResult>>;

    /// Executes a compiled query.
    ///
    /// # Returns
    ///
    /// The matching documents, ordered and limited as the query specifies.
    async fn run_query(&self, query: &StructuredQuery) -> DocumentStoreResult<Vec<StoredDocument>>;

    /// Subscribes to changes of one document.
    ///
    /// The stream yields the current state first, then one item per committed
    /// change to the document.
    async fn listen_document(&self, path: &ResourcePath) -> DocumentStoreResult<DocumentChangeStream>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Factory trait for asynchronously constructing backends.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
