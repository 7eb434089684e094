//! The drivers aggregate: the single dependency application code injects.

use std::{fmt, future::Future, sync::Arc};

use serde_json::Value;

use crate::{
    batch::WriteBatch,
    context::DocumentContext,
    data::DocumentData,
    database::Database,
    error::DocumentStoreResult,
    path::{PathRoot, collection_ref_for_path, doc_ref_for_path},
    query::{Query, QueryBase, QueryConstraint},
    reference::{CollectionRef, DocumentRef},
    snapshot::QuerySnapshot,
    transaction::Transaction,
};

/// Whether a driver talks to the real backend or a test double.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverType {
    Production,
    Testing,
}

impl fmt::Display for DriverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DriverType::Production => "production",
            DriverType::Testing => "testing",
        })
    }
}

/// Path resolution and document contexts over one database.
#[derive(Debug, Clone)]
pub struct AccessorDriver {
    database: Database,
}

impl AccessorDriver {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn direct<T: DocumentData>(&self) -> DocumentContext<T> {
        DocumentContext::direct()
    }

    pub fn in_transaction<T: DocumentData>(&self, transaction: Arc<Transaction>) -> DocumentContext<T> {
        DocumentContext::transaction(transaction)
    }

    pub fn in_batch<T: DocumentData>(&self, batch: Arc<WriteBatch>) -> DocumentContext<T> {
        DocumentContext::batch(batch)
    }

    pub fn batch(&self) -> Arc<WriteBatch> {
        self.database.batch()
    }

    /// See [`Database::run_transaction`].
    pub async fn run_transaction<R, F, Fut>(&self, body: F) -> DocumentStoreResult<R>
    where
        F: FnMut(Arc<Transaction>) -> Fut,
        Fut: Future<Output = DocumentStoreResult<R>>,
    {
        self.database.run_transaction(body).await
    }

    /// Resolves `path` and `segments` from the database root.
    pub fn collection_ref_for_path<S: AsRef<str>>(
        &self,
        path: &str,
        segments: &[S],
    ) -> DocumentStoreResult<CollectionRef> {
        collection_ref_for_path(&self.database, path, segments)
    }

    /// Resolves `path` and `segments` from the database root.
    pub fn doc_ref_for_path<S: AsRef<str>>(
        &self,
        path: &str,
        segments: &[S],
    ) -> DocumentStoreResult<DocumentRef> {
        doc_ref_for_path(&self.database, Some(path), segments)
    }

    /// Resolves relative to an existing reference.
    pub fn doc_ref_from<S: AsRef<str>>(
        &self,
        root: impl Into<PathRoot>,
        path: Option<&str>,
        segments: &[S],
    ) -> DocumentStoreResult<DocumentRef> {
        doc_ref_for_path(root, path, segments)
    }
}

/// Query construction and execution.
#[derive(Debug, Clone, Default)]
pub struct QueryDriver;

impl QueryDriver {
    pub fn new() -> Self {
        Self
    }

    pub fn query(
        &self,
        base: impl Into<QueryBase>,
        constraints: impl IntoIterator<Item = QueryConstraint>,
    ) -> Query {
        Query::new(base, constraints)
    }

    /// Builds a query from tagged JSON constraint descriptors.
    ///
    /// # Errors
    ///
    /// Fails with `UnsupportedConstraint` on the first descriptor of unknown type.
    pub fn query_from_descriptors(
        &self,
        base: impl Into<QueryBase>,
        descriptors: &[Value],
    ) -> DocumentStoreResult<Query> {
        let constraints = descriptors
            .iter()
            .map(QueryConstraint::from_descriptor)
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        Ok(Query::new(base, constraints))
    }

    pub async fn get_docs(&self, query: &Query) -> DocumentStoreResult<QuerySnapshot> {
        query.get_docs().await
    }
}

/// Everything the rest of an application needs to reach the document store.
#[derive(Debug, Clone)]
pub struct Drivers {
    pub driver_identifier: String,
    pub driver_type: DriverType,
    pub accessor_driver: AccessorDriver,
    pub query_driver: QueryDriver,
}

impl Drivers {
    pub fn new(driver_identifier: impl Into<String>, driver_type: DriverType, database: Database) -> Self {
        Self {
            driver_identifier: driver_identifier.into(),
            driver_type,
            accessor_driver: AccessorDriver::new(database),
            query_driver: QueryDriver::new(),
        }
    }

    pub fn database(&self) -> &Database {
        self.accessor_driver.database()
    }
}
