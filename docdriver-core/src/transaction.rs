//! Transaction handles.
//!
//! A [`Transaction`] reads through to the backend, remembering the version of
//! every document it reads, and buffers its writes. Nothing is written until
//! [`Database::run_transaction`] commits the handle; the backend then verifies
//! that none of the read documents changed in the meantime.

use std::collections::BTreeMap;

use bson::Document;
use log::debug;
use mea::rwlock::RwLock;

use crate::{
    backend::ReadVersion,
    database::Database,
    error::{DocumentStoreError, DocumentStoreResult},
    path::ResourcePath,
    reference::DocumentRef,
    snapshot::DocumentSnapshot,
    value::UpdateData,
    write::{SetOptions, Write, WriteResult},
};

#[derive(Debug, Default)]
struct TransactionState {
    reads: BTreeMap<ResourcePath, ReadVersion>,
    writes: Vec<Write>,
    committed: bool,
}

/// A read/write transaction over one [`Database`].
///
/// Obtained from [`Database::run_transaction`].
#[derive(Debug)]
pub struct Transaction {
    database: Database,
    state: RwLock<TransactionState>,
}

impl Transaction {
    pub(crate) fn new(database: Database) -> Self {
        Self {
            database,
            state: RwLock::new(TransactionState::default()),
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    fn ensure_same_database(&self, reference: &DocumentRef) -> DocumentStoreResult<()> {
        if !self.database.same_backend(reference.database()) {
            return Err(DocumentStoreError::InvalidArgument(format!(
                "{} belongs to a different database than this transaction",
                reference.path()
            )));
        }

        Ok(())
    }

    async fn stage(&self, write: Write) -> DocumentStoreResult<()> {
        let mut state = self.state.write().await;

        if state.committed {
            return Err(DocumentStoreError::FailedPrecondition(
                "transaction has already been committed".into(),
            ));
        }

        state.writes.push(write);
        Ok(())
    }

    /// Reads a document and records the version seen.
    ///
    /// All reads must happen before the first write.
    pub async fn get(&self, reference: &DocumentRef) -> DocumentStoreResult<DocumentSnapshot> {
        self.ensure_same_database(reference)?;

        if !self.state.read().await.writes.is_empty() {
            return Err(DocumentStoreError::FailedPrecondition(
                "transactions require all reads to happen before any write".into(),
            ));
        }

        let stored = self
            .database
            .backend()
            .get_document(reference.path())
            .await?;

        self.state
            .write()
            .await
            .reads
            .entry(reference.path().clone())
            .or_insert_with(|| ReadVersion::of(reference.path().clone(), stored.as_ref()));

        Ok(DocumentSnapshot::new(reference.clone(), stored))
    }

    pub async fn create(&self, reference: &DocumentRef, data: Document) -> DocumentStoreResult<()> {
        self.ensure_same_database(reference)?;
        self.stage(Write::create(reference.path().clone(), data)).await
    }

    pub async fn set(
        &self,
        reference: &DocumentRef,
        data: Document,
        options: Option<SetOptions>,
    ) -> DocumentStoreResult<()> {
        self.ensure_same_database(reference)?;
        self.stage(Write::set(reference.path().clone(), data, options)).await
    }

    /// Stages an update. The document must exist when the transaction commits.
    pub async fn update(&self, reference: &DocumentRef, fields: UpdateData) -> DocumentStoreResult<()> {
        self.ensure_same_database(reference)?;
        self.stage(Write::update(reference.path().clone(), fields, None)).await
    }

    pub async fn delete(&self, reference: &DocumentRef) -> DocumentStoreResult<()> {
        self.ensure_same_database(reference)?;
        self.stage(Write::delete(reference.path().clone(), None)).await
    }

    /// Number of writes buffered so far.
    pub async fn pending_writes(&self) -> usize {
        self.state.read().await.writes.len()
    }

    /// Commits the buffered writes together with the read set.
    pub(crate) async fn commit(&self) -> DocumentStoreResult<Vec<WriteResult>> {
        let (writes, reads) = {
            let mut state = self.state.write().await;

            if state.committed {
                return Err(DocumentStoreError::FailedPrecondition(
                    "transaction has already been committed".into(),
                ));
            }

            state.committed = true;
            (
                std::mem::take(&mut state.writes),
                std::mem::take(&mut state.reads),
            )
        };

        if writes.is_empty() {
            debug!("committing read-only transaction over {} documents", reads.len());
            return Ok(Vec::new());
        }

        debug!("committing transaction: {} writes, {} reads", writes.len(), reads.len());
        self.database
            .backend()
            .commit(writes, reads.into_values().collect())
            .await
    }
}
