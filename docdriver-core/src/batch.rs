//! Atomic write batches.

use bson::Document;
use log::debug;
use mea::rwlock::RwLock;

use crate::{
    database::Database,
    error::{DocumentStoreError, DocumentStoreResult},
    reference::DocumentRef,
    snapshot::DocumentSnapshot,
    value::UpdateData,
    write::{SetOptions, Write, WriteResult},
};

#[derive(Debug, Default)]
struct BatchState {
    writes: Vec<Write>,
    committed: bool,
}

/// Buffers writes and commits them atomically in one backend call.
///
/// Staged writes are invisible to everyone, including reads through this batch,
/// until [`commit`](Self::commit) succeeds. A batch commits at most once.
#[derive(Debug)]
pub struct WriteBatch {
    database: Database,
    state: RwLock<BatchState>,
}

impl WriteBatch {
    pub(crate) fn new(database: Database) -> Self {
        Self {
            database,
            state: RwLock::new(BatchState::default()),
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    async fn stage(&self, reference: &DocumentRef, write: Write) -> DocumentStoreResult<()> {
        if !self.database.same_backend(reference.database()) {
            return Err(DocumentStoreError::InvalidArgument(format!(
                "{} belongs to a different database than this batch",
                reference.path()
            )));
        }

        let mut state = self.state.write().await;

        if state.committed {
            return Err(DocumentStoreError::FailedPrecondition(
                "write batch has already been committed".into(),
            ));
        }

        let limit = self.database.settings().max_batch_writes;
        if state.writes.len() >= limit {
            return Err(DocumentStoreError::ResourceExhausted(format!(
                "a write batch holds at most {limit} writes"
            )));
        }

        state.writes.push(write);
        Ok(())
    }

    /// Reads the committed state of a document. Staged writes are not visible.
    pub async fn get(&self, reference: &DocumentRef) -> DocumentStoreResult<DocumentSnapshot> {
        let stored = self
            .database
            .backend()
            .get_document(reference.path())
            .await?;

        Ok(DocumentSnapshot::new(reference.clone(), stored))
    }

    pub async fn create(&self, reference: &DocumentRef, data: Document) -> DocumentStoreResult<()> {
        self.stage(reference, Write::create(reference.path().clone(), data)).await
    }

    pub async fn set(
        &self,
        reference: &DocumentRef,
        data: Document,
        options: Option<SetOptions>,
    ) -> DocumentStoreResult<()> {
        self.stage(reference, Write::set(reference.path().clone(), data, options))
            .await
    }

    pub async fn update(&self, reference: &DocumentRef, fields: UpdateData) -> DocumentStoreResult<()> {
        self.stage(reference, Write::update(reference.path().clone(), fields, None))
            .await
    }

    pub async fn delete(&self, reference: &DocumentRef) -> DocumentStoreResult<()> {
        self.stage(reference, Write::delete(reference.path().clone(), None))
            .await
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.writes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.writes.is_empty()
    }

    /// Applies every staged write atomically.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::FailedPrecondition`] if the batch was already
    /// committed; otherwise whatever the backend reports, in which case none of the
    /// writes were applied.
    pub async fn commit(&self) -> DocumentStoreResult<Vec<WriteResult>> {
        let writes = {
            let mut state = self.state.write().await;

            if state.committed {
                return Err(DocumentStoreError::FailedPrecondition(
                    "write batch has already been committed".into(),
                ));
            }

            state.committed = true;
            std::mem::take(&mut state.writes)
        };

        if writes.is_empty() {
            return Ok(Vec::new());
        }

        debug!("committing write batch of {} writes", writes.len());
        self.database.backend().commit(writes, Vec::new()).await
    }
}
