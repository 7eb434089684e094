//! Document accessors.
//!
//! A [`DocumentAccessor`] is bound to one document reference and one execution
//! context. The three implementations share a contract and differ only in how
//! they route each operation:
//!
//! - [`DirectAccessor`] reads and writes the backend immediately.
//! - [`TransactionalAccessor`] reads through a [`Transaction`] (recording the
//!   versions it saw) and stages writes on it.
//! - [`BatchedAccessor`] reads the committed state and stages writes on a
//!   [`WriteBatch`]; staged writes stay invisible until the batch commits.
//!
//! Accessors never cache: every `get` and `exists` call is a fresh read.
//!
//! # Example
//!
//! ```ignore
//! use docdriver_core::context::DocumentContext;
//!
//! let context = DocumentContext::<City>::direct();
//! let accessor = context.accessor_for(&database.doc("cities/porto")?);
//!
//! accessor.create(&City { name: "Porto".into(), population: 231_800 }).await?;
//! accessor.increment(IncrementUpdate::new().field("population", 1), None).await?;
//! ```

use std::{fmt, marker::PhantomData, sync::Arc};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use log::debug;

use crate::{
    batch::WriteBatch,
    context::ExecutionContext,
    data::{DocumentData, DocumentDataExt},
    error::{DocumentStoreError, DocumentStoreResult},
    reference::DocumentRef,
    snapshot::{DocumentSnapshot, DocumentSnapshotStream},
    transaction::Transaction,
    update::{
        ArrayUpdate, IncrementUpdate, UpdateDescriptor, translate_all, translate_arrays,
        translate_increments,
    },
    value::UpdateData,
    write::{SetOptions, Write, WriteParams, WriteResult},
};

/// Uniform access to one document under one execution context.
#[async_trait]
pub trait DocumentAccessor<T: DocumentData>: Send + Sync + fmt::Debug {
    /// The document this accessor is bound to.
    fn reference(&self) -> &DocumentRef;

    /// The context this accessor routes operations through.
    fn context_type(&self) -> ExecutionContext;

    /// Whether the document currently exists.
    async fn exists(&self) -> DocumentStoreResult<bool> {
        Ok(self.get().await?.exists())
    }

    /// Reads the document.
    async fn get(&self) -> DocumentStoreResult<DocumentSnapshot>;

    /// Reads the document and decodes it into `T`.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if the document does not exist.
    async fn get_with_converter(&self) -> DocumentStoreResult<Option<T>> {
        self.get().await?.decode()
    }

    /// Writes the document, failing with `DocumentAlreadyExists` if it exists.
    ///
    /// Under a transaction or batch the existence check happens at commit.
    async fn create(&self, data: &T) -> DocumentStoreResult<WriteResult>;

    async fn set(&self, data: &T, options: Option<SetOptions>) -> DocumentStoreResult<WriteResult>;

    /// Applies native field mutations to an existing document.
    async fn update(
        &self,
        fields: UpdateData,
        params: Option<WriteParams>,
    ) -> DocumentStoreResult<WriteResult>;

    async fn increment(
        &self,
        update: IncrementUpdate,
        params: Option<WriteParams>,
    ) -> DocumentStoreResult<WriteResult> {
        self.update(translate_increments(update), params).await
    }

    async fn array_update(
        &self,
        update: ArrayUpdate,
        params: Option<WriteParams>,
    ) -> DocumentStoreResult<WriteResult> {
        self.update(translate_arrays(update), params).await
    }

    /// Translates and shallow-merges several partial updates, then issues one `update`.
    async fn apply(
        &self,
        descriptors: Vec<UpdateDescriptor>,
        params: Option<WriteParams>,
    ) -> DocumentStoreResult<WriteResult> {
        self.update(translate_all(descriptors), params).await
    }

    async fn delete(&self, params: Option<WriteParams>) -> DocumentStoreResult<WriteResult>;

    /// Snapshots of the document as it changes.
    ///
    /// Only direct accessors stream live changes. Under a transaction or batch the
    /// stream yields a single snapshot read when `stream` is called.
    async fn stream(&self) -> DocumentStoreResult<DocumentSnapshotStream>;
}

/// Reads and writes the backend immediately.
pub struct DirectAccessor<T> {
    reference: DocumentRef,
    _marker: PhantomData<fn() -> T>,
}

impl<T> DirectAccessor<T> {
    pub fn new(reference: DocumentRef) -> Self {
        Self { reference, _marker: PhantomData }
    }

    async fn commit_one(&self, write: Write) -> DocumentStoreResult<WriteResult> {
        self.reference
            .database()
            .backend()
            .commit(vec![write], Vec::new())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DocumentStoreError::Backend("commit returned no write result".into()))
    }
}

impl<T> fmt::Debug for DirectAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectAccessor")
            .field("reference", &self.reference)
            .finish()
    }
}

#[async_trait]
impl<T: DocumentData> DocumentAccessor<T> for DirectAccessor<T> {
    fn reference(&self) -> &DocumentRef {
        &self.reference
    }

    fn context_type(&self) -> ExecutionContext {
        ExecutionContext::None
    }

    async fn get(&self) -> DocumentStoreResult<DocumentSnapshot> {
        let stored = self
            .reference
            .database()
            .backend()
            .get_document(self.reference.path())
            .await?;

        Ok(DocumentSnapshot::new(self.reference.clone(), stored))
    }

    async fn create(&self, data: &T) -> DocumentStoreResult<WriteResult> {
        self.commit_one(Write::create(self.reference.path().clone(), data.to_document()?))
            .await
    }

    async fn set(&self, data: &T, options: Option<SetOptions>) -> DocumentStoreResult<WriteResult> {
        self.commit_one(Write::set(
            self.reference.path().clone(),
            data.to_document()?,
            options,
        ))
        .await
    }

    async fn update(
        &self,
        fields: UpdateData,
        params: Option<WriteParams>,
    ) -> DocumentStoreResult<WriteResult> {
        let precondition = params.and_then(|params| params.precondition);

        self.commit_one(Write::update(self.reference.path().clone(), fields, precondition))
            .await
    }

    async fn delete(&self, params: Option<WriteParams>) -> DocumentStoreResult<WriteResult> {
        let precondition = params.and_then(|params| params.precondition);

        self.commit_one(Write::delete(self.reference.path().clone(), precondition))
            .await
    }

    async fn stream(&self) -> DocumentStoreResult<DocumentSnapshotStream> {
        let reference = self.reference.clone();
        let changes = reference
            .database()
            .backend()
            .listen_document(reference.path())
            .await?;

        Ok(changes
            .map(move |change| change.map(|stored| DocumentSnapshot::new(reference.clone(), stored)))
            .boxed())
    }
}

fn ignored_precondition(reference: &DocumentRef, params: Option<WriteParams>, context: &str) {
    if let Some(precondition) = params.and_then(|params| params.precondition) {
        debug!("{context} writes ignore preconditions; dropping {precondition:?} for {}", reference.path());
    }
}

fn single_snapshot(snapshot: DocumentSnapshot) -> DocumentSnapshotStream {
    stream::iter(vec![Ok(snapshot)]).boxed()
}

/// Reads through a transaction and stages writes on it.
pub struct TransactionalAccessor<T> {
    reference: DocumentRef,
    transaction: Arc<Transaction>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TransactionalAccessor<T> {
    pub fn new(reference: DocumentRef, transaction: Arc<Transaction>) -> Self {
        Self { reference, transaction, _marker: PhantomData }
    }
}

impl<T> fmt::Debug for TransactionalAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionalAccessor")
            .field("reference", &self.reference)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T: DocumentData> DocumentAccessor<T> for TransactionalAccessor<T> {
    fn reference(&self) -> &DocumentRef {
        &self.reference
    }

    fn context_type(&self) -> ExecutionContext {
        ExecutionContext::Transaction
    }

    async fn get(&self) -> DocumentStoreResult<DocumentSnapshot> {
        self.transaction.get(&self.reference).await
    }

    async fn create(&self, data: &T) -> DocumentStoreResult<WriteResult> {
        self.transaction
            .create(&self.reference, data.to_document()?)
            .await?;

        Ok(WriteResult::staged())
    }

    async fn set(&self, data: &T, options: Option<SetOptions>) -> DocumentStoreResult<WriteResult> {
        self.transaction
            .set(&self.reference, data.to_document()?, options)
            .await?;

        Ok(WriteResult::staged())
    }

    async fn update(
        &self,
        fields: UpdateData,
        params: Option<WriteParams>,
    ) -> DocumentStoreResult<WriteResult> {
        ignored_precondition(&self.reference, params, "transactional");
        self.transaction.update(&self.reference, fields).await?;

        Ok(WriteResult::staged())
    }

    async fn delete(&self, params: Option<WriteParams>) -> DocumentStoreResult<WriteResult> {
        ignored_precondition(&self.reference, params, "transactional");
        self.transaction.delete(&self.reference).await?;

        Ok(WriteResult::staged())
    }

    async fn stream(&self) -> DocumentStoreResult<DocumentSnapshotStream> {
        Ok(single_snapshot(self.get().await?))
    }
}

/// Reads committed state and stages writes on a batch.
pub struct BatchedAccessor<T> {
    reference: DocumentRef,
    batch: Arc<WriteBatch>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> BatchedAccessor<T> {
    pub fn new(reference: DocumentRef, batch: Arc<WriteBatch>) -> Self {
        Self { reference, batch, _marker: PhantomData }
    }
}

impl<T> fmt::Debug for BatchedAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchedAccessor")
            .field("reference", &self.reference)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T: DocumentData> DocumentAccessor<T> for BatchedAccessor<T> {
    fn reference(&self) -> &DocumentRef {
        &self.reference
    }

    fn context_type(&self) -> ExecutionContext {
        ExecutionContext::WriteBatch
    }

    async fn get(&self) -> DocumentStoreResult<DocumentSnapshot> {
        self.batch.get(&self.reference).await
    }

    async fn create(&self, data: &T) -> DocumentStoreResult<WriteResult> {
        self.batch
            .create(&self.reference, data.to_document()?)
            .await?;

        Ok(WriteResult::staged())
    }

    async fn set(&self, data: &T, options: Option<SetOptions>) -> DocumentStoreResult<WriteResult> {
        self.batch
            .set(&self.reference, data.to_document()?, options)
            .await?;

        Ok(WriteResult::staged())
    }

    async fn update(
        &self,
        fields: UpdateData,
        params: Option<WriteParams>,
    ) -> DocumentStoreResult<WriteResult> {
        ignored_precondition(&self.reference, params, "batched");
        self.batch.update(&self.reference, fields).await?;

        Ok(WriteResult::staged())
    }

    async fn delete(&self, params: Option<WriteParams>) -> DocumentStoreResult<WriteResult> {
        ignored_precondition(&self.reference, params, "batched");
        self.batch.delete(&self.reference).await?;

        Ok(WriteResult::staged())
    }

    async fn stream(&self) -> DocumentStoreResult<DocumentSnapshotStream> {
        Ok(single_snapshot(self.get().await?))
    }
}
