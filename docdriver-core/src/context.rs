//! Execution contexts and accessor factories.
//!
//! A [`DocumentContext`] pairs an [`ExecutionContext`] tag with the
//! [`AccessorFactory`] that builds accessors for it, so calling code can branch on
//! the context without looking at accessor types. Every accessor built by one
//! factory shares that factory's transaction or batch handle.

use std::{fmt, marker::PhantomData, sync::Arc};

use crate::{
    accessor::{BatchedAccessor, DirectAccessor, DocumentAccessor, TransactionalAccessor},
    batch::WriteBatch,
    data::DocumentData,
    reference::DocumentRef,
    transaction::Transaction,
};

/// How operations reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionContext {
    /// Every operation hits the backend immediately.
    None,
    /// Reads are tracked and writes buffered on a transaction.
    Transaction,
    /// Writes are buffered on a batch until it commits.
    WriteBatch,
}

impl ExecutionContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionContext::None => "none",
            ExecutionContext::Transaction => "transaction",
            ExecutionContext::WriteBatch => "batch",
        }
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
enum ContextHandle {
    Direct,
    Transaction(Arc<Transaction>),
    Batch(Arc<WriteBatch>),
}

/// Builds accessors bound to one context's shared handle.
///
/// Building an accessor never touches the backend.
pub struct AccessorFactory<T> {
    handle: ContextHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DocumentData> AccessorFactory<T> {
    pub fn direct() -> Self {
        Self::with_handle(ContextHandle::Direct)
    }

    pub fn transaction(transaction: Arc<Transaction>) -> Self {
        Self::with_handle(ContextHandle::Transaction(transaction))
    }

    pub fn batch(batch: Arc<WriteBatch>) -> Self {
        Self::with_handle(ContextHandle::Batch(batch))
    }

    fn with_handle(handle: ContextHandle) -> Self {
        Self { handle, _marker: PhantomData }
    }

    pub fn context_type(&self) -> ExecutionContext {
        match self.handle {
            ContextHandle::Direct => ExecutionContext::None,
            ContextHandle::Transaction(_) => ExecutionContext::Transaction,
            ContextHandle::Batch(_) => ExecutionContext::WriteBatch,
        }
    }

    pub fn accessor_for(&self, reference: &DocumentRef) -> Box<dyn DocumentAccessor<T>> {
        let reference = reference.clone();

        match &self.handle {
            ContextHandle::Direct => Box::new(DirectAccessor::new(reference)),
            ContextHandle::Transaction(transaction) => {
                Box::new(TransactionalAccessor::new(reference, transaction.clone()))
            }
            ContextHandle::Batch(batch) => Box::new(BatchedAccessor::new(reference, batch.clone())),
        }
    }
}

impl<T> Clone for AccessorFactory<T> {
    fn clone(&self) -> Self {
        Self { handle: self.handle.clone(), _marker: PhantomData }
    }
}

impl<T> fmt::Debug for AccessorFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorFactory")
            .field("handle", &self.handle)
            .finish()
    }
}

/// A context tag together with its accessor factory.
///
/// Lives for one direct call, one transaction attempt or one batch.
pub struct DocumentContext<T> {
    pub context_type: ExecutionContext,
    pub accessor_factory: AccessorFactory<T>,
}

impl<T: DocumentData> DocumentContext<T> {
    pub fn new(accessor_factory: AccessorFactory<T>) -> Self {
        Self {
            context_type: accessor_factory.context_type(),
            accessor_factory,
        }
    }

    pub fn direct() -> Self {
        Self::new(AccessorFactory::direct())
    }

    pub fn transaction(transaction: Arc<Transaction>) -> Self {
        Self::new(AccessorFactory::transaction(transaction))
    }

    pub fn batch(batch: Arc<WriteBatch>) -> Self {
        Self::new(AccessorFactory::batch(batch))
    }

    /// Shorthand for `self.accessor_factory.accessor_for(reference)`.
    pub fn accessor_for(&self, reference: &DocumentRef) -> Box<dyn DocumentAccessor<T>> {
        self.accessor_factory.accessor_for(reference)
    }
}

impl<T> Clone for DocumentContext<T> {
    fn clone(&self) -> Self {
        Self {
            context_type: self.context_type,
            accessor_factory: self.accessor_factory.clone(),
        }
    }
}

impl<T> fmt::Debug for DocumentContext<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentContext")
            .field("context_type", &self.context_type)
            .field("accessor_factory", &self.accessor_factory)
            .finish()
    }
}
