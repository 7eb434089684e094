//! The database handle: the entry point for references, batches and transactions.
//!
//! A [`Database`] wraps a shared [`StoreBackend`] plus client-side settings. It is
//! cheap to clone; clones talk to the same backend.
//!
//! # Example
//!
//! ```ignore
//! use docdriver_core::database::Database;
//!
//! let database = Database::new(backend);
//! let cities = database.collection("cities")?;
//!
//! let population = database
//!     .run_transaction(|tx| async move {
//!         let snapshot = tx.get(&cities.doc("lisbon")?).await?;
//!         Ok(snapshot.get("population").cloned())
//!     })
//!     .await?;
//! ```

use std::{future::Future, sync::Arc};

use log::{debug, warn};

use crate::{
    backend::StoreBackend,
    batch::WriteBatch,
    error::{DocumentStoreError, DocumentStoreResult},
    path::ResourcePath,
    reference::{CollectionGroupRef, CollectionRef, DocumentRef},
    transaction::Transaction,
};

/// Default number of attempts [`Database::run_transaction`] makes.
pub const DEFAULT_MAX_TRANSACTION_ATTEMPTS: usize = 5;

/// Default number of writes a [`WriteBatch`] accepts.
pub const DEFAULT_MAX_BATCH_WRITES: usize = 500;

/// Client-side limits applied by a [`Database`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub max_transaction_attempts: usize,
    pub max_batch_writes: usize,
}

impl DatabaseSettings {
    pub fn builder() -> DatabaseSettingsBuilder {
        DatabaseSettingsBuilder::default()
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            max_transaction_attempts: DEFAULT_MAX_TRANSACTION_ATTEMPTS,
            max_batch_writes: DEFAULT_MAX_BATCH_WRITES,
        }
    }
}

/// Builder for [`DatabaseSettings`].
#[derive(Debug, Default)]
pub struct DatabaseSettingsBuilder {
    max_transaction_attempts: Option<usize>,
    max_batch_writes: Option<usize>,
}

impl DatabaseSettingsBuilder {
    /// Sets how many times a transaction body runs before contention is reported.
    pub fn max_transaction_attempts(mut self, attempts: usize) -> Self {
        self.max_transaction_attempts = Some(attempts);
        self
    }

    pub fn max_batch_writes(mut self, writes: usize) -> Self {
        self.max_batch_writes = Some(writes);
        self
    }

    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Initialization`] if a limit is zero.
    pub fn build(self) -> DocumentStoreResult<DatabaseSettings> {
        let defaults = DatabaseSettings::default();
        let settings = DatabaseSettings {
            max_transaction_attempts: self
                .max_transaction_attempts
                .unwrap_or(defaults.max_transaction_attempts),
            max_batch_writes: self
                .max_batch_writes
                .unwrap_or(defaults.max_batch_writes),
        };

        if settings.max_transaction_attempts == 0 {
            return Err(DocumentStoreError::Initialization(
                "max_transaction_attempts must be at least 1".into(),
            ));
        }
        if settings.max_batch_writes == 0 {
            return Err(DocumentStoreError::Initialization(
                "max_batch_writes must be at least 1".into(),
            ));
        }

        Ok(settings)
    }
}

/// A handle to one document database.
#[derive(Debug, Clone)]
pub struct Database {
    backend: Arc<dyn StoreBackend>,
    settings: Arc<DatabaseSettings>,
}

impl Database {
    pub fn new<B: StoreBackend + 'static>(backend: B) -> Self {
        Self::with_settings(backend, DatabaseSettings::default())
    }

    pub fn with_settings<B: StoreBackend + 'static>(backend: B, settings: DatabaseSettings) -> Self {
        Self {
            backend: Arc::new(backend),
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    pub(crate) fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.backend
    }

    /// Whether both handles talk to the same backend instance.
    pub fn same_backend(&self, other: &Database) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.backend), Arc::as_ptr(&other.backend))
    }

    /// A collection by absolute path, e.g. `"users"` or `"users/alice/posts"`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidPath`] if the path does not name a collection.
    pub fn collection(&self, path: &str) -> DocumentStoreResult<CollectionRef> {
        let path = ResourcePath::parse(path)?;

        if !path.is_collection() {
            return Err(DocumentStoreError::InvalidPath(format!(
                "{path} does not name a collection"
            )));
        }

        Ok(CollectionRef::new(self.clone(), path))
    }

    /// A document by absolute path, e.g. `"users/alice"`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidPath`] if the path does not name a document.
    pub fn doc(&self, path: &str) -> DocumentStoreResult<DocumentRef> {
        let path = ResourcePath::parse(path)?;

        if !path.is_document() || path.is_empty() {
            return Err(DocumentStoreError::InvalidPath(format!(
                "{path} does not name a document"
            )));
        }

        Ok(DocumentRef::new(self.clone(), path))
    }

    pub fn collection_group(&self, collection_id: impl Into<String>) -> CollectionGroupRef {
        CollectionGroupRef::new(self.clone(), collection_id.into())
    }

    /// A new, empty write batch.
    pub fn batch(&self) -> Arc<WriteBatch> {
        Arc::new(WriteBatch::new(self.clone()))
    }

    /// Runs `body` inside a transaction and commits its buffered writes.
    ///
    /// Each attempt gets a fresh [`Transaction`]. If the body or the commit fails
    /// with [`DocumentStoreError::Aborted`] the whole attempt is retried, up to
    /// `max_transaction_attempts` times. Any other error is returned at once and
    /// nothing is written.
    pub async fn run_transaction<R, F, Fut>(&self, mut body: F) -> DocumentStoreResult<R>
    where
        F: FnMut(Arc<Transaction>) -> Fut,
        Fut: Future<Output = DocumentStoreResult<R>>,
    {
        let attempts = self.settings.max_transaction_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let transaction = Arc::new(Transaction::new(self.clone()));

            let outcome = match body(transaction.clone()).await {
                Ok(value) => transaction.commit().await.map(|_| value),
                Err(err) => Err(err),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    debug!("transaction attempt {attempt}/{attempts} aborted: {err}");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        warn!("transaction gave up after {attempts} attempts");
        Err(last_error.unwrap_or_else(|| {
            DocumentStoreError::Aborted("transaction did not complete".into())
        }))
    }
}
