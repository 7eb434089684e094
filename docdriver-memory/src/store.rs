use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use futures::{StreamExt, channel::mpsc};
use log::{debug, trace};
use mea::rwlock::RwLock;

use docdriver_core::{
    backend::{DocumentChangeStream, ReadVersion, StoreBackend, StoreBackendBuilder, StoredDocument},
    error::{DocumentStoreError, DocumentStoreResult},
    path::ResourcePath,
    query::StructuredQuery,
    write::{Write, WriteResult},
};

use crate::{
    evaluator::{StartCursor, compare_documents, has_order_fields, in_target, matches_all, validate_query},
    mutation::apply_write,
};

type ChangeSender = mpsc::UnboundedSender<DocumentStoreResult<Option<StoredDocument>>>;

#[derive(Debug, Default)]
struct MemoryState {
    documents: BTreeMap<ResourcePath, StoredDocument>,
    last_commit: Option<DateTime<Utc>>,
}

impl MemoryState {
    /// Commit times strictly increase, even when the clock does not.
    fn next_commit_time(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let commit_time = match self.last_commit {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };

        self.last_commit = Some(commit_time);
        commit_time
    }
}

/// A thread-safe, in-memory document database.
///
/// `InMemoryStore` keeps every document in a single ordered map keyed by its full
/// path and serializes commits behind an async-aware read-write lock. Commits are
/// atomic: either every write in a commit applies or none does.
///
/// Cloning the store is cheap; clones share the same data.
///
/// # Example
///
/// ```ignore
/// use docdriver_core::{database::Database, backend::StoreBackendBuilder};
/// use docdriver_memory::InMemoryStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::builder().build().await?;
///     let database = Database::new(store);
///
///     let snapshot = database.batch().get(&database.doc("cities/porto")?).await?;
///     assert!(!snapshot.exists());
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
    listeners: Arc<RwLock<HashMap<ResourcePath, Vec<ChangeSender>>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Number of stored documents across all collections.
    pub async fn document_count(&self) -> usize {
        self.state.read().await.documents.len()
    }

    async fn notify(&self, changes: &BTreeMap<ResourcePath, Option<StoredDocument>>) {
        let mut listeners = self.listeners.write().await;

        for (path, change) in changes {
            if let Some(senders) = listeners.get_mut(path) {
                senders.retain(|sender| sender.unbounded_send(Ok(change.clone())).is_ok());

                if senders.is_empty() {
                    listeners.remove(path);
                }
            }
        }
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn get_document(&self, path: &ResourcePath) -> DocumentStoreResult<Option<StoredDocument>> {
        Ok(self.state.read().await.documents.get(path).cloned())
    }

    async fn commit(
        &self,
        writes: Vec<Write>,
        read_set: Vec<ReadVersion>,
    ) -> DocumentStoreResult<Vec<WriteResult>> {
        let mut state = self.state.write().await;

        for read in &read_set {
            let current = state
                .documents
                .get(&read.path)
                .map(|stored| stored.update_time);

            if current != read.update_time {
                debug!("commit aborted: {} changed since it was read", read.path);
                return Err(DocumentStoreError::Aborted(format!(
                    "{} was modified after it was read",
                    read.path
                )));
            }
        }

        let commit_time = state.next_commit_time();
        let mut changes: BTreeMap<ResourcePath, Option<StoredDocument>> = BTreeMap::new();
        let mut results = Vec::with_capacity(writes.len());

        // Writes see the effects of earlier writes in the same commit.
        for write in writes {
            let path = write.path().clone();
            let existing = match changes.get(&path) {
                Some(staged) => staged.clone(),
                None => state.documents.get(&path).cloned(),
            };

            let next = apply_write(write, existing, commit_time)?;
            changes.insert(path, next);
            results.push(WriteResult::committed(commit_time));
        }

        for (path, change) in &changes {
            match change {
                Some(document) => {
                    state.documents.insert(path.clone(), document.clone());
                }
                None => {
                    state.documents.remove(path);
                }
            }
        }

        trace!("committed {} writes at {commit_time}", results.len());
        self.notify(&changes).await;

        Ok(results)
    }

    async fn run_query(&self, query: &StructuredQuery) -> DocumentStoreResult<Vec<StoredDocument>> {
        validate_query(query)?;

        let state = self.state.read().await;
        let mut matching = Vec::new();

        for document in state.documents.values() {
            if in_target(&query.target, &document.path)
                && has_order_fields(document, &query.order_by)
                && matches_all(document, &query.filters)?
            {
                matching.push(document);
            }
        }

        matching.sort_by(|a, b| compare_documents(a, b, &query.order_by));

        if let Some(bound) = &query.start {
            let cursor = StartCursor::resolve(bound, &query.order_by)?;
            matching.retain(|document| cursor.admits(document, &query.order_by));
        }

        Ok(matching
            .into_iter()
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn listen_document(&self, path: &ResourcePath) -> DocumentStoreResult<DocumentChangeStream> {
        let state = self.state.read().await;
        let (sender, receiver) = mpsc::unbounded();

        sender
            .unbounded_send(Ok(state.documents.get(path).cloned()))
            .map_err(|err| DocumentStoreError::Backend(err.to_string()))?;

        let mut listeners = self.listeners.write().await;
        let senders = listeners.entry(path.clone()).or_default();
        senders.retain(|sender| !sender.is_closed());
        senders.push(sender);

        Ok(receiver.boxed())
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.listeners.write().await.clear();
        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// Documents passed to [`with_document`](Self::with_document) are present from the
/// start, all sharing one commit time.
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    seed: Vec<Write>,
}

impl InMemoryStoreBuilder {
    pub fn with_document(mut self, path: ResourcePath, data: bson::Document) -> Self {
        self.seed.push(Write::set(path, data, None));
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let store = InMemoryStore::new();

        if !self.seed.is_empty() {
            store.commit(self.seed, Vec::new()).await?;
        }

        Ok(store)
    }
}
