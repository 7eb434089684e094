//! Error types and result types for document access operations.
//!
//! Errors fall into three groups:
//!
//! - input validation raised by this crate before any backend call
//!   ([`DocumentStoreError::InvalidPath`], [`DocumentStoreError::InvalidPathSegments`],
//!   [`DocumentStoreError::UnsupportedConstraint`]),
//! - backend errors produced by a [`StoreBackend`](crate::backend::StoreBackend) and passed
//!   through accessors untouched,
//! - serialization errors when converting typed data to and from BSON.
//!
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when accessing a document store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A path string does not resolve to the requested kind of reference.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    /// Additional path segments were not supplied as complete pairs.
    /// The argument is the primary path the segments were attached to.
    #[error("Invalid path segments for {0}: segments must come in pairs")]
    InvalidPathSegments(String),
    /// A query constraint descriptor carried an unknown type discriminator.
    #[error("Unsupported query constraint: {0}")]
    UnsupportedConstraint(String),
    /// The backend rejected an argument (malformed query, bad field value, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection path.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection path.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// A write precondition did not hold, or a handle was used in the wrong state.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),
    /// A transaction lost a contention race and may be retried.
    #[error("Aborted: {0}")]
    Aborted(String),
    /// A client-side limit was exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
    /// The document has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
    /// An unknown error occurred.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl DocumentStoreError {
    /// Whether the error signals transaction contention that a fresh attempt may resolve.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DocumentStoreError::Aborted(_))
    }
}

/// A specialized `Result` type for document access operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
