//! Resource paths and the path resolver.
//!
//! A [`ResourcePath`] is a sequence of alternating collection and document
//! segments. Odd-length paths name collections, even-length paths name documents.
//!
//! [`collection_ref_for_path`] and [`doc_ref_for_path`] build references from a
//! root (database, collection or document), a primary path and an optional list of
//! additional segments. The additional segments continue the path where the
//! primary path ended and are consumed two at a time; an empty document id in a
//! pair is replaced by an auto-generated id. No I/O happens here.
//!
//! # Example
//!
//! ```ignore
//! use docdriver_core::path::doc_ref_for_path;
//!
//! let users = database.collection("users")?;
//! // users/alice/posts/<auto-id>
//! let post = doc_ref_for_path(&users, Some("alice"), &["posts", ""])?;
//! ```

use std::fmt::{self, Display};

use crate::{
    database::Database,
    error::{DocumentStoreError, DocumentStoreResult},
    reference::{CollectionRef, DocumentRef},
};

/// A `/`-separated path of alternating collection and document segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    /// The empty path naming the database root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a `/`-separated path. Leading and trailing slashes are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidPath`] if the path contains an empty segment.
    pub fn parse(path: &str) -> DocumentStoreResult<Self> {
        let trimmed = path.trim_matches('/');

        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let segments = trimmed
            .split('/')
            .map(str::to_string)
            .collect::<Vec<_>>();

        if segments.iter().any(String::is_empty) {
            return Err(DocumentStoreError::InvalidPath(format!(
                "path {path:?} contains an empty segment"
            )));
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether this path names a document (non-empty, even length).
    pub fn is_document(&self) -> bool {
        !self.is_empty() && self.len() % 2 == 0
    }

    /// Whether this path names a collection (odd length).
    pub fn is_collection(&self) -> bool {
        self.len() % 2 == 1
    }

    /// Returns a new path with one segment appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Returns a new path with every segment of `other` appended.
    pub fn join(&self, other: &ResourcePath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// The path without its last segment, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        match self.segments.split_last() {
            Some((_, rest)) => Some(Self { segments: rest.to_vec() }),
            None => None,
        }
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn canonical_string(&self) -> String {
        self.segments.join("/")
    }
}

impl Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_string())
    }
}

/// The starting point of a path resolution.
#[derive(Debug, Clone)]
pub enum PathRoot {
    Database(Database),
    Collection(CollectionRef),
    Document(DocumentRef),
}

impl From<&Database> for PathRoot {
    fn from(database: &Database) -> Self {
        PathRoot::Database(database.clone())
    }
}

impl From<&CollectionRef> for PathRoot {
    fn from(collection: &CollectionRef) -> Self {
        PathRoot::Collection(collection.clone())
    }
}

impl From<&DocumentRef> for PathRoot {
    fn from(document: &DocumentRef) -> Self {
        PathRoot::Document(document.clone())
    }
}

impl PathRoot {
    fn database(&self) -> &Database {
        match self {
            PathRoot::Database(database) => database,
            PathRoot::Collection(collection) => collection.database(),
            PathRoot::Document(document) => document.database(),
        }
    }

    fn path(&self) -> ResourcePath {
        match self {
            PathRoot::Database(_) => ResourcePath::root(),
            PathRoot::Collection(collection) => collection.path().clone(),
            PathRoot::Document(document) => document.path().clone(),
        }
    }
}

/// An empty segment list, for resolver calls that only need the primary path.
pub const NO_SEGMENTS: &[&str] = &[];

fn ensure_pairs<S: AsRef<str>>(path: &str, segments: &[S]) -> DocumentStoreResult<()> {
    if segments.len() % 2 != 0 {
        return Err(DocumentStoreError::InvalidPathSegments(path.to_string()));
    }

    Ok(())
}

/// Resolves a collection reference.
///
/// `path` is resolved relative to `root` and must land on a collection. The
/// additional `segments` continue from there as `(document id, collection name)`
/// pairs; an empty document id is replaced by an auto-generated one.
///
/// # Errors
///
/// - [`DocumentStoreError::InvalidPathSegments`] if `segments` has odd length.
/// - [`DocumentStoreError::InvalidPath`] if the resolved path is not a collection.
pub fn collection_ref_for_path<S: AsRef<str>>(
    root: impl Into<PathRoot>,
    path: &str,
    segments: &[S],
) -> DocumentStoreResult<CollectionRef> {
    ensure_pairs(path, segments)?;

    let root = root.into();
    let full = root.path().join(&ResourcePath::parse(path)?);

    if !full.is_collection() {
        return Err(DocumentStoreError::InvalidPath(format!(
            "{full} does not name a collection"
        )));
    }

    let mut collection = CollectionRef::new(root.database().clone(), full);

    for pair in segments.chunks(2) {
        let document = collection.doc_or_auto(pair[0].as_ref())?;
        collection = document.collection(pair[1].as_ref())?;
    }

    Ok(collection)
}

/// Resolves a document reference.
///
/// `path` is resolved relative to `root` and must land on a document. When `path`
/// is `None` the root itself is used if it is a document, or a new auto-id
/// document is chosen if it is a collection. The additional `segments` then
/// descend as `(collection name, document id)` pairs, each step calling
/// `collection(name).doc(id)`; an empty id is replaced by an auto-generated one.
///
/// # Errors
///
/// - [`DocumentStoreError::InvalidPathSegments`] if `segments` has odd length.
/// - [`DocumentStoreError::InvalidPath`] if the resolved path is not a document.
pub fn doc_ref_for_path<S: AsRef<str>>(
    root: impl Into<PathRoot>,
    path: Option<&str>,
    segments: &[S],
) -> DocumentStoreResult<DocumentRef> {
    ensure_pairs(path.unwrap_or_default(), segments)?;

    let root = root.into();
    let mut document = match (path, &root) {
        (Some(path), _) => {
            let full = root.path().join(&ResourcePath::parse(path)?);

            if !full.is_document() {
                return Err(DocumentStoreError::InvalidPath(format!(
                    "{full} does not name a document"
                )));
            }

            DocumentRef::new(root.database().clone(), full)
        }
        (None, PathRoot::Collection(collection)) => collection.new_doc(),
        (None, PathRoot::Document(document)) => document.clone(),
        (None, PathRoot::Database(_)) => {
            return Err(DocumentStoreError::InvalidPath(
                "a document path is required when resolving from the database root".into(),
            ));
        }
    };

    for pair in segments.chunks(2) {
        document = document
            .collection(pair[0].as_ref())?
            .doc_or_auto(pair[1].as_ref())?;
    }

    Ok(document)
}
