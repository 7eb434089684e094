//! Convenient re-exports of commonly used types from docdriver.
//!
//! ```ignore
//! use docdriver::prelude::*;
//! ```
//!
//! This provides access to:
//! - The database handle, references and the path resolver
//! - Document accessors and contexts
//! - Update descriptors and field values
//! - Query constraints and snapshots
//! - The drivers aggregate and error types

pub use docdriver_core::{
    accessor::DocumentAccessor,
    backend::{StoreBackend, StoreBackendBuilder},
    batch::WriteBatch,
    context::{AccessorFactory, DocumentContext, ExecutionContext},
    data::{DocumentData, DocumentDataExt},
    database::{Database, DatabaseSettings},
    drivers::{AccessorDriver, DriverType, Drivers, QueryDriver},
    error::{DocumentStoreError, DocumentStoreResult},
    path::{NO_SEGMENTS, ResourcePath, collection_ref_for_path, doc_ref_for_path},
    query::{Cursor, Direction, FilterOp, Query, QueryConstraint, get_docs},
    reference::{CollectionGroupRef, CollectionRef, DocumentRef},
    snapshot::{DocumentSnapshot, QuerySnapshot},
    transaction::Transaction,
    update::{ArrayOps, ArrayUpdate, IncrementUpdate, UpdateDescriptor},
    value::{FieldValue, Number, UpdateData},
    write::{Precondition, SetOptions, WriteParams, WriteResult},
};
