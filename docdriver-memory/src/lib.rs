//! In-memory document database backend for docdriver.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for
//! development and tests, where it stands in for a real document database.
//!
//! # Features
//!
//! - **Atomic commits** - All writes of a commit apply together or not at all
//! - **Optimistic transactions** - Commits carrying a stale read set are aborted
//! - **Native field mutations** - Increments, array union/remove, server timestamps, merges
//! - **Full query support** - Filters, ordering, cursors and limits, over collections or collection groups
//! - **Change streams** - Per-document listeners fed on every commit
//!
//! # Quick Start
//!
//! ```ignore
//! use docdriver::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let database = Database::new(InMemoryStore::builder().build().await?);
//!     let accessor = DocumentContext::<bson::Document>::direct()
//!         .accessor_for(&database.doc("cities/porto")?);
//!
//!     accessor.set(&bson::doc! { "name": "Porto" }, None).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docdriver_memory;

pub mod evaluator;
pub mod mutation;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
