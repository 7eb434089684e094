//! A document-store access layer that hides whether an operation runs directly,
//! inside a transaction, or inside an atomic write batch.
//!
//! This crate is the core of the docdriver project and provides:
//!
//! - **Paths and references** ([`path`], [`reference`]) - Resource paths, the path resolver and document/collection references
//! - **Store backend abstraction** ([`backend`]) - The trait a document-database client implements
//! - **Database handle** ([`database`]) - Entry point for references, batches and transaction runs
//! - **Transactions and batches** ([`transaction`], [`batch`]) - Shared handles that buffer writes until commit
//! - **Document accessors** ([`accessor`], [`context`]) - One interface over direct, transactional and batched access
//! - **Update translation** ([`update`], [`value`]) - Increment and array descriptors turned into native field mutations
//! - **Query compilation** ([`query`]) - Declarative constraints folded onto a backend query
//! - **Drivers aggregate** ([`drivers`]) - The bundle applications inject
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docdriver_core::{context::DocumentContext, database::Database};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct City {
//!     pub name: String,
//!     pub population: i64,
//! }
//!
//! let database = Database::new(backend);
//! let batch = database.batch();
//! let context = DocumentContext::<City>::batch(batch.clone());
//!
//! context
//!     .accessor_for(&database.doc("cities/braga")?)
//!     .create(&City { name: "Braga".into(), population: 193_000 })
//!     .await?;
//!
//! batch.commit().await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docdriver_core;

pub mod accessor;
pub mod backend;
pub mod batch;
pub mod context;
pub mod data;
pub mod database;
pub mod drivers;
pub mod error;
pub mod field;
pub mod path;
pub mod query;
pub mod reference;
pub mod snapshot;
pub mod transaction;
pub mod update;
pub mod value;
pub mod write;
