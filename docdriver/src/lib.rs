//! Main docdriver crate: one document-access interface over direct, transactional
//! and batched execution.
//!
//! This crate is the primary entry point for users of the docdriver framework.
//! It re-exports the core types and functionality from the sub-crates and provides
//! ready-made drivers over the in-memory backend.
//!
//! # Features
//!
//! - **Uniform accessors** - The same `get`/`create`/`set`/`update`/`delete` calls work
//!   directly, inside a transaction or inside a write batch
//! - **Semantic updates** - Increment and array union/remove descriptors
//! - **Declarative queries** - Where/order-by/limit/cursor constraints compiled in a fixed order
//! - **Path resolution** - Collection and document references from a root plus segment pairs
//!
//! # Quick Start
//!
//! ```ignore
//! use docdriver::{prelude::*, memory::in_memory_drivers};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct City {
//!     pub name: String,
//!     pub population: i64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let drivers = in_memory_drivers("local");
//!     let accessors = &drivers.accessor_driver;
//!
//!     // users/alice/cities/<auto-id>
//!     let reference = accessors.doc_ref_for_path("users/alice", &["cities", ""])?;
//!     let city = accessors.direct::<City>().accessor_for(&reference);
//!
//!     city.create(&City { name: "Porto".into(), population: 231_800 }).await?;
//!     city.increment(IncrementUpdate::new().field("population", 1), None).await?;
//!
//!     let query = drivers.query_driver.query(&reference.parent(), [
//!         QueryConstraint::order_by("population", Direction::Descending),
//!         QueryConstraint::limit(10),
//!     ]);
//!     let snapshot = drivers.query_driver.get_docs(&query).await?;
//!
//!     println!("{} cities", snapshot.len());
//!     Ok(())
//! }
//! ```
//!
//! # Transactions and Batches
//!
//! ```ignore
//! let accessors = &drivers.accessor_driver;
//!
//! accessors
//!     .run_transaction(|tx| {
//!         let context = accessors.in_transaction::<City>(tx);
//!         let reference = reference.clone();
//!         async move {
//!             let city = context.accessor_for(&reference);
//!             if !city.exists().await? {
//!                 city.create(&City { name: "Braga".into(), population: 0 }).await?;
//!             }
//!             Ok(())
//!         }
//!     })
//!     .await?;
//!
//! let batch = accessors.batch();
//! let context = accessors.in_batch::<City>(batch.clone());
//! context.accessor_for(&reference).delete(None).await?;
//! batch.commit().await?;
//! ```

pub mod prelude;

pub use docdriver_core::{
    accessor, backend, batch, context, data, database, drivers, error, field, path, query,
    reference, snapshot, transaction, update, value, write,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    use docdriver_core::{
        database::{Database, DatabaseSettings},
        drivers::{DriverType, Drivers},
    };

    pub use docdriver_memory::{InMemoryStore, InMemoryStoreBuilder};

    /// Testing drivers over a fresh, empty [`InMemoryStore`].
    pub fn in_memory_drivers(driver_identifier: impl Into<String>) -> Drivers {
        in_memory_drivers_with_settings(driver_identifier, DatabaseSettings::default())
    }

    pub fn in_memory_drivers_with_settings(
        driver_identifier: impl Into<String>,
        settings: DatabaseSettings,
    ) -> Drivers {
        Drivers::new(
            driver_identifier,
            DriverType::Testing,
            Database::with_settings(InMemoryStore::new(), settings),
        )
    }
}
