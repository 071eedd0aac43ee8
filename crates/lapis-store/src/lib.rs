//! Record store adapters for Lapis.
//!
//! A PID registry offers one flat, sparse record per identifier and nothing
//! else: no composite types, no transactions, no secondary indices. The
//! [`RecordStore`] trait captures exactly that contract so the data
//! structures in `lapis-model` can run against any registry.
//!
//! # Storage Backends
//!
//! - [`InMemoryRecordStore`] -- `HashMap`-based double for tests and embedding
//! - [`FileRecordStore`] -- one JSON document per identifier under a directory
//!
//! # Design Rules
//!
//! 1. Every call touches at most one identifier and is atomic on its own.
//! 2. No call is atomic together with any other call.
//! 3. The store never interprets type tags or values.
//! 4. A missing identifier is an error; a missing index is `None`.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FileRecordStore;
pub use memory::InMemoryRecordStore;
pub use traits::RecordStore;
