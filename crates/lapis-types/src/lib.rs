//! Foundation types for Lapis.
//!
//! Lapis builds typed metadata, references and collections on top of a PID
//! registry whose only storage primitive is a flat, sparse
//! `index -> (type, value)` record per identifier. This crate holds the
//! vocabulary shared by every other Lapis crate.
//!
//! # Key Types
//!
//! - [`Pid`]: validated `prefix/suffix` persistent identifier
//! - [`RecordValue`]: one `(type tag, value)` entry of a record
//! - [`Record`]: a full record, keyed by index
//!
//! The [`record`] module also fixes the reserved low indices and the
//! well-known type tags that interoperate with existing registries.

pub mod error;
pub mod pid;
pub mod record;

pub use error::TypeError;
pub use pid::{is_pid_name, validate_pid, validate_prefix, Pid};
pub use record::{Record, RecordValue};
