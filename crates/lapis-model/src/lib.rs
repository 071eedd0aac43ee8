//! Digital objects and collections for Lapis.
//!
//! Everything here is stored in the flat `index -> (type, value)` records of
//! a [`RecordStore`]. The 32-bit index space of each record is split into
//! segments (see [`segment`]) so one record can carry scalar metadata,
//! references, a collection body and back-references to every collection
//! it belongs to.
//!
//! # Key Types
//!
//! - [`Infrastructure`]: create, look up and delete objects and aliases
//! - [`DigitalObject`]: handle on one record with typed accessors
//! - [`DigitalObjectSet`], [`DigitalObjectArray`],
//!   [`DigitalObjectLinkedList`]: collections with parent back-references
//! - [`SegmentHashMap`]: open-addressing string map inside one segment
//! - [`AliasResolver`]: follows alias records with cycle detection
//!
//! ```
//! use lapis_model::{InfraConfig, Infrastructure};
//!
//! let infra = Infrastructure::in_memory(InfraConfig::with_prefix("10876")).unwrap();
//! let set = infra.create_set(Some("10876/root")).unwrap();
//! let member = infra.create_object(None).unwrap();
//! assert!(set.add(&member).unwrap());
//! assert_eq!(set.len().unwrap(), 1);
//! ```

pub mod array;
pub mod config;
pub mod entity;
pub mod error;
pub mod hashmap;
pub mod infra;
pub mod linked_list;
pub mod object;
pub mod resolver;
pub mod segment;
pub mod set;

pub use array::DigitalObjectArray;
pub use config::InfraConfig;
pub use entity::{CollectionKind, Entity};
pub use error::{LapisError, LapisResult};
pub use hashmap::SegmentHashMap;
pub use infra::Infrastructure;
pub use linked_list::{DigitalObjectLinkedList, Pointer};
pub use object::DigitalObject;
pub use resolver::{AliasResolver, Resolved};
pub use segment::Segment;
pub use set::DigitalObjectSet;

// Re-export key types
pub use lapis_store::{FileRecordStore, InMemoryRecordStore, RecordStore};
pub use lapis_types::{Pid, Record, RecordValue};
