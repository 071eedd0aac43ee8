use lapis_types::{Pid, Record, RecordValue};

use crate::error::{StoreError, StoreResult};

/// Single-index record registry.
///
/// All implementations must satisfy these invariants:
/// - Each call is atomic on its own; nothing is atomic across calls.
/// - Reads and writes of an index on a missing identifier fail with
///   [`StoreError::NotFound`]; a missing index on an existing identifier
///   reads as `None`.
/// - Identifiers are never reused after [`delete`](RecordStore::delete)
///   within one design; stores need not guard against it.
pub trait RecordStore: Send + Sync {
    /// Reserve a fresh, empty record for `pid`.
    ///
    /// Returns the identifier actually acquired (a registry may normalise
    /// it). Fails with [`StoreError::AlreadyExists`] if it is taken.
    fn acquire(&self, pid: &Pid) -> StoreResult<Pid>;

    /// Read the entry at `index`.
    fn read(&self, pid: &Pid, index: u32) -> StoreResult<Option<RecordValue>>;

    /// Write (create or overwrite) the entry at `index`.
    fn write(&self, pid: &Pid, index: u32, value: RecordValue) -> StoreResult<()>;

    /// Remove the entry at `index`. Returns `true` if it existed.
    fn remove(&self, pid: &Pid, index: u32) -> StoreResult<bool>;

    /// Read the full record.
    fn read_all(&self, pid: &Pid) -> StoreResult<Record>;

    /// Delete the whole record. This cannot be undone.
    fn delete(&self, pid: &Pid) -> StoreResult<()>;

    /// Check whether a record exists for `pid`.
    ///
    /// Default implementation reads the full record. Backends may override
    /// for a cheaper existence check.
    fn exists(&self, pid: &Pid) -> StoreResult<bool> {
        match self.read_all(pid) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
