use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use lapis_types::{Pid, Record, RecordValue};

use crate::error::{StoreError, StoreResult};
use crate::traits::RecordStore;

/// In-memory, HashMap-based record store.
///
/// Intended for tests and embedding. All records are held in memory behind a
/// `RwLock`; values are cloned on read and write. Data is lost when the store
/// is dropped.
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<Pid, Record>>,
}

impl InMemoryRecordStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    fn read_lock(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<Pid, Record>>> {
        self.records
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write_lock(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<Pid, Record>>> {
        self.records
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    /// Number of identifiers currently stored.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read_lock()?.len())
    }

    /// Returns `true` if the store holds no identifiers.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn acquire(&self, pid: &Pid) -> StoreResult<Pid> {
        let mut map = self.write_lock()?;
        if map.contains_key(pid) {
            return Err(StoreError::AlreadyExists(pid.clone()));
        }
        map.insert(pid.clone(), Record::new());
        Ok(pid.clone())
    }

    fn read(&self, pid: &Pid, index: u32) -> StoreResult<Option<RecordValue>> {
        let map = self.read_lock()?;
        let record = map
            .get(pid)
            .ok_or_else(|| StoreError::NotFound(pid.clone()))?;
        Ok(record.get(&index).cloned())
    }

    fn write(&self, pid: &Pid, index: u32, value: RecordValue) -> StoreResult<()> {
        let mut map = self.write_lock()?;
        let record = map
            .get_mut(pid)
            .ok_or_else(|| StoreError::NotFound(pid.clone()))?;
        record.insert(index, value);
        Ok(())
    }

    fn remove(&self, pid: &Pid, index: u32) -> StoreResult<bool> {
        let mut map = self.write_lock()?;
        let record = map
            .get_mut(pid)
            .ok_or_else(|| StoreError::NotFound(pid.clone()))?;
        Ok(record.remove(&index).is_some())
    }

    fn read_all(&self, pid: &Pid) -> StoreResult<Record> {
        let map = self.read_lock()?;
        map.get(pid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(pid.clone()))
    }

    fn delete(&self, pid: &Pid) -> StoreResult<()> {
        let mut map = self.write_lock()?;
        map.remove(pid)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(pid.clone()))
    }

    fn exists(&self, pid: &Pid) -> StoreResult<bool> {
        Ok(self.read_lock()?.contains_key(pid))
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecordStore")
            .field("record_count", &self.len().ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> Pid {
        Pid::parse(s).unwrap()
    }

    // -----------------------------------------------------------------------
    // Acquire
    // -----------------------------------------------------------------------

    #[test]
    fn acquire_creates_empty_record() {
        let store = InMemoryRecordStore::new();
        let id = store.acquire(&pid("10876/a")).unwrap();
        assert_eq!(id, pid("10876/a"));
        assert!(store.read_all(&id).unwrap().is_empty());
    }

    #[test]
    fn acquire_twice_fails() {
        let store = InMemoryRecordStore::new();
        store.acquire(&pid("10876/a")).unwrap();
        let err = store.acquire(&pid("10876/a")).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(p) if p == pid("10876/a")));
    }

    // -----------------------------------------------------------------------
    // Index operations
    // -----------------------------------------------------------------------

    #[test]
    fn write_then_read_index() {
        let store = InMemoryRecordStore::new();
        let id = store.acquire(&pid("10876/a")).unwrap();
        store.write(&id, 1, RecordValue::new("URL", "http://x")).unwrap();
        let value = store.read(&id, 1).unwrap().expect("should exist");
        assert_eq!(value, RecordValue::new("URL", "http://x"));
    }

    #[test]
    fn write_overwrites() {
        let store = InMemoryRecordStore::new();
        let id = store.acquire(&pid("10876/a")).unwrap();
        store.write(&id, 5, RecordValue::new("A", "1")).unwrap();
        store.write(&id, 5, RecordValue::new("B", "2")).unwrap();
        assert_eq!(store.read(&id, 5).unwrap().unwrap().tag, "B");
    }

    #[test]
    fn missing_index_reads_none() {
        let store = InMemoryRecordStore::new();
        let id = store.acquire(&pid("10876/a")).unwrap();
        assert!(store.read(&id, 42).unwrap().is_none());
    }

    #[test]
    fn missing_identifier_is_an_error() {
        let store = InMemoryRecordStore::new();
        let id = pid("10876/ghost");
        assert!(matches!(store.read(&id, 1), Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.write(&id, 1, RecordValue::new("A", "b")),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(store.remove(&id, 1), Err(StoreError::NotFound(_))));
        assert!(matches!(store.read_all(&id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn remove_reports_presence() {
        let store = InMemoryRecordStore::new();
        let id = store.acquire(&pid("10876/a")).unwrap();
        store.write(&id, 7, RecordValue::new("A", "b")).unwrap();
        assert!(store.remove(&id, 7).unwrap());
        assert!(!store.remove(&id, 7).unwrap());
    }

    #[test]
    fn read_all_is_ordered_by_index() {
        let store = InMemoryRecordStore::new();
        let id = store.acquire(&pid("10876/a")).unwrap();
        store.write(&id, 2000, RecordValue::new("C", "3")).unwrap();
        store.write(&id, 1, RecordValue::new("A", "1")).unwrap();
        store.write(&id, 2, RecordValue::new("B", "2")).unwrap();
        let keys: Vec<u32> = store.read_all(&id).unwrap().keys().copied().collect();
        assert_eq!(keys, vec![1, 2, 2000]);
    }

    // -----------------------------------------------------------------------
    // Delete / Exists
    // -----------------------------------------------------------------------

    #[test]
    fn delete_removes_record() {
        let store = InMemoryRecordStore::new();
        let id = store.acquire(&pid("10876/a")).unwrap();
        assert!(store.exists(&id).unwrap());
        store.delete(&id).unwrap();
        assert!(!store.exists(&id).unwrap());
        assert!(matches!(store.delete(&id), Err(StoreError::NotFound(_))));
    }

    // -----------------------------------------------------------------------
    // Utility methods
    // -----------------------------------------------------------------------

    #[test]
    fn len_counts_identifiers() {
        let store = InMemoryRecordStore::default();
        assert!(store.is_empty().unwrap());
        store.acquire(&pid("10876/b")).unwrap();
        store.acquire(&pid("10876/a")).unwrap();
        assert_eq!(store.len().unwrap(), 2);
        store.delete(&pid("10876/a")).unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn poisoned_lock_is_reported() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryRecordStore::new());
        let poisoner = Arc::clone(&store);
        let _ = thread::spawn(move || {
            let _guard = poisoner.records.write().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(matches!(store.len(), Err(StoreError::Unavailable(_))));
        assert!(store.is_empty().is_err());
        assert!(matches!(
            store.acquire(&pid("10876/a")),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn concurrent_writes_to_distinct_indices() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryRecordStore::new());
        let id = store.acquire(&pid("10876/shared")).unwrap();

        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let store = Arc::clone(&store);
                let id = id.clone();
                thread::spawn(move || {
                    store.write(&id, 100 + i, RecordValue::new("N", i.to_string())).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(store.read_all(&id).unwrap().len(), 8);
    }

    #[test]
    fn debug_format() {
        let store = InMemoryRecordStore::new();
        store.acquire(&pid("10876/x")).unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryRecordStore"));
        assert!(debug.contains("record_count"));
    }
}
