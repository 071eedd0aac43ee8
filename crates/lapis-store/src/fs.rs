//! File-backed record store.
//!
//! Each identifier is one JSON document `<root>/<hex blake3 of pid>.json`
//! holding the identifier and its record. Hashed names have a fixed length
//! whatever the suffix contains; the identifier itself is read back from the
//! document.
//! Every mutation rewrites the whole document through a temporary file in
//! the same directory followed by a rename, so a crash leaves either the old
//! or the new record on disk.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use lapis_types::{Pid, Record, RecordValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::RecordStore;

const RECORD_EXTENSION: &str = "json";

/// On-disk form of one record.
#[derive(Serialize, Deserialize)]
struct Document {
    pid: Pid,
    record: Record,
}

/// A [`RecordStore`] keeping one JSON file per identifier under a directory.
pub struct FileRecordStore {
    root: PathBuf,
    // Serialises read-modify-write cycles within this process.
    guard: Mutex<()>,
}

impl FileRecordStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened file record store");
        Ok(Self {
            root,
            guard: Mutex::new(()),
        })
    }

    /// The directory this store writes to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All identifiers with a record on disk, sorted.
    pub fn all_ids(&self) -> StoreResult<Vec<Pid>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().map(|e| e != RECORD_EXTENSION).unwrap_or(true) {
                continue;
            }
            match read_document(&path) {
                Ok(doc) => ids.push(doc.pid),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable file"),
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn path_for(&self, pid: &Pid) -> PathBuf {
        let name = hex::encode(blake3::hash(pid.as_str().as_bytes()).as_bytes());
        self.root.join(format!("{name}.{RECORD_EXTENSION}"))
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, ()>> {
        self.guard
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn load(&self, pid: &Pid) -> StoreResult<Record> {
        let path = self.path_for(pid);
        match read_document(&path) {
            Ok(doc) if doc.pid == *pid => Ok(doc.record),
            Ok(doc) => Err(StoreError::Serialization(format!(
                "{}: holds {} instead of {pid}",
                path.display(),
                doc.pid
            ))),
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(pid.clone()))
            }
            Err(e) => Err(e),
        }
    }

    fn save(&self, pid: &Pid, record: &Record) -> StoreResult<()> {
        let doc = Document {
            pid: pid.clone(),
            record: record.clone(),
        };
        let json = serde_json::to_vec_pretty(&doc)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(pid)).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn modify<T>(&self, pid: &Pid, f: impl FnOnce(&mut Record) -> T) -> StoreResult<T> {
        let _guard = self.lock()?;
        let mut record = self.load(pid)?;
        let out = f(&mut record);
        self.save(pid, &record)?;
        Ok(out)
    }
}

impl RecordStore for FileRecordStore {
    fn acquire(&self, pid: &Pid) -> StoreResult<Pid> {
        let _guard = self.lock()?;
        if self.path_for(pid).exists() {
            return Err(StoreError::AlreadyExists(pid.clone()));
        }
        self.save(pid, &Record::new())?;
        debug!(%pid, "acquired identifier");
        Ok(pid.clone())
    }

    fn read(&self, pid: &Pid, index: u32) -> StoreResult<Option<RecordValue>> {
        Ok(self.load(pid)?.remove(&index))
    }

    fn write(&self, pid: &Pid, index: u32, value: RecordValue) -> StoreResult<()> {
        self.modify(pid, |record| {
            record.insert(index, value);
        })
    }

    fn remove(&self, pid: &Pid, index: u32) -> StoreResult<bool> {
        let _guard = self.lock()?;
        let mut record = self.load(pid)?;
        if record.remove(&index).is_none() {
            return Ok(false);
        }
        self.save(pid, &record)?;
        Ok(true)
    }

    fn read_all(&self, pid: &Pid) -> StoreResult<Record> {
        self.load(pid)
    }

    fn delete(&self, pid: &Pid) -> StoreResult<()> {
        let _guard = self.lock()?;
        match fs::remove_file(self.path_for(pid)) {
            Ok(()) => {
                debug!(%pid, "deleted record");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(pid.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, pid: &Pid) -> StoreResult<bool> {
        Ok(self.path_for(pid).is_file())
    }
}

impl std::fmt::Debug for FileRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRecordStore")
            .field("root", &self.root)
            .finish()
    }
}

fn read_document(path: &Path) -> StoreResult<Document> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))
}
