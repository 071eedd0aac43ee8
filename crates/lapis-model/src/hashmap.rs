//! Open-addressing hash map inside one segment of one record.
//!
//! Buckets are record entries at `segment_index(segment, slot)` whose tag is
//! the key and whose value is the mapped value. Collisions are resolved by
//! linear probing that wraps at the end of the table back to slot 0 of the
//! same segment. Removal uses backward-shift deletion, so a probe may always
//! stop at the first empty bucket.

use lapis_types::Record;
use tracing::debug;

use crate::error::{LapisError, LapisResult};
use crate::object::DigitalObject;
use crate::segment::{field_index, segment_index, Field, Segment, MAX_PAYLOAD};

/// Full table size: every payload of a segment.
pub const DEFAULT_TABLE_SIZE: u32 = MAX_PAYLOAD + 1;

const SIZE_TAG: &str = "HASHMAP_SIZE";

/// A string-to-string hash map stored in `segment` of the owner's record.
#[derive(Clone, Debug)]
pub struct SegmentHashMap {
    owner: DigitalObject,
    segment: Segment,
    table_size: u32,
}

impl SegmentHashMap {
    pub fn new(owner: DigitalObject, segment: Segment) -> Self {
        Self {
            owner,
            segment,
            table_size: DEFAULT_TABLE_SIZE,
        }
    }

    /// A map using only the first `table_size` payloads of the segment.
    ///
    /// The table size is part of the layout: every handle on the same map
    /// must use the same value.
    pub fn with_table_size(
        owner: DigitalObject,
        segment: Segment,
        table_size: u32,
    ) -> LapisResult<Self> {
        if table_size == 0 || table_size > DEFAULT_TABLE_SIZE {
            return Err(LapisError::capacity(
                format!("hash table size {table_size}"),
                u64::from(DEFAULT_TABLE_SIZE),
            ));
        }
        Ok(Self {
            owner,
            segment,
            table_size,
        })
    }

    /// The object whose record holds the table.
    pub fn owner(&self) -> &DigitalObject {
        &self.owner
    }

    pub fn into_owner(self) -> DigitalObject {
        self.owner
    }

    pub fn segment(&self) -> Segment {
        self.segment
    }

    pub fn table_size(&self) -> u32 {
        self.table_size
    }

    /// Home slot of `key`.
    pub fn slot_of(&self, key: &str) -> u32 {
        let digest = blake3::hash(key.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        (u64::from_le_bytes(head) % u64::from(self.table_size)) as u32
    }

    fn next_slot(&self, slot: u32) -> u32 {
        if slot + 1 == self.table_size {
            0
        } else {
            slot + 1
        }
    }

    fn bucket_index(&self, slot: u32) -> LapisResult<u32> {
        segment_index(self.segment, slot)
    }

    /// Probe for `key`. Returns the slot holding it, or the first empty
    /// slot on its probe path.
    fn probe(&self, key: &str) -> LapisResult<Probe> {
        let mut slot = self.slot_of(key);
        for _ in 0..self.table_size {
            match self.owner.read_value(self.bucket_index(slot)?)? {
                None => return Ok(Probe::Vacant(slot)),
                Some(bucket) if bucket.has_tag(key) => {
                    return Ok(Probe::Occupied(slot, bucket.data));
                }
                Some(_) => slot = self.next_slot(slot),
            }
        }
        Ok(Probe::Full)
    }

    /// Insert or overwrite `key`. Returns the previous value.
    pub fn put(&self, key: &str, value: &str) -> LapisResult<Option<String>> {
        match self.probe(key)? {
            Probe::Occupied(slot, old) => {
                self.owner.write_value(self.bucket_index(slot)?, key, value)?;
                Ok(Some(old))
            }
            Probe::Vacant(slot) => {
                self.owner.write_value(self.bucket_index(slot)?, key, value)?;
                let len = self.len()?;
                self.write_len(len + 1)?;
                debug!(owner = %self.owner.pid(), segment = %self.segment, slot, "inserted hash map entry");
                Ok(None)
            }
            Probe::Full => Err(LapisError::capacity(
                format!("hash map in {} of {}", self.segment, self.owner.pid()),
                u64::from(self.table_size),
            )),
        }
    }

    pub fn get(&self, key: &str) -> LapisResult<Option<String>> {
        match self.probe(key)? {
            Probe::Occupied(_, value) => Ok(Some(value)),
            Probe::Vacant(_) | Probe::Full => Ok(None),
        }
    }

    pub fn contains_key(&self, key: &str) -> LapisResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Remove `key`, returning its value. Absent keys yield `Ok(None)`.
    pub fn remove(&self, key: &str) -> LapisResult<Option<String>> {
        let (found, value) = match self.probe(key)? {
            Probe::Occupied(slot, value) => (slot, value),
            Probe::Vacant(_) | Probe::Full => return Ok(None),
        };

        // Pull later entries of the cluster back into the hole unless that
        // would move them in front of their home slot.
        let mut hole = found;
        let mut cursor = found;
        for _ in 1..self.table_size {
            cursor = self.next_slot(cursor);
            let Some(bucket) = self.owner.read_value(self.bucket_index(cursor)?)? else {
                break;
            };
            let home = self.slot_of(&bucket.tag);
            if cyclic_between(hole, home, cursor) {
                continue;
            }
            self.owner
                .write_value(self.bucket_index(hole)?, &bucket.tag, bucket.data)?;
            debug!(owner = %self.owner.pid(), from = cursor, to = hole, "shifted hash map entry back");
            hole = cursor;
        }
        self.owner.remove_value(self.bucket_index(hole)?)?;

        let len = self.len()?;
        self.write_len(len.saturating_sub(1))?;
        Ok(Some(value))
    }

    /// Number of entries.
    pub fn len(&self) -> LapisResult<u32> {
        self.owner.read_counter(field_index(self.segment, Field::Size))
    }

    pub fn is_empty(&self) -> LapisResult<bool> {
        Ok(self.len()? == 0)
    }

    /// All `(key, value)` pairs in slot order.
    pub fn entries(&self) -> LapisResult<Vec<(String, String)>> {
        let record: Record = self.owner.record()?;
        let first = self.bucket_index(0)?;
        let last = self.bucket_index(self.table_size - 1)?;
        Ok(record
            .range(first..=last)
            .map(|(_, v)| (v.tag.clone(), v.data.clone()))
            .collect())
    }

    fn write_len(&self, len: u32) -> LapisResult<()> {
        self.owner
            .write_counter(field_index(self.segment, Field::Size), SIZE_TAG, len)
    }
}

enum Probe {
    Occupied(u32, String),
    Vacant(u32),
    Full,
}

/// Whether `x` lies in the cyclic half-open interval `(from, to]`.
fn cyclic_between(from: u32, x: u32, to: u32) -> bool {
    if from <= to {
        from < x && x <= to
    } else {
        from < x || x <= to
    }
}
