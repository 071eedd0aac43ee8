//! The digital object: one identifier and the structures stored in its record.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use lapis_store::RecordStore;
use lapis_types::record::{
    tags, INDEX_RESOURCE_LOCATION, INDEX_RESOURCE_TYPE, REFERENCE_INDEX_END,
    REFERENCE_INDEX_START,
};
use lapis_types::{Pid, Record, RecordValue};
use tracing::{debug, warn};

use crate::entity::Entity;
use crate::error::{LapisError, LapisResult};
use crate::resolver::AliasResolver;
use crate::segment::{parent_slot, parent_slot_base, Segment, MAX_PARENTS};

/// A handle on one identifier.
///
/// The handle holds no record state; every accessor reads the store and
/// every mutator writes it immediately. Two handles are equal when they name
/// the same identifier.
#[derive(Clone)]
pub struct DigitalObject {
    pid: Pid,
    resolver: AliasResolver,
    alias_chain: Vec<Pid>,
}

impl DigitalObject {
    pub(crate) fn new(pid: Pid, resolver: AliasResolver, alias_chain: Vec<Pid>) -> Self {
        Self {
            pid,
            resolver,
            alias_chain,
        }
    }

    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    pub fn resolver(&self) -> &AliasResolver {
        &self.resolver
    }

    /// Alias identifiers this object was reached through, in the order they
    /// were followed. Empty when looked up directly.
    pub fn alias_identifiers(&self) -> &[Pid] {
        &self.alias_chain
    }

    /// The full record as currently stored.
    pub fn record(&self) -> LapisResult<Record> {
        Ok(self.store().read_all(&self.pid)?)
    }

    // ---- Record access shared with the collection engines ----

    pub(crate) fn store(&self) -> &Arc<dyn RecordStore> {
        self.resolver.store()
    }

    pub(crate) fn read_value(&self, index: u32) -> LapisResult<Option<RecordValue>> {
        Ok(self.store().read(&self.pid, index)?)
    }

    pub(crate) fn write_value(
        &self,
        index: u32,
        tag: &str,
        data: impl Into<String>,
    ) -> LapisResult<()> {
        Ok(self
            .store()
            .write(&self.pid, index, RecordValue::new(tag, data))?)
    }

    pub(crate) fn remove_value(&self, index: u32) -> LapisResult<bool> {
        Ok(self.store().remove(&self.pid, index)?)
    }

    /// Read an unsigned counter; a missing entry counts as zero.
    pub(crate) fn read_counter(&self, index: u32) -> LapisResult<u32> {
        match self.read_value(index)? {
            None => Ok(0),
            Some(v) => v.data.parse().map_err(|_| {
                LapisError::corrupt(
                    &self.pid,
                    format!("counter at index {index} is not a number: {:?}", v.data),
                )
            }),
        }
    }

    pub(crate) fn write_counter(&self, index: u32, tag: &str, value: u32) -> LapisResult<()> {
        self.write_value(index, tag, value.to_string())
    }

    // ---- Scalars ----

    pub fn resource_location(&self) -> LapisResult<Option<String>> {
        Ok(self.read_value(INDEX_RESOURCE_LOCATION)?.map(|v| v.data))
    }

    pub fn set_resource_location(&self, location: &str) -> LapisResult<()> {
        self.write_value(INDEX_RESOURCE_LOCATION, tags::URL, location)
    }

    pub fn resource_type(&self) -> LapisResult<Option<String>> {
        Ok(self.read_value(INDEX_RESOURCE_TYPE)?.map(|v| v.data))
    }

    pub fn set_resource_type(&self, resource_type: &str) -> LapisResult<()> {
        self.write_value(INDEX_RESOURCE_TYPE, tags::RESOURCE_TYPE, resource_type)
    }

    // ---- References ----
    //
    // Each semantics key owns one index in the reference range. The entry's
    // tag is the key and its value a JSON list of target identifiers.

    /// Append `target` to the references stored under `semantics`.
    ///
    /// The target must resolve; aliases are stored as the identifier they
    /// resolve to.
    pub fn add_reference(&self, semantics: &str, target: &Pid) -> LapisResult<()> {
        let resolved = self
            .resolver
            .resolve(target)?
            .ok_or_else(|| LapisError::NotFound(target.clone()))?;

        let record = self.record()?;
        let (index, mut targets) = match self.reference_slot(&record, semantics)? {
            Some(index) => (index, self.decode_references(&record[&index])?),
            None => (free_reference_index(&record, &self.pid)?, Vec::new()),
        };
        targets.push(resolved.pid);
        debug!(pid = %self.pid, semantics, index, count = targets.len(), "wrote reference");
        self.write_references(index, semantics, &targets)
    }

    /// Remove the first occurrence of `target` under `semantics`.
    ///
    /// Returns `false` if the key or the target is not present. The key's
    /// index is freed once its list becomes empty.
    pub fn remove_reference(&self, semantics: &str, target: &Pid) -> LapisResult<bool> {
        let record = self.record()?;
        let Some(index) = self.reference_slot(&record, semantics)? else {
            return Ok(false);
        };
        let mut targets = self.decode_references(&record[&index])?;

        let position = match targets.iter().position(|t| t == target) {
            Some(p) => Some(p),
            // The caller may hold an alias of the stored identifier.
            None => match self.resolver.resolve(target) {
                Ok(Some(resolved)) => targets.iter().position(|t| *t == resolved.pid),
                Ok(None) | Err(_) => None,
            },
        };
        let Some(position) = position else {
            return Ok(false);
        };

        targets.remove(position);
        if targets.is_empty() {
            self.remove_value(index)?;
        } else {
            self.write_references(index, semantics, &targets)?;
        }
        Ok(true)
    }

    /// Remove every reference stored under `semantics`.
    pub fn remove_references(&self, semantics: &str) -> LapisResult<bool> {
        let record = self.record()?;
        match self.reference_slot(&record, semantics)? {
            Some(index) => self.remove_value(index),
            None => Ok(false),
        }
    }

    /// The stored target identifiers for `semantics`, in insertion order.
    pub fn reference_identifiers(&self, semantics: &str) -> LapisResult<Vec<Pid>> {
        let record = self.record()?;
        match self.reference_slot(&record, semantics)? {
            Some(index) => self.decode_references(&record[&index]),
            None => Ok(Vec::new()),
        }
    }

    /// The referenced objects for `semantics`. Targets that no longer exist
    /// are skipped.
    pub fn references(&self, semantics: &str) -> LapisResult<Vec<Entity>> {
        let mut out = Vec::new();
        for target in self.reference_identifiers(semantics)? {
            match self.resolver.lookup(&target)? {
                Some(entity) => out.push(entity),
                None => warn!(pid = %self.pid, %target, semantics, "skipping dangling reference"),
            }
        }
        Ok(out)
    }

    /// All reference keys, in index order.
    pub fn reference_keys(&self) -> LapisResult<Vec<String>> {
        Ok(self
            .record()?
            .range(REFERENCE_INDEX_START..=REFERENCE_INDEX_END)
            .map(|(_, v)| v.tag.clone())
            .collect())
    }

    fn reference_slot(&self, record: &Record, semantics: &str) -> LapisResult<Option<u32>> {
        let mut matches = record
            .range(REFERENCE_INDEX_START..=REFERENCE_INDEX_END)
            .filter(|(_, v)| v.has_tag(semantics))
            .map(|(index, _)| *index);
        let first = matches.next();
        if let Some(second) = matches.next() {
            return Err(LapisError::corrupt(
                &self.pid,
                format!(
                    "reference key {semantics:?} stored at both index {} and {second}",
                    first.unwrap_or_default()
                ),
            ));
        }
        Ok(first)
    }

    fn decode_references(&self, value: &RecordValue) -> LapisResult<Vec<Pid>> {
        serde_json::from_str(&value.data).map_err(|e| {
            LapisError::corrupt(
                &self.pid,
                format!("reference list {:?} does not decode: {e}", value.tag),
            )
        })
    }

    fn write_references(&self, index: u32, semantics: &str, targets: &[Pid]) -> LapisResult<()> {
        let json = serde_json::to_string(targets)
            .map_err(|e| LapisError::Internal(format!("encoding reference list: {e}")))?;
        self.write_value(index, semantics, json)
    }

    // ---- Properties ----

    /// Write a named property at `index`.
    ///
    /// An occupied index may only be overwritten by a property of the same
    /// name; otherwise nothing is written.
    pub fn set_property(&self, index: u32, name: &str, value: &str) -> LapisResult<()> {
        if let Some(existing) = self.read_value(index)? {
            if !existing.has_tag(name) {
                return Err(LapisError::PropertyNameMismatch {
                    pid: self.pid.clone(),
                    index,
                    existing: existing.tag,
                    attempted: name.to_string(),
                });
            }
        }
        self.write_value(index, name, value)
    }

    /// The `(name, value)` stored at `index`.
    pub fn property(&self, index: u32) -> LapisResult<Option<RecordValue>> {
        self.read_value(index)
    }

    pub fn is_property_set(&self, index: u32) -> LapisResult<bool> {
        Ok(self.read_value(index)?.is_some())
    }

    // ---- Parent back-references ----
    //
    // Slots `0..n` of a segment's table are always occupied contiguously, so
    // the first empty slot marks the end of the table.

    /// Record `parent` in the first free slot of `segment`'s table.
    pub fn write_parent_slot(&self, parent: &Pid, segment: Segment) -> LapisResult<u32> {
        let slot = self.parent_slots(segment)?.len() as u32;
        let index = parent_slot(segment, slot)?;
        self.write_value(index, tags::PARENT_OBJECT, parent.as_str())?;
        debug!(pid = %self.pid, %parent, %segment, slot, "wrote parent slot");
        Ok(slot)
    }

    /// Remove the first slot naming `parent` and compact the table.
    ///
    /// Fails with [`LapisError::NotAMember`] if `parent` is not recorded.
    pub fn remove_parent_slot(&self, parent: &Pid, segment: Segment) -> LapisResult<u32> {
        let slots = self.parent_slots(segment)?;
        let slot = slots
            .iter()
            .position(|p| p == parent)
            .ok_or_else(|| LapisError::NotAMember {
                member: self.pid.clone(),
                collection: parent.clone(),
            })?;
        self.compact_parent_slots(segment, &slots, slot as u32)?;
        Ok(slot as u32)
    }

    /// Remove slot `slot` and shift every higher slot down by one.
    pub(crate) fn remove_parent_slot_at(&self, segment: Segment, slot: u32) -> LapisResult<()> {
        let slots = self.parent_slots(segment)?;
        self.compact_parent_slots(segment, &slots, slot)
    }

    fn compact_parent_slots(&self, segment: Segment, slots: &[Pid], slot: u32) -> LapisResult<()> {
        let len = slots.len() as u32;
        if slot >= len {
            return Err(LapisError::IndexOutOfBounds { index: slot, len });
        }
        for higher in slot + 1..len {
            let parent = &slots[higher as usize];
            self.write_value(parent_slot(segment, higher - 1)?, tags::PARENT_OBJECT, parent.as_str())?;
        }
        self.remove_value(parent_slot(segment, len - 1)?)?;
        debug!(pid = %self.pid, %segment, slot, remaining = len - 1, "removed parent slot");
        Ok(())
    }

    /// The parent table for `segment`; position in the vector is the slot.
    pub fn parent_slots(&self, segment: Segment) -> LapisResult<Vec<Pid>> {
        let record = self.record()?;
        let base = parent_slot_base(segment);
        let mut parents = Vec::new();
        for slot in 0..MAX_PARENTS {
            let Some(value) = record.get(&(base + slot)) else {
                break;
            };
            let parent = Pid::parse(&value.data).map_err(|e| {
                LapisError::corrupt(&self.pid, format!("parent slot {slot} of {segment}: {e}"))
            })?;
            parents.push(parent);
        }
        Ok(parents)
    }

    /// Distinct parents of the collection kind stored on `segment`.
    pub fn parent_identifiers(&self, segment: Segment) -> LapisResult<BTreeSet<Pid>> {
        Ok(self.parent_slots(segment)?.into_iter().collect())
    }
}

fn free_reference_index(record: &Record, pid: &Pid) -> LapisResult<u32> {
    (REFERENCE_INDEX_START..=REFERENCE_INDEX_END)
        .find(|index| !record.contains_key(index))
        .ok_or_else(|| {
            debug!(%pid, "reference range exhausted");
            LapisError::capacity(
                format!("reference keys of {pid}"),
                u64::from(REFERENCE_INDEX_END - REFERENCE_INDEX_START + 1),
            )
        })
}

impl PartialEq for DigitalObject {
    fn eq(&self, other: &Self) -> bool {
        self.pid == other.pid
    }
}

impl Eq for DigitalObject {}

impl fmt::Debug for DigitalObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigitalObject")
            .field("pid", &self.pid)
            .field("alias_chain", &self.alias_chain)
            .finish()
    }
}

impl fmt::Display for DigitalObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.pid, f)
    }
}
