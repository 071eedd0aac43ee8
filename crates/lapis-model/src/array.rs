//! Ordered array of digital objects.
//!
//! Element `i` is stored at `segment_index(ARRAY, i)` on the array's record,
//! the element count at the array's size field. Positions `0..len` are
//! always occupied; insertion and removal shift the tail of the array.

use lapis_types::Pid;
use tracing::{debug, warn};

use crate::entity::{resource_types, Entity};
use crate::error::{LapisError, LapisResult};
use crate::object::DigitalObject;
use crate::segment::{field_index, segment_index, Field, Segment, MAX_PAYLOAD};

const SEGMENT: Segment = Segment::ARRAY;
const SIZE_TAG: &str = "ARRAY_SIZE";
const ELEMENT_TAG: &str = "ARRAY_ELEMENT";

#[derive(Clone, Debug)]
pub struct DigitalObjectArray {
    object: DigitalObject,
}

impl DigitalObjectArray {
    /// Turn `object` into an empty array.
    pub fn create(object: DigitalObject) -> LapisResult<Self> {
        object.set_resource_type(resource_types::ARRAY)?;
        object.write_counter(field_index(SEGMENT, Field::Size), SIZE_TAG, 0)?;
        Ok(Self::attach(object))
    }

    pub(crate) fn attach(object: DigitalObject) -> Self {
        Self { object }
    }

    pub fn object(&self) -> &DigitalObject {
        &self.object
    }

    pub fn into_object(self) -> DigitalObject {
        self.object
    }

    pub fn pid(&self) -> &Pid {
        self.object.pid()
    }

    /// Number of elements.
    pub fn len(&self) -> LapisResult<u32> {
        self.object.read_counter(field_index(SEGMENT, Field::Size))
    }

    pub fn is_empty(&self) -> LapisResult<bool> {
        Ok(self.len()? == 0)
    }

    fn set_len(&self, len: u32) -> LapisResult<()> {
        self.object
            .write_counter(field_index(SEGMENT, Field::Size), SIZE_TAG, len)
    }

    fn check_capacity(&self, len: u32) -> LapisResult<()> {
        if len > MAX_PAYLOAD {
            return Err(LapisError::capacity(
                format!("array {}", self.pid()),
                u64::from(MAX_PAYLOAD) + 1,
            ));
        }
        Ok(())
    }

    fn write_element(&self, position: u32, pid: &Pid) -> LapisResult<()> {
        self.object
            .write_value(segment_index(SEGMENT, position)?, ELEMENT_TAG, pid.as_str())
    }

    /// Append `element`, returning its position.
    pub fn append(&self, element: &DigitalObject) -> LapisResult<u32> {
        let len = self.len()?;
        self.check_capacity(len)?;
        self.write_element(len, element.pid())?;
        element.write_parent_slot(self.pid(), SEGMENT)?;
        self.set_len(len + 1)?;
        debug!(array = %self.pid(), element = %element.pid(), position = len, "appended");
        Ok(len)
    }

    /// Insert `element` at `position`, shifting later elements up.
    ///
    /// `position == len` appends.
    pub fn insert(&self, element: &DigitalObject, position: u32) -> LapisResult<()> {
        let len = self.len()?;
        if position > len {
            return Err(LapisError::IndexOutOfBounds {
                index: position,
                len,
            });
        }
        self.check_capacity(len)?;
        for from in (position..len).rev() {
            let pid = self.identifier_at_unchecked(from)?;
            self.write_element(from + 1, &pid)?;
        }
        self.write_element(position, element.pid())?;
        element.write_parent_slot(self.pid(), SEGMENT)?;
        self.set_len(len + 1)?;
        debug!(array = %self.pid(), element = %element.pid(), position, "inserted");
        Ok(())
    }

    /// Remove the element at `position`, shifting later elements down.
    /// Returns the removed identifier.
    pub fn remove_at(&self, position: u32) -> LapisResult<Pid> {
        let len = self.len()?;
        if position >= len {
            return Err(LapisError::IndexOutOfBounds {
                index: position,
                len,
            });
        }
        let removed = self.identifier_at_unchecked(position)?;
        for from in position + 1..len {
            let pid = self.identifier_at_unchecked(from)?;
            self.write_element(from - 1, &pid)?;
        }
        self.object.remove_value(segment_index(SEGMENT, len - 1)?)?;
        self.set_len(len - 1)?;

        let element = self.object.resolver().object(removed.clone());
        match element.remove_parent_slot(self.pid(), SEGMENT) {
            Ok(_) => {}
            Err(LapisError::NotFound(_)) => {
                warn!(array = %self.pid(), element = %removed, "removed element no longer exists");
            }
            Err(LapisError::NotAMember { .. }) => {
                warn!(array = %self.pid(), element = %removed, "element had no back-reference to the array");
            }
            Err(e) => return Err(e),
        }
        debug!(array = %self.pid(), element = %removed, position, "removed");
        Ok(removed)
    }

    /// Remove the first occurrence of `element`. Returns `false` if absent.
    pub fn remove(&self, element: &Pid) -> LapisResult<bool> {
        match self.index_of(element)? {
            Some(position) => {
                self.remove_at(position)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Identifier stored at `position`.
    pub fn identifier_at(&self, position: u32) -> LapisResult<Pid> {
        let len = self.len()?;
        if position >= len {
            return Err(LapisError::IndexOutOfBounds {
                index: position,
                len,
            });
        }
        self.identifier_at_unchecked(position)
    }

    fn identifier_at_unchecked(&self, position: u32) -> LapisResult<Pid> {
        let value = self
            .object
            .read_value(segment_index(SEGMENT, position)?)?
            .ok_or_else(|| {
                LapisError::corrupt(self.pid(), format!("array slot {position} is empty"))
            })?;
        Pid::parse(&value.data).map_err(|e| {
            LapisError::corrupt(self.pid(), format!("array slot {position}: {e}"))
        })
    }

    /// The element at `position`, or `None` if its record no longer exists.
    pub fn get(&self, position: u32) -> LapisResult<Option<Entity>> {
        let pid = self.identifier_at(position)?;
        self.object.resolver().lookup(&pid)
    }

    /// All element identifiers in order.
    pub fn identifiers(&self) -> LapisResult<Vec<Pid>> {
        let len = self.len()?;
        let record = self.object.record()?;
        (0..len)
            .map(|position| {
                let value = record.get(&segment_index(SEGMENT, position)?).ok_or_else(|| {
                    LapisError::corrupt(self.pid(), format!("array slot {position} is empty"))
                })?;
                Pid::parse(&value.data).map_err(|e| {
                    LapisError::corrupt(self.pid(), format!("array slot {position}: {e}"))
                })
            })
            .collect()
    }

    /// Lowest position holding `element`.
    pub fn index_of(&self, element: &Pid) -> LapisResult<Option<u32>> {
        Ok(self
            .identifiers()?
            .iter()
            .position(|p| p == element)
            .map(|p| p as u32))
    }

    pub fn contains(&self, element: &Pid) -> LapisResult<bool> {
        Ok(self.index_of(element)?.is_some())
    }
}
