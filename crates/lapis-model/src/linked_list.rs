//! Doubly linked list whose links live on the elements.
//!
//! The list's own record holds only its size and the head and tail
//! [`Pointer`]s. Each occurrence of an element owns one parent slot `s` in
//! the element's [`Segment::LINKED_LIST`] table; the occurrence's links are
//! stored on the element's record:
//!
//! ```text
//! segment_index(LINKED_LIST, 2*s)     LIST_PREV  "slot:pid" | ""
//! segment_index(LINKED_LIST, 2*s + 1) LIST_NEXT  "slot:pid" | ""
//! ```
//!
//! An element can therefore sit in many lists, or several times in one
//! list, without the lists sharing any index.

use std::fmt;

use lapis_types::record::tags;
use lapis_types::Pid;
use tracing::{debug, warn};

use crate::entity::{resource_types, Entity};
use crate::error::{LapisError, LapisResult};
use crate::object::DigitalObject;
use crate::resolver::AliasResolver;
use crate::segment::{field_index, parent_slot, segment_index, Field, Segment};

const SEGMENT: Segment = Segment::LINKED_LIST;
const SIZE_TAG: &str = "LIST_SIZE";
const HEAD_TAG: &str = "LIST_HEAD";
const TAIL_TAG: &str = "LIST_TAIL";
const PREV_TAG: &str = "LIST_PREV";
const NEXT_TAG: &str = "LIST_NEXT";

/// One occurrence of an element: its parent slot and identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pointer {
    pub slot: u32,
    pub pid: Pid,
}

impl Pointer {
    pub fn new(slot: u32, pid: Pid) -> Self {
        Self { slot, pid }
    }

    /// Parse the stored `slot:pid` form.
    pub fn decode(s: &str) -> Option<Self> {
        let (slot, pid) = s.split_once(':')?;
        Some(Self {
            slot: slot.parse().ok()?,
            pid: Pid::parse(pid).ok()?,
        })
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.slot, self.pid)
    }
}

#[derive(Clone, Copy, Debug)]
enum Link {
    Prev,
    Next,
}

impl Link {
    fn payload(self, slot: u32) -> u32 {
        match self {
            Self::Prev => 2 * slot,
            Self::Next => 2 * slot + 1,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Prev => PREV_TAG,
            Self::Next => NEXT_TAG,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DigitalObjectLinkedList {
    object: DigitalObject,
}

impl DigitalObjectLinkedList {
    /// Turn `object` into an empty list.
    pub fn create(object: DigitalObject) -> LapisResult<Self> {
        object.set_resource_type(resource_types::LINKED_LIST)?;
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

    fn resolver(&self) -> &AliasResolver {
        self.object.resolver()
    }

    // ---- Bookkeeping on the list record ----

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

    /// Pointer to the first occurrence.
    pub fn first(&self) -> LapisResult<Option<Pointer>> {
        read_end(&self.object, Field::Head)
    }

    /// Pointer to the last occurrence.
    pub fn last(&self) -> LapisResult<Option<Pointer>> {
        read_end(&self.object, Field::Tail)
    }

    // ---- Navigation ----

    /// The occurrence after `pointer`, read from the element's record.
    pub fn next_of(resolver: &AliasResolver, pointer: &Pointer) -> LapisResult<Option<Pointer>> {
        read_link(resolver, pointer, Link::Next)
    }

    /// The occurrence before `pointer`.
    pub fn prev_of(resolver: &AliasResolver, pointer: &Pointer) -> LapisResult<Option<Pointer>> {
        read_link(resolver, pointer, Link::Prev)
    }

    /// All occurrences from head to tail.
    ///
    /// Fails with [`LapisError::CorruptRecord`] if the chain and the stored
    /// size disagree.
    pub fn pointers(&self) -> LapisResult<Vec<Pointer>> {
        let len = self.len()?;
        let mut out = Vec::with_capacity(len as usize);
        let mut cursor = self.first()?;
        while let Some(pointer) = cursor {
            if out.len() as u32 == len {
                return Err(LapisError::corrupt(
                    self.pid(),
                    format!("chain continues past size {len} at {pointer}"),
                ));
            }
            cursor = read_link(self.resolver(), &pointer, Link::Next)?;
            out.push(pointer);
        }
        if out.len() as u32 != len {
            return Err(LapisError::corrupt(
                self.pid(),
                format!("chain has {} elements, size says {len}", out.len()),
            ));
        }
        Ok(out)
    }

    pub fn identifiers(&self) -> LapisResult<Vec<Pid>> {
        Ok(self.pointers()?.into_iter().map(|p| p.pid).collect())
    }

    /// Pointer to the occurrence at `position`, walking from the head.
    pub fn pointer_at(&self, position: u32) -> LapisResult<Pointer> {
        let len = self.len()?;
        if position >= len {
            return Err(LapisError::IndexOutOfBounds {
                index: position,
                len,
            });
        }
        let mut cursor = self.first()?;
        for _ in 0..position {
            let Some(pointer) = cursor else { break };
            cursor = read_link(self.resolver(), &pointer, Link::Next)?;
        }
        cursor.ok_or_else(|| {
            LapisError::corrupt(self.pid(), format!("chain ends before position {position}"))
        })
    }

    /// The element at `position`, or `None` if its record no longer exists.
    pub fn get(&self, position: u32) -> LapisResult<Option<Entity>> {
        let pointer = self.pointer_at(position)?;
        self.resolver().lookup(&pointer.pid)
    }

    /// Position of the first occurrence of `element`.
    pub fn index_of(&self, element: &Pid) -> LapisResult<Option<u32>> {
        Ok(self
            .pointers()?
            .iter()
            .position(|p| p.pid == *element)
            .map(|p| p as u32))
    }

    pub fn contains(&self, element: &Pid) -> LapisResult<bool> {
        Ok(self.index_of(element)?.is_some())
    }

    // ---- Mutation ----

    /// Append `element`, returning the new occurrence.
    pub fn append(&self, element: &DigitalObject) -> LapisResult<Pointer> {
        let tail = self.last()?;
        let node = self.allocate(element)?;
        self.splice(&node, tail.as_ref(), None)?;
        self.set_len(self.len()? + 1)?;
        debug!(list = %self.pid(), %node, "appended");
        Ok(node)
    }

    /// Insert `element` directly before the occurrence `target`.
    pub fn insert_before(&self, element: &DigitalObject, target: &Pointer) -> LapisResult<Pointer> {
        self.check_owns(target)?;
        let prev = read_link(self.resolver(), target, Link::Prev)?;
        let node = self.allocate(element)?;
        self.splice(&node, prev.as_ref(), Some(target))?;
        self.set_len(self.len()? + 1)?;
        debug!(list = %self.pid(), %node, before = %target, "inserted");
        Ok(node)
    }

    /// Insert `element` before the occurrence of `target` holding its lowest
    /// parent slot in this list. Returns `None` if `target` is not a member.
    pub fn insert_before_object(&self, element: &DigitalObject, target: &Pid) -> LapisResult<Option<Pointer>> {
        let owners = match self.resolver().object(target.clone()).parent_slots(SEGMENT) {
            Ok(owners) => owners,
            Err(LapisError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let Some(slot) = owners.iter().position(|owner| owner == self.pid()) else {
            return Ok(None);
        };
        self.insert_before(element, &Pointer::new(slot as u32, target.clone()))
            .map(Some)
    }

    /// Insert `element` so it ends up at `position`. `position == len`
    /// appends.
    pub fn insert_at(&self, element: &DigitalObject, position: u32) -> LapisResult<Pointer> {
        let len = self.len()?;
        if position == len {
            return self.append(element);
        }
        let target = self.pointer_at(position)?;
        self.insert_before(element, &target)
    }

    /// Remove the occurrence `pointer`.
    pub fn remove(&self, pointer: &Pointer) -> LapisResult<()> {
        self.check_owns(pointer)?;
        let prev = read_link(self.resolver(), pointer, Link::Prev)?;
        let next = read_link(self.resolver(), pointer, Link::Next)?;

        match &prev {
            Some(p) => write_link(self.resolver(), p, Link::Next, next.as_ref())?,
            None => write_end(&self.object, Field::Head, next.as_ref())?,
        }
        match &next {
            Some(n) => write_link(self.resolver(), n, Link::Prev, prev.as_ref())?,
            None => write_end(&self.object, Field::Tail, prev.as_ref())?,
        }

        let element = self.resolver().object(pointer.pid.clone());
        element.remove_value(link_index(pointer.slot, Link::Prev)?)?;
        element.remove_value(link_index(pointer.slot, Link::Next)?)?;

        // Freeing the slot shifts the element's later occurrences down one
        // slot; their links and every pointer to them follow.
        let owners = element.parent_slots(SEGMENT)?;
        element.remove_parent_slot_at(SEGMENT, pointer.slot)?;
        for slot in pointer.slot + 1..owners.len() as u32 {
            relocate(self.resolver(), &pointer.pid, &owners[slot as usize], slot, slot - 1)?;
        }

        self.set_len(self.len()?.saturating_sub(1))?;
        debug!(list = %self.pid(), %pointer, "removed");
        Ok(())
    }

    /// Remove the first occurrence of `element`. Returns `false` if absent.
    pub fn remove_object(&self, element: &Pid) -> LapisResult<bool> {
        let found = self.pointers()?.into_iter().find(|p| p.pid == *element);
        match found {
            Some(pointer) => {
                self.remove(&pointer)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove the occurrence at `position`, returning its identifier.
    pub fn remove_at(&self, position: u32) -> LapisResult<Pid> {
        let pointer = self.pointer_at(position)?;
        self.remove(&pointer)?;
        Ok(pointer.pid)
    }

    fn allocate(&self, element: &DigitalObject) -> LapisResult<Pointer> {
        let slot = element.write_parent_slot(self.pid(), SEGMENT)?;
        Ok(Pointer::new(slot, element.pid().clone()))
    }

    /// Link `node` between `prev` and `next`, updating head or tail where
    /// there is no neighbour.
    fn splice(&self, node: &Pointer, prev: Option<&Pointer>, next: Option<&Pointer>) -> LapisResult<()> {
        write_link(self.resolver(), node, Link::Prev, prev)?;
        write_link(self.resolver(), node, Link::Next, next)?;
        match prev {
            Some(p) => write_link(self.resolver(), p, Link::Next, Some(node))?,
            None => write_end(&self.object, Field::Head, Some(node))?,
        }
        match next {
            Some(n) => write_link(self.resolver(), n, Link::Prev, Some(node))?,
            None => write_end(&self.object, Field::Tail, Some(node))?,
        }
        Ok(())
    }

    fn check_owns(&self, pointer: &Pointer) -> LapisResult<()> {
        let element = self.resolver().object(pointer.pid.clone());
        let owner = element.read_value(parent_slot(SEGMENT, pointer.slot)?)?;
        match owner {
            Some(v) if v.has_tag(tags::PARENT_OBJECT) && v.data == self.pid().as_str() => Ok(()),
            _ => Err(LapisError::NotAMember {
                member: pointer.pid.clone(),
                collection: self.pid().clone(),
            }),
        }
    }
}

fn link_index(slot: u32, link: Link) -> LapisResult<u32> {
    segment_index(SEGMENT, link.payload(slot))
}

fn read_link(resolver: &AliasResolver, pointer: &Pointer, link: Link) -> LapisResult<Option<Pointer>> {
    let element = resolver.object(pointer.pid.clone());
    let value = element.read_value(link_index(pointer.slot, link)?)?.ok_or_else(|| {
        LapisError::corrupt(&pointer.pid, format!("missing {} for slot {}", link.tag(), pointer.slot))
    })?;
    decode_optional(&pointer.pid, &value.data)
}

fn write_link(
    resolver: &AliasResolver,
    pointer: &Pointer,
    link: Link,
    target: Option<&Pointer>,
) -> LapisResult<()> {
    let element = resolver.object(pointer.pid.clone());
    let data = target.map(Pointer::to_string).unwrap_or_default();
    element.write_value(link_index(pointer.slot, link)?, link.tag(), data)
}

fn end_tag(field: Field) -> &'static str {
    match field {
        Field::Head => HEAD_TAG,
        _ => TAIL_TAG,
    }
}

fn read_end(list: &DigitalObject, field: Field) -> LapisResult<Option<Pointer>> {
    match list.read_value(field_index(SEGMENT, field))? {
        None => Ok(None),
        Some(v) => decode_optional(list.pid(), &v.data),
    }
}

fn write_end(list: &DigitalObject, field: Field, target: Option<&Pointer>) -> LapisResult<()> {
    let index = field_index(SEGMENT, field);
    match target {
        Some(p) => list.write_value(index, end_tag(field), p.to_string()),
        None => list.remove_value(index).map(|_| ()),
    }
}

fn decode_optional(owner: &Pid, data: &str) -> LapisResult<Option<Pointer>> {
    if data.is_empty() {
        return Ok(None);
    }
    Pointer::decode(data)
        .map(Some)
        .ok_or_else(|| LapisError::corrupt(owner, format!("malformed list pointer {data:?}")))
}

/// Move the occurrence of `element` at slot `from` to slot `to` in the list
/// `owner`, rewriting its links and every pointer to it.
fn relocate(resolver: &AliasResolver, element: &Pid, owner: &Pid, from: u32, to: u32) -> LapisResult<()> {
    let old = Pointer::new(from, element.clone());
    let new = Pointer::new(to, element.clone());
    let prev = read_link(resolver, &old, Link::Prev)?;
    let next = read_link(resolver, &old, Link::Next)?;

    write_link(resolver, &new, Link::Prev, prev.as_ref())?;
    write_link(resolver, &new, Link::Next, next.as_ref())?;
    let handle = resolver.object(element.clone());
    handle.remove_value(link_index(from, Link::Prev)?)?;
    handle.remove_value(link_index(from, Link::Next)?)?;

    let list = resolver.object(owner.clone());
    let rewrite_end = |field: Field| match write_end(&list, field, Some(&new)) {
        Err(LapisError::NotFound(_)) => {
            warn!(%owner, %element, "owning list no longer exists");
            Ok(())
        }
        other => other,
    };
    match &prev {
        Some(p) => write_link(resolver, p, Link::Next, Some(&new))?,
        None => rewrite_end(Field::Head)?,
    }
    match &next {
        Some(n) => write_link(resolver, n, Link::Prev, Some(&new))?,
        None => rewrite_end(Field::Tail)?,
    }
    debug!(%element, %owner, from, to, "relocated list occurrence");
    Ok(())
}
