use lapis_types::Pid;
use tracing::warn;

use crate::entity::{resource_types, Entity};
use crate::error::{LapisError, LapisResult};
use crate::hashmap::SegmentHashMap;
use crate::object::DigitalObject;
use crate::segment::Segment;

/// An unordered set of digital objects.
///
/// Membership lives in a [`SegmentHashMap`] on the set's own record mapping
/// each member identifier to itself. Every member also records the set in
/// its [`Segment::HASHMAP`] parent table.
#[derive(Clone, Debug)]
pub struct DigitalObjectSet {
    map: SegmentHashMap,
}

impl DigitalObjectSet {
    /// Turn `object` into an empty set.
    pub fn create(object: DigitalObject) -> LapisResult<Self> {
        object.set_resource_type(resource_types::SET)?;
        Ok(Self::attach(object))
    }

    pub(crate) fn attach(object: DigitalObject) -> Self {
        Self {
            map: SegmentHashMap::new(object, Segment::HASHMAP),
        }
    }

    pub fn object(&self) -> &DigitalObject {
        self.map.owner()
    }

    pub fn into_object(self) -> DigitalObject {
        self.map.into_owner()
    }

    pub fn pid(&self) -> &Pid {
        self.object().pid()
    }

    /// Add `member`. Returns `false` if it already was a member.
    pub fn add(&self, member: &DigitalObject) -> LapisResult<bool> {
        let key = member.pid().as_str();
        if self.map.contains_key(key)? {
            return Ok(false);
        }
        self.map.put(key, key)?;
        member.write_parent_slot(self.pid(), Segment::HASHMAP)?;
        Ok(true)
    }

    /// Remove `member`. Returns `false` if it was not a member.
    ///
    /// A member whose record has been deleted is still removed from the set.
    pub fn remove(&self, member: &Pid) -> LapisResult<bool> {
        if self.map.remove(member.as_str())?.is_none() {
            return Ok(false);
        }
        let handle = self.object().resolver().object(member.clone());
        match handle.remove_parent_slot(self.pid(), Segment::HASHMAP) {
            Ok(_) => {}
            Err(LapisError::NotFound(_)) => {
                warn!(set = %self.pid(), %member, "removed member no longer exists");
            }
            Err(LapisError::NotAMember { .. }) => {
                warn!(set = %self.pid(), %member, "member had no back-reference to the set");
            }
            Err(e) => return Err(e),
        }
        Ok(true)
    }

    pub fn contains(&self, member: &Pid) -> LapisResult<bool> {
        self.map.contains_key(member.as_str())
    }

    /// Number of members.
    pub fn len(&self) -> LapisResult<u32> {
        self.map.len()
    }

    pub fn is_empty(&self) -> LapisResult<bool> {
        self.map.is_empty()
    }

    /// Member identifiers in bucket order.
    pub fn member_identifiers(&self) -> LapisResult<Vec<Pid>> {
        self.map
            .entries()?
            .into_iter()
            .map(|(_, value)| {
                Pid::parse(&value).map_err(|e| {
                    LapisError::corrupt(self.pid(), format!("set member {value:?}: {e}"))
                })
            })
            .collect()
    }

    /// Resolved members. Members whose record no longer exists are skipped.
    pub fn members(&self) -> LapisResult<Vec<Entity>> {
        let resolver = self.object().resolver();
        let mut out = Vec::new();
        for pid in self.member_identifiers()? {
            match resolver.lookup(&pid)? {
                Some(entity) => out.push(entity),
                None => warn!(set = %self.pid(), member = %pid, "skipping deleted member"),
            }
        }
        Ok(out)
    }
}
