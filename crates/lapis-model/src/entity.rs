//! Collection factory: typed views over resolved records.

use std::fmt;

use lapis_types::Pid;

use crate::array::DigitalObjectArray;
use crate::linked_list::DigitalObjectLinkedList;
use crate::object::DigitalObject;
use crate::set::DigitalObjectSet;

/// The resource-type tags that mark a record as a collection.
pub mod resource_types {
    pub const SET: &str = "DIGITAL_OBJECT_SET";
    pub const ARRAY: &str = "DIGITAL_OBJECT_ARRAY";
    pub const LINKED_LIST: &str = "DIGITAL_OBJECT_LINKED_LIST";
}

/// What kind of structure a record holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Plain,
    Set,
    Array,
    LinkedList,
}

impl CollectionKind {
    /// The resource-type tag written for this kind. Plain objects carry none.
    pub fn resource_type(self) -> Option<&'static str> {
        match self {
            Self::Plain => None,
            Self::Set => Some(resource_types::SET),
            Self::Array => Some(resource_types::ARRAY),
            Self::LinkedList => Some(resource_types::LINKED_LIST),
        }
    }

    /// Classify a stored resource-type tag. Unknown tags are domain types
    /// of plain objects.
    pub fn from_resource_type(tag: Option<&str>) -> Self {
        match tag {
            Some(resource_types::SET) => Self::Set,
            Some(resource_types::ARRAY) => Self::Array,
            Some(resource_types::LINKED_LIST) => Self::LinkedList,
            _ => Self::Plain,
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "object"),
            Self::Set => write!(f, "set"),
            Self::Array => write!(f, "array"),
            Self::LinkedList => write!(f, "linked list"),
        }
    }
}

/// A resolved digital object, typed by its resource-type tag.
#[derive(Clone, Debug)]
pub enum Entity {
    Plain(DigitalObject),
    Set(DigitalObjectSet),
    Array(DigitalObjectArray),
    LinkedList(DigitalObjectLinkedList),
}

impl Entity {
    pub(crate) fn from_resource_type(object: DigitalObject, tag: Option<&str>) -> Self {
        match CollectionKind::from_resource_type(tag) {
            CollectionKind::Plain => Self::Plain(object),
            CollectionKind::Set => Self::Set(DigitalObjectSet::attach(object)),
            CollectionKind::Array => Self::Array(DigitalObjectArray::attach(object)),
            CollectionKind::LinkedList => {
                Self::LinkedList(DigitalObjectLinkedList::attach(object))
            }
        }
    }

    pub fn kind(&self) -> CollectionKind {
        match self {
            Self::Plain(_) => CollectionKind::Plain,
            Self::Set(_) => CollectionKind::Set,
            Self::Array(_) => CollectionKind::Array,
            Self::LinkedList(_) => CollectionKind::LinkedList,
        }
    }

    /// The underlying digital object, whatever the kind.
    pub fn object(&self) -> &DigitalObject {
        match self {
            Self::Plain(o) => o,
            Self::Set(s) => s.object(),
            Self::Array(a) => a.object(),
            Self::LinkedList(l) => l.object(),
        }
    }

    pub fn into_object(self) -> DigitalObject {
        match self {
            Self::Plain(o) => o,
            Self::Set(s) => s.into_object(),
            Self::Array(a) => a.into_object(),
            Self::LinkedList(l) => l.into_object(),
        }
    }

    pub fn pid(&self) -> &Pid {
        self.object().pid()
    }

    pub fn as_set(&self) -> Option<&DigitalObjectSet> {
        match self {
            Self::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&DigitalObjectArray> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_linked_list(&self) -> Option<&DigitalObjectLinkedList> {
        match self {
            Self::LinkedList(l) => Some(l),
            _ => None,
        }
    }
}
