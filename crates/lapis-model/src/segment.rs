//! Address segmentation of the flat record index space.
//!
//! ```text
//!  31      24 23                                 0
//! +----------+------------------------------------+
//! | segment  |             payload                |   collection data
//! +----------+------------------------------------+
//!
//!  index = (1 << 24) | (segment << 17) | slot           parent back-references
//!  index = (1 << 24) | (segment << 8)  | field          bookkeeping fields
//! ```
//!
//! Indices below `1 << 24` form the base space holding scalars, reference
//! lists and properties. Segment numbers are per collection kind, so one
//! record can host an array, a hash map and the link slots of several lists
//! at once without overlap. Parent back-reference tables and bookkeeping
//! fields both live just above the base space, in the range segment 1 would
//! otherwise cover; collections therefore use segments `2..=127` only.

use std::fmt;

use crate::error::{LapisError, LapisResult};

/// Number of low-order bits available for the payload.
pub const PAYLOAD_BITS: u32 = 24;
/// Highest payload value a segment can address.
pub const MAX_PAYLOAD: u32 = (1 << PAYLOAD_BITS) - 1;
/// Bits available for parent slot numbers within one segment's table.
pub const PARENT_SLOT_BITS: u32 = 17;
/// Number of parent slots per (child, segment).
pub const MAX_PARENTS: u32 = (1 << PARENT_SLOT_BITS) - 1;

const HIGH_SPACE: u32 = 1 << PAYLOAD_BITS;
const FIELD_BITS: u32 = 8;
const MAX_COLLECTION_SEGMENT: u8 = 127;

/// A segment number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Segment(u8);

impl Segment {
    /// The base scalar/property space.
    pub const BASE: Segment = Segment(1);
    /// Array elements.
    pub const ARRAY: Segment = Segment(2);
    /// Hash map and set buckets.
    pub const HASHMAP: Segment = Segment(3);
    /// Linked list per-element link slots.
    pub const LINKED_LIST: Segment = Segment(4);

    /// A collection segment. Must be within `2..=127`.
    pub fn new(number: u32) -> LapisResult<Self> {
        match u8::try_from(number) {
            Ok(n) if (2..=MAX_COLLECTION_SEGMENT).contains(&n) => Ok(Self(n)),
            _ => Err(LapisError::InvalidSegment(number)),
        }
    }

    pub fn number(self) -> u32 {
        u32::from(self.0)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment {}", self.0)
    }
}

/// Absolute index of `payload` within `segment`.
///
/// Fails with [`LapisError::CapacityExceeded`] rather than spilling into
/// the next segment.
pub fn segment_index(segment: Segment, payload: u32) -> LapisResult<u32> {
    if payload > MAX_PAYLOAD {
        return Err(LapisError::capacity(
            format!("payload {payload} in {segment}"),
            u64::from(MAX_PAYLOAD),
        ));
    }
    Ok((segment.number() << PAYLOAD_BITS) | payload)
}

/// Returns `true` if `index` lies within `segment`'s payload range.
pub fn is_in_segment(index: u32, segment: Segment) -> bool {
    index >> PAYLOAD_BITS == segment.number()
}

/// The payload bits of `index`.
pub fn payload_of(index: u32) -> u32 {
    index & MAX_PAYLOAD
}

/// First index of the parent back-reference table for `segment`.
pub fn parent_slot_base(segment: Segment) -> u32 {
    (segment.number() << PARENT_SLOT_BITS) | HIGH_SPACE
}

/// Absolute index of parent slot `slot` for `segment`.
pub fn parent_slot(segment: Segment, slot: u32) -> LapisResult<u32> {
    if slot >= MAX_PARENTS {
        return Err(LapisError::capacity(
            format!("parent slots for {segment}"),
            u64::from(MAX_PARENTS),
        ));
    }
    Ok(parent_slot_base(segment) + slot)
}

/// Bookkeeping fields a collection keeps on its own record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Size = 0,
    Head = 1,
    Tail = 2,
}

/// Absolute index of `field` for a collection on `segment`.
pub fn field_index(segment: Segment, field: Field) -> u32 {
    HIGH_SPACE | (segment.number() << FIELD_BITS) | field as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapis_types::record::{ANNOTATION_INDEX_START, REFERENCE_INDEX_END};

    fn collection_segments() -> impl Iterator<Item = Segment> {
        (2..=127).map(|n| Segment::new(n).unwrap())
    }

    #[test]
    fn segment_number_range() {
        assert!(Segment::new(2).is_ok());
        assert!(Segment::new(127).is_ok());
        assert!(matches!(Segment::new(0), Err(LapisError::InvalidSegment(0))));
        assert!(matches!(Segment::new(1), Err(LapisError::InvalidSegment(1))));
        assert!(matches!(Segment::new(128), Err(LapisError::InvalidSegment(128))));
        assert!(matches!(Segment::new(1000), Err(LapisError::InvalidSegment(1000))));
    }

    #[test]
    fn segment_index_layout() {
        assert_eq!(segment_index(Segment::ARRAY, 0).unwrap(), 2 << 24);
        assert_eq!(segment_index(Segment::HASHMAP, 5).unwrap(), (3 << 24) | 5);
        assert_eq!(
            segment_index(Segment::ARRAY, MAX_PAYLOAD).unwrap(),
            (3 << 24) - 1
        );
    }

    #[test]
    fn payload_overflow_is_capacity_error() {
        let err = segment_index(Segment::ARRAY, MAX_PAYLOAD + 1).unwrap_err();
        assert!(matches!(err, LapisError::CapacityExceeded { .. }));
    }

    #[test]
    fn membership_and_payload() {
        let idx = segment_index(Segment::LINKED_LIST, 77).unwrap();
        assert!(is_in_segment(idx, Segment::LINKED_LIST));
        assert!(!is_in_segment(idx, Segment::HASHMAP));
        assert_eq!(payload_of(idx), 77);
    }

    #[test]
    fn parent_slot_layout() {
        assert_eq!(parent_slot_base(Segment::ARRAY), (2 << 17) | (1 << 24));
        assert_eq!(
            parent_slot(Segment::HASHMAP, 3).unwrap(),
            parent_slot_base(Segment::HASHMAP) + 3
        );
        assert!(matches!(
            parent_slot(Segment::HASHMAP, MAX_PARENTS),
            Err(LapisError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn parent_tables_do_not_overlap() {
        let segments: Vec<Segment> = collection_segments().collect();
        for pair in segments.windows(2) {
            let last_of_lower = parent_slot(pair[0], MAX_PARENTS - 1).unwrap();
            assert!(last_of_lower < parent_slot_base(pair[1]));
        }
        let last = parent_slot(Segment::new(127).unwrap(), MAX_PARENTS - 1).unwrap();
        assert!(last < segment_index(Segment::ARRAY, 0).unwrap());
    }

    #[test]
    fn fields_sit_between_base_space_and_parent_tables() {
        for seg in collection_segments() {
            for field in [Field::Size, Field::Head, Field::Tail] {
                let idx = field_index(seg, field);
                assert!(idx > ANNOTATION_INDEX_START.max(REFERENCE_INDEX_END));
                assert!(idx >= 1 << 24);
                assert!(idx < parent_slot_base(Segment::ARRAY));
            }
        }
        assert_ne!(
            field_index(Segment::ARRAY, Field::Size),
            field_index(Segment::HASHMAP, Field::Size)
        );
    }
}
