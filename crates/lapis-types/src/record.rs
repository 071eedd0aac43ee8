//! Record values and the reserved index layout.
//!
//! A record is the flat `index -> (type, value)` mapping the registry keeps
//! for one identifier. The constants below are shared with existing
//! registries and must not change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Index of the resource location (type tag [`tags::URL`]).
pub const INDEX_RESOURCE_LOCATION: u32 = 1;
/// Index of the resource/collection type discriminator.
pub const INDEX_RESOURCE_TYPE: u32 = 2;
/// First index reserved for reference lists.
pub const REFERENCE_INDEX_START: u32 = 1000;
/// Last index reserved for reference lists (inclusive).
pub const REFERENCE_INDEX_END: u32 = 1999;
/// First index for free-form annotations.
pub const ANNOTATION_INDEX_START: u32 = 2000;

/// Well-known type tags.
pub mod tags {
    pub const URL: &str = "URL";
    pub const RESOURCE_TYPE: &str = "RESOURCE_TYPE";
    pub const PARENT_OBJECT: &str = "PARENT_OBJECT";
    /// Marks a record as a redirect; the value is the target identifier.
    pub const HS_ALIAS: &str = "HS_ALIAS";
}

/// One `(type tag, value)` entry of a record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordValue {
    /// The type tag. For reference lists and hash map buckets this carries
    /// the key rather than a fixed type name.
    pub tag: String,
    /// The opaque value.
    pub data: String,
}

impl RecordValue {
    pub fn new(tag: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            data: data.into(),
        }
    }

    /// Returns `true` if the tag equals `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag == tag
    }
}

/// A full record, ordered by index.
pub type Record = BTreeMap<u32, RecordValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_ranges_do_not_overlap() {
        assert!(INDEX_RESOURCE_TYPE < REFERENCE_INDEX_START);
        assert!(REFERENCE_INDEX_END < ANNOTATION_INDEX_START);
    }

    #[test]
    fn record_serializes_with_numeric_keys() {
        let mut record = Record::new();
        record.insert(INDEX_RESOURCE_LOCATION, RecordValue::new(tags::URL, "http://example.com"));
        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert!(back[&1].has_tag(tags::URL));
    }
}
