//! Record and tag identifier types.
//!
//! The sorters never own, copy, or mutate the records they organize. They
//! only read tag values through the [`SliceRecord`] capability for the
//! duration of one sort call, so callers can back records by anything —
//! a parsed file, a database row, or an in-memory map ([`PlainRecord`]).

use std::fmt;

use ahash::AHashMap;

/// Identifies one piece of per-record metadata by its group/element pair.
///
/// Comparable and hashable so it can key processor registrations and
/// participate in structural group keys.
///
/// # Examples
///
/// ```
/// use stacksort::TagId;
///
/// let position = TagId::new(0x0020, 0x0032);
/// assert_eq!(format!("{position}"), "(0020,0032)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagId {
    /// The tag group number
    pub group: u16,
    /// The tag element number
    pub element: u16,
}

impl TagId {
    /// The standard image-position tag (0020,0032): the spatial position of
    /// a slice as a backslash-separated millimeter triple.
    pub const IMAGE_POSITION: TagId = TagId::new(0x0020, 0x0032);

    /// The standard image-orientation tag (0020,0037): the in-plane
    /// right/up basis as six backslash-separated direction cosines.
    pub const IMAGE_ORIENTATION: TagId = TagId::new(0x0020, 0x0037);

    /// Creates a new tag identifier from a group/element pair.
    #[must_use]
    pub const fn new(group: u16, element: u16) -> Self {
        Self { group, element }
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:04x},{:04x})", self.group, self.element)
    }
}

/// Capability the sorters require from a slice record.
///
/// Implementations must be pure with respect to the tag values they expose:
/// repeated lookups of the same tag during one sort call must return the
/// same value, otherwise the partitioning is unspecified (though it still
/// places every record in exactly one block).
pub trait SliceRecord {
    /// Returns the raw string value stored for `tag`, or `None` when the
    /// record does not carry that tag.
    fn tag_value(&self, tag: TagId) -> Option<String>;

    /// A human-readable name for this record, used in log output only
    /// (e.g. a filename or an instance identifier).
    fn display_name(&self) -> String;
}

/// Borrowed record handle used throughout the sorters.
pub type RecordRef<'a> = &'a dyn SliceRecord;

/// A simple in-memory [`SliceRecord`] backed by a tag/value map.
///
/// Useful for tests and for callers that already hold decoded metadata.
///
/// # Examples
///
/// ```
/// use stacksort::{PlainRecord, SliceRecord, TagId};
///
/// let series = TagId::new(0x0020, 0x000e);
/// let record = PlainRecord::new("slice_001").with_tag(series, "1.2.3");
/// assert_eq!(record.tag_value(series).as_deref(), Some("1.2.3"));
/// assert_eq!(record.display_name(), "slice_001");
/// ```
#[derive(Debug, Clone, Default)]
pub struct PlainRecord {
    name: String,
    tags: AHashMap<TagId, String>,
}

impl PlainRecord {
    /// Creates an empty record with the given display name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), tags: AHashMap::new() }
    }

    /// Adds or replaces a tag value, returning the record for chaining.
    #[must_use]
    pub fn with_tag(mut self, tag: TagId, value: &str) -> Self {
        self.tags.insert(tag, value.to_string());
        self
    }

    /// Adds or replaces a tag value in place.
    pub fn set_tag(&mut self, tag: TagId, value: &str) {
        self.tags.insert(tag, value.to_string());
    }
}

impl SliceRecord for PlainRecord {
    fn tag_value(&self, tag: TagId) -> Option<String> {
        self.tags.get(&tag).cloned()
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }
}
