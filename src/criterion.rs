//! Pluggable ordering criteria for records within a group.
//!
//! A [`SortCriterion`] defines both a strict ordering over records and a
//! signed numeric distance along that ordering dimension, so the sorters
//! can detect gaps and direction flips, not just order. Criteria chain:
//! each may own a secondary criterion consulted only when the primary
//! cannot distinguish two records.

use std::cmp::Ordering;

use crate::geometry::{parse_orientation, parse_vec3};
use crate::record::{RecordRef, TagId};

/// A total ordering over records plus a physical distance measure.
///
/// `is_before` must define a strict weak ordering (irreflexive,
/// transitive). This is a documented precondition, not checked at runtime;
/// violating it yields unstable (but still complete) output.
pub trait SortCriterion {
    /// Whether `a` must be ordered strictly before `b`.
    fn is_before(&self, a: RecordRef<'_>, b: RecordRef<'_>) -> bool;

    /// Signed scalar distance from `a` to `b` along the ordering dimension.
    /// Magnitude and sign carry physical meaning (e.g. millimeters along
    /// the slice normal, or an index difference).
    fn numeric_distance(&self, a: RecordRef<'_>, b: RecordRef<'_>) -> f64;

    /// The tie-break criterion, if any. Chains are owned and acyclic by
    /// construction.
    fn secondary(&self) -> Option<&dyn SortCriterion> {
        None
    }

    /// Total ordering derived from `is_before`, for use with stable sorts.
    fn ordering(&self, a: RecordRef<'_>, b: RecordRef<'_>) -> Ordering {
        if self.is_before(a, b) {
            Ordering::Less
        } else if self.is_before(b, a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

/// Compares two raw tag values: numerically when both parse as numbers,
/// lexically otherwise. Missing values order before present ones.
fn compare_values(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
            (Ok(na), Ok(nb)) => na.partial_cmp(&nb).unwrap_or(Ordering::Equal),
            _ => a.cmp(b),
        },
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Orders records by the value of one tag.
///
/// Values are compared numerically when both sides parse as numbers (so
/// `"9"` sorts before `"10"`), lexically otherwise. The numeric distance is
/// the difference of the parsed values, or the secondary's distance when
/// either side is non-numeric.
///
/// # Examples
///
/// ```
/// use stacksort::{PlainRecord, SortCriterion, TagId, TagValueCriterion};
///
/// let instance = TagId::new(0x0020, 0x0013);
/// let a = PlainRecord::new("a").with_tag(instance, "9");
/// let b = PlainRecord::new("b").with_tag(instance, "10");
///
/// let by_instance = TagValueCriterion::new(instance);
/// assert!(by_instance.is_before(&a, &b));
/// assert_eq!(by_instance.numeric_distance(&a, &b), 1.0);
/// ```
pub struct TagValueCriterion {
    tag: TagId,
    secondary: Option<Box<dyn SortCriterion>>,
}

impl TagValueCriterion {
    /// Creates a criterion ordering by the given tag's value.
    #[must_use]
    pub fn new(tag: TagId) -> Self {
        Self { tag, secondary: None }
    }

    /// Attaches a tie-break criterion consulted when both records carry
    /// the same value for this tag.
    #[must_use]
    pub fn with_secondary(mut self, secondary: Box<dyn SortCriterion>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// The tag this criterion reads.
    #[must_use]
    pub fn tag(&self) -> TagId {
        self.tag
    }
}

impl SortCriterion for TagValueCriterion {
    fn is_before(&self, a: RecordRef<'_>, b: RecordRef<'_>) -> bool {
        let va = a.tag_value(self.tag);
        let vb = b.tag_value(self.tag);
        match compare_values(va.as_deref(), vb.as_deref()) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => self.secondary.as_ref().is_some_and(|s| s.is_before(a, b)),
        }
    }

    fn numeric_distance(&self, a: RecordRef<'_>, b: RecordRef<'_>) -> f64 {
        let parsed = |r: RecordRef<'_>| r.tag_value(self.tag)?.trim().parse::<f64>().ok();
        match (parsed(a), parsed(b)) {
            (Some(na), Some(nb)) => nb - na,
            _ => self.secondary.as_ref().map_or(0.0, |s| s.numeric_distance(a, b)),
        }
    }

    fn secondary(&self) -> Option<&dyn SortCriterion> {
        self.secondary.as_deref()
    }
}

/// Orders records by their position along the slice normal.
///
/// The normal is the cross product of the right/up orientation basis read
/// from the first record of each comparison; the comparison key is the
/// projection of the record's position onto that normal, so the order is
/// the physical stacking order regardless of how positions are encoded.
/// Falls back to the secondary criterion when position or orientation is
/// missing or unreadable.
pub struct ImagePositionCriterion {
    position_tag: TagId,
    orientation_tag: TagId,
    secondary: Option<Box<dyn SortCriterion>>,
}

impl ImagePositionCriterion {
    /// Creates a criterion using the standard position/orientation tags.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tags(TagId::IMAGE_POSITION, TagId::IMAGE_ORIENTATION)
    }

    /// Creates a criterion reading position and orientation from the given
    /// tags.
    #[must_use]
    pub fn with_tags(position_tag: TagId, orientation_tag: TagId) -> Self {
        Self { position_tag, orientation_tag, secondary: None }
    }

    /// Attaches a tie-break criterion, also used as a fallback when the
    /// geometry cannot be read.
    #[must_use]
    pub fn with_secondary(mut self, secondary: Box<dyn SortCriterion>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Signed distance from `a` to `b` along `a`'s slice normal, or `None`
    /// when either record's geometry is unreadable.
    fn distance_along_normal(&self, a: RecordRef<'_>, b: RecordRef<'_>) -> Option<f64> {
        let (right, up) = parse_orientation(&a.tag_value(self.orientation_tag)?)?;
        let normal = right.cross(&up).normalized()?;
        let pos_a = parse_vec3(&a.tag_value(self.position_tag)?)?;
        let pos_b = parse_vec3(&b.tag_value(self.position_tag)?)?;
        Some((pos_b - pos_a).dot(&normal))
    }
}

impl Default for ImagePositionCriterion {
    fn default() -> Self {
        Self::new()
    }
}

impl SortCriterion for ImagePositionCriterion {
    fn is_before(&self, a: RecordRef<'_>, b: RecordRef<'_>) -> bool {
        match self.distance_along_normal(a, b) {
            Some(d) if d > 0.0 => true,
            Some(d) if d < 0.0 => false,
            _ => self.secondary.as_ref().is_some_and(|s| s.is_before(a, b)),
        }
    }

    fn numeric_distance(&self, a: RecordRef<'_>, b: RecordRef<'_>) -> f64 {
        match self.distance_along_normal(a, b) {
            Some(d) => d,
            None => self.secondary.as_ref().map_or(0.0, |s| s.numeric_distance(a, b)),
        }
    }

    fn secondary(&self) -> Option<&dyn SortCriterion> {
        self.secondary.as_deref()
    }
}
