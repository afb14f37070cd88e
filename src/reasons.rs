//! Typed split reasons attached to groups and blocks.
//!
//! The sorters never fail a run: they degrade by producing more, smaller
//! blocks and explaining each cut with a [`ReasonKind`]. Reasons are plain
//! diagnostics — they are never used for control flow — and carry their
//! numeric payloads (distances, counts) as text so the enumeration itself
//! stays free of numeric-kind variance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Why two adjacent records ended up in different groups or blocks.
///
/// A closed enumeration: downstream consumers can match exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReasonKind {
    /// Records carried different values for a distinguishing tag
    ValueSplitDifference,
    /// The consecutive ordering distance deviated from the learned step
    ValueSortDistance,
    /// A record carried no readable spatial position
    ImagePositionMissing,
    /// Two records occupied the exact same spatial position
    OverlappingSlices,
    /// A gap in the slice stack; payload carries the estimated slice count
    MissingSlices,
    /// The inter-slice distance deviated; payload carries the observed distance
    SliceDistanceInconsistency,
    /// The acquisition geometry was sheared in an unsupported way
    GantryTiltDifference,
}

impl ReasonKind {
    /// A short human-readable description for log output.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ReasonKind::ValueSplitDifference => "differing distinguishing tag values",
            ReasonKind::ValueSortDistance => "inconsistent consecutive ordering distance",
            ReasonKind::ImagePositionMissing => "missing image position",
            ReasonKind::OverlappingSlices => "overlapping slice positions",
            ReasonKind::MissingSlices => "missing slices",
            ReasonKind::SliceDistanceInconsistency => "inconsistent slice distance",
            ReasonKind::GantryTiltDifference => "unsupported gantry tilt",
        }
    }
}

/// One recorded reason with its optional textual payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitReason {
    /// What happened
    pub kind: ReasonKind,
    /// Numeric payload as text (observed distance, missing-slice count)
    pub detail: Option<String>,
}

/// An append-only, de-duplicating set of split reasons.
///
/// At most one entry is kept per [`ReasonKind`]; re-adding a kind refreshes
/// its payload. The set supports deep [`Clone`] and union [`merge`], so
/// reasons can propagate into every descendant block when a group is split
/// further downstream.
///
/// [`merge`]: SplitReasonSet::merge
///
/// # Examples
///
/// ```
/// use stacksort::{ReasonKind, SplitReasonSet};
///
/// let mut reasons = SplitReasonSet::new();
/// assert!(reasons.is_empty());
///
/// reasons.add_with_detail(ReasonKind::MissingSlices, "1");
/// reasons.add_with_detail(ReasonKind::MissingSlices, "2"); // refreshes
/// assert_eq!(reasons.detail(ReasonKind::MissingSlices), Some("2"));
/// assert_eq!(reasons.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitReasonSet {
    entries: BTreeMap<ReasonKind, Option<String>>,
}

impl SplitReasonSet {
    /// Creates an empty reason set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a reason without a payload.
    ///
    /// Re-adding a kind that already carries a payload clears that payload.
    pub fn add(&mut self, kind: ReasonKind) {
        self.entries.insert(kind, None);
    }

    /// Records a reason with a textual payload, refreshing any previous
    /// payload for the same kind.
    pub fn add_with_detail(&mut self, kind: ReasonKind, detail: &str) {
        self.entries.insert(kind, Some(detail.to_string()));
    }

    /// Removes a reason by kind; removing an absent kind is a no-op.
    pub fn remove(&mut self, kind: ReasonKind) {
        self.entries.remove(&kind);
    }

    /// Whether a reason of the given kind is recorded.
    #[must_use]
    pub fn has(&self, kind: ReasonKind) -> bool {
        self.entries.contains_key(&kind)
    }

    /// The payload recorded for `kind`, if the kind is present and carries one.
    #[must_use]
    pub fn detail(&self, kind: ReasonKind) -> Option<&str> {
        self.entries.get(&kind).and_then(|d| d.as_deref())
    }

    /// Unions another set into this one; the other set's payloads win on
    /// kinds present in both.
    pub fn merge(&mut self, other: &SplitReasonSet) {
        for (kind, detail) in &other.entries {
            self.entries.insert(*kind, detail.clone());
        }
    }

    /// Whether no reasons are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct reason kinds recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates the recorded reasons in a deterministic (kind) order.
    pub fn iter(&self) -> impl Iterator<Item = SplitReason> + '_ {
        self.entries.iter().map(|(kind, detail)| SplitReason { kind: *kind, detail: detail.clone() })
    }
}
