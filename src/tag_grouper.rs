//! Grouping and ordering of records by distinguishing tag values.
//!
//! The [`TagGroupSorter`] partitions records into groups that share
//! identical (optionally normalized) values for a configured set of
//! distinguishing tags, orders each group with a pluggable
//! [`SortCriterion`], and — in strict mode — re-splits a group wherever the
//! consecutive ordering distance breaks down. Its output feeds the
//! geometric block sorter one group at a time.

use ahash::AHashMap;

use crate::criterion::SortCriterion;
use crate::errors::{Result, StacksortError};
use crate::processor::ValueProcessor;
use crate::reasons::{ReasonKind, SplitReasonSet};
use crate::record::{RecordRef, TagId};

/// An ordered run of records sharing identical distinguishing tag values,
/// together with the reasons it was separated from its siblings.
///
/// Groups are never mutated in place: strict re-splitting produces new
/// groups, each carrying a clone of its parent's reason set.
pub struct Group<'a> {
    records: Vec<RecordRef<'a>>,
    reasons: SplitReasonSet,
}

impl<'a> Group<'a> {
    /// Creates a group from its members and reasons.
    #[must_use]
    pub fn new(records: Vec<RecordRef<'a>>, reasons: SplitReasonSet) -> Self {
        Self { records, reasons }
    }

    /// The member records, in final order.
    #[must_use]
    pub fn records(&self) -> &[RecordRef<'a>] {
        &self.records
    }

    /// The accumulated split reasons.
    #[must_use]
    pub fn reasons(&self) -> &SplitReasonSet {
        &self.reasons
    }

    /// Number of member records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Structural grouping key: one `(tag, normalized value)` entry per
/// distinguishing tag, in configuration order. An absent tag contributes
/// `None`, so absence itself is part of the identity and untagged records
/// naturally gather in their own group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey(Vec<(TagId, Option<String>)>);

/// Partitions records by distinguishing tag values and orders each group.
///
/// # Examples
///
/// ```
/// use stacksort::{PlainRecord, TagGroupSorter, TagId, TagValueCriterion};
///
/// let series = TagId::new(0x0020, 0x000e);
/// let instance = TagId::new(0x0020, 0x0013);
/// let records = vec![
///     PlainRecord::new("b").with_tag(series, "1").with_tag(instance, "2"),
///     PlainRecord::new("a").with_tag(series, "1").with_tag(instance, "1"),
///     PlainRecord::new("c").with_tag(series, "2").with_tag(instance, "1"),
/// ];
/// let refs: Vec<&dyn stacksort::SliceRecord> =
///     records.iter().map(|r| r as &dyn stacksort::SliceRecord).collect();
///
/// let sorter = TagGroupSorter::new()
///     .with_distinguishing_tag(series)
///     .with_criterion(Box::new(TagValueCriterion::new(instance)));
/// let groups = sorter.sort(&refs);
///
/// assert_eq!(groups.len(), 2);
/// assert_eq!(groups[0].records()[0].display_name(), "a");
/// assert_eq!(groups[0].records()[1].display_name(), "b");
/// ```
pub struct TagGroupSorter {
    distinguishing_tags: Vec<TagId>,
    processors: AHashMap<TagId, Box<dyn ValueProcessor>>,
    criterion: Option<Box<dyn SortCriterion>>,
    strict_sorting: bool,
    expect_unit_distance: bool,
    strict_tolerance_fraction: f64,
}

/// Default relative tolerance for the strict consecutive-distance check:
/// a pair deviating from the learned step by more than this fraction of
/// the step's magnitude cuts a new sub-group.
pub const DEFAULT_STRICT_TOLERANCE_FRACTION: f64 = 0.01;

impl TagGroupSorter {
    /// Creates a sorter with no distinguishing tags, no criterion, and
    /// strict sorting disabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            distinguishing_tags: Vec::new(),
            processors: AHashMap::new(),
            criterion: None,
            strict_sorting: false,
            expect_unit_distance: false,
            strict_tolerance_fraction: DEFAULT_STRICT_TOLERANCE_FRACTION,
        }
    }

    /// Adds a distinguishing tag. Key construction follows the order in
    /// which tags were added.
    #[must_use]
    pub fn with_distinguishing_tag(mut self, tag: TagId) -> Self {
        self.distinguishing_tags.push(tag);
        self
    }

    /// Registers a value processor that normalizes the given tag's raw
    /// value before it participates in the grouping key.
    #[must_use]
    pub fn with_processor(mut self, tag: TagId, processor: Box<dyn ValueProcessor>) -> Self {
        self.processors.insert(tag, processor);
        self
    }

    /// Sets the ordering criterion applied within each group.
    #[must_use]
    pub fn with_criterion(mut self, criterion: Box<dyn SortCriterion>) -> Self {
        self.criterion = Some(criterion);
        self
    }

    /// Enables strict consecutive-order enforcement: after ordering, a
    /// group is re-split wherever the pairwise distance deviates from the
    /// learned step.
    #[must_use]
    pub fn with_strict_sorting(mut self, strict: bool) -> Self {
        self.strict_sorting = strict;
        self
    }

    /// Enables the first-pair heuristic for index-like orderings: when the
    /// very first learned distance is an exact integer other than ±1, the
    /// group is cut right after its first element (a missing slice at the
    /// start would otherwise poison the learned step).
    #[must_use]
    pub fn with_expect_unit_distance(mut self, expect: bool) -> Self {
        self.expect_unit_distance = expect;
        self
    }

    /// Overrides the strict-mode relative tolerance (default
    /// [`DEFAULT_STRICT_TOLERANCE_FRACTION`]).
    ///
    /// # Errors
    ///
    /// Returns [`StacksortError::InvalidTolerance`] when `fraction` is not
    /// greater than zero.
    pub fn with_strict_tolerance_fraction(mut self, fraction: f64) -> Result<Self> {
        if !(fraction > 0.0) {
            return Err(StacksortError::InvalidTolerance {
                parameter: "strict-tolerance-fraction".to_string(),
                value: fraction,
                min: 0.0,
            });
        }
        self.strict_tolerance_fraction = fraction;
        Ok(self)
    }

    /// Partitions `records` into groups and orders each group.
    ///
    /// Every input record appears in exactly one output group. When more
    /// than one group results, each carries
    /// [`ReasonKind::ValueSplitDifference`]; a single group carries an
    /// empty reason set. Strict re-splitting tags each cut-off sub-group
    /// with [`ReasonKind::ValueSortDistance`].
    #[must_use]
    pub fn sort<'a>(&self, records: &[RecordRef<'a>]) -> Vec<Group<'a>> {
        if records.is_empty() {
            return Vec::new();
        }

        let mut groups = self.group_by_key(records);

        if groups.len() > 1 {
            log::debug!(
                "distinguishing tag values split {} records into {} groups",
                records.len(),
                groups.len()
            );
        }
        let reasons = if groups.len() > 1 {
            let mut r = SplitReasonSet::new();
            r.add(ReasonKind::ValueSplitDifference);
            r
        } else {
            SplitReasonSet::new()
        };

        if let Some(criterion) = self.criterion.as_deref() {
            for group in &mut groups {
                group.sort_by(|a, b| criterion.ordering(*a, *b));
            }
        }

        let mut result: Vec<Group<'a>> = Vec::with_capacity(groups.len());
        for members in groups {
            if self.strict_sorting {
                if let Some(criterion) = self.criterion.as_deref() {
                    result.extend(self.split_on_distance(members, &reasons, criterion));
                    continue;
                }
            }
            result.push(Group::new(members, reasons.clone()));
        }

        // Order the groups themselves by their first elements; contents and
        // reasons travel unchanged.
        if let Some(criterion) = self.criterion.as_deref() {
            result.sort_by(|a, b| criterion.ordering(a.records[0], b.records[0]));
        }

        result
    }

    /// Buckets records by structural key, preserving first-seen group order.
    fn group_by_key<'a>(&self, records: &[RecordRef<'a>]) -> Vec<Vec<RecordRef<'a>>> {
        let mut index: AHashMap<GroupKey, usize> = AHashMap::new();
        let mut groups: Vec<Vec<RecordRef<'a>>> = Vec::new();
        for &record in records {
            let key = self.build_key(record);
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(record);
        }
        groups
    }

    fn build_key(&self, record: RecordRef<'_>) -> GroupKey {
        let entries = self
            .distinguishing_tags
            .iter()
            .map(|&tag| {
                let value = record.tag_value(tag).map(|raw| match self.processors.get(&tag) {
                    Some(processor) => processor.process(&raw),
                    None => raw,
                });
                (tag, value)
            })
            .collect();
        GroupKey(entries)
    }

    /// Walks an ordered group pairwise and cuts a new sub-group wherever
    /// the consecutive distance deviates from the learned step. The
    /// sub-group started by a cut carries the observed distance as its
    /// [`ReasonKind::ValueSortDistance`] payload.
    fn split_on_distance<'a>(
        &self,
        members: Vec<RecordRef<'a>>,
        inherited: &SplitReasonSet,
        criterion: &dyn SortCriterion,
    ) -> Vec<Group<'a>> {
        let mut result = Vec::new();
        let mut current: Vec<RecordRef<'a>> = Vec::new();
        // Distance observed at the cut that started the current sub-group;
        // None for the sub-group that opens the run.
        let mut cut_distance: Option<f64> = None;
        let mut expected_step: Option<f64> = None;

        for &record in &members {
            let Some(&prev) = current.last() else {
                current.push(record);
                continue;
            };

            let distance = criterion.numeric_distance(prev, record);
            let cut = match expected_step {
                None => {
                    if distance == 0.0 {
                        false
                    } else if self.expect_unit_distance
                        && current.len() == 1
                        && distance.fract() == 0.0
                        && distance.abs() != 1.0
                    {
                        // An integer first step other than ±1 reflects a
                        // missing slice at the start, not the true step.
                        true
                    } else {
                        expected_step = Some(distance);
                        false
                    }
                }
                Some(expected) => {
                    (distance - expected).abs() > self.strict_tolerance_fraction * expected.abs()
                }
            };

            if cut {
                log::debug!(
                    "consecutive distance {} breaks run before '{}', cutting sub-group",
                    distance,
                    record.display_name()
                );
                result.push(Self::finish_sub_group(
                    std::mem::take(&mut current),
                    inherited,
                    cut_distance,
                ));
                cut_distance = Some(distance);
                expected_step = None;
            }
            current.push(record);
        }

        if !current.is_empty() {
            result.push(Self::finish_sub_group(current, inherited, cut_distance));
        }
        result
    }

    fn finish_sub_group<'a>(
        members: Vec<RecordRef<'a>>,
        inherited: &SplitReasonSet,
        cut_distance: Option<f64>,
    ) -> Group<'a> {
        let mut reasons = inherited.clone();
        if let Some(distance) = cut_distance {
            reasons.add_with_detail(ReasonKind::ValueSortDistance, &distance.to_string());
        }
        Group::new(members, reasons)
    }
}

impl Default for TagGroupSorter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criterion::TagValueCriterion;
    use crate::processor::CutDecimalPlaces;
    use crate::record::PlainRecord;

    const SERIES: TagId = TagId::new(0x0020, 0x000e);
    const INSTANCE: TagId = TagId::new(0x0020, 0x0013);
    const SPACING: TagId = TagId::new(0x0028, 0x0030);

    fn refs(records: &[PlainRecord]) -> Vec<RecordRef<'_>> {
        records.iter().map(|r| r as RecordRef<'_>).collect()
    }

    fn names(group: &Group<'_>) -> Vec<String> {
        group.records().iter().map(|r| r.display_name()).collect()
    }

    fn indexed(name: &str, series: &str, instance: u32) -> PlainRecord {
        PlainRecord::new(name)
            .with_tag(SERIES, series)
            .with_tag(INSTANCE, &instance.to_string())
    }

    #[test]
    fn test_single_group_has_empty_reasons() {
        let records =
            vec![indexed("a", "1", 1), indexed("b", "1", 2), indexed("c", "1", 3)];
        let sorter = TagGroupSorter::new().with_distinguishing_tag(SERIES);
        let groups = sorter.sort(&refs(&records));
        assert_eq!(groups.len(), 1);
        assert!(groups[0].reasons().is_empty());
    }

    #[test]
    fn test_value_difference_splits_and_tags_all_groups() {
        let records = vec![indexed("a", "1", 1), indexed("b", "2", 1), indexed("c", "1", 2)];
        let sorter = TagGroupSorter::new().with_distinguishing_tag(SERIES);
        let groups = sorter.sort(&refs(&records));
        assert_eq!(groups.len(), 2);
        for group in &groups {
            assert!(group.reasons().has(ReasonKind::ValueSplitDifference));
        }
    }

    #[test]
    fn test_absent_tag_is_part_of_identity() {
        let tagged = indexed("a", "1", 1);
        let untagged = PlainRecord::new("b").with_tag(INSTANCE, "2");
        let records = vec![tagged, untagged];
        let sorter = TagGroupSorter::new().with_distinguishing_tag(SERIES);
        let groups = sorter.sort(&refs(&records));
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_processor_collapses_near_equal_values() {
        let a = PlainRecord::new("a").with_tag(SPACING, "0.30000001");
        let b = PlainRecord::new("b").with_tag(SPACING, "0.30000002");
        let records = vec![a, b];

        let raw = TagGroupSorter::new().with_distinguishing_tag(SPACING);
        assert_eq!(raw.sort(&refs(&records)).len(), 2);

        let normalized = TagGroupSorter::new()
            .with_distinguishing_tag(SPACING)
            .with_processor(SPACING, Box::new(CutDecimalPlaces::new(4)));
        assert_eq!(normalized.sort(&refs(&records)).len(), 1);
    }

    #[test]
    fn test_within_group_ordering() {
        let records = vec![indexed("c", "1", 3), indexed("a", "1", 1), indexed("b", "1", 2)];
        let sorter = TagGroupSorter::new()
            .with_distinguishing_tag(SERIES)
            .with_criterion(Box::new(TagValueCriterion::new(INSTANCE)));
        let groups = sorter.sort(&refs(&records));
        assert_eq!(names(&groups[0]), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_ordering_is_stable_for_ties() {
        // No criterion can distinguish these; input order must survive.
        let records = vec![indexed("first", "1", 7), indexed("second", "1", 7)];
        let sorter = TagGroupSorter::new()
            .with_distinguishing_tag(SERIES)
            .with_criterion(Box::new(TagValueCriterion::new(INSTANCE)));
        let groups = sorter.sort(&refs(&records));
        assert_eq!(names(&groups[0]), vec!["first", "second"]);
    }

    #[test]
    fn test_strict_consecutive_order_split() {
        let slice_indices = [1, 2, 3, 4, 6, 7, 8];
        let records: Vec<PlainRecord> = slice_indices
            .iter()
            .map(|i| indexed(&format!("s{i}"), "1", *i))
            .collect();
        let sorter = TagGroupSorter::new()
            .with_distinguishing_tag(SERIES)
            .with_criterion(Box::new(TagValueCriterion::new(INSTANCE)))
            .with_strict_sorting(true);
        let groups = sorter.sort(&refs(&records));

        assert_eq!(groups.len(), 2);
        assert_eq!(names(&groups[0]), vec!["s1", "s2", "s3", "s4"]);
        assert_eq!(names(&groups[1]), vec!["s6", "s7", "s8"]);
        assert!(!groups[0].reasons().has(ReasonKind::ValueSortDistance));
        assert!(groups[1].reasons().has(ReasonKind::ValueSortDistance));
        assert_eq!(groups[1].reasons().detail(ReasonKind::ValueSortDistance), Some("2"));
    }

    #[test]
    fn test_strict_split_restarts_distance_learning() {
        // 10,20,30 then 31,32: after the cut at 30->31 the new sub-group
        // learns step 1 and stays together.
        let records: Vec<PlainRecord> = [10, 20, 30, 31, 32]
            .iter()
            .map(|i| indexed(&format!("s{i}"), "1", *i))
            .collect();
        let sorter = TagGroupSorter::new()
            .with_distinguishing_tag(SERIES)
            .with_criterion(Box::new(TagValueCriterion::new(INSTANCE)))
            .with_strict_sorting(true);
        let groups = sorter.sort(&refs(&records));
        assert_eq!(groups.len(), 2);
        assert_eq!(names(&groups[0]), vec!["s10", "s20", "s30"]);
        assert_eq!(names(&groups[1]), vec!["s31", "s32"]);
    }

    #[test]
    fn test_expect_unit_distance_cuts_after_first() {
        // First step is 2 (integer, not ±1): a missing slice at the start.
        let records: Vec<PlainRecord> =
            [1, 3, 4, 5].iter().map(|i| indexed(&format!("s{i}"), "1", *i)).collect();
        let sorter = TagGroupSorter::new()
            .with_distinguishing_tag(SERIES)
            .with_criterion(Box::new(TagValueCriterion::new(INSTANCE)))
            .with_strict_sorting(true)
            .with_expect_unit_distance(true);
        let groups = sorter.sort(&refs(&records));
        assert_eq!(groups.len(), 2);
        assert_eq!(names(&groups[0]), vec!["s1"]);
        assert_eq!(names(&groups[1]), vec!["s3", "s4", "s5"]);
        assert!(groups[1].reasons().has(ReasonKind::ValueSortDistance));
    }

    #[test]
    fn test_expect_unit_distance_accepts_unit_step() {
        let records: Vec<PlainRecord> =
            [1, 2, 3].iter().map(|i| indexed(&format!("s{i}"), "1", *i)).collect();
        let sorter = TagGroupSorter::new()
            .with_distinguishing_tag(SERIES)
            .with_criterion(Box::new(TagValueCriterion::new(INSTANCE)))
            .with_strict_sorting(true)
            .with_expect_unit_distance(true);
        assert_eq!(sorter.sort(&refs(&records)).len(), 1);
    }

    #[test]
    fn test_groups_ordered_by_first_element() {
        // Series "2" arrives first but its first instance sorts later.
        let records = vec![indexed("b1", "2", 10), indexed("a1", "1", 1), indexed("a2", "1", 2)];
        let sorter = TagGroupSorter::new()
            .with_distinguishing_tag(SERIES)
            .with_criterion(Box::new(TagValueCriterion::new(INSTANCE)));
        let groups = sorter.sort(&refs(&records));
        assert_eq!(names(&groups[0]), vec!["a1", "a2"]);
        assert_eq!(names(&groups[1]), vec!["b1"]);
    }

    #[test]
    fn test_sub_groups_inherit_value_split_reason() {
        let mut records: Vec<PlainRecord> =
            [1, 2, 5, 6].iter().map(|i| indexed(&format!("s{i}"), "1", *i)).collect();
        records.push(indexed("other", "2", 1));
        let sorter = TagGroupSorter::new()
            .with_distinguishing_tag(SERIES)
            .with_criterion(Box::new(TagValueCriterion::new(INSTANCE)))
            .with_strict_sorting(true);
        let groups = sorter.sort(&refs(&records));
        assert_eq!(groups.len(), 3);
        for group in &groups {
            assert!(group.reasons().has(ReasonKind::ValueSplitDifference));
        }
    }

    #[test]
    fn test_completeness_no_loss_no_duplication() {
        let records: Vec<PlainRecord> = (0..20)
            .map(|i| indexed(&format!("r{i}"), &(i % 3).to_string(), 100 - i))
            .collect();
        let sorter = TagGroupSorter::new()
            .with_distinguishing_tag(SERIES)
            .with_criterion(Box::new(TagValueCriterion::new(INSTANCE)))
            .with_strict_sorting(true);
        let groups = sorter.sort(&refs(&records));
        let mut seen: Vec<String> =
            groups.iter().flat_map(|g| names(g)).collect();
        seen.sort();
        let mut expected: Vec<String> = (0..20).map(|i| format!("r{i}")).collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_empty_input_yields_no_groups() {
        let sorter = TagGroupSorter::new().with_distinguishing_tag(SERIES);
        assert!(sorter.sort(&[]).is_empty());
    }

    #[test]
    fn test_invalid_strict_tolerance_rejected() {
        assert!(TagGroupSorter::new().with_strict_tolerance_fraction(0.0).is_err());
        assert!(TagGroupSorter::new().with_strict_tolerance_fraction(-0.5).is_err());
        assert!(TagGroupSorter::new().with_strict_tolerance_fraction(0.05).is_ok());
    }
}
