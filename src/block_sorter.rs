//! Partitioning of an ordered record run into equidistant volume blocks.
//!
//! The [`EquiDistantBlocksSorter`] walks a record sequence once, learns the
//! expected inter-slice displacement from the first two distinct positions,
//! and closes the growing block whenever a record deviates from the
//! extrapolated position beyond a tolerance. One geometric irregularity is
//! supported: a regular gantry tilt, where every slice is sheared by the
//! same consistent angle. Everything the pass cannot keep goes to an
//! unsorted remainder, which is re-analyzed from scratch until it is empty,
//! so every record always ends up in exactly one block.

use crate::errors::{Result, StacksortError};
use crate::geometry::{parse_orientation, parse_vec3, GantryTiltInfo, Vec3};
use crate::reasons::{ReasonKind, SplitReasonSet};
use crate::record::{RecordRef, TagId};

/// Default fraction of the expected inter-slice distance used as the
/// adaptive origin tolerance.
pub const DEFAULT_ADAPTIVE_TOLERANCE_FRACTION: f64 = 0.3;

/// How far a record's position may deviate from the extrapolated position
/// before it no longer belongs to the growing block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToleratedOriginOffset {
    /// A fixed tolerance in millimeters.
    Absolute(f64),
    /// A fraction of the learned inter-slice distance; the tolerance adapts
    /// to the stack's own spacing.
    Adaptive {
        /// Fraction of the expected inter-slice distance.
        fraction: f64,
    },
}

impl Default for ToleratedOriginOffset {
    fn default() -> Self {
        ToleratedOriginOffset::Adaptive { fraction: DEFAULT_ADAPTIVE_TOLERANCE_FRACTION }
    }
}

/// A final, geometrically consistent run of records representing one
/// reconstructable volume, with the reasons it was separated from its
/// neighbors and — for tilted stacks — the tilt geometry.
///
/// Immutable after emission.
pub struct Block<'a> {
    records: Vec<RecordRef<'a>>,
    reasons: SplitReasonSet,
    tilt: Option<GantryTiltInfo>,
}

impl<'a> Block<'a> {
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

    /// The tilt geometry, present only for blocks accepted as regularly
    /// gantry-tilted.
    #[must_use]
    pub fn tilt_info(&self) -> Option<&GantryTiltInfo> {
        self.tilt.as_ref()
    }

    /// Number of member records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the block has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Outcome of one analysis pass: the block it grew, what it could not
/// place, and reasons destined for the next pass's block.
struct PassOutcome<'a> {
    members: Vec<RecordRef<'a>>,
    reasons: SplitReasonSet,
    tilt: Option<GantryTiltInfo>,
    remainder: Vec<RecordRef<'a>>,
    carried: SplitReasonSet,
}

/// Splits a record sequence into blocks of evenly spaced slices.
///
/// # Examples
///
/// ```
/// use stacksort::{EquiDistantBlocksSorter, PlainRecord, SliceRecord, TagId};
///
/// let slice = |name: &str, z: f64| {
///     PlainRecord::new(name)
///         .with_tag(TagId::IMAGE_POSITION, &format!("0\\0\\{z}"))
///         .with_tag(TagId::IMAGE_ORIENTATION, "1\\0\\0\\0\\1\\0")
/// };
/// let records = vec![slice("a", 0.0), slice("b", 2.0), slice("c", 4.0)];
/// let refs: Vec<&dyn SliceRecord> =
///     records.iter().map(|r| r as &dyn SliceRecord).collect();
///
/// let blocks = EquiDistantBlocksSorter::new().sort(&refs);
/// assert_eq!(blocks.len(), 1);
/// assert_eq!(blocks[0].len(), 3);
/// ```
pub struct EquiDistantBlocksSorter {
    accept_tilt: bool,
    tolerated_offset: ToleratedOriginOffset,
    accept_two_slice_groups: bool,
    position_tag: TagId,
    orientation_tag: TagId,
}

impl EquiDistantBlocksSorter {
    /// Creates a sorter with tilt rejection, the default adaptive
    /// tolerance, two-slice groups accepted, and the standard
    /// position/orientation tags.
    #[must_use]
    pub fn new() -> Self {
        Self {
            accept_tilt: false,
            tolerated_offset: ToleratedOriginOffset::default(),
            accept_two_slice_groups: true,
            position_tag: TagId::IMAGE_POSITION,
            orientation_tag: TagId::IMAGE_ORIENTATION,
        }
    }

    /// Accepts regularly gantry-tilted stacks as single blocks instead of
    /// splitting them apart.
    #[must_use]
    pub fn with_accept_tilt(mut self, accept: bool) -> Self {
        self.accept_tilt = accept;
        self
    }

    /// Sets the origin deviation tolerance.
    ///
    /// # Errors
    ///
    /// Returns [`StacksortError::InvalidTolerance`] when the absolute
    /// tolerance or the adaptive fraction is not greater than zero.
    pub fn with_tolerated_offset(mut self, offset: ToleratedOriginOffset) -> Result<Self> {
        let (parameter, value) = match offset {
            ToleratedOriginOffset::Absolute(v) => ("tolerated-origin-offset", v),
            ToleratedOriginOffset::Adaptive { fraction } => {
                ("tolerated-origin-offset-fraction", fraction)
            }
        };
        if !(value > 0.0) {
            return Err(StacksortError::InvalidTolerance {
                parameter: parameter.to_string(),
                value,
                min: 0.0,
            });
        }
        self.tolerated_offset = offset;
        Ok(self)
    }

    /// Whether a tilted block of exactly two slices may survive. Two points
    /// cannot statistically justify a tilt inference, so with `false` such
    /// blocks are undone into singletons.
    #[must_use]
    pub fn with_accept_two_slice_groups(mut self, accept: bool) -> Self {
        self.accept_two_slice_groups = accept;
        self
    }

    /// Overrides the tags the sorter reads position and orientation from.
    ///
    /// # Errors
    ///
    /// Returns [`StacksortError::InvalidParameter`] when both tags are the
    /// same; position and orientation are distinct concepts and cannot share
    /// a source.
    pub fn with_geometry_tags(
        mut self,
        position_tag: TagId,
        orientation_tag: TagId,
    ) -> Result<Self> {
        if position_tag == orientation_tag {
            return Err(StacksortError::InvalidParameter {
                parameter: "geometry-tags".to_string(),
                reason: format!("position and orientation both read from {position_tag}"),
            });
        }
        self.position_tag = position_tag;
        self.orientation_tag = orientation_tag;
        Ok(self)
    }

    /// Partitions `records` into geometrically consistent blocks.
    ///
    /// Every record is placed in exactly one block; there is no failure
    /// path. Zero records yield zero blocks.
    #[must_use]
    pub fn sort<'a>(&self, records: &[RecordRef<'a>]) -> Vec<Block<'a>> {
        self.sort_with_inherited(records, &SplitReasonSet::new())
    }

    /// Like [`sort`](Self::sort), but clones `inherited` into every
    /// emitted block's reason set — used by the pipeline so group-level
    /// reasons propagate into all descendant blocks.
    #[must_use]
    pub fn sort_with_inherited<'a>(
        &self,
        records: &[RecordRef<'a>],
        inherited: &SplitReasonSet,
    ) -> Vec<Block<'a>> {
        let mut blocks: Vec<Block<'a>> = Vec::new();
        let mut remainder: Vec<RecordRef<'a>> = records.to_vec();
        let mut carried = SplitReasonSet::new();

        while !remainder.is_empty() {
            let mut seed = inherited.clone();
            seed.merge(&carried);

            let outcome = self.analyze(&remainder, seed);
            debug_assert!(!outcome.members.is_empty());
            debug_assert!(outcome.members.len() + outcome.remainder.len() == remainder.len());
            log::debug!(
                "block of {} slice(s) closed, {} left unsorted",
                outcome.members.len(),
                outcome.remainder.len()
            );
            blocks.push(Block {
                records: outcome.members,
                reasons: outcome.reasons,
                tilt: outcome.tilt,
            });
            remainder = outcome.remainder;
            carried = outcome.carried;
        }

        // When overlap terminated the run, keep the diagnostic visible on
        // the block built from the overlapping remainder as well.
        if blocks.len() >= 2 {
            let prev_overlaps =
                blocks[blocks.len() - 2].reasons.has(ReasonKind::OverlappingSlices);
            if prev_overlaps {
                if let Some(last) = blocks.last_mut() {
                    last.reasons.add(ReasonKind::OverlappingSlices);
                }
            }
        }

        blocks
    }

    /// One single-pass analysis: grows one block from the front of
    /// `records` and diverts everything that does not fit.
    fn analyze<'a>(&self, records: &[RecordRef<'a>], reasons: SplitReasonSet) -> PassOutcome<'a> {
        let mut outcome = PassOutcome {
            members: Vec::new(),
            reasons,
            tilt: None,
            remainder: Vec::new(),
            carried: SplitReasonSet::new(),
        };

        let mut first_origin = Vec3::default();
        let mut last_origin = Vec3::default();
        let mut orientation: Option<(Vec3, Vec3)> = None;
        let mut expected_shift: Option<Vec3> = None;
        let mut tolerance = 0.0_f64;

        for (index, &record) in records.iter().enumerate() {
            let position = record.tag_value(self.position_tag).and_then(|v| parse_vec3(&v));
            let Some(origin) = position else {
                if outcome.members.is_empty() {
                    // Position is required for all further reasoning, so
                    // this record can only ever stand alone.
                    log::debug!(
                        "'{}' has no readable position, emitting singleton block",
                        record.display_name()
                    );
                    outcome.members.push(record);
                    outcome.remainder.extend_from_slice(&records[index + 1..]);
                    if !outcome.remainder.is_empty() {
                        outcome.reasons.add(ReasonKind::ImagePositionMissing);
                    }
                } else {
                    outcome.remainder.extend_from_slice(&records[index..]);
                }
                return self.close(outcome, first_origin, last_origin, orientation);
            };

            if outcome.members.is_empty() {
                outcome.members.push(record);
                first_origin = origin;
                last_origin = origin;
                orientation =
                    record.tag_value(self.orientation_tag).and_then(|v| parse_orientation(&v));
                continue;
            }

            if origin == last_origin {
                // A separate time step at the same spatial location; a
                // later pass of this same algorithm picks it up.
                log::debug!(
                    "'{}' repeats the previous position, diverting as overlap",
                    record.display_name()
                );
                outcome.reasons.add(ReasonKind::OverlappingSlices);
                outcome.remainder.push(record);
                continue;
            }

            let Some(shift) = expected_shift else {
                let shift = origin - last_origin;
                tolerance = match self.tolerated_offset {
                    ToleratedOriginOffset::Absolute(mm) => mm,
                    ToleratedOriginOffset::Adaptive { fraction } => shift.norm() * fraction,
                };

                let tilt_candidate = orientation.and_then(|(right, up)| {
                    GantryTiltInfo::from_geometry(right, up, last_origin, origin, 1)
                });
                if let Some(info) = tilt_candidate {
                    if info.is_sheared() {
                        if self.accept_tilt && info.is_regular_gantry_tilt() {
                            log::debug!(
                                "accepting regular gantry tilt of {:.3} degrees",
                                info.tilt_angle_degrees()
                            );
                            outcome.tilt = Some(info);
                        } else {
                            // Unsupported shear: the diverted record starts
                            // over in the next pass and carries the reason.
                            outcome.carried.add(ReasonKind::GantryTiltDifference);
                            outcome.remainder.extend_from_slice(&records[index..]);
                            return self.close(outcome, first_origin, last_origin, orientation);
                        }
                    }
                }

                expected_shift = Some(shift);
                outcome.members.push(record);
                last_origin = origin;
                continue;
            };

            let expected_origin = last_origin + shift;
            let deviation = (origin - expected_origin).norm();
            if deviation > tolerance {
                self.record_distance_diagnostics(&mut outcome.reasons, shift, last_origin, origin);
                outcome.remainder.extend_from_slice(&records[index..]);
                return self.close(outcome, first_origin, last_origin, orientation);
            }

            outcome.members.push(record);
            last_origin = origin;
            // The sequence re-stabilized; earlier distance complaints no
            // longer describe this block's boundary.
            outcome.reasons.remove(ReasonKind::SliceDistanceInconsistency);
        }

        self.close(outcome, first_origin, last_origin, orientation)
    }

    /// Explains a beyond-tolerance step: estimates missing slices from the
    /// observed distance and records the distance itself.
    fn record_distance_diagnostics(
        &self,
        reasons: &mut SplitReasonSet,
        expected_shift: Vec3,
        last_origin: Vec3,
        origin: Vec3,
    ) {
        let expected_distance = expected_shift.norm();
        let Some(direction) = expected_shift.normalized() else {
            return;
        };
        let observed_distance = (origin - last_origin).dot(&direction);
        let missing = (observed_distance / expected_distance).round() as i64 - 1;

        log::debug!(
            "slice distance {observed_distance} deviates from expected {expected_distance}, \
             closing block ({missing} slice(s) estimated missing)"
        );
        if missing < 0 {
            reasons.add(ReasonKind::OverlappingSlices);
        } else if missing > 0 && !reasons.has(ReasonKind::OverlappingSlices) {
            reasons.add_with_detail(ReasonKind::MissingSlices, &missing.to_string());
        }
        reasons.add_with_detail(
            ReasonKind::SliceDistanceInconsistency,
            &observed_distance.to_string(),
        );
    }

    /// Block closure: undoes unjustifiable two-slice tilts and recomputes
    /// the tilt geometry from the block's outermost members.
    fn close<'a>(
        &self,
        mut outcome: PassOutcome<'a>,
        first_origin: Vec3,
        last_origin: Vec3,
        orientation: Option<(Vec3, Vec3)>,
    ) -> PassOutcome<'a> {
        if outcome.tilt.is_some() {
            if outcome.members.len() == 2 && !self.accept_two_slice_groups {
                // Two points cannot justify a tilt inference; give the
                // second one back.
                if let Some(undone) = outcome.members.pop() {
                    log::debug!(
                        "undoing two-slice tilted block, '{}' returns to the remainder",
                        undone.display_name()
                    );
                    outcome.remainder.insert(0, undone);
                    outcome.carried.add(ReasonKind::GantryTiltDifference);
                }
                outcome.tilt = None;
            } else if outcome.members.len() > 2 {
                // First-to-last spans the whole stack and averages out
                // per-slice encoding jitter.
                let steps = outcome.members.len() - 1;
                let recomputed = orientation.and_then(|(right, up)| {
                    GantryTiltInfo::from_geometry(right, up, first_origin, last_origin, steps)
                });
                if let Some(info) = recomputed {
                    outcome.tilt = Some(info);
                }
            }
        }
        outcome
    }
}

impl Default for EquiDistantBlocksSorter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PlainRecord, SliceRecord};

    const AXIAL: &str = "1\\0\\0\\0\\1\\0";

    fn slice(name: &str, z: f64) -> PlainRecord {
        slice_at(name, 0.0, 0.0, z)
    }

    fn slice_at(name: &str, x: f64, y: f64, z: f64) -> PlainRecord {
        PlainRecord::new(name)
            .with_tag(TagId::IMAGE_POSITION, &format!("{x}\\{y}\\{z}"))
            .with_tag(TagId::IMAGE_ORIENTATION, AXIAL)
    }

    fn refs(records: &[PlainRecord]) -> Vec<RecordRef<'_>> {
        records.iter().map(|r| r as RecordRef<'_>).collect()
    }

    fn names(block: &Block<'_>) -> Vec<String> {
        block.records().iter().map(|r| r.display_name()).collect()
    }

    /// Three sheared slices with the given tilt angle and 2mm spacing.
    fn tilted_stack(angle_degrees: f64, count: usize) -> Vec<PlainRecord> {
        let spacing = 2.0;
        let shear = spacing * angle_degrees.to_radians().tan();
        (0..count)
            .map(|i| slice_at(&format!("t{i}"), 0.0, shear * i as f64, spacing * i as f64))
            .collect()
    }

    #[test]
    fn test_empty_input_yields_no_blocks() {
        assert!(EquiDistantBlocksSorter::new().sort(&[]).is_empty());
    }

    #[test]
    fn test_single_record_single_block() {
        let records = vec![slice("only", 0.0)];
        let blocks = EquiDistantBlocksSorter::new().sort(&refs(&records));
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].reasons().is_empty());
        assert!(blocks[0].tilt_info().is_none());
    }

    #[test]
    fn test_even_stack_stays_together() {
        let records: Vec<PlainRecord> =
            (0..10).map(|i| slice(&format!("s{i}"), 2.0 * i as f64)).collect();
        let blocks = EquiDistantBlocksSorter::new().sort(&refs(&records));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].len(), 10);
        assert!(blocks[0].reasons().is_empty());
    }

    #[test]
    fn test_missing_slice_detection() {
        let records =
            vec![slice("a", 0.0), slice("b", 2.0), slice("c", 4.0), slice("d", 8.0), slice("e", 10.0)];
        let blocks = EquiDistantBlocksSorter::new().sort(&refs(&records));

        assert_eq!(blocks.len(), 2);
        assert_eq!(names(&blocks[0]), vec!["a", "b", "c"]);
        assert_eq!(names(&blocks[1]), vec!["d", "e"]);
        assert_eq!(blocks[0].reasons().detail(ReasonKind::MissingSlices), Some("1"));
        assert_eq!(blocks[0].reasons().detail(ReasonKind::SliceDistanceInconsistency), Some("4"));
        assert!(!blocks[1].reasons().has(ReasonKind::MissingSlices));
    }

    #[test]
    fn test_overlapping_duplicate_position() {
        let records = vec![slice("a", 0.0), slice("b", 2.0), slice("b2", 2.0), slice("c", 4.0)];
        let blocks = EquiDistantBlocksSorter::new().sort(&refs(&records));

        assert_eq!(blocks.len(), 2);
        assert_eq!(names(&blocks[0]), vec!["a", "b", "c"]);
        assert_eq!(names(&blocks[1]), vec!["b2"]);
        assert!(blocks[0].reasons().has(ReasonKind::OverlappingSlices));
        // Overlap caused the extra pass, so the diagnostic stays visible on
        // the final block too.
        assert!(blocks[1].reasons().has(ReasonKind::OverlappingSlices));
    }

    #[test]
    fn test_tolerance_boundary_classification() {
        // Expected step 2.0, adaptive fraction 0.3: tolerance 0.6.
        let within =
            vec![slice("a", 0.0), slice("b", 2.0), slice("c", 4.0 + 0.59)];
        let blocks = EquiDistantBlocksSorter::new().sort(&refs(&within));
        assert_eq!(blocks.len(), 1, "0.59 deviation must stay in-block");

        let beyond =
            vec![slice("a", 0.0), slice("b", 2.0), slice("c", 4.0 + 0.61)];
        let blocks = EquiDistantBlocksSorter::new().sort(&refs(&beyond));
        assert_eq!(blocks.len(), 2, "0.61 deviation must start a new block");
        assert!(blocks[0].reasons().has(ReasonKind::SliceDistanceInconsistency));
    }

    #[test]
    fn test_absolute_tolerance() {
        let records = vec![slice("a", 0.0), slice("b", 2.0), slice("c", 4.3)];
        let strict = EquiDistantBlocksSorter::new()
            .with_tolerated_offset(ToleratedOriginOffset::Absolute(0.2))
            .unwrap();
        assert_eq!(strict.sort(&refs(&records)).len(), 2);

        let lenient = EquiDistantBlocksSorter::new()
            .with_tolerated_offset(ToleratedOriginOffset::Absolute(0.5))
            .unwrap();
        assert_eq!(lenient.sort(&refs(&records)).len(), 1);
    }

    #[test]
    fn test_invalid_tolerances_rejected() {
        assert!(EquiDistantBlocksSorter::new()
            .with_tolerated_offset(ToleratedOriginOffset::Absolute(0.0))
            .is_err());
        assert!(EquiDistantBlocksSorter::new()
            .with_tolerated_offset(ToleratedOriginOffset::Adaptive { fraction: -0.1 })
            .is_err());
    }

    #[test]
    fn test_geometry_tags_must_differ() {
        let custom_pos = TagId::new(0x0021, 0x1000);
        let custom_ori = TagId::new(0x0021, 0x1001);
        assert!(EquiDistantBlocksSorter::new()
            .with_geometry_tags(custom_pos, custom_ori)
            .is_ok());
        assert!(EquiDistantBlocksSorter::new()
            .with_geometry_tags(custom_pos, custom_pos)
            .is_err());
    }

    #[test]
    fn test_missing_position_singleton() {
        let records = vec![
            PlainRecord::new("blind"),
            slice("a", 0.0),
            slice("b", 2.0),
        ];
        let blocks = EquiDistantBlocksSorter::new().sort(&refs(&records));
        assert_eq!(blocks.len(), 2);
        assert_eq!(names(&blocks[0]), vec!["blind"]);
        assert!(blocks[0].reasons().has(ReasonKind::ImagePositionMissing));
        assert_eq!(names(&blocks[1]), vec!["a", "b"]);
    }

    #[test]
    fn test_missing_position_mid_stream() {
        let records = vec![slice("a", 0.0), slice("b", 2.0), PlainRecord::new("blind")];
        let blocks = EquiDistantBlocksSorter::new().sort(&refs(&records));
        assert_eq!(blocks.len(), 2);
        assert_eq!(names(&blocks[0]), vec!["a", "b"]);
        assert_eq!(names(&blocks[1]), vec!["blind"]);
        // The singleton is the last record of the run, so no missing-position
        // reason is attached to it.
        assert!(!blocks[1].reasons().has(ReasonKind::ImagePositionMissing));
    }

    #[test]
    fn test_tilt_accepted_keeps_stack_together() {
        let records = tilted_stack(5.0, 3);
        let blocks =
            EquiDistantBlocksSorter::new().with_accept_tilt(true).sort(&refs(&records));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].len(), 3);
        let tilt = blocks[0].tilt_info().expect("tilt geometry must be recorded");
        assert!(tilt.is_regular_gantry_tilt());
        assert!((tilt.tilt_angle_degrees() - 5.0).abs() < 1e-9);
        // Recomputed over the whole stack.
        assert_eq!(tilt.number_of_steps(), 2);
    }

    #[test]
    fn test_tilt_rejected_splits_after_first() {
        let records = tilted_stack(5.0, 3);
        let blocks = EquiDistantBlocksSorter::new().sort(&refs(&records));
        assert_eq!(blocks.len(), 3);
        for block in &blocks {
            assert_eq!(block.len(), 1);
        }
        assert!(blocks[1].reasons().has(ReasonKind::GantryTiltDifference));
        assert!(blocks[2].reasons().has(ReasonKind::GantryTiltDifference));
    }

    #[test]
    fn test_two_slice_tilt_undo() {
        let records = tilted_stack(5.0, 2);
        let undone = EquiDistantBlocksSorter::new()
            .with_accept_tilt(true)
            .with_accept_two_slice_groups(false)
            .sort(&refs(&records));
        assert_eq!(undone.len(), 2);
        assert_eq!(undone[0].len(), 1);
        assert_eq!(undone[1].len(), 1);
        assert!(undone[0].tilt_info().is_none());
        assert!(undone[1].reasons().has(ReasonKind::GantryTiltDifference));

        let kept = EquiDistantBlocksSorter::new()
            .with_accept_tilt(true)
            .sort(&refs(&records));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].len(), 2);
        assert!(kept[0].tilt_info().is_some());
    }

    #[test]
    fn test_irregular_skew_rejected_even_with_accept_tilt() {
        // Shear along the right direction is arbitrary skew, not gantry tilt.
        let records = vec![
            slice_at("a", 0.0, 0.0, 0.0),
            slice_at("b", 0.5, 0.0, 2.0),
            slice_at("c", 1.0, 0.0, 4.0),
        ];
        let blocks =
            EquiDistantBlocksSorter::new().with_accept_tilt(true).sort(&refs(&records));
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].tilt_info().is_none());
    }

    #[test]
    fn test_direction_flip_splits() {
        // The stack walks up then back down.
        let records =
            vec![slice("a", 0.0), slice("b", 2.0), slice("c", 4.0), slice("d", 2.0 + 1e-9)];
        let blocks = EquiDistantBlocksSorter::new().sort(&refs(&records));
        assert_eq!(blocks.len(), 2);
        assert_eq!(names(&blocks[0]), vec!["a", "b", "c"]);
        // Going backwards registers as overlap, not as missing slices.
        assert!(blocks[0].reasons().has(ReasonKind::OverlappingSlices));
    }

    #[test]
    fn test_completeness_over_messy_input() {
        let mut records = vec![
            slice("a", 0.0),
            slice("b", 2.0),
            slice("b2", 2.0),
            PlainRecord::new("blind"),
            slice("c", 4.0),
            slice("d", 11.0),
        ];
        records.push(slice("e", 13.0));
        let blocks = EquiDistantBlocksSorter::new().sort(&refs(&records));
        let total: usize = blocks.iter().map(Block::len).sum();
        assert_eq!(total, records.len());

        let mut seen: Vec<String> = blocks.iter().flat_map(|b| names(b)).collect();
        seen.sort();
        let mut expected: Vec<String> =
            records.iter().map(|r| r.display_name()).collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_determinism() {
        let records: Vec<PlainRecord> = (0..12)
            .map(|i| slice(&format!("s{i}"), if i % 5 == 0 { 7.0 * i as f64 } else { 2.0 * i as f64 }))
            .collect();
        let sorter = EquiDistantBlocksSorter::new();
        let first = sorter.sort(&refs(&records));
        let second = sorter.sort(&refs(&records));
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(names(a), names(b));
            assert_eq!(a.reasons(), b.reasons());
        }
    }

    #[test]
    fn test_distance_inconsistency_self_heals() {
        // A duplicate mid-stack records overlap, but the block keeps
        // growing and no stale distance complaint survives.
        let records = vec![
            slice("a", 0.0),
            slice("b", 2.0),
            slice("b2", 2.0),
            slice("c", 4.0),
            slice("d", 6.0),
        ];
        let blocks = EquiDistantBlocksSorter::new().sort(&refs(&records));
        assert_eq!(blocks.len(), 2);
        assert!(!blocks[0].reasons().has(ReasonKind::SliceDistanceInconsistency));
    }
}
