//! Two-stage composition of the tag grouper and the block sorter.
//!
//! Stage one partitions records into groups with identical distinguishing
//! tag values and orders each group; stage two runs the geometric block
//! analysis once per group. Group-level reasons are cloned into every
//! descendant block, so a block always explains the full chain of
//! decisions that produced it.

use crate::block_sorter::{Block, EquiDistantBlocksSorter};
use crate::record::RecordRef;
use crate::tag_grouper::TagGroupSorter;

/// Runs records through grouping (optional) and block analysis.
///
/// # Examples
///
/// ```
/// use stacksort::{
///     EquiDistantBlocksSorter, ImagePositionCriterion, PlainRecord, SliceRecord,
///     SortingPipeline, TagGroupSorter, TagId,
/// };
///
/// let series = TagId::new(0x0020, 0x000e);
/// let slice = |name: &str, series_uid: &str, z: f64| {
///     PlainRecord::new(name)
///         .with_tag(series, series_uid)
///         .with_tag(TagId::IMAGE_POSITION, &format!("0\\0\\{z}"))
///         .with_tag(TagId::IMAGE_ORIENTATION, "1\\0\\0\\0\\1\\0")
/// };
/// let records = vec![
///     slice("a2", "1", 2.0),
///     slice("b1", "2", 0.0),
///     slice("a1", "1", 0.0),
/// ];
/// let refs: Vec<&dyn SliceRecord> =
///     records.iter().map(|r| r as &dyn SliceRecord).collect();
///
/// let pipeline = SortingPipeline::new(EquiDistantBlocksSorter::new()).with_tag_sorter(
///     TagGroupSorter::new()
///         .with_distinguishing_tag(series)
///         .with_criterion(Box::new(ImagePositionCriterion::new())),
/// );
/// let blocks = pipeline.sort(&refs);
/// assert_eq!(blocks.len(), 2);
/// ```
pub struct SortingPipeline {
    tag_sorter: Option<TagGroupSorter>,
    block_sorter: EquiDistantBlocksSorter,
}

impl SortingPipeline {
    /// Creates a pipeline running only the geometric block stage.
    #[must_use]
    pub fn new(block_sorter: EquiDistantBlocksSorter) -> Self {
        Self { tag_sorter: None, block_sorter }
    }

    /// Adds the grouping/ordering stage in front of the block stage.
    #[must_use]
    pub fn with_tag_sorter(mut self, tag_sorter: TagGroupSorter) -> Self {
        self.tag_sorter = Some(tag_sorter);
        self
    }

    /// Partitions `records` into reconstructable blocks.
    ///
    /// Every input record appears in exactly one output block; zero
    /// records yield zero blocks.
    #[must_use]
    pub fn sort<'a>(&self, records: &[RecordRef<'a>]) -> Vec<Block<'a>> {
        let blocks = match &self.tag_sorter {
            Some(tag_sorter) => {
                let groups = tag_sorter.sort(records);
                log::debug!("tag grouping produced {} group(s)", groups.len());
                let mut blocks = Vec::new();
                for group in &groups {
                    blocks.extend(
                        self.block_sorter.sort_with_inherited(group.records(), group.reasons()),
                    );
                }
                blocks
            }
            None => self.block_sorter.sort(records),
        };

        log_run_summary(records.len(), &blocks);
        blocks
    }
}

/// Logs a one-shot summary of a pipeline run: counts plus a histogram of
/// the reasons that caused splits.
fn log_run_summary(record_count: usize, blocks: &[Block<'_>]) {
    log::info!("Volume partitioning summary:");
    log::info!("  Input records: {record_count}");
    log::info!("  Output blocks: {}", blocks.len());

    let tilted = blocks.iter().filter(|b| b.tilt_info().is_some()).count();
    if tilted > 0 {
        log::info!("  Gantry-tilted blocks: {tilted}");
    }

    let mut histogram: std::collections::BTreeMap<&'static str, usize> =
        std::collections::BTreeMap::new();
    for block in blocks {
        for reason in block.reasons().iter() {
            *histogram.entry(reason.kind.description()).or_default() += 1;
        }
    }
    for (description, count) in &histogram {
        log::info!("  Blocks with {description}: {count}");
    }
}
