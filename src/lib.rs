#![deny(unsafe_code)]
// Clippy lint configuration for CI
// These lints are allowed because:
// - cast_*: Geometric code intentionally casts between numeric types
// - missing_errors_doc/missing_panics_doc: Documentation improvements tracked separately
// - module_name_repetitions: Public type names are chosen for call-site clarity
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args
)]

//! # stacksort - Volume Block Sorting Library
//!
//! This library partitions an unordered batch of per-slice acquisition
//! records into internally-consistent 3D (or 3D+t) volume blocks that are
//! safe to reconstruct as one regularly-sampled image. Real-world
//! acquisition metadata is messy — inconsistent spacing, missing slices,
//! duplicated positions, gantry-tilted stacks — so the partitioning uses
//! tolerance-based geometric reasoning rather than naive sorting, and
//! explains every cut with a typed split reason instead of failing.
//!
//! ## Overview
//!
//! Two sorters form a two-stage pipeline over the same abstract records:
//!
//! - **[`tag_grouper`]** - groups records by identical (optionally
//!   normalized) values of distinguishing tags and orders each group with
//!   a pluggable criterion, re-splitting on ordering inconsistencies
//! - **[`block_sorter`]** - walks an ordered run once, learns the expected
//!   inter-slice displacement, and splits off a new block whenever the
//!   geometry deviates beyond tolerance or shows an unsupported shear
//!
//! Supporting modules:
//!
//! - **[`record`]** - the [`SliceRecord`] capability and [`TagId`] keys
//! - **[`processor`]** - tag value normalization for grouping keys
//! - **[`criterion`]** - chainable ordering criteria with numeric distances
//! - **[`reasons`]** - typed, payload-carrying split diagnostics
//! - **[`geometry`]** - vectors, tag-value parsing, gantry tilt
//!   classification
//! - **[`pipeline`]** - the two-stage composition with summary logging
//!
//! ## Quick Start
//!
//! ```
//! use stacksort::{
//!     EquiDistantBlocksSorter, ImagePositionCriterion, PlainRecord, SliceRecord,
//!     SortingPipeline, TagGroupSorter, TagId,
//! };
//!
//! let series = TagId::new(0x0020, 0x000e);
//! let slice = |name: &str, z: f64| {
//!     PlainRecord::new(name)
//!         .with_tag(series, "1.2.3")
//!         .with_tag(TagId::IMAGE_POSITION, &format!("0\\0\\{z}"))
//!         .with_tag(TagId::IMAGE_ORIENTATION, "1\\0\\0\\0\\1\\0")
//! };
//! let records = vec![slice("s2", 2.0), slice("s0", 0.0), slice("s1", 1.0)];
//! let refs: Vec<&dyn SliceRecord> =
//!     records.iter().map(|r| r as &dyn SliceRecord).collect();
//!
//! let pipeline = SortingPipeline::new(EquiDistantBlocksSorter::new()).with_tag_sorter(
//!     TagGroupSorter::new()
//!         .with_distinguishing_tag(series)
//!         .with_criterion(Box::new(ImagePositionCriterion::new())),
//! );
//!
//! let blocks = pipeline.sort(&refs);
//! assert_eq!(blocks.len(), 1);
//! assert_eq!(blocks[0].records()[0].display_name(), "s0");
//! ```
//!
//! ## Design notes
//!
//! - Records are only ever borrowed: the sorters never copy, mutate, or
//!   outlive their input.
//! - Sorting never fails. Anything inconsistent degrades into more,
//!   smaller blocks, each annotated with [`ReasonKind`] diagnostics;
//!   only configuration (tolerances, fractions) is fallible.
//! - Everything is synchronous and invocation-local. Independent sorter
//!   invocations can be parallelized freely by the caller.

pub mod block_sorter;
pub mod criterion;
pub mod errors;
pub mod geometry;
pub mod pipeline;
pub mod processor;
pub mod reasons;
pub mod record;
pub mod tag_grouper;

pub use block_sorter::{
    Block, EquiDistantBlocksSorter, ToleratedOriginOffset, DEFAULT_ADAPTIVE_TOLERANCE_FRACTION,
};
pub use criterion::{ImagePositionCriterion, SortCriterion, TagValueCriterion};
pub use errors::{Result, StacksortError};
pub use geometry::{parse_orientation, parse_vec3, GantryTiltInfo, Vec3};
pub use pipeline::SortingPipeline;
pub use processor::{CutDecimalPlaces, ValueProcessor};
pub use reasons::{ReasonKind, SplitReason, SplitReasonSet};
pub use record::{PlainRecord, RecordRef, SliceRecord, TagId};
pub use tag_grouper::{Group, TagGroupSorter, DEFAULT_STRICT_TOLERANCE_FRACTION};
