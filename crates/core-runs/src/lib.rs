//! Run partitions over a cell's text: character styles and hyperlinks.
//!
//! Layering (leaf first):
//! - `partition`: sorted, non-overlapping half-open ranges with a payload and
//!   the shared geometric re-indexing rule applied on every text edit.
//! - `style`: sparse `CellStyle` runs; normalization, extraction from
//!   externally supplied fragments, uniform-attribute folding.
//! - `link`: identified link runs plus the read-only `ActualLengthMap`.
//! - `translate`: actual-value <-> display offset mapping for read-only cells.
//! - `project`: merged sweep producing tagged render segments.
//!
//! All offsets are char offsets (see `core_text`).

pub mod error;
pub mod fragment;
pub mod link;
pub mod partition;
pub mod project;
pub mod style;
pub mod translate;

pub use error::{RunError, check_range};
pub use fragment::{FragmentLink, StyledFragment, TaggedFragment};
pub use link::{ActualLengthMap, LinkId, LinkIds, LinkRun, LinkRuns, PersistedLink};
pub use partition::{Partition, Run};
pub use project::{Segment, SegmentTag, project};
pub use style::{CellStyle, StyleRun, StyleRuns};
pub use translate::{DisplayView, OffsetTranslator, substitute_labels};
