//! Merged-work aggregation: combining several backing works' chapters into
//! one deduplicated, ordered list.
//!
//! The aggregated list is recomputed on every cycle from the backing works'
//! persisted chapters; it is never stored as a separate copy, so changing
//! the dedup policy or a reference's priority takes effect on the next view.

mod aggregator;
mod error;
mod sort;

pub use aggregator::{
    AggregateOptions, ChapterFetcher, MergedChapters, SourceFailure, aggregate,
};
pub use error::MergeError;
pub use sort::{apply_scanlator_filter, apply_state_filters, sort_chapters};
