//! Persisted library model: works, chapters and merge references.
//!
//! A work is either a simple work bound to one source or a merged work
//! (`source_id == MERGED_SOURCE_ID`) that aggregates the chapters of other
//! works through [`MergedWorkReference`] rows. Chapter identity within a
//! work is the chapter url; numeric ids are storage handles only.

mod chapter;
mod error;
mod reference;
mod store;
mod work;

pub use chapter::ChapterRecord;
pub use error::{DbErrorKind, LibraryError};
pub use reference::MergedWorkReference;
pub use store::{AppliedSync, LibraryStore};
pub use work::{ChapterSortMode, FilterState, LibraryEntry, NewWork, Work, WorkKind};

/// The reserved source id that marks a work as a merge group.
///
/// No real source adapter may register under this id; a work carrying it has
/// no remote of its own and is materialized from its references instead.
pub const MERGED_SOURCE_ID: i64 = 6969;
