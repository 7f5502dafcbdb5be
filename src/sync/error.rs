//! Error types for work synchronization.

use thiserror::Error;

use crate::library::LibraryError;
use crate::source::SourceError;

/// Errors from syncing one work against its source.
///
/// A source failure aborts the sync for that work before any persisted row
/// is touched; it is recoverable and retried by the caller, never here.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Fetching from the source failed; nothing was mutated.
    #[error("source fetch failed: {0}")]
    Fetch(#[from] SourceError),

    /// Applying the outcome failed; the sync counts as not-applied.
    #[error("persistence failed: {0}")]
    Persistence(#[from] LibraryError),

    /// The work does not exist.
    #[error("work not found: id {0}")]
    WorkNotFound(i64),

    /// The work is a merge group; merged works are aggregated, not synced.
    #[error("work {0} is a merged work; use aggregation instead")]
    IsMerged(i64),
}
