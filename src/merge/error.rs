//! Error types for merge creation and aggregation.

use thiserror::Error;

use crate::library::LibraryError;
use crate::source::SourceError;
use crate::sync::SyncError;

/// Errors from building or aggregating a merge group.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A work named in the operation does not exist.
    #[error("work not found: id {0}")]
    WorkNotFound(i64),

    /// The work is not a merge group.
    #[error("work {0} is not a merged work")]
    NotMerged(i64),

    /// The work is already part of this merge group.
    #[error("work is already part of the merge group")]
    AlreadyMerged,

    /// A merged work with the same remote key already exists and is in the
    /// library; a second group over the same key is not allowed.
    #[error("a merged work with the same key already exists")]
    DuplicateMerge,

    /// A reference is configured in a way aggregation cannot honor.
    #[error("reference {reference_id} is misconfigured: {reason}")]
    Config {
        /// The offending reference.
        reference_id: i64,
        /// What is wrong with it.
        reason: String,
    },

    /// A per-source fetch failed.
    #[error("source fetch failed: {0}")]
    Fetch(#[from] SourceError),

    /// Syncing a backing work failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// A library read or write failed.
    #[error(transparent)]
    Library(#[from] LibraryError),

    /// A per-source fetch task panicked or was cancelled.
    #[error("fetch task aborted")]
    TaskAborted,
}
