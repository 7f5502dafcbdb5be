//! Two-way reconciliation against an external tracking service.
//!
//! The tracker only knows "last chapter number read"; the local library
//! knows per-chapter state. Reconciliation converges the two: remote
//! progress marks local chapters read, and local progress ahead of the
//! remote is pushed back as a new remote number.

use tracing::{debug, instrument};

use crate::library::ChapterRecord;

/// What has to change to converge local and remote progress.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackUpdate {
    /// Local chapter ids to mark read.
    pub mark_read: Vec<i64>,
    /// New remote last-read number to push, when local progress is ahead.
    pub remote_last_read: Option<f64>,
}

impl TrackUpdate {
    /// Returns true when both sides already agree.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.mark_read.is_empty() && self.remote_last_read.is_none()
    }
}

/// Computes the update that converges local chapters with the tracker's
/// last-read number.
///
/// Unread chapters with a usable number at or below `remote_last_read` are
/// marked read. Chapters without a usable number are never touched; the
/// tracker's numeric scale says nothing about them. When the highest read
/// local number exceeds the remote, that number is pushed back.
#[instrument(skip(chapters), fields(chapters = chapters.len()))]
#[must_use]
pub fn reconcile_tracker(chapters: &[ChapterRecord], remote_last_read: f64) -> TrackUpdate {
    let mut update = TrackUpdate::default();

    for chapter in chapters {
        if !chapter.read
            && chapter.has_known_number()
            && chapter.chapter_number <= remote_last_read
        {
            update.mark_read.push(chapter.id);
        }
    }

    let local_max = chapters
        .iter()
        .filter(|c| c.read && c.has_known_number())
        .map(|c| c.chapter_number)
        .fold(f64::NEG_INFINITY, f64::max);
    if local_max > remote_last_read {
        update.remote_last_read = Some(local_max);
    }

    debug!(
        mark_read = update.mark_read.len(),
        push = ?update.remote_last_read,
        "reconciled tracker state"
    );
    update
}
