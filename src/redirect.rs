//! Canonical-entry resolution for duplicate catalog entries.
//!
//! When several library entries turn out to represent the same physical
//! work, one of them is picked as the root the user should migrate to and
//! the rest become redirect candidates. The decision also reports whether a
//! non-root candidate carries content the root lacks, so the caller can
//! warn before migrating.

use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::library::{ChapterRecord, Work};

/// One catalog entry competing to be the canonical root.
#[derive(Debug, Clone)]
pub struct RedirectCandidate {
    /// The library entry.
    pub work: Work,
    /// Its persisted chapters.
    pub chapters: Vec<ChapterRecord>,
}

/// The outcome of resolving a redirect group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectDecision {
    /// The work the group should collapse into.
    pub accepted_work_id: i64,
    /// True when some non-accepted candidate has a chapter the accepted
    /// entry lacks; migrating would lose access to it.
    pub has_new_content: bool,
}

/// Picks the canonical entry for a group of duplicates.
///
/// Favorited entries win so the user's library entry (with its read state
/// and settings) survives; among favorites the oldest (lowest id) wins.
/// When nothing is favorited the oldest entry overall is accepted. Returns
/// `None` for an empty group.
#[instrument(skip(candidates), fields(candidates = candidates.len()))]
#[must_use]
pub fn resolve_root(candidates: &[RedirectCandidate]) -> Option<RedirectDecision> {
    let accepted = candidates
        .iter()
        .filter(|c| c.work.favorite)
        .min_by_key(|c| c.work.id)
        .or_else(|| candidates.iter().min_by_key(|c| c.work.id))?;

    let known: HashSet<&str> = accepted
        .chapters
        .iter()
        .map(ChapterRecord::identity_key)
        .collect();
    let has_new_content = candidates
        .iter()
        .filter(|c| c.work.id != accepted.work.id)
        .flat_map(|c| c.chapters.iter())
        .any(|chapter| !known.contains(chapter.identity_key()));

    debug!(
        accepted_work_id = accepted.work.id,
        has_new_content, "resolved redirect root"
    );
    Some(RedirectDecision {
        accepted_work_id: accepted.work.id,
        has_new_content,
    })
}
