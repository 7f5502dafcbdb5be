//! Concurrent aggregation of backing-work chapters into one merged list.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{debug, instrument, warn};

use crate::library::{ChapterRecord, MergedWorkReference};

use super::error::MergeError;

/// Supplies the reconciled chapter list for one backing reference.
///
/// # Object Safety
///
/// Uses `async_trait` so the aggregator can hold the fetcher as
/// `Arc<dyn ChapterFetcher>` and spawn one task per reference.
#[async_trait]
pub trait ChapterFetcher: Send + Sync {
    /// Returns the backing work's current chapters, syncing it first when
    /// the implementation is live rather than a fixture.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError`] on fetch or persistence failure; the
    /// aggregator records it per source and carries on.
    async fn fetch(
        &self,
        reference: &MergedWorkReference,
    ) -> Result<Vec<ChapterRecord>, MergeError>;
}

/// Per-aggregation knobs.
#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    /// Suppress same-numbered releases from lower-priority sources.
    /// Disabled keeps every group's release visible.
    pub dedupe: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self { dedupe: true }
    }
}

/// One backing source that failed during aggregation.
#[derive(Debug)]
pub struct SourceFailure {
    /// The reference whose fetch failed.
    pub reference_id: i64,
    /// The backing work behind that reference.
    pub work_id: i64,
    /// What went wrong.
    pub error: MergeError,
}

/// The aggregated chapter list plus per-source failures.
///
/// Failed sources contribute nothing to `chapters`; their persisted state is
/// untouched, so the next aggregation can pick them up again.
#[derive(Debug, Default)]
pub struct MergedChapters {
    /// Admitted chapters, in priority processing order (unsorted).
    pub chapters: Vec<ChapterRecord>,
    /// Sources whose fetch failed this cycle.
    pub failures: Vec<SourceFailure>,
}

/// Fetches all participating references concurrently and builds the
/// deduplicated merged chapter list.
///
/// Participants are the references with `get_chapter_updates` set, excluding
/// the group's self reference. Fetches run concurrently and independently; a
/// failure on one source is recorded in the result and never aborts the
/// others. Results are then processed in descending `chapter_priority` order
/// with ties broken by the references' original order.
///
/// # Errors
///
/// Infallible at the aggregate level by design; per-source errors are
/// returned inside [`MergedChapters::failures`]. The only hard error is a
/// panicked or cancelled fetch task, surfaced as [`MergeError::TaskAborted`].
#[instrument(skip(references, fetcher, options), fields(references = references.len(), dedupe = options.dedupe))]
pub async fn aggregate(
    references: &[MergedWorkReference],
    fetcher: Arc<dyn ChapterFetcher>,
    options: &AggregateOptions,
) -> Result<MergedChapters, MergeError> {
    let participants: Vec<MergedWorkReference> = references
        .iter()
        .filter(|r| r.get_chapter_updates && !r.is_self_reference())
        .cloned()
        .collect();

    let tasks = participants.iter().map(|reference| {
        let fetcher = Arc::clone(&fetcher);
        let reference = reference.clone();
        tokio::spawn(async move {
            let chapters = fetcher.fetch(&reference).await;
            (reference, chapters)
        })
    });

    let mut fetched = Vec::with_capacity(participants.len());
    for joined in join_all(tasks).await {
        fetched.push(joined.map_err(|_| MergeError::TaskAborted)?);
    }

    // Priority order, insertion order on ties.
    let mut ordered: Vec<(usize, MergedWorkReference, Result<Vec<ChapterRecord>, MergeError>)> =
        fetched
            .into_iter()
            .enumerate()
            .map(|(idx, (reference, chapters))| (idx, reference, chapters))
            .collect();
    ordered.sort_by_key(|(idx, reference, _)| (Reverse(reference.chapter_priority), *idx));

    let mut result = MergedChapters::default();
    let mut seen_numbers: HashSet<i64> = HashSet::new();

    for (_, reference, outcome) in ordered {
        let chapters = match outcome {
            Ok(chapters) => chapters,
            Err(error) => {
                warn!(
                    reference_id = reference.id,
                    work_id = reference.work_id,
                    %error,
                    "backing source failed, skipping this cycle"
                );
                result.failures.push(SourceFailure {
                    reference_id: reference.id,
                    work_id: reference.work_id,
                    error,
                });
                continue;
            }
        };

        let admitted = admit_chapters(chapters, options, &mut seen_numbers);
        debug!(
            reference_id = reference.id,
            priority = reference.chapter_priority,
            admitted = admitted.len(),
            "processed backing source"
        );
        result.chapters.extend(admitted);
    }

    Ok(result)
}

/// Normalizes a chapter number for identity comparison (two decimals of
/// precision, matching how sources express sub-chapters).
#[allow(clippy::cast_possible_truncation)]
fn number_key(number: f64) -> i64 {
    (number * 100.0).round() as i64
}

/// Admits one source's chapters against the already-seen numbers.
///
/// Chapters without a usable number are always admitted; number-based
/// identity is unreliable for them.
fn admit_chapters(
    chapters: Vec<ChapterRecord>,
    options: &AggregateOptions,
    seen_numbers: &mut HashSet<i64>,
) -> Vec<ChapterRecord> {
    if !options.dedupe {
        return chapters;
    }
    chapters
        .into_iter()
        .filter(|chapter| {
            if !chapter.has_known_number() {
                return true;
            }
            seen_numbers.insert(number_key(chapter.chapter_number))
        })
        .collect()
}
