//! The reconciliation algorithm.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use crate::library::ChapterRecord;
use crate::recognition::{UNKNOWN_NUMBER, parse_chapter_number};
use crate::scanlator::canonical_scanlator;
use crate::source::RawChapter;

/// Result of reconciling one fetched chapter list against the persisted one.
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    /// Fetched chapters with no persisted counterpart; ids are unassigned.
    pub new: Vec<ChapterRecord>,
    /// Persisted chapters whose source-derived fields changed. User state
    /// (read, bookmark, last page) is carried over untouched.
    pub updated: Vec<ChapterRecord>,
    /// Persisted chapters absent from the fetch. Removal candidates only;
    /// deletion is gated by a [`super::RemovalPolicy`] when applying.
    pub removed: Vec<ChapterRecord>,
}

impl SyncOutcome {
    /// Returns true when the fetch matched the persisted state exactly.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.new.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Reconciles a fetched chapter list against the persisted list of a work.
///
/// Identity is the chapter url, nothing else: a fetched chapter with a
/// persisted url match is the same chapter even if its name, number or
/// scanlator changed; those become an update that preserves the persisted
/// record's user state. Chapters the source no longer lists are reported as
/// removal candidates but never deleted here.
///
/// Chapter numbers missing from the fetch are recognized from the display
/// name; unrecognizable names store the `-1.0` sentinel instead of failing
/// the sync. Duplicate urls within one fetch are dropped (first occurrence
/// wins) so the outcome always has pairwise-distinct identity keys.
#[instrument(skip(persisted, fetched), fields(persisted = persisted.len(), fetched = fetched.len()))]
#[must_use]
pub fn reconcile(
    work_id: i64,
    persisted: &[ChapterRecord],
    fetched: &[RawChapter],
    now: i64,
) -> SyncOutcome {
    let by_url: HashMap<&str, &ChapterRecord> = persisted
        .iter()
        .map(|chapter| (chapter.url.as_str(), chapter))
        .collect();

    let mut outcome = SyncOutcome::default();
    let mut seen: HashSet<&str> = HashSet::with_capacity(fetched.len());

    for (index, raw) in fetched.iter().enumerate() {
        if !seen.insert(raw.url.as_str()) {
            debug!(url = %raw.url, "duplicate chapter url in fetched list, keeping first");
            continue;
        }

        let source_order = to_order(index);
        match by_url.get(raw.url.as_str()) {
            Some(existing) => {
                let refreshed = refresh_record(existing, raw, source_order);
                if refreshed != **existing {
                    outcome.updated.push(refreshed);
                }
            }
            None => outcome.new.push(new_record(work_id, raw, source_order, now)),
        }
    }

    outcome.removed = persisted
        .iter()
        .filter(|chapter| !seen.contains(chapter.url.as_str()))
        .cloned()
        .collect();

    debug!(
        new = outcome.new.len(),
        updated = outcome.updated.len(),
        removed = outcome.removed.len(),
        "reconciled chapter list"
    );
    outcome
}

/// Resolves the chapter number for a raw chapter: source-provided when
/// usable, otherwise recognized from the name, otherwise the sentinel.
fn resolve_number(raw: &RawChapter) -> f64 {
    match raw.chapter_number {
        Some(number) if number.is_finite() && number >= 0.0 => number,
        _ => parse_chapter_number(&raw.name).max(UNKNOWN_NUMBER),
    }
}

/// Builds a fresh record with default user state.
fn new_record(work_id: i64, raw: &RawChapter, source_order: i64, now: i64) -> ChapterRecord {
    ChapterRecord {
        id: 0,
        work_id,
        url: raw.url.clone(),
        name: raw.name.clone(),
        chapter_number: resolve_number(raw),
        volume: raw.volume.clone(),
        scanlator: canonical_scanlator(raw.scanlator.as_deref()),
        read: false,
        bookmark: false,
        last_page_read: 0,
        date_fetch: now,
        date_upload: raw.date_upload.unwrap_or(0),
        source_order,
    }
}

/// Copies a persisted record and overwrites only the source-derived fields.
fn refresh_record(existing: &ChapterRecord, raw: &RawChapter, source_order: i64) -> ChapterRecord {
    let mut refreshed = existing.clone();
    refreshed.name = raw.name.clone();
    refreshed.chapter_number = resolve_number(raw);
    refreshed.volume = raw.volume.clone();
    refreshed.scanlator = canonical_scanlator(raw.scanlator.as_deref());
    refreshed.date_upload = raw.date_upload.unwrap_or(existing.date_upload);
    refreshed.source_order = source_order;
    refreshed
}

#[allow(clippy::cast_possible_wrap)]
fn to_order(index: usize) -> i64 {
    index as i64
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn persisted_chapter(url: &str, number: f64) -> ChapterRecord {
        ChapterRecord {
            id: 11,
            work_id: 1,
            url: url.to_string(),
            name: "Ch.1".to_string(),
            chapter_number: number,
            volume: None,
            scanlator: None,
            read: false,
            bookmark: false,
            last_page_read: 0,
            date_fetch: 100,
            date_upload: 0,
            source_order: 0,
        }
    }

    fn raw_chapter(url: &str, name: &str, number: Option<f64>) -> RawChapter {
        RawChapter {
            url: url.to_string(),
            name: name.to_string(),
            chapter_number: number,
            volume: None,
            scanlator: None,
            date_upload: None,
            upload_id: None,
        }
    }

    #[test]
    fn test_unchanged_fetch_is_noop() {
        let persisted = vec![persisted_chapter("/c1", 1.0)];
        let fetched = vec![raw_chapter("/c1", "Ch.1", Some(1.0))];
        let outcome = reconcile(1, &persisted, &fetched, 200);
        assert!(outcome.is_noop());
    }

    #[test]
    fn test_renamed_chapter_updates_and_preserves_user_state() {
        let mut read_chapter = persisted_chapter("/c1", 1.0);
        read_chapter.read = true;
        read_chapter.bookmark = true;
        read_chapter.last_page_read = 14;

        let fetched = vec![raw_chapter("/c1", "Ch.1 v2", Some(1.0))];
        let outcome = reconcile(1, &[read_chapter], &fetched, 200);

        assert!(outcome.new.is_empty());
        assert!(outcome.removed.is_empty());
        assert_eq!(outcome.updated.len(), 1);
        let updated = &outcome.updated[0];
        assert_eq!(updated.name, "Ch.1 v2");
        assert!(updated.read);
        assert!(updated.bookmark);
        assert_eq!(updated.last_page_read, 14);
        assert_eq!(updated.id, 11);
        assert_eq!(updated.date_fetch, 100);
    }

    #[test]
    fn test_unknown_url_becomes_new_record_with_default_state() {
        let outcome = reconcile(1, &[], &[raw_chapter("/c2", "Ch.2", Some(2.0))], 200);
        assert_eq!(outcome.new.len(), 1);
        let record = &outcome.new[0];
        assert_eq!(record.id, 0);
        assert!(!record.read);
        assert!(!record.bookmark);
        assert_eq!(record.date_fetch, 200);
        assert_eq!(record.work_id, 1);
    }

    #[test]
    fn test_missing_chapter_is_reported_not_deleted() {
        let persisted = vec![persisted_chapter("/c1", 1.0), persisted_chapter("/c2", 2.0)];
        let fetched = vec![raw_chapter("/c1", "Ch.1", Some(1.0))];
        let outcome = reconcile(1, &persisted, &fetched, 200);
        assert_eq!(outcome.removed.len(), 1);
        assert_eq!(outcome.removed[0].url, "/c2");
    }

    #[test]
    fn test_number_recognized_from_name_when_missing() {
        let outcome = reconcile(1, &[], &[raw_chapter("/c3", "Chapter 24.5", None)], 200);
        assert_eq!(outcome.new[0].chapter_number, 24.5);
    }

    #[test]
    fn test_unparseable_number_stores_sentinel() {
        let outcome = reconcile(1, &[], &[raw_chapter("/extra", "Oneshot", None)], 200);
        assert_eq!(outcome.new[0].chapter_number, UNKNOWN_NUMBER);
    }

    #[test]
    fn test_negative_source_number_falls_back_to_recognition() {
        let outcome = reconcile(1, &[], &[raw_chapter("/c4", "Ch. 4", Some(-5.0))], 200);
        assert_eq!(outcome.new[0].chapter_number, 4.0);
    }

    #[test]
    fn test_duplicate_urls_in_fetch_keep_first() {
        let fetched = vec![
            raw_chapter("/c1", "Ch.1", Some(1.0)),
            raw_chapter("/c1", "Ch.1 dup", Some(1.0)),
        ];
        let outcome = reconcile(1, &[], &fetched, 200);
        assert_eq!(outcome.new.len(), 1);
        assert_eq!(outcome.new[0].name, "Ch.1");
    }

    #[test]
    fn test_output_identity_keys_are_distinct() {
        let fetched = vec![
            raw_chapter("/c1", "Ch.1", Some(1.0)),
            raw_chapter("/c2", "Ch.2", Some(2.0)),
            raw_chapter("/c2", "Ch.2 alt", Some(2.0)),
        ];
        let outcome = reconcile(1, &[], &fetched, 200);
        let mut urls: Vec<&str> = outcome.new.iter().map(|c| c.url.as_str()).collect();
        urls.sort_unstable();
        urls.dedup();
        assert_eq!(urls.len(), outcome.new.len());
    }

    #[test]
    fn test_scanlator_canonicalized_on_ingest() {
        let mut raw = raw_chapter("/c1", "Ch.1", Some(1.0));
        raw.scanlator = Some("zeta & Alpha".to_string());
        let outcome = reconcile(1, &[], &[raw], 200);
        assert_eq!(outcome.new[0].scanlator.as_deref(), Some("Alpha & zeta"));
    }

    #[test]
    fn test_source_order_change_produces_update() {
        let mut first = persisted_chapter("/c1", 1.0);
        first.source_order = 0;
        let mut second = persisted_chapter("/c2", 2.0);
        second.name = "Ch.2".to_string();
        second.chapter_number = 2.0;
        second.source_order = 1;

        // Source now lists them in the opposite order.
        let fetched = vec![
            raw_chapter("/c2", "Ch.2", Some(2.0)),
            raw_chapter("/c1", "Ch.1", Some(1.0)),
        ];
        let outcome = reconcile(1, &[first, second], &fetched, 200);
        assert_eq!(outcome.updated.len(), 2);
    }
}
