//! The caller-facing service: syncing, merging, aggregation and progress.
//!
//! Pull-based by design: every operation is a call returning a value, and
//! the caller decides how to notify observers. All collaborators (store,
//! source registry, removal policy) are passed in at construction; there is
//! no ambient lookup.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::library::{
    ChapterRecord, LibraryEntry, LibraryStore, MERGED_SOURCE_ID, MergedWorkReference, NewWork,
    Work,
};
use crate::merge::{
    AggregateOptions, ChapterFetcher, MergeError, MergedChapters, aggregate,
    apply_scanlator_filter, apply_state_filters, sort_chapters,
};
use crate::redirect::{RedirectCandidate, RedirectDecision, resolve_root};
use crate::source::SourceRegistry;
use crate::sync::{RemovalPolicy, SyncError, reconcile};
use crate::track::{TrackUpdate, reconcile_tracker};

/// Result of syncing one work against its source.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Chapters inserted this sync.
    pub new: usize,
    /// Chapters whose source-derived fields were rewritten.
    pub updated: usize,
    /// Chapters no longer listed by the source. Informational; only the
    /// removal policy decides whether any were deleted.
    pub removed_candidates: Vec<ChapterRecord>,
    /// Removal candidates actually deleted.
    pub deleted: usize,
}

/// Current epoch time in milliseconds.
fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

/// Orchestrates sync, merge aggregation, redirects and progress updates
/// over one library.
///
/// Cheap to clone; clones share the store pool, the source registry and the
/// per-work lock table.
#[derive(Debug, Clone)]
pub struct LibraryService {
    store: LibraryStore,
    sources: SourceRegistry,
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
    removal_policy: RemovalPolicy,
}

impl LibraryService {
    /// Creates a service with the default (keep-everything) removal policy.
    #[must_use]
    pub fn new(store: LibraryStore, sources: SourceRegistry) -> Self {
        Self {
            store,
            sources,
            locks: Arc::new(DashMap::new()),
            removal_policy: RemovalPolicy::default(),
        }
    }

    /// Replaces the removal policy applied when syncs are persisted.
    #[must_use]
    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }

    /// Access to the underlying store, for callers that manage works
    /// directly.
    #[must_use]
    pub fn store(&self) -> &LibraryStore {
        &self.store
    }

    /// Returns the lock serializing syncs of one work.
    fn work_lock(&self, work_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .entry(work_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ---- sync --------------------------------------------------------------

    /// Syncs one simple work against its source and persists the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::WorkNotFound`] for an unknown id and
    /// [`SyncError::IsMerged`] for a merge group (aggregate those instead).
    /// A fetch failure aborts before any persisted row is touched.
    #[instrument(skip(self))]
    pub async fn sync_work(&self, work_id: i64) -> Result<SyncReport, SyncError> {
        let work = self
            .store
            .get_work(work_id)
            .await?
            .ok_or(SyncError::WorkNotFound(work_id))?;
        if work.is_merged() {
            return Err(SyncError::IsMerged(work_id));
        }
        self.sync_simple(&work).await
    }

    async fn sync_simple(&self, work: &Work) -> Result<SyncReport, SyncError> {
        let lock = self.work_lock(work.id);
        let _guard = lock.lock().await;

        let adapter = self.sources.get_or_err(work.source_id)?;
        let fetched = adapter.fetch_chapter_list(&work.url).await?;

        let persisted = self.store.chapters_for_work(work.id).await?;
        let outcome = reconcile(work.id, &persisted, &fetched, now_millis());

        let applied = self
            .store
            .apply_sync(work.id, &outcome, &self.removal_policy)
            .await?;

        debug!(work_id = work.id, ?applied, "synced work");
        Ok(SyncReport {
            new: applied.inserted,
            updated: applied.updated,
            removed_candidates: outcome.removed,
            deleted: applied.deleted,
        })
    }

    // ---- aggregation --------------------------------------------------------

    /// Syncs every participating backing work of a merge group and returns
    /// the deduplicated, filtered, sorted chapter list.
    ///
    /// Per-source failures are reported inside the result; they exclude that
    /// source from this cycle but never abort the others.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::WorkNotFound`] / [`MergeError::NotMerged`] when
    /// `merge_id` is not a merge group.
    #[instrument(skip(self, options))]
    pub async fn aggregate_merged_work(
        &self,
        merge_id: i64,
        options: &AggregateOptions,
    ) -> Result<MergedChapters, MergeError> {
        let entry = self
            .store
            .get_entry(merge_id)
            .await?
            .ok_or(MergeError::WorkNotFound(merge_id))?;
        let LibraryEntry::Merged { work, references } = entry else {
            return Err(MergeError::NotMerged(merge_id));
        };

        let fetcher: Arc<dyn ChapterFetcher> = Arc::new(self.clone());
        let mut merged = aggregate(&references, fetcher, options).await?;

        apply_scanlator_filter(&mut merged.chapters, &work.filtered_scanlator_set());
        sort_chapters(&mut merged.chapters, work.sort_mode(), work.sort_descending);
        Ok(merged)
    }

    /// Returns a work's chapter list as the user sees it: aggregated for a
    /// merge group, straight from persistence otherwise, with the work's
    /// sort and display filters applied.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::WorkNotFound`] for an unknown id; aggregation
    /// errors pass through for merge groups.
    #[instrument(skip(self))]
    pub async fn visible_chapters(&self, work_id: i64) -> Result<Vec<ChapterRecord>, MergeError> {
        let entry = self
            .store
            .get_entry(work_id)
            .await?
            .ok_or(MergeError::WorkNotFound(work_id))?;

        let (work, mut chapters) = match entry {
            LibraryEntry::Merged { work, .. } => {
                let merged = self
                    .aggregate_merged_work(work.id, &AggregateOptions::default())
                    .await?;
                (work, merged.chapters)
            }
            LibraryEntry::Simple(work) => {
                let mut chapters = self.store.chapters_for_work(work.id).await?;
                apply_scanlator_filter(&mut chapters, &work.filtered_scanlator_set());
                sort_chapters(&mut chapters, work.sort_mode(), work.sort_descending);
                (work, chapters)
            }
        };

        apply_state_filters(&mut chapters, work.read_filter(), work.bookmarked_filter());
        Ok(chapters)
    }

    // ---- merge management ----------------------------------------------------

    /// Merges `work_id` into `into_work_id`.
    ///
    /// When the target is already a merge group the work is appended as a
    /// new reference. Otherwise a merge group is created over the target:
    /// the target becomes the info reference supplying work-level metadata,
    /// the work joins as a plain reference, and the group's self reference
    /// is added. Returns the merge group's work row.
    ///
    /// # Errors
    ///
    /// [`MergeError::AlreadyMerged`] when the work is already in the group
    /// (or is itself a group), [`MergeError::DuplicateMerge`] when a
    /// favorited merge group over the same key already exists.
    #[instrument(skip(self))]
    pub async fn smart_merge(&self, work_id: i64, into_work_id: i64) -> Result<Work, MergeError> {
        let work = self
            .store
            .get_work(work_id)
            .await?
            .ok_or(MergeError::WorkNotFound(work_id))?;
        let into = self
            .store
            .get_work(into_work_id)
            .await?
            .ok_or(MergeError::WorkNotFound(into_work_id))?;

        // Merge groups cannot nest.
        if work.is_merged() {
            return Err(MergeError::AlreadyMerged);
        }

        if into.is_merged() {
            return self.append_to_merge(&into, &work).await;
        }
        self.create_merge(&into, &work).await
    }

    async fn append_to_merge(&self, merged: &Work, work: &Work) -> Result<Work, MergeError> {
        let references = self.store.references_for_merge(merged.id).await?;
        let already = references.iter().any(|r| {
            r.work_id == work.id || (r.work_url == work.url && r.work_source_id == work.source_id)
        });
        if already {
            return Err(MergeError::AlreadyMerged);
        }

        self.store
            .insert_reference(&MergedWorkReference::new(
                merged.id,
                &merged.url,
                work.id,
                &work.url,
                work.source_id,
            ))
            .await?;

        if !references.iter().any(MergedWorkReference::is_self_reference) {
            self.store
                .insert_reference(&self_reference(merged))
                .await?;
        }

        debug!(merge_id = merged.id, work_id = work.id, "appended to merge group");
        Ok(merged.clone())
    }

    async fn create_merge(&self, into: &Work, work: &Work) -> Result<Work, MergeError> {
        // A leftover group over the same key blocks creation only while the
        // user still has it in the library.
        if let Some(existing) = self
            .store
            .get_work_by_key(MERGED_SOURCE_ID, &into.url)
            .await?
        {
            if existing.favorite {
                return Err(MergeError::DuplicateMerge);
            }
            warn!(work_id = existing.id, "replacing abandoned merge group");
            self.store.delete_work(existing.id).await?;
        }

        let mut new_work = NewWork::new(MERGED_SOURCE_ID, &into.url, &into.title);
        new_work.favorite = true;
        new_work.date_added = now_millis();
        let merged = self.store.insert_work(&new_work).await?;

        let mut info = MergedWorkReference::new(
            merged.id,
            &merged.url,
            into.id,
            &into.url,
            into.source_id,
        );
        info.is_info_work = true;
        self.store.insert_reference(&info).await?;

        self.store
            .insert_reference(&MergedWorkReference::new(
                merged.id,
                &merged.url,
                work.id,
                &work.url,
                work.source_id,
            ))
            .await?;

        self.store
            .insert_reference(&self_reference(&merged))
            .await?;

        debug!(
            merge_id = merged.id,
            info_work_id = into.id,
            work_id = work.id,
            "created merge group"
        );
        Ok(merged)
    }

    /// Rewrites one reference's aggregation settings.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Config`] for a reference that was never
    /// persisted.
    #[instrument(skip(self, reference), fields(reference_id = reference.id))]
    pub async fn update_merge_settings(
        &self,
        reference: &MergedWorkReference,
    ) -> Result<(), MergeError> {
        if reference.id == 0 {
            return Err(MergeError::Config {
                reference_id: 0,
                reason: "reference was never persisted".to_string(),
            });
        }
        self.store.update_reference_settings(reference).await?;
        Ok(())
    }

    // ---- redirects -----------------------------------------------------------

    /// Resolves which of several duplicate entries the user should keep.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::WorkNotFound`] when a candidate id is unknown.
    #[instrument(skip(self, work_ids), fields(candidates = work_ids.len()))]
    pub async fn resolve_redirect(
        &self,
        work_ids: &[i64],
    ) -> Result<Option<RedirectDecision>, MergeError> {
        let mut candidates = Vec::with_capacity(work_ids.len());
        for &id in work_ids {
            let work = self
                .store
                .get_work(id)
                .await?
                .ok_or(MergeError::WorkNotFound(id))?;
            let chapters = self.store.chapters_for_work(id).await?;
            candidates.push(RedirectCandidate { work, chapters });
        }
        Ok(resolve_root(&candidates))
    }

    // ---- progress and filters --------------------------------------------------

    /// Sets a chapter's read flag; clearing it resets reading progress.
    ///
    /// # Errors
    ///
    /// Returns [`crate::library::LibraryError::ChapterNotFound`] for an
    /// unknown id.
    pub async fn set_read(&self, chapter_id: i64, read: bool) -> Result<(), MergeError> {
        self.store.set_chapter_read(chapter_id, read).await?;
        Ok(())
    }

    /// Sets a chapter's bookmark flag.
    ///
    /// # Errors
    ///
    /// Returns [`crate::library::LibraryError::ChapterNotFound`] for an
    /// unknown id.
    pub async fn set_bookmark(&self, chapter_id: i64, bookmark: bool) -> Result<(), MergeError> {
        self.store.set_chapter_bookmark(chapter_id, bookmark).await?;
        Ok(())
    }

    /// Records reading progress within a chapter.
    ///
    /// # Errors
    ///
    /// Returns [`crate::library::LibraryError::ChapterNotFound`] for an
    /// unknown id.
    pub async fn set_last_page_read(&self, chapter_id: i64, page: i64) -> Result<(), MergeError> {
        self.store.set_chapter_last_page_read(chapter_id, page).await?;
        Ok(())
    }

    /// Replaces a work's filtered scanlator set; an empty slice clears it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::library::LibraryError::WorkNotFound`] for an
    /// unknown id.
    pub async fn set_scanlator_filter(
        &self,
        work_id: i64,
        groups: &[String],
    ) -> Result<(), MergeError> {
        let set: crate::scanlator::ScanlatorSet = groups.iter().cloned().collect();
        self.store
            .set_filtered_scanlators(work_id, set.format().as_deref())
            .await?;
        Ok(())
    }

    /// Converges a work's read state with an external tracker's last-read
    /// number, marking chapters read locally and returning the number to
    /// push back when local progress is ahead.
    ///
    /// Works over the full persisted chapter set, never the display view:
    /// for a merge group that is the union of every backing work's
    /// chapters, so releases hidden by the scanlator filter or shadowed by
    /// a higher-priority duplicate still converge with the tracker.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::WorkNotFound`] for an unknown id.
    #[instrument(skip(self))]
    pub async fn apply_tracker_state(
        &self,
        work_id: i64,
        remote_last_read: f64,
    ) -> Result<TrackUpdate, MergeError> {
        let entry = self
            .store
            .get_entry(work_id)
            .await?
            .ok_or(MergeError::WorkNotFound(work_id))?;
        let chapters = match entry {
            LibraryEntry::Merged { references, .. } => {
                let mut chapters = Vec::new();
                for reference in references.iter().filter(|r| !r.is_self_reference()) {
                    chapters.extend(self.store.chapters_for_work(reference.work_id).await?);
                }
                chapters
            }
            LibraryEntry::Simple(work) => self.store.chapters_for_work(work.id).await?,
        };
        let update = reconcile_tracker(&chapters, remote_last_read);
        for &chapter_id in &update.mark_read {
            self.store.set_chapter_read(chapter_id, true).await?;
        }
        Ok(update)
    }
}

/// The reference representing the merge group's own identity. Never
/// participates in chapter updates.
fn self_reference(merged: &Work) -> MergedWorkReference {
    let mut reference = MergedWorkReference::new(
        merged.id,
        &merged.url,
        merged.id,
        &merged.url,
        MERGED_SOURCE_ID,
    );
    reference.get_chapter_updates = false;
    reference.chapter_priority = -1;
    reference.download_chapters = false;
    reference
}

#[async_trait]
impl ChapterFetcher for LibraryService {
    /// Live fetcher: syncs the backing work against its source first, then
    /// returns its persisted chapters. A fetch failure leaves the persisted
    /// chapters untouched, so the work drops out of this aggregation cycle
    /// without losing state.
    async fn fetch(
        &self,
        reference: &MergedWorkReference,
    ) -> Result<Vec<ChapterRecord>, MergeError> {
        let work = self
            .store
            .get_work(reference.work_id)
            .await?
            .ok_or(MergeError::WorkNotFound(reference.work_id))?;
        if work.is_merged() {
            return Err(MergeError::Config {
                reference_id: reference.id,
                reason: "merge groups cannot back another merge group".to_string(),
            });
        }

        self.sync_simple(&work).await?;
        let chapters = self.store.chapters_for_work(work.id).await?;
        Ok(chapters)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::source::{RawChapter, SourceAdapter, SourceError, WorkMetadata};
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    /// Adapter serving canned chapter lists keyed by remote url.
    struct CannedSource {
        id: i64,
        lists: StdMutex<HashMap<String, Vec<RawChapter>>>,
    }

    impl CannedSource {
        fn new(id: i64) -> Self {
            Self {
                id,
                lists: StdMutex::new(HashMap::new()),
            }
        }

        fn serve(&self, url: &str, chapters: Vec<RawChapter>) {
            self.lists.lock().unwrap().insert(url.to_string(), chapters);
        }
    }

    #[async_trait]
    impl SourceAdapter for CannedSource {
        fn source_id(&self) -> i64 {
            self.id
        }

        fn name(&self) -> &str {
            "canned"
        }

        async fn fetch_chapter_list(&self, key: &str) -> Result<Vec<RawChapter>, SourceError> {
            self.lists
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| SourceError::Transport("unreachable".to_string()))
        }

        async fn fetch_work_metadata(&self, key: &str) -> Result<WorkMetadata, SourceError> {
            Err(SourceError::NotFound(key.to_string()))
        }
    }

    fn raw(url: &str, number: f64) -> RawChapter {
        RawChapter {
            url: url.to_string(),
            name: format!("Chapter {number}"),
            chapter_number: Some(number),
            ..RawChapter::default()
        }
    }

    async fn service_with(sources: Vec<Arc<CannedSource>>) -> LibraryService {
        let db = Database::new_in_memory().await.unwrap();
        let mut registry = SourceRegistry::new();
        for source in sources {
            registry.register(source);
        }
        LibraryService::new(LibraryStore::new(db), registry)
    }

    #[tokio::test]
    async fn test_sync_work_persists_new_chapters() {
        let source = Arc::new(CannedSource::new(2));
        source.serve("/series/1", vec![raw("/c1", 1.0), raw("/c2", 2.0)]);
        let service = service_with(vec![source]).await;

        let work = service
            .store()
            .insert_work(&NewWork::new(2, "/series/1", "One"))
            .await
            .unwrap();

        let report = service.sync_work(work.id).await.unwrap();
        assert_eq!(report.new, 2);
        assert_eq!(report.updated, 0);
        assert!(report.removed_candidates.is_empty());

        let chapters = service.store().chapters_for_work(work.id).await.unwrap();
        assert_eq!(chapters.len(), 2);
    }

    #[tokio::test]
    async fn test_sync_work_rejects_merge_groups() {
        let service = service_with(vec![]).await;
        let merged = service
            .store()
            .insert_work(&NewWork::new(MERGED_SOURCE_ID, "/series/1", "One"))
            .await
            .unwrap();

        let err = service.sync_work(merged.id).await.unwrap_err();
        assert!(matches!(err, SyncError::IsMerged(_)));
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_persisted_state_untouched() {
        let source = Arc::new(CannedSource::new(2));
        source.serve("/series/1", vec![raw("/c1", 1.0)]);
        let service = service_with(vec![source.clone()]).await;

        let work = service
            .store()
            .insert_work(&NewWork::new(2, "/series/1", "One"))
            .await
            .unwrap();
        service.sync_work(work.id).await.unwrap();

        // Drop the canned list so the next fetch fails.
        source.lists.lock().unwrap().clear();
        let err = service.sync_work(work.id).await.unwrap_err();
        assert!(matches!(err, SyncError::Fetch(_)));

        let chapters = service.store().chapters_for_work(work.id).await.unwrap();
        assert_eq!(chapters.len(), 1);
    }

    #[tokio::test]
    async fn test_smart_merge_creates_group_with_references() {
        let service = service_with(vec![]).await;
        let a = service
            .store()
            .insert_work(&NewWork::new(2, "/series/a", "A"))
            .await
            .unwrap();
        let b = service
            .store()
            .insert_work(&NewWork::new(3, "/series/b", "B"))
            .await
            .unwrap();

        let merged = service.smart_merge(b.id, a.id).await.unwrap();
        assert!(merged.is_merged());
        assert!(merged.favorite);
        assert_eq!(merged.url, a.url);
        assert_eq!(merged.title, a.title);

        let references = service
            .store()
            .references_for_merge(merged.id)
            .await
            .unwrap();
        assert_eq!(references.len(), 3);
        assert!(references[0].is_info_work);
        assert_eq!(references[0].work_id, a.id);
        assert_eq!(references[1].work_id, b.id);
        assert!(references[2].is_self_reference());
        assert!(!references[2].get_chapter_updates);
    }

    #[tokio::test]
    async fn test_smart_merge_appends_to_existing_group() {
        let service = service_with(vec![]).await;
        let a = service
            .store()
            .insert_work(&NewWork::new(2, "/series/a", "A"))
            .await
            .unwrap();
        let b = service
            .store()
            .insert_work(&NewWork::new(3, "/series/b", "B"))
            .await
            .unwrap();
        let c = service
            .store()
            .insert_work(&NewWork::new(4, "/series/c", "C"))
            .await
            .unwrap();

        let merged = service.smart_merge(b.id, a.id).await.unwrap();
        let same = service.smart_merge(c.id, merged.id).await.unwrap();
        assert_eq!(same.id, merged.id);

        let references = service
            .store()
            .references_for_merge(merged.id)
            .await
            .unwrap();
        assert_eq!(references.len(), 4);

        // Merging the same work twice is rejected.
        let err = service.smart_merge(c.id, merged.id).await.unwrap_err();
        assert!(matches!(err, MergeError::AlreadyMerged));
    }

    #[tokio::test]
    async fn test_smart_merge_rejects_duplicate_favorited_group() {
        let service = service_with(vec![]).await;
        let a = service
            .store()
            .insert_work(&NewWork::new(2, "/series/a", "A"))
            .await
            .unwrap();
        let b = service
            .store()
            .insert_work(&NewWork::new(3, "/series/b", "B"))
            .await
            .unwrap();
        service.smart_merge(b.id, a.id).await.unwrap();

        let err = service.smart_merge(b.id, a.id).await.unwrap_err();
        assert!(matches!(err, MergeError::DuplicateMerge));
    }

    #[tokio::test]
    async fn test_aggregate_merged_work_dedups_by_priority() {
        let x = Arc::new(CannedSource::new(2));
        x.serve(
            "/series/x",
            vec![raw("/x1", 1.0), raw("/x2", 2.0), raw("/x3", 3.0)],
        );
        let y = Arc::new(CannedSource::new(3));
        y.serve(
            "/series/y",
            vec![raw("/y2", 2.0), raw("/y3", 3.0), raw("/y4", 4.0)],
        );
        let service = service_with(vec![x, y]).await;

        let wx = service
            .store()
            .insert_work(&NewWork::new(2, "/series/x", "X"))
            .await
            .unwrap();
        let wy = service
            .store()
            .insert_work(&NewWork::new(3, "/series/y", "Y"))
            .await
            .unwrap();

        let merged = service.smart_merge(wy.id, wx.id).await.unwrap();

        // Raise X's priority above Y's.
        let mut references = service
            .store()
            .references_for_merge(merged.id)
            .await
            .unwrap();
        references[0].chapter_priority = 2;
        service
            .update_merge_settings(&references[0])
            .await
            .unwrap();

        let result = service
            .aggregate_merged_work(merged.id, &AggregateOptions::default())
            .await
            .unwrap();
        assert!(result.failures.is_empty());

        let numbers: Vec<f64> = result.chapters.iter().map(|c| c.chapter_number).collect();
        assert_eq!(numbers, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(
            result
                .chapters
                .iter()
                .filter(|c| c.work_id == wx.id)
                .count(),
            3
        );
        assert_eq!(
            result
                .chapters
                .iter()
                .filter(|c| c.work_id == wy.id)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_visible_chapters_applies_filters() {
        let source = Arc::new(CannedSource::new(2));
        source.serve("/series/1", vec![raw("/c1", 1.0), raw("/c2", 2.0)]);
        let service = service_with(vec![source]).await;

        let work = service
            .store()
            .insert_work(&NewWork::new(2, "/series/1", "One"))
            .await
            .unwrap();
        service.sync_work(work.id).await.unwrap();

        let chapters = service.store().chapters_for_work(work.id).await.unwrap();
        service.set_read(chapters[0].id, true).await.unwrap();

        service
            .store()
            .set_chapter_flags(
                work.id,
                crate::library::ChapterSortMode::Number,
                false,
                crate::library::FilterState::Exclude,
                crate::library::FilterState::Ignore,
            )
            .await
            .unwrap();

        let visible = service.visible_chapters(work.id).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].url, "/c2");
    }

    #[tokio::test]
    async fn test_apply_tracker_state_marks_and_pushes() {
        let source = Arc::new(CannedSource::new(2));
        source.serve(
            "/series/1",
            vec![raw("/c1", 1.0), raw("/c2", 2.0), raw("/c3", 3.0)],
        );
        let service = service_with(vec![source]).await;

        let work = service
            .store()
            .insert_work(&NewWork::new(2, "/series/1", "One"))
            .await
            .unwrap();
        service.sync_work(work.id).await.unwrap();

        let update = service.apply_tracker_state(work.id, 2.0).await.unwrap();
        assert_eq!(update.mark_read.len(), 2);
        assert_eq!(update.remote_last_read, None);

        let chapters = service.store().chapters_for_work(work.id).await.unwrap();
        assert!(chapters[0].read);
        assert!(chapters[1].read);
        assert!(!chapters[2].read);

        // Read past the tracker locally; the number is pushed back.
        service.set_read(chapters[2].id, true).await.unwrap();
        let update = service.apply_tracker_state(work.id, 2.0).await.unwrap();
        assert_eq!(update.remote_last_read, Some(3.0));
    }

    #[tokio::test]
    async fn test_tracker_converges_chapters_hidden_from_merged_view() {
        let source = Arc::new(CannedSource::new(2));
        source.serve(
            "/series/x",
            vec![
                RawChapter {
                    scanlator: Some("Group A".to_string()),
                    ..raw("/x1", 1.0)
                },
                raw("/x2", 2.0),
            ],
        );
        let service = service_with(vec![source]).await;

        let backing = service
            .store()
            .insert_work(&NewWork::new(2, "/series/x", "X"))
            .await
            .unwrap();
        let other = service
            .store()
            .insert_work(&NewWork::new(3, "/series/other", "Other"))
            .await
            .unwrap();
        service.sync_work(backing.id).await.unwrap();

        let merged = service.smart_merge(other.id, backing.id).await.unwrap();
        service
            .set_scanlator_filter(merged.id, &["Group A".to_string()])
            .await
            .unwrap();

        // /x1 is hidden from the merged view, but the tracker still sees it.
        let update = service.apply_tracker_state(merged.id, 2.0).await.unwrap();
        assert_eq!(update.mark_read.len(), 2);

        let chapters = service.store().chapters_for_work(backing.id).await.unwrap();
        assert!(chapters.iter().all(|c| c.read));
    }
}
