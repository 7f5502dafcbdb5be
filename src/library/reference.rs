//! Merge reference rows: the join between a merged work and its backing works.

use sqlx::FromRow;

use super::MERGED_SOURCE_ID;
use super::work::ChapterSortMode;

/// Links a merged (virtual) work to one backing work.
///
/// A merge group also carries one self reference pointing back at the merged
/// work itself (`work_source_id == MERGED_SOURCE_ID`); it represents the
/// merged work's own identity for downstream joins and never participates in
/// chapter updates. Priority ties are broken by insertion order.
#[derive(Debug, Clone, FromRow)]
pub struct MergedWorkReference {
    /// Row id; zero before insert.
    pub id: i64,
    /// The merged work this reference belongs to.
    pub merge_id: i64,
    /// The merged work's remote key.
    pub merge_url: String,
    /// The backing work.
    pub work_id: i64,
    /// The backing work's remote key.
    pub work_url: String,
    /// The backing work's source.
    pub work_source_id: i64,
    /// Designates the reference whose record supplies work-level metadata.
    /// At most one per group.
    pub is_info_work: bool,
    /// Whether this reference participates in chapter aggregation.
    pub get_chapter_updates: bool,
    /// Dedup processing order; highest priority is processed first.
    pub chapter_priority: i64,
    /// Per-reference sort preference (stored as text).
    #[sqlx(rename = "chapter_sort_mode")]
    pub chapter_sort_mode_str: String,
    /// Whether new chapters from this reference should be auto-downloaded.
    pub download_chapters: bool,
}

impl MergedWorkReference {
    /// Creates an insertable reference with default aggregation settings.
    #[must_use]
    pub fn new(merge_id: i64, merge_url: impl Into<String>, work_id: i64, work_url: impl Into<String>, work_source_id: i64) -> Self {
        Self {
            id: 0,
            merge_id,
            merge_url: merge_url.into(),
            work_id,
            work_url: work_url.into(),
            work_source_id,
            is_info_work: false,
            get_chapter_updates: true,
            chapter_priority: 0,
            chapter_sort_mode_str: ChapterSortMode::Number.as_str().to_string(),
            download_chapters: true,
        }
    }

    /// Returns true for the group's self reference.
    #[must_use]
    pub fn is_self_reference(&self) -> bool {
        self.work_source_id == MERGED_SOURCE_ID
    }

    /// Returns the parsed per-reference sort mode, falling back to `Number`.
    #[must_use]
    pub fn chapter_sort_mode(&self) -> ChapterSortMode {
        self.chapter_sort_mode_str
            .parse()
            .unwrap_or(ChapterSortMode::Number)
    }
}
