//! `SQLite`-backed persistence for works, chapters and merge references.

use sqlx::Row;
use tracing::{debug, instrument};

use crate::db::Database;
use crate::sync::{RemovalPolicy, SyncOutcome};

use super::chapter::ChapterRecord;
use super::error::LibraryError;
use super::reference::MergedWorkReference;
use super::work::{ChapterSortMode, FilterState, LibraryEntry, NewWork, Work, WorkKind};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, LibraryError>;

/// Counts from applying one sync outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedSync {
    /// New chapter rows inserted.
    pub inserted: usize,
    /// Chapter rows whose source-derived fields were rewritten.
    pub updated: usize,
    /// Removal candidates actually deleted under the policy.
    pub deleted: usize,
}

/// Returns `Ok(())` if at least one row was affected; otherwise `not_found`.
fn check_affected(rows_affected: u64, not_found: LibraryError) -> Result<()> {
    if rows_affected == 0 {
        Err(not_found)
    } else {
        Ok(())
    }
}

/// Transactional CRUD for the library tables.
///
/// Chapter rows are mutated through [`LibraryStore::apply_sync`] (one
/// transaction per work per sync) and the progress setters; nothing else
/// writes the chapter table, which is what makes a sync atomic from the
/// work's point of view.
#[derive(Debug, Clone)]
pub struct LibraryStore {
    db: Database,
}

impl LibraryStore {
    /// Creates a store over an open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // ---- works -----------------------------------------------------------

    /// Inserts a work row and returns it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Database`] on failure; a duplicate
    /// `(source_id, url)` surfaces as a constraint violation.
    #[instrument(skip(self, new), fields(source_id = new.source_id, url = %new.url))]
    pub async fn insert_work(&self, new: &NewWork) -> Result<Work> {
        let work = sqlx::query_as::<_, Work>(
            r"INSERT INTO works (source_id, url, title, favorite, date_added, sort_mode, sort_descending)
              VALUES (?, ?, ?, ?, ?, ?, ?)
              RETURNING *",
        )
        .bind(new.source_id)
        .bind(&new.url)
        .bind(&new.title)
        .bind(new.favorite)
        .bind(new.date_added)
        .bind(new.sort_mode.as_str())
        .bind(new.sort_descending)
        .fetch_one(self.db.pool())
        .await?;

        debug!(work_id = work.id, "inserted work");
        Ok(work)
    }

    /// Fetches a work by id.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get_work(&self, id: i64) -> Result<Option<Work>> {
        let work = sqlx::query_as::<_, Work>("SELECT * FROM works WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(work)
    }

    /// Fetches a work by its `(source_id, url)` key.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Database`] if the query fails.
    #[instrument(skip(self, url), fields(url = %url))]
    pub async fn get_work_by_key(&self, source_id: i64, url: &str) -> Result<Option<Work>> {
        let work = sqlx::query_as::<_, Work>("SELECT * FROM works WHERE source_id = ? AND url = ?")
            .bind(source_id)
            .bind(url)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(work)
    }

    /// Fetches a work together with its merge references as a tagged entry.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Database`] if a query fails.
    #[instrument(skip(self))]
    pub async fn get_entry(&self, id: i64) -> Result<Option<LibraryEntry>> {
        let Some(work) = self.get_work(id).await? else {
            return Ok(None);
        };
        let entry = match work.kind() {
            WorkKind::Simple => LibraryEntry::Simple(work),
            WorkKind::Merged => {
                let references = self.references_for_merge(work.id).await?;
                LibraryEntry::Merged { work, references }
            }
        };
        Ok(Some(entry))
    }

    /// Sets the favorite flag.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::WorkNotFound`] when the id does not exist.
    #[instrument(skip(self))]
    pub async fn set_favorite(&self, id: i64, favorite: bool) -> Result<()> {
        let result = sqlx::query("UPDATE works SET favorite = ? WHERE id = ?")
            .bind(favorite)
            .bind(id)
            .execute(self.db.pool())
            .await?;
        check_affected(result.rows_affected(), LibraryError::WorkNotFound(id))
    }

    /// Stores the canonical filtered-scanlators string (`None` clears it).
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::WorkNotFound`] when the id does not exist.
    #[instrument(skip(self, filtered))]
    pub async fn set_filtered_scanlators(&self, id: i64, filtered: Option<&str>) -> Result<()> {
        let result = sqlx::query("UPDATE works SET filtered_scanlators = ? WHERE id = ?")
            .bind(filtered)
            .bind(id)
            .execute(self.db.pool())
            .await?;
        check_affected(result.rows_affected(), LibraryError::WorkNotFound(id))
    }

    /// Updates the work's chapter display settings.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::WorkNotFound`] when the id does not exist.
    #[instrument(skip(self))]
    pub async fn set_chapter_flags(
        &self,
        id: i64,
        sort_mode: ChapterSortMode,
        sort_descending: bool,
        read_filter: FilterState,
        bookmarked_filter: FilterState,
    ) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE works
              SET sort_mode = ?, sort_descending = ?, read_filter = ?, bookmarked_filter = ?
              WHERE id = ?",
        )
        .bind(sort_mode.as_str())
        .bind(sort_descending)
        .bind(read_filter.as_str())
        .bind(bookmarked_filter.as_str())
        .bind(id)
        .execute(self.db.pool())
        .await?;
        check_affected(result.rows_affected(), LibraryError::WorkNotFound(id))
    }

    /// Deletes a work; its chapters and owned merge references cascade.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::WorkNotFound`] when the id does not exist.
    #[instrument(skip(self))]
    pub async fn delete_work(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM works WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        check_affected(result.rows_affected(), LibraryError::WorkNotFound(id))
    }

    // ---- chapters --------------------------------------------------------

    /// Returns a work's chapters in source order.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn chapters_for_work(&self, work_id: i64) -> Result<Vec<ChapterRecord>> {
        let chapters = sqlx::query_as::<_, ChapterRecord>(
            "SELECT * FROM chapters WHERE work_id = ? ORDER BY source_order ASC, id ASC",
        )
        .bind(work_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(chapters)
    }

    /// Applies a sync outcome for one work in a single transaction.
    ///
    /// Inserts the new records, rewrites the source-derived fields of the
    /// updated records (user state columns are not touched), and deletes
    /// removal candidates the policy admits. All-or-nothing: a failure rolls
    /// the whole sync back and the work's persisted state is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Database`] if any statement fails.
    #[instrument(skip(self, outcome, policy), fields(
        new = outcome.new.len(),
        updated = outcome.updated.len(),
        removed = outcome.removed.len(),
    ))]
    pub async fn apply_sync(
        &self,
        work_id: i64,
        outcome: &SyncOutcome,
        policy: &RemovalPolicy,
    ) -> Result<AppliedSync> {
        let mut tx = self.db.pool().begin().await?;
        let mut applied = AppliedSync::default();

        for chapter in &outcome.new {
            sqlx::query(
                r"INSERT INTO chapters (
                    work_id, url, name, chapter_number, volume, scanlator,
                    read, bookmark, last_page_read, date_fetch, date_upload, source_order
                  )
                  VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(work_id)
            .bind(&chapter.url)
            .bind(&chapter.name)
            .bind(chapter.chapter_number)
            .bind(&chapter.volume)
            .bind(&chapter.scanlator)
            .bind(chapter.read)
            .bind(chapter.bookmark)
            .bind(chapter.last_page_read)
            .bind(chapter.date_fetch)
            .bind(chapter.date_upload)
            .bind(chapter.source_order)
            .execute(&mut *tx)
            .await?;
            applied.inserted += 1;
        }

        for chapter in &outcome.updated {
            sqlx::query(
                r"UPDATE chapters
                  SET name = ?, chapter_number = ?, volume = ?, scanlator = ?,
                      date_upload = ?, source_order = ?
                  WHERE id = ?",
            )
            .bind(&chapter.name)
            .bind(chapter.chapter_number)
            .bind(&chapter.volume)
            .bind(&chapter.scanlator)
            .bind(chapter.date_upload)
            .bind(chapter.source_order)
            .bind(chapter.id)
            .execute(&mut *tx)
            .await?;
            applied.updated += 1;
        }

        for chapter in &outcome.removed {
            if !policy.should_remove(chapter) {
                continue;
            }
            sqlx::query("DELETE FROM chapters WHERE id = ?")
                .bind(chapter.id)
                .execute(&mut *tx)
                .await?;
            applied.deleted += 1;
        }

        tx.commit().await?;
        debug!(?applied, "applied sync outcome");
        Ok(applied)
    }

    /// Sets the read flag; clearing it also resets the last page read.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::ChapterNotFound`] when the id does not exist.
    #[instrument(skip(self))]
    pub async fn set_chapter_read(&self, id: i64, read: bool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE chapters SET read = ?, last_page_read = CASE WHEN ? THEN last_page_read ELSE 0 END WHERE id = ?",
        )
        .bind(read)
        .bind(read)
        .bind(id)
        .execute(self.db.pool())
        .await?;
        check_affected(result.rows_affected(), LibraryError::ChapterNotFound(id))
    }

    /// Sets the bookmark flag.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::ChapterNotFound`] when the id does not exist.
    #[instrument(skip(self))]
    pub async fn set_chapter_bookmark(&self, id: i64, bookmark: bool) -> Result<()> {
        let result = sqlx::query("UPDATE chapters SET bookmark = ? WHERE id = ?")
            .bind(bookmark)
            .bind(id)
            .execute(self.db.pool())
            .await?;
        check_affected(result.rows_affected(), LibraryError::ChapterNotFound(id))
    }

    /// Records reading progress within a chapter.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::ChapterNotFound`] when the id does not exist.
    #[instrument(skip(self))]
    pub async fn set_chapter_last_page_read(&self, id: i64, last_page_read: i64) -> Result<()> {
        let result = sqlx::query("UPDATE chapters SET last_page_read = ? WHERE id = ?")
            .bind(last_page_read)
            .bind(id)
            .execute(self.db.pool())
            .await?;
        check_affected(result.rows_affected(), LibraryError::ChapterNotFound(id))
    }

    // ---- merge references -------------------------------------------------

    /// Returns a merge group's references in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn references_for_merge(&self, merge_id: i64) -> Result<Vec<MergedWorkReference>> {
        let references = sqlx::query_as::<_, MergedWorkReference>(
            "SELECT * FROM merged_work_references WHERE merge_id = ? ORDER BY id ASC",
        )
        .bind(merge_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(references)
    }

    /// Inserts a merge reference and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Database`] if the insert fails.
    #[instrument(skip(self, reference), fields(merge_id = reference.merge_id, work_id = reference.work_id))]
    pub async fn insert_reference(&self, reference: &MergedWorkReference) -> Result<i64> {
        let result = sqlx::query(
            r"INSERT INTO merged_work_references (
                merge_id, merge_url, work_id, work_url, work_source_id,
                is_info_work, get_chapter_updates, chapter_priority,
                chapter_sort_mode, download_chapters
              )
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              RETURNING id",
        )
        .bind(reference.merge_id)
        .bind(&reference.merge_url)
        .bind(reference.work_id)
        .bind(&reference.work_url)
        .bind(reference.work_source_id)
        .bind(reference.is_info_work)
        .bind(reference.get_chapter_updates)
        .bind(reference.chapter_priority)
        .bind(&reference.chapter_sort_mode_str)
        .bind(reference.download_chapters)
        .fetch_one(self.db.pool())
        .await?;

        Ok(result.get("id"))
    }

    /// Rewrites a reference's aggregation settings (explicit merge-settings
    /// edits are the only mutation path for references).
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Database`] if the update fails.
    #[instrument(skip(self, reference), fields(reference_id = reference.id))]
    pub async fn update_reference_settings(&self, reference: &MergedWorkReference) -> Result<()> {
        sqlx::query(
            r"UPDATE merged_work_references
              SET is_info_work = ?, get_chapter_updates = ?, chapter_priority = ?,
                  chapter_sort_mode = ?, download_chapters = ?
              WHERE id = ?",
        )
        .bind(reference.is_info_work)
        .bind(reference.get_chapter_updates)
        .bind(reference.chapter_priority)
        .bind(&reference.chapter_sort_mode_str)
        .bind(reference.download_chapters)
        .bind(reference.id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Removes every reference of a merge group.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn delete_references_for_merge(&self, merge_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM merged_work_references WHERE merge_id = ?")
            .bind(merge_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}
