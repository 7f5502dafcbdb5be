//! Persisted chapter rows.

use std::fmt;

use sqlx::FromRow;

use crate::recognition::UNKNOWN_NUMBER;
use crate::scanlator::ScanlatorSet;

/// A chapter belonging to exactly one work.
///
/// The url is the chapter's identity within its work: two chapters are the
/// same chapter iff their urls match. Name, number and scanlator changes
/// between fetches are updates to the same row, never new rows, which is
/// what keeps read/bookmark state stable across re-fetches.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ChapterRecord {
    /// Assigned on first persistence, stable thereafter. Zero before insert.
    pub id: i64,
    /// Owning work.
    pub work_id: i64,
    /// Remote key; the identity within the work.
    pub url: String,
    /// Display name.
    pub name: String,
    /// Recognized chapter number; `-1.0` when unknown.
    pub chapter_number: f64,
    /// Volume label when the source provides one.
    pub volume: Option<String>,
    /// Canonical scanlator string (sorted, separator-joined).
    pub scanlator: Option<String>,
    /// User state: read flag.
    pub read: bool,
    /// User state: bookmark flag.
    pub bookmark: bool,
    /// User state: last page read.
    pub last_page_read: i64,
    /// Epoch millis when this row was first fetched.
    pub date_fetch: i64,
    /// Source-reported upload time, epoch millis; zero when unknown.
    pub date_upload: i64,
    /// Position in the source's own listing; sort tiebreaker when the
    /// chapter number is unknown or duplicated.
    pub source_order: i64,
}

impl ChapterRecord {
    /// The chapter's identity key within its work.
    #[must_use]
    pub fn identity_key(&self) -> &str {
        &self.url
    }

    /// Returns true when a usable chapter number was recognized.
    #[must_use]
    pub fn has_known_number(&self) -> bool {
        self.chapter_number > UNKNOWN_NUMBER
    }

    /// Parses the stored scanlator string into a group set.
    #[must_use]
    pub fn scanlator_set(&self) -> ScanlatorSet {
        ScanlatorSet::parse(self.scanlator.as_deref())
    }
}

impl fmt::Display for ChapterRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ChapterRecord {{ id: {}, work: {}, url: {}, number: {} }}",
            self.id, self.work_id, self.url, self.chapter_number
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_chapter(url: &str, number: f64) -> ChapterRecord {
        ChapterRecord {
            id: 0,
            work_id: 1,
            url: url.to_string(),
            name: String::new(),
            chapter_number: number,
            volume: None,
            scanlator: None,
            read: false,
            bookmark: false,
            last_page_read: 0,
            date_fetch: 0,
            date_upload: 0,
            source_order: 0,
        }
    }

    #[test]
    fn test_identity_key_is_url() {
        let chapter = sample_chapter("/c/1", 1.0);
        assert_eq!(chapter.identity_key(), "/c/1");
    }

    #[test]
    fn test_has_known_number() {
        assert!(sample_chapter("/c/1", 1.0).has_known_number());
        assert!(sample_chapter("/c/0", 0.0).has_known_number());
        assert!(!sample_chapter("/c/x", UNKNOWN_NUMBER).has_known_number());
    }

    #[test]
    fn test_scanlator_set_from_stored_string() {
        let mut chapter = sample_chapter("/c/1", 1.0);
        chapter.scanlator = Some("Alpha & Beta".to_string());
        let set = chapter.scanlator_set();
        assert_eq!(set.len(), 2);
        assert!(set.contains("beta"));
    }
}
