//! The deletion gate for removal candidates.

use crate::library::ChapterRecord;

/// Decides which removal candidates may actually be deleted when a sync
/// outcome is applied.
///
/// Disabled by default: chapters that disappeared from the remote are kept
/// unless the user opted into removal, and even then read or bookmarked
/// chapters can be protected.
#[derive(Debug, Clone, Copy)]
pub struct RemovalPolicy {
    /// Whether chapters no longer present remotely are deleted at all.
    pub enabled: bool,
    /// Protect chapters the user has read.
    pub keep_read: bool,
    /// Protect bookmarked chapters.
    pub keep_bookmarked: bool,
}

impl Default for RemovalPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            keep_read: true,
            keep_bookmarked: true,
        }
    }
}

impl RemovalPolicy {
    /// A policy that never deletes anything.
    #[must_use]
    pub fn keep_all() -> Self {
        Self::default()
    }

    /// Returns true when `chapter` may be deleted under this policy.
    #[must_use]
    pub fn should_remove(&self, chapter: &ChapterRecord) -> bool {
        if !self.enabled {
            return false;
        }
        if self.keep_read && chapter.read {
            return false;
        }
        if self.keep_bookmarked && chapter.bookmark {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(read: bool, bookmark: bool) -> ChapterRecord {
        ChapterRecord {
            id: 1,
            work_id: 1,
            url: "/c1".to_string(),
            name: String::new(),
            chapter_number: 1.0,
            volume: None,
            scanlator: None,
            read,
            bookmark,
            last_page_read: 0,
            date_fetch: 0,
            date_upload: 0,
            source_order: 0,
        }
    }

    #[test]
    fn test_disabled_policy_removes_nothing() {
        let policy = RemovalPolicy::default();
        assert!(!policy.should_remove(&chapter(false, false)));
    }

    #[test]
    fn test_enabled_policy_removes_untouched_chapters() {
        let policy = RemovalPolicy {
            enabled: true,
            ..RemovalPolicy::default()
        };
        assert!(policy.should_remove(&chapter(false, false)));
    }

    #[test]
    fn test_read_and_bookmarked_chapters_are_protected() {
        let policy = RemovalPolicy {
            enabled: true,
            ..RemovalPolicy::default()
        };
        assert!(!policy.should_remove(&chapter(true, false)));
        assert!(!policy.should_remove(&chapter(false, true)));
    }

    #[test]
    fn test_protection_can_be_lifted() {
        let policy = RemovalPolicy {
            enabled: true,
            keep_read: false,
            keep_bookmarked: false,
        };
        assert!(policy.should_remove(&chapter(true, true)));
    }
}
