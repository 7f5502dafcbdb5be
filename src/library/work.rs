//! Work rows and their chapter display settings.

use std::fmt;

use sqlx::FromRow;

use crate::scanlator::ScanlatorSet;

use super::MERGED_SOURCE_ID;
use super::reference::MergedWorkReference;

/// How a work's visible chapter list is ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterSortMode {
    /// By recognized chapter number; unknown numbers fall back to
    /// source order and upload date.
    Number,
    /// By the source-reported upload timestamp.
    UploadDate,
    /// By the position the source itself listed the chapters in.
    SourceOrder,
}

impl ChapterSortMode {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::UploadDate => "upload_date",
            Self::SourceOrder => "source_order",
        }
    }
}

impl fmt::Display for ChapterSortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ChapterSortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "number" => Ok(Self::Number),
            "upload_date" => Ok(Self::UploadDate),
            "source_order" => Ok(Self::SourceOrder),
            _ => Err(format!("invalid chapter sort mode: {s}")),
        }
    }
}

/// Tri-state chapter display filter (read / bookmarked).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// Filter not active.
    Ignore,
    /// Show only chapters with the flag set.
    Include,
    /// Show only chapters with the flag unset.
    Exclude,
}

impl FilterState {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::Include => "include",
            Self::Exclude => "exclude",
        }
    }

    /// Returns true when `flag` passes this filter.
    #[must_use]
    pub fn admits(&self, flag: bool) -> bool {
        match self {
            Self::Ignore => true,
            Self::Include => flag,
            Self::Exclude => !flag,
        }
    }
}

impl fmt::Display for FilterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FilterState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ignore" => Ok(Self::Ignore),
            "include" => Ok(Self::Include),
            "exclude" => Ok(Self::Exclude),
            _ => Err(format!("invalid filter state: {s}")),
        }
    }
}

/// Whether a work is a plain catalog entry or a merge aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkKind {
    /// A single catalog entry on one source.
    Simple,
    /// A virtual entry aggregating chapters from backing works.
    Merged,
}

/// A logical unit the user tracks: one catalog entry, or one merge group.
///
/// `(source_id, url)` is unique. Display settings (sort mode, tri-state
/// filters, filtered scanlators) live on the work so a merged work carries
/// its own view configuration independent of its backing entries.
#[derive(Debug, Clone, FromRow)]
pub struct Work {
    /// Locally assigned stable id.
    pub id: i64,
    /// Owning source id; [`MERGED_SOURCE_ID`] marks a merged work.
    pub source_id: i64,
    /// Remote key within the source.
    pub url: String,
    /// Display title.
    pub title: String,
    /// Whether the user tracks this work in their library.
    pub favorite: bool,
    /// Epoch millis when the work was added.
    pub date_added: i64,
    /// Chapter ordering mode (stored as text, parsed via `sort_mode()`).
    #[sqlx(rename = "sort_mode")]
    pub sort_mode_str: String,
    /// Whether the visible list is shown newest-first.
    pub sort_descending: bool,
    /// Read tri-state filter (stored as text, parsed via `read_filter()`).
    #[sqlx(rename = "read_filter")]
    pub read_filter_str: String,
    /// Bookmarked tri-state filter (stored as text).
    #[sqlx(rename = "bookmarked_filter")]
    pub bookmarked_filter_str: String,
    /// Scanlator groups hidden from the visible list, canonical string form.
    pub filtered_scanlators: Option<String>,
}

impl Work {
    /// Returns whether this work is simple or merged.
    #[must_use]
    pub fn kind(&self) -> WorkKind {
        if self.source_id == MERGED_SOURCE_ID {
            WorkKind::Merged
        } else {
            WorkKind::Simple
        }
    }

    /// Returns true for merged works.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.kind() == WorkKind::Merged
    }

    /// Returns the parsed sort mode, falling back to `Number`.
    #[must_use]
    pub fn sort_mode(&self) -> ChapterSortMode {
        self.sort_mode_str.parse().unwrap_or(ChapterSortMode::Number)
    }

    /// Returns the parsed read filter, falling back to `Ignore`.
    #[must_use]
    pub fn read_filter(&self) -> FilterState {
        self.read_filter_str.parse().unwrap_or(FilterState::Ignore)
    }

    /// Returns the parsed bookmarked filter, falling back to `Ignore`.
    #[must_use]
    pub fn bookmarked_filter(&self) -> FilterState {
        self.bookmarked_filter_str
            .parse()
            .unwrap_or(FilterState::Ignore)
    }

    /// Returns the parsed filtered-scanlator set (empty when unset).
    #[must_use]
    pub fn filtered_scanlator_set(&self) -> ScanlatorSet {
        ScanlatorSet::parse(self.filtered_scanlators.as_deref())
    }
}

impl fmt::Display for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Work {{ id: {}, source: {}, url: {} }}",
            self.id, self.source_id, self.url
        )
    }
}

/// Fields for inserting a new work row.
#[derive(Debug, Clone)]
pub struct NewWork {
    /// Owning source id.
    pub source_id: i64,
    /// Remote key within the source.
    pub url: String,
    /// Display title.
    pub title: String,
    /// Library membership flag.
    pub favorite: bool,
    /// Epoch millis when added.
    pub date_added: i64,
    /// Initial sort mode.
    pub sort_mode: ChapterSortMode,
    /// Initial sort direction.
    pub sort_descending: bool,
}

impl NewWork {
    /// Creates an insertable work with default display settings.
    #[must_use]
    pub fn new(source_id: i64, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source_id,
            url: url.into(),
            title: title.into(),
            favorite: false,
            date_added: 0,
            sort_mode: ChapterSortMode::Number,
            sort_descending: false,
        }
    }
}

/// A work resolved together with its merge references, dispatched on by
/// the aggregation path.
#[derive(Debug, Clone)]
pub enum LibraryEntry {
    /// A plain catalog entry.
    Simple(Work),
    /// A merge group with its backing references.
    Merged {
        /// The virtual merged work row.
        work: Work,
        /// References to the backing works, in insertion order.
        references: Vec<MergedWorkReference>,
    },
}

impl LibraryEntry {
    /// Returns the underlying work row.
    #[must_use]
    pub fn work(&self) -> &Work {
        match self {
            Self::Simple(work) | Self::Merged { work, .. } => work,
        }
    }
}
