//! Ordering and display filtering of an aggregated chapter list.

use std::cmp::Ordering;

use crate::library::{ChapterRecord, ChapterSortMode, FilterState};
use crate::scanlator::ScanlatorSet;

/// Position fallback for chapters that cannot be compared by number.
fn positional(chapter: &ChapterRecord) -> (i64, i64, &str) {
    (chapter.source_order, chapter.date_upload, &chapter.url)
}

fn compare(a: &ChapterRecord, b: &ChapterRecord, mode: ChapterSortMode) -> Ordering {
    match mode {
        // Knowns order by number and always precede unknowns; unknowns order
        // positionally among themselves. Total, so a sort never interleaves
        // known numbers out of numeric order through an unknown neighbor.
        ChapterSortMode::Number => match (a.has_known_number(), b.has_known_number()) {
            (true, true) => a
                .chapter_number
                .partial_cmp(&b.chapter_number)
                .unwrap_or(Ordering::Equal)
                .then_with(|| positional(a).cmp(&positional(b))),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => positional(a).cmp(&positional(b)),
        },
        ChapterSortMode::UploadDate => a
            .date_upload
            .cmp(&b.date_upload)
            .then_with(|| positional(a).cmp(&positional(b))),
        ChapterSortMode::SourceOrder => positional(a).cmp(&positional(b)),
    }
}

/// Sorts chapters in place per the work's display settings.
///
/// Chapters without a usable number sort by source order and upload date
/// even in number mode.
pub fn sort_chapters(chapters: &mut [ChapterRecord], mode: ChapterSortMode, descending: bool) {
    chapters.sort_by(|a, b| {
        let ordering = compare(a, b, mode);
        if descending { ordering.reverse() } else { ordering }
    });
}

/// Removes chapters all of whose parsed groups are in the filtered set.
///
/// A chapter with at least one non-filtered group survives, as does a
/// chapter with no scanlator at all.
pub fn apply_scanlator_filter(chapters: &mut Vec<ChapterRecord>, filtered: &ScanlatorSet) {
    if filtered.is_empty() {
        return;
    }
    chapters.retain(|chapter| !chapter.scanlator_set().is_subset_of(filtered));
}

/// Applies the work's read/bookmarked display filters.
pub fn apply_state_filters(
    chapters: &mut Vec<ChapterRecord>,
    read: FilterState,
    bookmarked: FilterState,
) {
    chapters.retain(|chapter| read.admits(chapter.read) && bookmarked.admits(chapter.bookmark));
}
