//! Scanlator group parsing and canonical formatting.
//!
//! A chapter's scanlator field is free text that may name several release
//! groups joined by a fixed separator. Dedup and filtering need the parsed
//! set; storage needs a canonical string so repeated parse/format cycles
//! are stable.

use std::collections::BTreeSet;

/// Separator used when a chapter lists multiple scanlator groups.
pub const SCANLATOR_SEPARATOR: &str = " & ";

/// A parsed set of scanlator group names.
///
/// Original casing is preserved for display; comparison and ordering are
/// case-insensitive so `"Group"` and `"group"` are the same group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanlatorSet {
    /// Keyed by lowercased name, value keeps the first-seen casing.
    groups: BTreeSet<(String, String)>,
}

impl ScanlatorSet {
    /// Parses a raw scanlator field into a group set.
    ///
    /// Splits on [`SCANLATOR_SEPARATOR`], trims whitespace and drops empty
    /// entries. `None` and all-whitespace input produce an empty set.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let mut groups = BTreeSet::new();
        let Some(raw) = raw else {
            return Self { groups };
        };

        for part in raw.split(SCANLATOR_SEPARATOR) {
            let name = part.trim();
            if name.is_empty() {
                continue;
            }
            let key = name.to_lowercase();
            if !groups.iter().any(|(existing, _)| *existing == key) {
                groups.insert((key, name.to_string()));
            }
        }

        Self { groups }
    }

    /// Formats the set back into the canonical storage string.
    ///
    /// Groups are joined in case-insensitive sorted order, so
    /// `parse(format(set)) == set` and formatting is deterministic no matter
    /// what order the source listed the groups in.
    #[must_use]
    pub fn format(&self) -> Option<String> {
        if self.groups.is_empty() {
            return None;
        }
        Some(
            self.groups
                .iter()
                .map(|(_, display)| display.as_str())
                .collect::<Vec<_>>()
                .join(SCANLATOR_SEPARATOR),
        )
    }

    /// Returns true when the set contains `group`, ignoring case.
    #[must_use]
    pub fn contains(&self, group: &str) -> bool {
        let key = group.to_lowercase();
        self.groups.iter().any(|(existing, _)| *existing == key)
    }

    /// Returns true when every group in this set is also in `other`.
    ///
    /// An empty set is never a subset here: a chapter with no scanlator
    /// cannot be filtered away by a scanlator filter.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        if self.groups.is_empty() {
            return false;
        }
        self.groups
            .iter()
            .all(|(key, _)| other.groups.iter().any(|(k, _)| k == key))
    }

    /// Iterates the lowercased comparison keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(key, _)| key.as_str())
    }

    /// Iterates the display names in canonical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(_, display)| display.as_str())
    }

    /// Returns true when no groups were parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of distinct groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }
}

impl FromIterator<String> for ScanlatorSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        let joined = iter.into_iter().collect::<Vec<_>>().join(SCANLATOR_SEPARATOR);
        Self::parse(Some(&joined))
    }
}

/// Canonicalizes a raw scanlator field for storage.
///
/// Returns `None` when the field parses to no groups.
#[must_use]
pub fn canonical_scanlator(raw: Option<&str>) -> Option<String> {
    ScanlatorSet::parse(raw).format()
}
