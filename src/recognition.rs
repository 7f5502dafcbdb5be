//! Chapter number recognition from display names.
//!
//! Sources frequently omit a structured chapter number and only encode it in
//! the display name ("Vol.4 Ch.24.5: The Promise"). The recognizer extracts
//! a float from the name; on failure it returns the [`UNKNOWN_NUMBER`]
//! sentinel rather than an error, so a malformed name never aborts a sync.

use std::sync::LazyLock;

use regex::Regex;

/// Sentinel stored when no chapter number could be determined.
pub const UNKNOWN_NUMBER: f64 = -1.0;

/// Matches an explicitly tagged chapter number, e.g. `ch. 12`, `Chapter 4.5b`.
#[allow(clippy::expect_used)]
static TAGGED_CHAPTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bch(?:apter|\.)?\s*(\d+(?:\.\d+)?)\s*([a-z])?\b")
        .expect("tagged chapter regex is valid") // Static pattern, safe to panic
});

/// Matches a volume tag so it is not mistaken for the chapter number.
#[allow(clippy::expect_used)]
static VOLUME_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bvol(?:ume|\.)?\s*\d+(?:\.\d+)?")
        .expect("volume tag regex is valid") // Static pattern, safe to panic
});

/// Matches any bare number with an optional single-letter sub-chapter suffix.
#[allow(clippy::expect_used)]
static BARE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*([a-z])?\b").expect("bare number regex is valid") // Static pattern, safe to panic
});

/// Named sub-release markers mapped to hundredths offsets, matching the
/// convention of `.99`/`.98`/`.97` sorting after the base chapter.
const NAMED_SUFFIXES: [(&str, f64); 3] = [("extra", 99.0), ("omake", 98.0), ("special", 97.0)];

/// Extracts a chapter number from a display name.
///
/// Resolution order:
/// 1. an explicitly tagged number (`ch.`/`chapter`),
/// 2. the last bare number once volume tags are stripped.
///
/// A trailing letter becomes a fractional sub-chapter (`24a` -> `24.1`), and
/// `extra`/`omake`/`special` markers become `.99`/`.98`/`.97` when the name
/// carries a base number. Returns [`UNKNOWN_NUMBER`] when nothing matches.
#[must_use]
pub fn parse_chapter_number(name: &str) -> f64 {
    let lowered = name.to_lowercase();

    let parsed = if let Some(captures) = TAGGED_CHAPTER.captures(&lowered) {
        captured_number(&captures)
    } else {
        let stripped = VOLUME_TAG.replace_all(&lowered, "");
        BARE_NUMBER
            .captures_iter(&stripped)
            .last()
            .and_then(|captures| captured_number(&captures))
    };

    let Some(mut number) = parsed else {
        return UNKNOWN_NUMBER;
    };

    // Only apply named suffixes to whole-number bases; "24.5 extra" keeps
    // 24.5. Computed in hundredths so the result is the correctly rounded
    // double for base.xx, bit-identical to the literal.
    if number.fract() == 0.0 {
        for (marker, hundredths) in NAMED_SUFFIXES {
            if lowered.contains(marker) {
                number = (number * 100.0 + hundredths) / 100.0;
                break;
            }
        }
    }

    number
}

/// Converts the matched digits plus optional letter suffix into a float.
fn captured_number(captures: &regex::Captures<'_>) -> Option<f64> {
    let base: f64 = captures.get(1)?.as_str().parse().ok()?;
    let suffix = captures
        .get(2)
        .map(|letter| letter_fraction(letter.as_str()))
        .unwrap_or(0.0);
    Some(base + suffix)
}

/// Maps a trailing letter to a fractional sub-chapter: a -> .1, b -> .2, ...
fn letter_fraction(letter: &str) -> f64 {
    match letter.bytes().next() {
        Some(byte @ b'a'..=b'i') => f64::from(byte - b'a' + 1) / 10.0,
        _ => 0.0,
    }
}
