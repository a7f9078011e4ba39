//! Name normalization and string similarity measures
//!
//! Used by the fuzzy and n-gram tiers. All scores are in [0, 1].

use std::collections::HashSet;

/// Tokens that mark a format variant when they appear inside brackets
const FORMAT_MARKERS: &[&str] = &[
    "wav", "wave", "aif", "aiff", "flac", "mp3", "m4a", "aac", "alac", "ogg", "opus",
    "lossless", "lossy", "hq", "hires", "hi-res", "copy", "master",
];

/// Codec names that may trail a bare name after a hyphen or underscore ("song - wav")
const TRAILING_CODECS: &[&str] = &[
    "wav", "aif", "aiff", "flac", "mp3", "m4a", "aac", "alac", "ogg", "lossless", "hq", "hires",
];

/// Composite weights: whole-string, best-aligned substring, token-sorted
pub const RATIO_WEIGHT: f64 = 0.4;
pub const PARTIAL_WEIGHT: f64 = 0.3;
pub const TOKEN_SORT_WEIGHT: f64 = 0.3;

fn is_number(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Bitrate, sample rate or bit depth ("320kbps", "44.1khz", "24bit")
///
/// A bare unit ("kbps", "bit") only counts when `allow_bare_unit` is set.
fn is_unit_token(token: &str, allow_bare_unit: bool) -> bool {
    ["kbps", "khz", "bit"].iter().any(|unit| match token.strip_suffix(*unit) {
        Some("") => allow_bare_unit,
        Some(value) => is_number(value),
        None => false,
    })
}

fn is_format_token(token: &str) -> bool {
    let token = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '-');
    if token.is_empty() {
        return true;
    }
    FORMAT_MARKERS.contains(&token) || is_unit_token(token, true)
}

/// Annotation inside brackets that only names a format (e.g. "(WAV)", "[320 kbps]", "(copy 2)")
fn is_format_annotation(inner: &str) -> bool {
    let lowered = inner.to_lowercase();
    let mut tokens = lowered
        .split(|c: char| c.is_whitespace() || c == ',' || c == '/')
        .filter(|t| !t.is_empty())
        .peekable();
    if tokens.peek().is_none() {
        return true;
    }
    tokens.all(|t| is_format_token(t) || is_number(t))
}

/// Remove bracketed format annotations, keeping every other bracketed part
fn strip_format_annotations(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;

    while let Some(open) = rest.find(['(', '[']) {
        let close_char = if rest[open..].starts_with('(') { ')' } else { ']' };
        let Some(close_rel) = rest[open + 1..].find(close_char) else {
            break;
        };
        let close = open + 1 + close_rel;
        let inner = &rest[open + 1..close];

        out.push_str(&rest[..open]);
        if !is_format_annotation(inner) {
            out.push_str(&rest[open..=close]);
        }
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    out
}

/// A word of a bare name and whether a hyphen or underscore preceded it
struct Word {
    text: String,
    after_dash: bool,
}

fn split_words(lowered: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut dash = false;

    for c in lowered.chars() {
        let is_dash = matches!(c, '-' | '_');
        if is_dash || c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']') {
            if !current.is_empty() {
                words.push(Word {
                    text: std::mem::take(&mut current),
                    after_dash: dash,
                });
                dash = false;
            }
            dash |= is_dash;
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        words.push(Word {
            text: current,
            after_dash: dash,
        });
    }
    words
}

/// Pop trailing technical markers while a word remains
///
/// Only bitrate/sample-rate/bit-depth values and codec names set off by a
/// hyphen or underscore go. Ordinary words ("Heat Wave", "Hard Copy") stay.
fn drop_trailing_markers(words: &mut Vec<Word>) {
    while words.len() > 1 {
        let last = &words[words.len() - 1];
        let before = &words[words.len() - 2];

        let trailing_codec = last.after_dash && TRAILING_CODECS.contains(&last.text.as_str());
        if trailing_codec || is_unit_token(&last.text, false) {
            words.pop();
        } else if is_unit_token(&last.text, true) && is_number(&before.text) && words.len() > 2 {
            words.truncate(words.len() - 2);
        } else {
            break;
        }
    }
}

/// Normalize a display name for comparison
///
/// 1. Strip bracketed format annotations
/// 2. Collapse hyphens, underscores and runs of whitespace to one space
/// 3. Case-fold
/// 4. Drop trailing technical markers ("song - wav", "song 320kbps") while a word remains
pub fn normalize_name(name: &str) -> String {
    let stripped = strip_format_annotations(name);
    let mut words = split_words(&stripped.to_lowercase());
    drop_trailing_markers(&mut words);
    words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split "Artist - Title" into its raw parts
pub fn split_artist_title(name: &str) -> Option<(&str, &str)> {
    let (artist, title) = name.split_once(" - ")?;
    let (artist, title) = (artist.trim(), title.trim());
    if artist.is_empty() || title.is_empty() {
        None
    } else {
        Some((artist, title))
    }
}

/// Whole-string similarity (normalized Levenshtein)
pub fn ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Best similarity of the shorter string against any equal-length window of the longer
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return if a == b { 1.0 } else { 0.0 };
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (short, long) = if a_chars.len() <= b_chars.len() {
        (a_chars, b_chars)
    } else {
        (b_chars, a_chars)
    };
    if short.len() == long.len() {
        return ratio(a, b);
    }

    let short_str: String = short.iter().collect();
    long.windows(short.len())
        .map(|window| {
            let window: String = window.iter().collect();
            ratio(&short_str, &window)
        })
        .fold(0.0, f64::max)
}

/// Similarity after sorting whitespace tokens (order-insensitive)
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let sorted = |s: &str| {
        let mut tokens: Vec<&str> = s.split_whitespace().collect();
        tokens.sort_unstable();
        tokens.join(" ")
    };
    ratio(&sorted(a), &sorted(b))
}

/// Weighted blend of `ratio`, `partial_ratio` and `token_sort_ratio`
pub fn composite_score(a: &str, b: &str) -> f64 {
    RATIO_WEIGHT * ratio(a, b)
        + PARTIAL_WEIGHT * partial_ratio(a, b)
        + TOKEN_SORT_WEIGHT * token_sort_ratio(a, b)
}

/// Overlapping character trigrams; strings shorter than three characters
/// yield themselves as the only gram
pub fn trigrams(s: &str) -> HashSet<String> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() < 3 {
        return if s.is_empty() {
            HashSet::new()
        } else {
            HashSet::from([s.to_string()])
        };
    }
    chars.windows(3).map(|w| w.iter().collect()).collect()
}

/// Jaccard similarity of two gram sets
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Artist tokens agree when one token set contains the other
///
/// "daft punk" agrees with "daft punk feat pharrell"; "artist a" does not
/// agree with "artist b".
pub fn artists_agree(a: &[String], b: &[String]) -> bool {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    !small.is_empty() && small.iter().all(|t| large.contains(t))
}

/// Sorted, deduplicated tokens of a normalized artist name
pub fn artist_tokens(artist: &str) -> Vec<String> {
    let mut tokens: Vec<String> = normalize_name(artist)
        .split_whitespace()
        .filter(|t| !matches!(*t, "&" | "and" | "feat" | "feat." | "ft" | "ft." | "x" | "vs" | "vs."))
        .map(str::to_string)
        .collect();
    tokens.sort();
    tokens.dedup();
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_format_annotations() {
        assert_eq!(normalize_name("Track A (copy)"), "track a");
        assert_eq!(normalize_name("Sunrise [WAV]"), "sunrise");
        assert_eq!(normalize_name("Sunrise (320 kbps)"), "sunrise");
        assert_eq!(normalize_name("Sunrise (Extended Mix)"), "sunrise extended mix");
    }

    #[test]
    fn test_normalize_collapses_separators() {
        assert_eq!(normalize_name("Deep__Blue -  Sea"), "deep blue sea");
        assert_eq!(normalize_name("night_drive-wav"), "night drive");
        assert_eq!(normalize_name("Copy"), "copy");
        assert_eq!(normalize_name("Sunrise_FLAC"), "sunrise");
        assert_eq!(normalize_name("Sunrise 320kbps"), "sunrise");
        assert_eq!(normalize_name("Sunrise 24 bit"), "sunrise");
    }

    #[test]
    fn test_normalize_keeps_title_words_that_look_like_formats() {
        assert_eq!(normalize_name("Heat Wave"), "heat wave");
        assert_eq!(normalize_name("Magnum Opus"), "magnum opus");
        assert_eq!(normalize_name("Puppet Master"), "puppet master");
        assert_eq!(normalize_name("Hard Copy"), "hard copy");
        assert_eq!(normalize_name("Little Bit"), "little bit");
        assert_eq!(normalize_name("Heat Wave (WAV)"), "heat wave");
        assert_eq!(normalize_name("Hard Copy (copy)"), "hard copy");
    }

    #[test]
    fn test_split_artist_title() {
        assert_eq!(split_artist_title("Artist A - Sunrise"), Some(("Artist A", "Sunrise")));
        assert_eq!(split_artist_title("Sunrise"), None);
        assert_eq!(split_artist_title(" - Sunrise"), None);
    }

    #[test]
    fn test_identical_names_score_one() {
        assert!((composite_score("sunrise", "sunrise") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_near_miss_scores_below_default_threshold() {
        let score = composite_score("morning glow", "evening glow");
        assert!(score < 0.75, "score was {score}");
        assert!(score > 0.45, "score was {score}");
    }

    #[test]
    fn test_partial_ratio_finds_aligned_substring() {
        assert!((partial_ratio("blue sea", "deep blue sea") - 1.0).abs() < 1e-9);
        assert_eq!(partial_ratio("", "abc"), 0.0);
    }

    #[test]
    fn test_token_sort_ignores_order() {
        assert!((token_sort_ratio("glow morning", "morning glow") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_trigram_jaccard() {
        let a = trigrams("track");
        let b = trigrams("tracy");
        assert_eq!(a.len(), 3);
        assert!((jaccard(&a, &b) - 0.5).abs() < 1e-9);
        assert_eq!(trigrams("ab").len(), 1);
        assert!(trigrams("").is_empty());
    }

    #[test]
    fn test_artist_agreement() {
        let a = artist_tokens("Artist A");
        let b = artist_tokens("Artist B");
        assert!(!artists_agree(&a, &b));

        let solo = artist_tokens("Daft Punk");
        let feat = artist_tokens("Daft Punk feat. Pharrell");
        assert!(artists_agree(&solo, &feat));
        assert!(artists_agree(&feat, &solo));
    }
}
