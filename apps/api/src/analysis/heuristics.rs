//! Heuristic mining of free-form model text: rating patterns, recommendation
//! sentences and word-root sentiment counting.

use std::sync::LazyLock;

use regex::Regex;

use crate::analysis::models::{MAX_DAY_RATING, MAX_RECOMMENDATIONS, MIN_DAY_RATING};

/// Explicit rating patterns in priority order; the first one yielding an in-range
/// value wins.
static RATING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b(\d{1,2})\s*/\s*10\b",
        r"(?i)\b(\d{1,2})\s+из\s+10\b",
        r"(?i)рейтинг\w*\s*(?:дня)?\s*[:\-–—=]?\s*(\d{1,2})\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid rating regex"))
    .collect()
});

/// Last resort: any standalone 1..=10, scanned after enumeration numbers are masked.
static BARE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(10|[1-9])\b").expect("valid bare number regex"));

/// "Рекомендация 2", "совет №1": the number counts items, it is not a rating.
static ENUMERATED_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:рекомендаци[яи]|совет)\s*(?:№\s*)?\d+").expect("valid enumerated label regex")
});

/// A line or sentence introduced by "рекомендация"/"совет", optionally numbered.
static RECOMMENDATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[\s*\-•]*(?:\d+[.)]\s*)?(?:рекомендаци[яи]|совет)\s*(?:№\s*)?\d*\s*[:.\-–—)]\s*(.+)$",
    )
    .expect("valid recommendation regex")
});

/// `1. `, `2) `, `- `, `• ` at the start of a line. The marker must be followed by
/// whitespace, so `7.5 часов` is not an item.
static LIST_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\d{1,2}[.)]|[-*•])\s+").expect("valid list marker regex")
});

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid word regex"));

/// Prose sentences at or under this many characters are not recommendations.
const MIN_FRAGMENT_CHARS: usize = 20;
const RATING_WORD: &str = "рейтинг";

const POSITIVE_ROOTS: &[&str] = &[
    "хорош", "отличн", "прекрасн", "замечательн", "рад", "счаст", "весел", "довол",
    "любл", "любим", "успе", "спокойн", "вдохнов", "энерги", "бодр", "улыб", "good",
    "great", "happy", "calm",
];

const NEGATIVE_ROOTS: &[&str] = &[
    "плох", "ужасн", "груст", "печал", "устал", "тяжел", "тяжёл", "стресс", "тревог",
    "тревож", "зло", "злю", "раздраж", "одинок", "разочаров", "боль", "депресс", "страх",
    "bad", "sad", "tired", "angry",
];

/// Rating used when sentiment is balanced or absent.
pub const NEUTRAL_RATING: u8 = 5;

pub fn extract_rating(text: &str) -> Option<u8> {
    let in_range = |re: &Regex, haystack: &str| {
        re.captures_iter(haystack)
            .filter_map(|c| c.get(1)?.as_str().parse::<u8>().ok())
            .find(|r| (MIN_DAY_RATING..=MAX_DAY_RATING).contains(r))
    };

    RATING_PATTERNS
        .iter()
        .find_map(|re| in_range(re, text))
        .or_else(|| in_range(&*BARE_NUMBER_RE, &mask_enumeration(text)))
}

/// Drops list markers and "рекомендация N" labels so item numbers never read as ratings.
fn mask_enumeration(text: &str) -> String {
    text.lines()
        .map(|line| {
            let line = LIST_MARKER_RE.replace(line, "");
            ENUMERATED_LABEL_RE.replace_all(&line, "").into_owned()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Recommendations the reply marks as such: "рекомендация/совет" lines first, otherwise
/// list items. Markers are stripped; at most three, in text order.
pub fn extract_listed_recommendations(text: &str) -> Vec<String> {
    let prefixed: Vec<String> = RECOMMENDATION_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|r| !r.is_empty())
        .take(MAX_RECOMMENDATIONS)
        .collect();
    if !prefixed.is_empty() {
        return prefixed;
    }

    text.lines()
        .filter_map(|line| {
            let marker = LIST_MARKER_RE.find(line)?;
            let item = line[marker.end()..].trim();
            (!item.is_empty()).then(|| item.to_string())
        })
        .filter(|item| !item.to_lowercase().contains(RATING_WORD))
        .take(MAX_RECOMMENDATIONS)
        .collect()
}

/// Prose sentences longer than 20 characters that do not talk about the rating.
/// List lines are skipped. At most three, in text order.
pub fn extract_sentence_recommendations(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !LIST_MARKER_RE.is_match(line))
        .flat_map(split_sentences)
        .filter(|f| f.chars().count() > MIN_FRAGMENT_CHARS)
        .filter(|f| !f.to_lowercase().contains(RATING_WORD))
        .take(MAX_RECOMMENDATIONS)
        .collect()
}

/// Splits one line on sentence ends (`.`, `!`, `?`, `…` followed by whitespace).
/// The terminator stays with its sentence.
fn split_sentences(line: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = matches!(c, '.' | '!' | '?' | '…')
            && chars.peek().map_or(true, |next| next.is_whitespace());
        if at_boundary {
            sentences.push(std::mem::take(&mut current));
        }
    }
    sentences.push(current);
    sentences
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SentimentCounts {
    pub positive: usize,
    pub negative: usize,
}

/// Counts tokens of the lowercased text that start with a positive or negative root.
pub fn count_sentiment(text: &str) -> SentimentCounts {
    let lowered = text.to_lowercase();
    let mut counts = SentimentCounts::default();
    for word in WORD_RE.find_iter(&lowered).map(|m| m.as_str()) {
        if POSITIVE_ROOTS.iter().any(|root| word.starts_with(root)) {
            counts.positive += 1;
        } else if NEGATIVE_ROOTS.iter().any(|root| word.starts_with(root)) {
            counts.negative += 1;
        }
    }
    counts
}

/// >2:1 positive → 8, positive ahead → 6, >2:1 negative → 3, negative ahead → 4,
/// otherwise neutral.
pub fn sentiment_rating(counts: SentimentCounts) -> u8 {
    let SentimentCounts { positive, negative } = counts;
    if positive > 2 * negative {
        8
    } else if positive > negative {
        6
    } else if negative > 2 * positive {
        3
    } else if negative > positive {
        4
    } else {
        NEUTRAL_RATING
    }
}
