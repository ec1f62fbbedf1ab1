//! Response-language consistency heuristic.
//!
//! A healthy session returns one page in one language. When the endpoint
//! starts mixing scripts within a page it usually means the session lost its
//! language pin. The check counts characters per Unicode script family; it
//! is deliberately crude and never tries to name a language.

use revscrape_core::Review;

/// At most this many texts are classified per page.
pub const MAX_SAMPLES: usize = 5;

/// Fewer classified samples than this is never called mixed.
pub const MIN_SAMPLES: usize = 3;

/// A page is mixed when its most common script holds less than this share...
pub const DOMINANT_SHARE: f64 = 0.6;

/// ...and the runner-up holds at least this share.
pub const RUNNER_UP_SHARE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Script {
    Latin,
    Cyrillic,
    Greek,
    Arabic,
    Hebrew,
    Devanagari,
    Thai,
    Han,
    /// Hiragana or katakana. Text containing any kana counts as kana even
    /// when kanji outnumber it.
    Kana,
    Hangul,
}

#[must_use]
pub fn script_of(c: char) -> Option<Script> {
    let script = match u32::from(c) {
        0x0041..=0x005A | 0x0061..=0x007A | 0x00C0..=0x024F | 0x1E00..=0x1EFF => Script::Latin,
        0x0370..=0x03FF | 0x1F00..=0x1FFF => Script::Greek,
        0x0400..=0x052F => Script::Cyrillic,
        0x0590..=0x05FF => Script::Hebrew,
        0x0600..=0x06FF | 0x0750..=0x077F => Script::Arabic,
        0x0900..=0x097F => Script::Devanagari,
        0x0E00..=0x0E7F => Script::Thai,
        0x3040..=0x30FF | 0x31F0..=0x31FF => Script::Kana,
        0x3400..=0x4DBF | 0x4E00..=0x9FFF => Script::Han,
        0x1100..=0x11FF | 0x3130..=0x318F | 0xAC00..=0xD7AF => Script::Hangul,
        _ => return None,
    };
    Some(script)
}

/// The script with the most characters in `text`, or `None` if no
/// character belongs to a known script.
#[must_use]
pub fn dominant_script(text: &str) -> Option<Script> {
    let mut counts: Vec<(Script, usize)> = Vec::new();
    for script in text.chars().filter_map(script_of) {
        match counts.iter_mut().find(|(s, _)| *s == script) {
            Some((_, n)) => *n += 1,
            None => counts.push((script, 1)),
        }
    }
    if counts.iter().any(|(s, _)| *s == Script::Kana) {
        return Some(Script::Kana);
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(script, _)| script)
}

/// Result of checking one page.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageCheck {
    pub samples: usize,
    pub dominant: Option<Script>,
    pub dominant_share: f64,
    pub mixed: bool,
}

/// Samples up to [`MAX_SAMPLES`] review texts and decides whether the page
/// mixes script families in comparable proportions.
#[must_use]
pub fn check_page(reviews: &[Review]) -> LanguageCheck {
    let sampled: Vec<Script> = reviews
        .iter()
        .filter(|r| !r.text.trim().is_empty())
        .filter_map(|r| dominant_script(&r.text))
        .take(MAX_SAMPLES)
        .collect();

    let mut tally: Vec<(Script, usize)> = Vec::new();
    for script in &sampled {
        match tally.iter_mut().find(|(s, _)| s == script) {
            Some((_, n)) => *n += 1,
            None => tally.push((*script, 1)),
        }
    }
    tally.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    #[allow(clippy::cast_precision_loss)]
    let share = |n: usize| n as f64 / sampled.len().max(1) as f64;
    let dominant_share = tally.first().map_or(0.0, |(_, n)| share(*n));
    let runner_up_share = tally.get(1).map_or(0.0, |(_, n)| share(*n));

    LanguageCheck {
        samples: sampled.len(),
        dominant: tally.first().map(|(s, _)| *s),
        dominant_share,
        mixed: sampled.len() >= MIN_SAMPLES
            && dominant_share < DOMINANT_SHARE
            && runner_up_share >= RUNNER_UP_SHARE,
    }
}
