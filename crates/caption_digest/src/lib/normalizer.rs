//! # Subtitle text normalizer
//!
//! Reduces cue-based timed text (SRT, WebVTT) to plain prose. Works line by
//! line on the cue-number / time-range / text-line pattern shared by both
//! formats. Input starting with a `WEBVTT` header additionally gets its
//! metadata blocks skipped and its rolling duplicate lines dropped.

use std::sync::LazyLock;

use regex::Regex;

static TIME_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:\d+:)?\d{1,2}:\d{2}(?:[.,]\d{1,3})?\s*-->\s*(?:\d+:)?\d{1,2}:\d{2}(?:[.,]\d{1,3})?",
    )
    .unwrap()
});

/// Inline cue markup: `<c>`, `</c>`, `<i>`, `<v Speaker>`, `<00:00:01.000>`.
static CUE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[^<>\n]*>").unwrap());

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Converts timed text into a single line of plain text.
///
/// Drops blank lines, bare cue numbers and time-range lines, strips inline
/// cue tags, then joins what is left with single spaces.
///
/// For WebVTT input the header, `NOTE`, `STYLE` and `REGION` blocks are
/// skipped, and a line identical to the previous kept line is dropped.
pub fn normalize(raw_timed_text: &str) -> String {
    let is_webvtt = raw_timed_text
        .trim_start_matches('\u{feff}')
        .trim_start()
        .starts_with("WEBVTT");

    let mut kept: Vec<String> = Vec::new();
    let mut in_metadata_block = false;
    let mut block_start = true;

    for line in raw_timed_text.lines() {
        let line = line.trim_start_matches('\u{feff}').trim();

        if line.is_empty() {
            in_metadata_block = false;
            block_start = true;
            continue;
        }
        let opens_block = std::mem::replace(&mut block_start, false);

        if in_metadata_block {
            continue;
        }
        let is_header = kept.is_empty() && line.starts_with("WEBVTT");
        if is_webvtt && opens_block && (is_header || is_metadata_block_start(line)) {
            in_metadata_block = true;
            continue;
        }
        if is_cue_number(line) || TIME_RANGE_RE.is_match(line) {
            continue;
        }

        let text = decode_entities(&CUE_TAG_RE.replace_all(line, ""));
        let text = collapse_whitespace(&text);
        if text.is_empty() {
            continue;
        }
        // rolling auto-captions repeat the previous line in the next cue
        if is_webvtt && kept.last().is_some_and(|prev| *prev == text) {
            continue;
        }
        kept.push(text);
    }

    collapse_whitespace(&kept.join(" "))
}

/// Collapses every whitespace run to one space and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

fn is_cue_number(line: &str) -> bool {
    line.chars().all(|c| c.is_ascii_digit())
}

fn is_metadata_block_start(line: &str) -> bool {
    line == "NOTE" || line.starts_with("NOTE ") || line == "STYLE" || line == "REGION"
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
