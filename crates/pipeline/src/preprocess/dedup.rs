//! Collapse runs of consecutive identical messages.
//!
//! Lines are compared by a normalized key: the message trimmed and with any
//! leading application timestamp removed, so `2026-01-01T10:00:00Z retrying`
//! and `2026-01-01T10:00:05Z retrying` group together. Only adjacent lines
//! collapse; interleaved distinct messages keep their relative order.

use loglens_core::batch::PreparedLine;
use loglens_core::log::LogLine;
use regex_lite::Regex;
use std::sync::LazyLock;

static LEADING_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^\[?(?:",
        r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:[.,]\d{1,9})?(?:Z|[+-]\d{2}:?\d{2})?",
        r"|[A-Z][a-z]{2} +\d{1,2} \d{2}:\d{2}:\d{2}",
        r"|\d{2}:\d{2}:\d{2}(?:[.,]\d{1,9})?",
        r")\]?\s*",
    ))
    .unwrap()
});

/// The grouping key for a message.
pub fn normalize(message: &str) -> &str {
    let trimmed = message.trim();
    match LEADING_TIMESTAMP.find(trimmed) {
        Some(m) => &trimmed[m.end()..],
        None => trimmed,
    }
}

/// Collapse raw lines into prepared entries.
pub fn collapse(lines: Vec<LogLine>) -> Vec<PreparedLine> {
    collapse_prepared(lines.into_iter().map(PreparedLine::single).collect())
}

/// Merge adjacent entries with equal keys, summing their repeat counts.
///
/// The first entry of a run is kept as the representative.
pub fn collapse_prepared(entries: Vec<PreparedLine>) -> Vec<PreparedLine> {
    let mut out: Vec<PreparedLine> = Vec::with_capacity(entries.len());
    for entry in entries {
        match out.last_mut() {
            Some(prev) if normalize(&prev.line.message) == normalize(&entry.line.message) => {
                prev.repeat += entry.repeat;
            }
            _ => out.push(entry),
        }
    }
    out
}
