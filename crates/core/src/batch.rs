//! Prepared batches and chunks: what the pipeline actually sends downstream.

use crate::log::LogLine;
use serde::{Deserialize, Serialize};

/// A retained log entry after preprocessing.
///
/// `repeat` counts how many consecutive identical messages were collapsed
/// into this entry (1 when the line was not a duplicate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedLine {
    pub line: LogLine,
    pub repeat: usize,
}

impl PreparedLine {
    pub fn single(line: LogLine) -> Self {
        Self { line, repeat: 1 }
    }

    /// Render as one newline-terminated line of prompt text.
    pub fn render(&self) -> String {
        let mut out = format!(
            "{} [{}] {}",
            self.line.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            self.line.stream,
            self.line.message
        );
        if self.repeat > 1 {
            out.push_str(&format!(" (repeated {} times)", self.repeat));
        }
        out.push('\n');
        out
    }
}

/// Counts produced by the regexp pre-filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
    /// Lines handed to the preprocessor
    pub lines_total: usize,
    /// Lines dropped by an enabled pattern
    pub lines_filtered: usize,
}

/// The output of the preprocessor for one container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedBatch {
    pub lines: Vec<PreparedLine>,
    /// Lines remaining after filtering, before collapsing duplicates
    pub original_count: usize,
    /// Entries remaining after collapsing duplicates
    pub processed_count: usize,
    pub filter_stats: FilterStats,
}

impl PreparedBatch {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn deduplicated(&self) -> bool {
        self.processed_count < self.original_count
    }

    /// The full prompt text for the batch.
    pub fn render(&self) -> String {
        render_lines(&self.lines)
    }
}

/// A contiguous, budget-fitting slice of a prepared batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based position of this chunk
    pub index: usize,
    pub lines: Vec<PreparedLine>,
    pub estimated_tokens: usize,
}

impl Chunk {
    pub fn render(&self) -> String {
        render_lines(&self.lines)
    }
}

fn render_lines(lines: &[PreparedLine]) -> String {
    lines.iter().map(PreparedLine::render).collect()
}
