//! The record produced for one container per scan cycle.

use crate::batch::FilterStats;
use serde::{Deserialize, Serialize};

/// The outcome of analyzing one container's new log lines.
///
/// Produced at most once per container per scan cycle and never mutated
/// afterwards; report writers, notifiers and the knowledge store only read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub container_name: String,
    pub analysis_text: String,
    /// Sum of `total_tokens` over every chat-completion call made
    pub tokens_used: u64,
    /// 1 for single-pass, N for an N-chunk analysis
    pub chunks_used: usize,
    pub deduplicated: bool,
    pub original_count: usize,
    pub processed_count: usize,
    pub filter_stats: FilterStats,
}

impl AnalysisResult {
    /// First non-empty line of the analysis, with markdown heading markers removed.
    pub fn headline(&self) -> String {
        self.analysis_text
            .lines()
            .map(|l| l.trim().trim_start_matches('#').trim())
            .find(|l| !l.is_empty())
            .unwrap_or_default()
            .to_string()
    }
}
