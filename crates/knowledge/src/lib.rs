//! Knowledge store implementations for LogLens.
//!
//! - [`InMemoryKnowledge`]: process-local, for tests and dry runs
//! - [`FileKnowledge`]: JSONL files, one per container plus a global rollup
//!
//! Both keep per-container history subject to retention pruning and a
//! cross-container rollup that is never pruned.

pub mod file_backend;
pub mod in_memory;

pub use file_backend::FileKnowledge;
pub use in_memory::InMemoryKnowledge;

use chrono::{DateTime, Utc};
use loglens_core::analysis::AnalysisResult;
use loglens_core::knowledge::RollupEntry;

/// The rollup line recorded for one analysis.
pub(crate) fn rollup_entry(container: &str, result: &AnalysisResult, now: DateTime<Utc>) -> RollupEntry {
    let headline = result.headline();
    RollupEntry {
        timestamp: now,
        container_name: container.to_string(),
        headline: if headline.is_empty() {
            "(empty analysis)".to_string()
        } else {
            headline
        },
        tokens_used: result.tokens_used,
    }
}

#[cfg(test)]
pub(crate) fn test_result(container: &str, text: &str) -> AnalysisResult {
    AnalysisResult {
        container_name: container.to_string(),
        analysis_text: text.to_string(),
        tokens_used: 100,
        chunks_used: 1,
        deduplicated: false,
        original_count: 1,
        processed_count: 1,
        filter_stats: loglens_core::batch::FilterStats::default(),
    }
}
