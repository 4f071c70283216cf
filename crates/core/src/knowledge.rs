//! Knowledge trait: the retention-bounded history of analyses.
//!
//! Two kinds of record live here:
//! - per-container [`KnowledgeEntry`] history, pruned to a retention window
//! - a global [`RollupEntry`] log across all containers, never pruned

use crate::analysis::AnalysisResult;
use crate::error::KnowledgeError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One stored analysis for one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub timestamp: DateTime<Utc>,
    pub container_name: String,
    pub analysis_text: String,
}

impl KnowledgeEntry {
    /// Whether this entry has outlived a retention window of `retention_days`.
    ///
    /// The window is closed: an entry exactly `retention_days` old is kept.
    pub fn is_expired(&self, retention_days: u32, now: DateTime<Utc>) -> bool {
        now - self.timestamp > Duration::days(i64::from(retention_days))
    }
}

/// One line of the cross-container running summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupEntry {
    pub timestamp: DateTime<Utc>,
    pub container_name: String,
    pub headline: String,
    pub tokens_used: u64,
}

/// Storage for analysis history.
///
/// Implementations must tolerate concurrent `append`/`prune` calls for
/// different containers.
#[async_trait]
pub trait KnowledgeBackend: Send + Sync {
    /// The backend name (e.g., "memory", "file").
    fn name(&self) -> &str;

    /// Record a new entry stamped `now`, and add it to the global rollup.
    async fn append(
        &self,
        container: &str,
        result: &AnalysisResult,
        now: DateTime<Utc>,
    ) -> std::result::Result<KnowledgeEntry, KnowledgeError>;

    /// Drop this container's entries older than `retention_days`.
    /// Returns how many were removed.
    async fn prune(
        &self,
        container: &str,
        retention_days: u32,
        now: DateTime<Utc>,
    ) -> std::result::Result<usize, KnowledgeError>;

    /// This container's entries, oldest first.
    async fn entries(
        &self,
        container: &str,
    ) -> std::result::Result<Vec<KnowledgeEntry>, KnowledgeError>;

    /// Containers with at least one stored entry.
    async fn containers(&self) -> std::result::Result<Vec<String>, KnowledgeError>;

    /// The global rollup, oldest first.
    async fn rollup(&self) -> std::result::Result<Vec<RollupEntry>, KnowledgeError>;
}

/// Render rollup entries as a markdown running summary.
pub fn render_rollup(entries: &[RollupEntry]) -> String {
    let mut out = String::from("# Log analysis rollup\n\n");
    if entries.is_empty() {
        out.push_str("_No analyses recorded yet._\n");
        return out;
    }
    for e in entries {
        out.push_str(&format!(
            "- {} **{}** — {} ({} tokens)\n",
            e.timestamp.format("%Y-%m-%d %H:%M"),
            e.container_name,
            e.headline,
            e.tokens_used
        ));
    }
    out
}
