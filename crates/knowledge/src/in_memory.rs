//! In-memory knowledge store. Useful for tests and one-off scans.

use crate::rollup_entry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loglens_core::analysis::AnalysisResult;
use loglens_core::error::KnowledgeError;
use loglens_core::knowledge::{KnowledgeBackend, KnowledgeEntry, RollupEntry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct InMemoryKnowledge {
    entries: Arc<RwLock<HashMap<String, Vec<KnowledgeEntry>>>>,
    rollup: Arc<RwLock<Vec<RollupEntry>>>,
}

impl InMemoryKnowledge {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            rollup: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryKnowledge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeBackend for InMemoryKnowledge {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(
        &self,
        container: &str,
        result: &AnalysisResult,
        now: DateTime<Utc>,
    ) -> Result<KnowledgeEntry, KnowledgeError> {
        let entry = KnowledgeEntry {
            timestamp: now,
            container_name: container.to_string(),
            analysis_text: result.analysis_text.clone(),
        };
        self.entries
            .write()
            .await
            .entry(container.to_string())
            .or_default()
            .push(entry.clone());
        self.rollup
            .write()
            .await
            .push(rollup_entry(container, result, now));
        Ok(entry)
    }

    async fn prune(
        &self,
        container: &str,
        retention_days: u32,
        now: DateTime<Utc>,
    ) -> Result<usize, KnowledgeError> {
        let mut entries = self.entries.write().await;
        let Some(list) = entries.get_mut(container) else {
            return Ok(0);
        };
        let before = list.len();
        list.retain(|e| !e.is_expired(retention_days, now));
        let removed = before - list.len();
        if list.is_empty() {
            entries.remove(container);
        }
        Ok(removed)
    }

    async fn entries(&self, container: &str) -> Result<Vec<KnowledgeEntry>, KnowledgeError> {
        Ok(self
            .entries
            .read()
            .await
            .get(container)
            .cloned()
            .unwrap_or_default())
    }

    async fn containers(&self) -> Result<Vec<String>, KnowledgeError> {
        let mut names: Vec<String> = self.entries.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn rollup(&self) -> Result<Vec<RollupEntry>, KnowledgeError> {
        Ok(self.rollup.read().await.clone())
    }
}
