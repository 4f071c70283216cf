//! One scan cycle over a list of containers.
//!
//! Containers are processed one after another. A failure for one container
//! is recorded in its [`ScanReport`] and the cycle moves on.

use crate::analyzer::{Analyzer, AnalyzerSettings};
use crate::preprocess::Preprocessor;
use crate::prompts::PromptTemplates;
use chrono::{DateTime, Utc};
use loglens_config::AppConfig;
use loglens_core::analysis::AnalysisResult;
use loglens_core::knowledge::KnowledgeBackend;
use loglens_core::log::LogSource;
use loglens_core::provider::Provider;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Per-container position: the newest log timestamp already consumed.
pub type Cursors = BTreeMap<String, DateTime<Utc>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Analyzed(AnalysisResult),
    NoNewLogs,
    /// Every new line matched a filter pattern.
    AllFiltered { lines_filtered: usize },
    Skipped { reason: String },
}

impl ScanOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ScanOutcome::Analyzed(_) => "analyzed",
            ScanOutcome::NoNewLogs => "no new logs",
            ScanOutcome::AllFiltered { .. } => "all filtered",
            ScanOutcome::Skipped { .. } => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub container: String,
    pub outcome: ScanOutcome,
}

/// Where analyses are recorded and how long they are kept.
#[derive(Clone)]
pub struct Retention {
    pub store: Arc<dyn KnowledgeBackend>,
    pub retention_days: u32,
}

pub struct ScanCycle {
    preprocessor: Preprocessor,
    analyzer: Analyzer,
    ignore_instructions: HashMap<String, String>,
    knowledge: Option<Retention>,
}

impl ScanCycle {
    pub fn new(preprocessor: Preprocessor, analyzer: Analyzer) -> Self {
        Self {
            preprocessor,
            analyzer,
            ignore_instructions: HashMap::new(),
            knowledge: None,
        }
    }

    /// Wire the cycle from configuration.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        prompts: PromptTemplates,
    ) -> Result<Self, regex_lite::Error> {
        let preprocessor = Preprocessor::from_config(config)?;
        let analyzer = Analyzer::new(provider, prompts, AnalyzerSettings::from_config(config));
        let mut cycle = Self::new(preprocessor, analyzer);
        for (name, container) in &config.containers {
            if let Some(text) = &container.ignore_instructions {
                cycle = cycle.with_ignore_instructions(name, text);
            }
        }
        Ok(cycle)
    }

    pub fn with_ignore_instructions(
        mut self,
        container: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.ignore_instructions.insert(container.into(), text.into());
        self
    }

    pub fn with_knowledge(mut self, store: Arc<dyn KnowledgeBackend>, retention_days: u32) -> Self {
        self.knowledge = Some(Retention {
            store,
            retention_days,
        });
        self
    }

    /// Scan `containers` in order, advancing `cursors` for each container
    /// whose new lines were fully handled.
    ///
    /// Stops before the next container once `cancel` fires.
    pub async fn run(
        &self,
        source: &dyn LogSource,
        containers: &[String],
        cursors: &mut Cursors,
        cancel: &CancellationToken,
    ) -> Vec<ScanReport> {
        let mut reports = Vec::with_capacity(containers.len());

        for container in containers {
            if cancel.is_cancelled() {
                info!(remaining = containers.len() - reports.len(), "Scan cancelled");
                break;
            }
            let outcome = self.scan_one(source, container, cursors).await;
            match &outcome {
                ScanOutcome::Skipped { reason } => {
                    warn!(container = %container, %reason, "Container skipped");
                }
                other => info!(container = %container, outcome = other.label(), "Container scanned"),
            }
            reports.push(ScanReport {
                container: container.clone(),
                outcome,
            });
        }
        reports
    }

    async fn scan_one(
        &self,
        source: &dyn LogSource,
        container: &str,
        cursors: &mut Cursors,
    ) -> ScanOutcome {
        let since = cursors.get(container).copied();
        let lines = match source.fetch_since(container, since).await {
            Ok(lines) => lines,
            Err(e) => {
                return ScanOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
        };
        let Some(newest) = lines.iter().map(|l| l.timestamp).max() else {
            return ScanOutcome::NoNewLogs;
        };

        let batch = self.preprocessor.prepare(container, lines);
        if batch.is_empty() {
            cursors.insert(container.to_string(), newest);
            return ScanOutcome::AllFiltered {
                lines_filtered: batch.filter_stats.lines_filtered,
            };
        }

        let ignore = self.ignore_instructions.get(container).map(String::as_str);
        let result = match self.analyzer.analyze(container, ignore, &batch).await {
            Ok(result) => result,
            Err(e) => {
                return ScanOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
        };

        if let Some(knowledge) = &self.knowledge {
            record(knowledge, container, &result, Utc::now()).await;
        }
        cursors.insert(container.to_string(), newest);
        ScanOutcome::Analyzed(result)
    }
}

/// Append then prune. Store failures are logged, not fatal.
async fn record(knowledge: &Retention, container: &str, result: &AnalysisResult, now: DateTime<Utc>) {
    if let Err(e) = knowledge.store.append(container, result, now).await {
        warn!(container, error = %e, "Failed to record analysis");
    }
    match knowledge
        .store
        .prune(container, knowledge.retention_days, now)
        .await
    {
        Ok(0) => {}
        Ok(removed) => info!(container, removed, "Pruned expired knowledge entries"),
        Err(e) => warn!(container, error = %e, "Failed to prune knowledge"),
    }
}
