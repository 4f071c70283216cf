//! Analysis orchestrator.
//!
//! Turns one container's [`PreparedBatch`] into an [`AnalysisResult`], either
//! with a single Analyze call or with a sequential chunk loop followed by a
//! Synthesize call. Every call goes through the injected [`Provider`], which
//! in production is the retrying transport.

use crate::planner::{self, Budget, Plan, PlanError, TemplateOverhead};
use crate::prompts::PromptTemplates;
use crate::token::estimate_messages_tokens;
use loglens_config::AppConfig;
use loglens_core::analysis::AnalysisResult;
use loglens_core::batch::{Chunk, PreparedBatch};
use loglens_core::error::ProviderError;
use loglens_core::message::Message;
use loglens_core::provider::{Provider, ProviderRequest, ProviderResponse};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Model parameters and limits for the analysis calls.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerSettings {
    pub model: String,
    pub temperature: f32,
    /// Context window plus the single-pass and chunk completion allowances
    pub budget: Budget,
    pub synthesis_tokens: u32,
}

impl AnalyzerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            budget: Budget::from_config(config),
            synthesis_tokens: config.synthesis_tokens,
        }
    }
}

/// Which call of an analysis failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Analyze,
    SummarizeChunk { index: usize, total: usize },
    Synthesize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Analyze => f.write_str("analysis"),
            Stage::SummarizeChunk { index, total } => write!(f, "chunk {index}/{total} summary"),
            Stage::Synthesize => f.write_str("synthesis"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{stage} failed: {source}")]
    Provider {
        stage: Stage,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Plan(#[from] PlanError),
}

impl AnalysisError {
    /// The failed stage, when a provider call failed.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            AnalysisError::Provider { stage, .. } => Some(*stage),
            AnalysisError::Plan(_) => None,
        }
    }
}

/// Stand-in for line counts and chunk numbers when measuring overhead.
const WIDE_COUNT: usize = 999_999;

pub struct Analyzer {
    provider: Arc<dyn Provider>,
    prompts: PromptTemplates,
    settings: AnalyzerSettings,
}

impl Analyzer {
    pub fn new(provider: Arc<dyn Provider>, prompts: PromptTemplates, settings: AnalyzerSettings) -> Self {
        Self {
            provider,
            prompts,
            settings,
        }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Analyze one container's prepared batch.
    ///
    /// Calls are issued one at a time. The first unrecovered failure aborts
    /// the analysis and reports its stage; no partial result is produced.
    pub async fn analyze(
        &self,
        container: &str,
        ignore_instructions: Option<&str>,
        batch: &PreparedBatch,
    ) -> Result<AnalysisResult, AnalysisError> {
        let system = self.prompts.system_prompt(ignore_instructions);
        let overhead = self.overhead(container, &system);
        let plan = planner::plan(batch, self.settings.budget, overhead)?;

        let (analysis_text, tokens_used, chunks_used) = match plan {
            Plan::SinglePass { estimated_tokens } => {
                info!(container, estimated_tokens, "Analyzing in a single pass");
                let user = self
                    .prompts
                    .analysis_prompt(container, &batch.render(), batch.lines.len());
                let response = self
                    .call(
                        Stage::Analyze,
                        &system,
                        user,
                        self.settings.budget.reserved_completion as u32,
                    )
                    .await?;
                let tokens = response.total_tokens();
                (response.message.content, tokens, 1)
            }
            Plan::Chunked { chunks, target } => {
                info!(
                    container,
                    chunks = chunks.len(),
                    target,
                    "Batch exceeds the token budget, analyzing in chunks"
                );
                self.chunk_loop(container, &system, &chunks).await?
            }
        };

        info!(container, tokens = tokens_used, chunks = chunks_used, "Analysis complete");

        Ok(AnalysisResult {
            container_name: container.to_string(),
            analysis_text,
            tokens_used,
            chunks_used,
            deduplicated: batch.deduplicated(),
            original_count: batch.original_count,
            processed_count: batch.processed_count,
            filter_stats: batch.filter_stats,
        })
    }

    async fn chunk_loop(
        &self,
        container: &str,
        system: &str,
        chunks: &[Chunk],
    ) -> Result<(String, u64, usize), AnalysisError> {
        let total = chunks.len();
        let mut tokens_used = 0u64;
        let mut summaries = Vec::with_capacity(total);

        for chunk in chunks {
            debug!(
                container,
                chunk = chunk.index,
                total,
                tokens = chunk.estimated_tokens,
                "Summarizing chunk"
            );
            let user = self.prompts.chunk_summary_prompt(
                container,
                &chunk.render(),
                chunk.lines.len(),
                chunk.index,
                total,
            );
            let response = self
                .call(
                    Stage::SummarizeChunk {
                        index: chunk.index,
                        total,
                    },
                    system,
                    user,
                    self.settings.budget.chunk_completion as u32,
                )
                .await?;
            tokens_used += response.total_tokens();
            summaries.push(response.message.content);
        }

        if total == 1 {
            let text = summaries.pop().unwrap_or_default();
            return Ok((text, tokens_used, 1));
        }

        let joined = summaries
            .iter()
            .enumerate()
            .map(|(i, s)| format!("### Part {} of {}\n{}\n", i + 1, total, s.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        let user = self.prompts.synthesis_prompt(container, &joined, total);
        let prompt_tokens =
            estimate_messages_tokens(&[Message::system(system), Message::user(user.as_str())]);
        let completion = self.settings.synthesis_tokens as usize;
        if !self.settings.budget.fits(prompt_tokens, completion) {
            warn!(
                container,
                prompt_tokens,
                completion,
                max_tokens = self.settings.budget.max_tokens,
                "Synthesis prompt exceeds the context budget"
            );
        }
        let response = self
            .call(Stage::Synthesize, system, user, self.settings.synthesis_tokens)
            .await?;
        tokens_used += response.total_tokens();

        Ok((response.message.content, tokens_used, total))
    }

    async fn call(
        &self,
        stage: Stage,
        system: &str,
        user: String,
        max_tokens: u32,
    ) -> Result<ProviderResponse, AnalysisError> {
        let request = ProviderRequest {
            model: self.settings.model.clone(),
            messages: vec![Message::system(system), Message::user(user)],
            temperature: self.settings.temperature,
            max_tokens: Some(max_tokens),
        };
        self.provider
            .complete(request)
            .await
            .map_err(|source| AnalysisError::Provider { stage, source })
    }

    /// Prompt cost of each call kind with an empty log body. Counts are
    /// rendered at their widest so the real prompt never costs more.
    fn overhead(&self, container: &str, system: &str) -> TemplateOverhead {
        let cost = |user: String| {
            estimate_messages_tokens(&[Message::system(system), Message::user(user)])
        };
        TemplateOverhead {
            analysis: cost(self.prompts.analysis_prompt(container, "", WIDE_COUNT)),
            chunk_summary: cost(self.prompts.chunk_summary_prompt(
                container, "", WIDE_COUNT, WIDE_COUNT, WIDE_COUNT,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::Preprocessor;
    use crate::test_helpers::*;
    use loglens_config::RegexpFilterRule;

    fn settings(max_tokens: usize, reserved: usize) -> AnalyzerSettings {
        AnalyzerSettings {
            model: "test-model".into(),
            temperature: 0.0,
            budget: Budget::new(max_tokens, reserved).with_chunk_completion(reserved / 2),
            synthesis_tokens: 512,
        }
    }

    /// A template set with a known, tiny overhead.
    fn bare_prompts() -> PromptTemplates {
        PromptTemplates {
            system: "sys".into(),
            analysis: "{{logs}}".into(),
            chunk_summary: "{{logs}}".into(),
            synthesis: "{{summaries}}".into(),
        }
    }

    /// 100-byte rendered lines, 25 tokens each.
    fn batch(n: usize) -> PreparedBatch {
        let msgs: Vec<String> = (0..n).map(|i| format!("{:<65}", format!("event {i}"))).collect();
        let refs: Vec<&str> = msgs.iter().map(String::as_str).collect();
        Preprocessor::default().prepare("svc", log_lines(&refs))
    }

    #[tokio::test]
    async fn small_batch_is_one_call() {
        let provider = Arc::new(SequentialMockProvider::texts(1, 42));
        let analyzer = Analyzer::new(provider.clone(), bare_prompts(), settings(10_000, 1_000));

        let result = analyzer.analyze("svc", None, &batch(5)).await.unwrap();

        assert_eq!(provider.call_count(), 1);
        assert_eq!(result.chunks_used, 1);
        assert_eq!(result.tokens_used, 42);
        assert_eq!(result.analysis_text, "response 1");
        let req = &provider.requests()[0];
        assert_eq!(req.max_tokens, Some(1_000));
        assert_eq!(req.model, "test-model");
    }

    #[tokio::test]
    async fn three_chunks_then_synthesis() {
        // overhead: system "sys" (1+4) + empty user (0+4) = 9 per call kind
        // target = 200 - 100 - 9 = 91 tokens, three 25-token lines per chunk
        let provider = Arc::new(SequentialMockProvider::texts(4, 10));
        let analyzer = Analyzer::new(provider.clone(), bare_prompts(), settings(200, 100));

        let result = analyzer.analyze("svc", None, &batch(9)).await.unwrap();

        assert_eq!(provider.call_count(), 4);
        assert_eq!(result.chunks_used, 3);
        assert_eq!(result.tokens_used, 40);
        assert_eq!(result.analysis_text, "response 4");

        let requests = provider.requests();
        assert_eq!(requests[0].max_tokens, Some(50));
        assert_eq!(requests[3].max_tokens, Some(512));
        let synthesis_input = &requests[3].messages[1].content;
        for i in 1..=3 {
            assert!(synthesis_input.contains(&format!("response {i}")));
        }
        let first = synthesis_input.find("response 1").unwrap();
        let third = synthesis_input.find("response 3").unwrap();
        assert!(first < third);
    }

    #[tokio::test]
    async fn chunk_requests_carry_index_and_total() {
        let provider = Arc::new(SequentialMockProvider::texts(40, 1));
        let analyzer = Analyzer::new(provider.clone(), PromptTemplates::default(), settings(600, 300));

        let result = analyzer.analyze("svc", None, &batch(30)).await.unwrap();
        let requests = provider.requests();
        let n = result.chunks_used;
        assert!(n > 1);
        assert_eq!(requests.len(), n + 1);
        for (i, req) in requests[..n].iter().enumerate() {
            assert!(req.messages[1].content.contains(&format!("part {} of {n}", i + 1)));
        }
    }

    #[tokio::test]
    async fn chunk_requests_fit_the_window() {
        let config = AppConfig::from_toml(
            "model = \"gpt-4\"\nreserved_completion = 1024\nchunk_summary_tokens = 2048\n",
        )
        .unwrap();
        let settings = AnalyzerSettings::from_config(&config);
        assert_eq!(settings.budget.max_tokens, 8_192);

        let provider = Arc::new(SequentialMockProvider::texts(64, 1));
        let analyzer = Analyzer::new(provider.clone(), PromptTemplates::default(), settings);
        let result = analyzer.analyze("svc", None, &batch(2000)).await.unwrap();

        let requests = provider.requests();
        assert!(result.chunks_used > 1);
        for req in &requests[..result.chunks_used] {
            let prompt = estimate_messages_tokens(&req.messages);
            assert_eq!(req.max_tokens, Some(2048));
            assert!(prompt + 2048 <= 8_192, "prompt {prompt} + 2048 overflows");
        }
    }

    #[tokio::test]
    async fn oversized_synthesis_is_still_sent() {
        // Three summaries of 250 tokens each overflow a 600-token window.
        let long = "s".repeat(1_000);
        let results: Vec<_> = (0..10).map(|_| Ok(make_text_response(&long, 1))).collect();
        let provider = Arc::new(SequentialMockProvider::new(results));
        let analyzer = Analyzer::new(provider.clone(), bare_prompts(), settings(600, 300));

        let result = analyzer.analyze("svc", None, &batch(30)).await.unwrap();

        let requests = provider.requests();
        let synthesis = requests.last().unwrap();
        let prompt = estimate_messages_tokens(&synthesis.messages);
        assert!(!analyzer.settings().budget.fits(prompt, 512));
        assert_eq!(requests.len(), result.chunks_used + 1);
    }

    #[tokio::test]
    async fn failure_mid_loop_reports_chunk_index() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            Ok(make_text_response("first", 10)),
            Err(ProviderError::RetriesExhausted {
                attempts: 3,
                last: Box::new(ProviderError::ApiError {
                    status_code: 503,
                    message: "unavailable".into(),
                }),
            }),
        ]));
        let analyzer = Analyzer::new(provider.clone(), bare_prompts(), settings(200, 100));

        let err = analyzer.analyze("svc", None, &batch(9)).await.unwrap_err();

        assert_eq!(provider.call_count(), 2);
        assert_eq!(err.stage(), Some(Stage::SummarizeChunk { index: 2, total: 3 }));
        assert!(err.to_string().contains("chunk 2/3 summary failed"));
    }

    #[tokio::test]
    async fn synthesis_failure_is_reported() {
        let mut results: Vec<_> = (0..3).map(|_| Ok(make_text_response("s", 1))).collect();
        results.push(Err(ProviderError::AuthenticationFailed("revoked".into())));
        let provider = Arc::new(SequentialMockProvider::new(results));
        let analyzer = Analyzer::new(provider, bare_prompts(), settings(200, 100));

        let err = analyzer.analyze("svc", None, &batch(9)).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Synthesize));
    }

    #[tokio::test]
    async fn single_chunk_skips_synthesis() {
        // Analysis template is heavier than the chunk template, so the batch
        // misses single-pass but fits one chunk.
        let prompts = PromptTemplates {
            analysis: format!("{}{{{{logs}}}}", "x".repeat(400)),
            ..bare_prompts()
        };
        let provider = Arc::new(SequentialMockProvider::texts(1, 7));
        let analyzer = Analyzer::new(provider.clone(), prompts, settings(200, 100));

        let result = analyzer.analyze("svc", None, &batch(2)).await.unwrap();

        assert_eq!(provider.call_count(), 1);
        assert_eq!(result.chunks_used, 1);
        assert_eq!(result.tokens_used, 7);
        assert_eq!(result.analysis_text, "response 1");
        assert_eq!(provider.requests()[0].max_tokens, Some(50));
    }

    #[tokio::test]
    async fn budget_too_small_makes_no_calls() {
        let provider = Arc::new(SequentialMockProvider::texts(0, 0));
        let analyzer = Analyzer::new(provider.clone(), bare_prompts(), settings(100, 95));

        let err = analyzer.analyze("svc", None, &batch(3)).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Plan(PlanError::BudgetTooSmall { .. })));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn ignore_instructions_reach_the_system_prompt() {
        let provider = Arc::new(SequentialMockProvider::texts(1, 1));
        let analyzer = Analyzer::new(provider.clone(), PromptTemplates::default(), settings(10_000, 1_000));

        analyzer
            .analyze("svc", Some("Ignore cron noise."), &batch(1))
            .await
            .unwrap();
        let system = &provider.requests()[0].messages[0].content;
        assert!(system.contains("Ignore cron noise."));
    }

    #[tokio::test]
    async fn counts_are_copied_from_the_batch() {
        let mut msgs = vec!["heartbeat failed"; 10];
        msgs.push("heartbeat restored");
        let batch = Preprocessor::default().prepare("svc", log_lines(&msgs));
        let provider = Arc::new(SequentialMockProvider::texts(1, 3));
        let analyzer = Analyzer::new(provider, bare_prompts(), settings(10_000, 1_000));

        let result = analyzer.analyze("svc", None, &batch).await.unwrap();
        assert_eq!(result.original_count, 11);
        assert_eq!(result.processed_count, 2);
        assert!(result.deduplicated);
    }

    #[tokio::test]
    async fn filtered_lines_never_reach_the_provider() {
        let pre = Preprocessor::default()
            .with_rule(
                "my-app",
                &RegexpFilterRule {
                    enabled: true,
                    patterns: vec!["^DEBUG:".into()],
                },
            )
            .unwrap();
        let raw: Vec<String> = (0..1000)
            .map(|i| {
                if i % 4 == 0 {
                    format!("DEBUG: cache probe {i}")
                } else {
                    format!("INFO: handled request {i}")
                }
            })
            .collect();
        let refs: Vec<&str> = raw.iter().map(String::as_str).collect();
        let batch = pre.prepare("my-app", log_lines(&refs));

        // Budget forces a chunked analysis.
        let provider = Arc::new(SequentialMockProvider::texts(64, 1));
        let analyzer = Analyzer::new(provider.clone(), bare_prompts(), settings(4_000, 1_000));
        let result = analyzer.analyze("my-app", None, &batch).await.unwrap();

        assert_eq!(result.filter_stats.lines_total, 1000);
        assert_eq!(result.filter_stats.lines_filtered, 250);
        assert!(result.chunks_used > 1);
        for req in provider.requests() {
            assert!(!req.messages[1].content.contains("DEBUG:"));
        }
    }
}
