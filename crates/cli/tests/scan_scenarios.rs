//! End-to-end scan scenarios.
//!
//! These wire the real config, preprocessor, planner, analyzer, retrying
//! transport and file knowledge store together, with only the chat endpoint
//! and the log source scripted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use loglens_config::AppConfig;
use loglens_core::error::{ProviderError, SourceError};
use loglens_core::knowledge::KnowledgeBackend;
use loglens_core::log::{LogLine, LogSource};
use loglens_core::message::Message;
use loglens_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use loglens_knowledge::FileKnowledge;
use loglens_pipeline::{Cursors, PromptTemplates, ScanCycle, ScanOutcome};
use loglens_providers::{RetryPolicy, RetryingProvider};
use tokio_util::sync::CancellationToken;

// ── Scripted collaborators ───────────────────────────────────────────────

/// A chat endpoint that plays back scripted outcomes and records requests.
struct ScriptedProvider {
    script: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn texts(n: usize) -> Arc<Self> {
        Self::new((1..=n).map(|i| Ok(text_response(&format!("analysis {i}"), 50))).collect())
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let script = self.script.lock().unwrap();
        let call = requests.len();
        requests.push(request);
        script
            .get(call)
            .cloned()
            .unwrap_or_else(|| panic!("ScriptedProvider: no outcome for call #{call}"))
    }
}

fn text_response(text: &str, total_tokens: u32) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: total_tokens - 10,
            completion_tokens: 10,
            total_tokens,
        }),
        model: "gpt-4o-mini".into(),
        finish_reason: Some("stop".into()),
    }
}

fn status(code: u16) -> Result<ProviderResponse, ProviderError> {
    Err(ProviderError::ApiError {
        status_code: code,
        message: format!("HTTP {code}"),
    })
}

#[derive(Default)]
struct MemorySource {
    logs: HashMap<String, Vec<LogLine>>,
}

impl MemorySource {
    fn with(mut self, container: &str, messages: Vec<String>) -> Self {
        let base = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        let lines = messages
            .into_iter()
            .enumerate()
            .map(|(i, m)| LogLine::stdout(base + Duration::seconds(i as i64), m))
            .collect();
        self.logs.insert(container.to_string(), lines);
        self
    }
}

#[async_trait::async_trait]
impl LogSource for MemorySource {
    async fn containers(&self) -> Result<Vec<String>, SourceError> {
        let mut names: Vec<String> = self.logs.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn fetch_since(
        &self,
        container: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<LogLine>, SourceError> {
        let lines = self
            .logs
            .get(container)
            .ok_or_else(|| SourceError::ContainerNotFound(container.into()))?;
        Ok(lines
            .iter()
            .filter(|l| since.is_none_or(|s| l.timestamp > s))
            .cloned()
            .collect())
    }
}

/// Templates with a fixed, tiny overhead.
fn bare_prompts() -> PromptTemplates {
    PromptTemplates {
        system: "sys".into(),
        analysis: "{{logs}}".into(),
        chunk_summary: "{{logs}}".into(),
        synthesis: "{{summaries}}".into(),
    }
}

/// Messages that render to exactly 100 bytes (25 estimated tokens).
fn fixed_width(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{:<65}", format!("request {i} served"))).collect()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn filtered_lines_never_leave_the_host() {
    let config = AppConfig::from_toml(
        r#"
max_tokens = 8000
reserved_completion = 1000

[containers.my-app.regexp_filter]
enabled = true
patterns = ["^DEBUG:"]
"#,
    )
    .unwrap();
    let messages: Vec<String> = (0..1000)
        .map(|i| {
            if i % 4 == 0 {
                format!("DEBUG: cache lookup {i}")
            } else {
                format!("INFO: served request {i}")
            }
        })
        .collect();
    let source = MemorySource::default().with("my-app", messages);
    let provider = ScriptedProvider::texts(32);
    let cycle = ScanCycle::from_config(&config, provider.clone(), bare_prompts()).unwrap();

    let reports = cycle
        .run(&source, &names(&["my-app"]), &mut Cursors::new(), &CancellationToken::new())
        .await;

    let ScanOutcome::Analyzed(result) = &reports[0].outcome else {
        panic!("expected analysis, got {:?}", reports[0].outcome);
    };
    assert_eq!(result.filter_stats.lines_total, 1000);
    assert_eq!(result.filter_stats.lines_filtered, 250);
    assert_eq!(result.original_count, 750);
    for request in provider.requests() {
        assert!(!request.messages[1].content.contains("DEBUG:"));
    }
}

#[tokio::test]
async fn three_chunk_batch_makes_four_calls() {
    // budget 200, reserve 100, overhead 9: 91-token chunks of three lines
    let config = AppConfig::from_toml(
        "max_tokens = 200\nreserved_completion = 100\nchunk_summary_tokens = 50\nsynthesis_tokens = 150\n",
    )
    .unwrap();
    let source = MemorySource::default().with("api", fixed_width(9));
    let provider = ScriptedProvider::texts(4);
    let cycle = ScanCycle::from_config(&config, provider.clone(), bare_prompts()).unwrap();

    let reports = cycle
        .run(&source, &names(&["api"]), &mut Cursors::new(), &CancellationToken::new())
        .await;

    let ScanOutcome::Analyzed(result) = &reports[0].outcome else {
        panic!("expected analysis, got {:?}", reports[0].outcome);
    };
    assert_eq!(provider.calls(), 4);
    assert_eq!(result.chunks_used, 3);
    assert_eq!(result.tokens_used, 200);
    assert_eq!(result.analysis_text, "analysis 4");
}

#[tokio::test]
async fn duplicate_run_collapses_before_analysis() {
    let config = AppConfig::default();
    let mut messages = vec!["upstream connect error".to_string(); 10];
    messages.push("upstream healthy".to_string());
    let source = MemorySource::default().with("proxy", messages);
    let provider = ScriptedProvider::texts(1);
    let cycle = ScanCycle::from_config(&config, provider.clone(), bare_prompts()).unwrap();

    let reports = cycle
        .run(&source, &names(&["proxy"]), &mut Cursors::new(), &CancellationToken::new())
        .await;

    let ScanOutcome::Analyzed(result) = &reports[0].outcome else {
        panic!("expected analysis");
    };
    assert_eq!(result.original_count, 11);
    assert_eq!(result.processed_count, 2);
    assert!(result.deduplicated);
    let sent = &provider.requests()[0].messages[1].content;
    assert!(sent.contains("(repeated 10 times)"));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_behind_the_pipeline() {
    let scripted = ScriptedProvider::new(vec![
        status(503),
        status(502),
        Ok(text_response("recovered", 80)),
    ]);
    let provider = Arc::new(RetryingProvider::new(
        scripted.clone(),
        RetryPolicy::new(3, StdDuration::from_secs(1)),
    ));
    let cycle =
        ScanCycle::from_config(&AppConfig::default(), provider, bare_prompts()).unwrap();
    let source = MemorySource::default().with("worker", fixed_width(3));

    let started = tokio::time::Instant::now();
    let reports = cycle
        .run(&source, &names(&["worker"]), &mut Cursors::new(), &CancellationToken::new())
        .await;
    let elapsed = started.elapsed();

    assert!(matches!(reports[0].outcome, ScanOutcome::Analyzed(_)));
    assert_eq!(scripted.calls(), 3);
    assert!(elapsed >= StdDuration::from_secs(3));
    assert!(elapsed < StdDuration::from_millis(3100));
}

#[tokio::test(start_paused = true)]
async fn failed_container_keeps_its_cursor_and_history() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileKnowledge::new(dir.path()));
    let scripted = ScriptedProvider::new(vec![
        // "billing": three transient failures exhaust the retries
        status(500),
        status(500),
        status(500),
        // "search": fine
        Ok(text_response("# All quiet\nnothing to report", 60)),
    ]);
    let provider = Arc::new(RetryingProvider::new(scripted.clone(), RetryPolicy::default()));
    let cycle = ScanCycle::from_config(&AppConfig::default(), provider, bare_prompts())
        .unwrap()
        .with_knowledge(store.clone(), 30);
    let source = MemorySource::default()
        .with("billing", fixed_width(2))
        .with("search", fixed_width(2));
    let mut cursors = Cursors::new();

    let reports = cycle
        .run(&source, &names(&["billing", "search"]), &mut cursors, &CancellationToken::new())
        .await;

    let ScanOutcome::Skipped { reason } = &reports[0].outcome else {
        panic!("expected billing to be skipped");
    };
    assert!(reason.contains("3 attempt"));
    assert!(matches!(reports[1].outcome, ScanOutcome::Analyzed(_)));

    assert!(!cursors.contains_key("billing"));
    assert!(cursors.contains_key("search"));
    assert!(store.entries("billing").await.unwrap().is_empty());
    assert_eq!(store.entries("search").await.unwrap().len(), 1);

    let rollup = FileKnowledge::new(dir.path()).rollup().await.unwrap();
    assert_eq!(rollup.len(), 1);
    assert_eq!(rollup[0].headline, "All quiet");
    assert_eq!(rollup[0].tokens_used, 60);
}

#[tokio::test]
async fn client_error_is_not_retried_and_skips_only_that_container() {
    let scripted = ScriptedProvider::new(vec![status(401), Ok(text_response("ok", 20))]);
    let provider = Arc::new(RetryingProvider::new(scripted.clone(), RetryPolicy::default()));
    let cycle = ScanCycle::from_config(&AppConfig::default(), provider, bare_prompts()).unwrap();
    let source = MemorySource::default()
        .with("a", fixed_width(1))
        .with("b", fixed_width(1));

    let reports = cycle
        .run(&source, &names(&["a", "b"]), &mut Cursors::new(), &CancellationToken::new())
        .await;

    assert_eq!(scripted.calls(), 2);
    assert!(matches!(reports[0].outcome, ScanOutcome::Skipped { .. }));
    assert!(matches!(reports[1].outcome, ScanOutcome::Analyzed(_)));
}

#[tokio::test]
async fn retention_is_enforced_during_scans() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileKnowledge::new(dir.path()));
    let now = Utc::now();
    let seed = loglens_core::AnalysisResult {
        container_name: "db".into(),
        analysis_text: "old".into(),
        tokens_used: 1,
        chunks_used: 1,
        deduplicated: false,
        original_count: 1,
        processed_count: 1,
        filter_stats: Default::default(),
    };
    store.append("db", &seed, now - Duration::days(8)).await.unwrap();
    store.append("db", &seed, now - Duration::days(6)).await.unwrap();

    let provider = ScriptedProvider::texts(1);
    let cycle = ScanCycle::from_config(&AppConfig::default(), provider, bare_prompts())
        .unwrap()
        .with_knowledge(store.clone(), 7);
    let source = MemorySource::default().with("db", fixed_width(1));

    cycle
        .run(&source, &names(&["db"]), &mut Cursors::new(), &CancellationToken::new())
        .await;

    let texts: Vec<String> = store
        .entries("db")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.analysis_text)
        .collect();
    assert_eq!(texts, vec!["old".to_string(), "analysis 1".to_string()]);
    assert_eq!(store.rollup().await.unwrap().len(), 3);
}
