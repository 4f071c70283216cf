//! Shared test helpers for pipeline tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use loglens_core::error::{ProviderError, SourceError};
use loglens_core::log::{LogLine, LogSource};
use loglens_core::message::Message;
use loglens_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::collections::HashMap;
use std::sync::Mutex;

/// A mock provider that returns a sequence of scripted results and records
/// every request it receives.
///
/// Panics if more calls are made than results provided.
pub struct SequentialMockProvider {
    results: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(results: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            results: Mutex::new(results),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `n` successful text responses, each reporting `tokens` total tokens.
    pub fn texts(n: usize, tokens: u32) -> Self {
        Self::new(
            (1..=n)
                .map(|i| Ok(make_text_response(&format!("response {i}"), tokens)))
                .collect(),
        )
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let results = self.results.lock().unwrap();
        let call = requests.len();
        if call >= results.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                call,
                results.len()
            );
        }
        requests.push(request);
        results[call].clone()
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str, total_tokens: u32) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: total_tokens.saturating_sub(5),
            completion_tokens: total_tokens.min(5),
            total_tokens,
        }),
        model: "mock-model".into(),
        finish_reason: Some("stop".into()),
    }
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap()
}

/// Lines one second apart, starting at [`base_time`].
pub fn log_lines(messages: &[&str]) -> Vec<LogLine> {
    messages
        .iter()
        .enumerate()
        .map(|(i, m)| LogLine::stdout(base_time() + Duration::seconds(i as i64), *m))
        .collect()
}

/// A log source backed by fixed per-container line lists.
#[derive(Default)]
pub struct StaticLogSource {
    logs: HashMap<String, Vec<LogLine>>,
    failing: Vec<String>,
}

impl StaticLogSource {
    pub fn with(mut self, container: &str, lines: Vec<LogLine>) -> Self {
        self.logs.insert(container.to_string(), lines);
        self
    }

    pub fn failing(mut self, container: &str) -> Self {
        self.failing.push(container.to_string());
        self
    }
}

#[async_trait]
impl LogSource for StaticLogSource {
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
        if self.failing.iter().any(|c| c == container) {
            return Err(SourceError::ReadFailed {
                container: container.to_string(),
                reason: "permission denied".into(),
            });
        }
        let lines = self
            .logs
            .get(container)
            .ok_or_else(|| SourceError::ContainerNotFound(container.to_string()))?;
        Ok(lines
            .iter()
            .filter(|l| since.is_none_or(|s| l.timestamp > s))
            .cloned()
            .collect())
    }
}
