//! LLM provider implementations for LogLens.
//!
//! All providers implement the `loglens_core::Provider` trait.
//! [`build_provider`] assembles the HTTP client and the retry wrapper from
//! configuration.

pub mod openai_compat;
pub mod retry;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::{RetryPolicy, RetryingProvider};

use loglens_config::AppConfig;
use loglens_core::error::ProviderError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Build the retrying chat-completion provider described by `config`.
pub fn build_provider(
    config: &AppConfig,
    cancel: CancellationToken,
) -> Result<Arc<RetryingProvider>, ProviderError> {
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| ProviderError::NotConfigured("No API key configured".into()))?;

    let http = OpenAiCompatProvider::new(
        "openai",
        config.api_url.clone(),
        api_key,
        Duration::from_secs(config.request_timeout_secs),
    )?;

    let policy = RetryPolicy::new(
        config.retry.max_attempts,
        Duration::from_secs(config.retry.base_delay_secs),
    );

    Ok(Arc::new(
        RetryingProvider::new(Arc::new(http), policy).with_cancellation(cancel),
    ))
}
