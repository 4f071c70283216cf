//! Raw log lines and the source they come from.

use crate::error::SourceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which output stream a container wrote a line to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStream::Stdout => "stdout",
            LogStream::Stderr => "stderr",
        }
    }
}

impl std::fmt::Display for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of container output. Immutable once produced by a [`LogSource`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub stream: LogStream,
    /// The message text, without the runtime's timestamp prefix.
    pub message: String,
}

impl LogLine {
    pub fn new(timestamp: DateTime<Utc>, stream: LogStream, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            stream,
            message: message.into(),
        }
    }

    pub fn stdout(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self::new(timestamp, LogStream::Stdout, message)
    }

    pub fn stderr(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self::new(timestamp, LogStream::Stderr, message)
    }
}

/// Anything that can hand out container log lines.
///
/// Implementations: a Docker-style log file reader in the CLI, scripted
/// sources in tests.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Names of the containers this source knows about.
    async fn containers(&self) -> std::result::Result<Vec<String>, SourceError>;

    /// Lines strictly newer than `since` (all lines when `None`), oldest first.
    async fn fetch_since(
        &self,
        container: &str,
        since: Option<DateTime<Utc>>,
    ) -> std::result::Result<Vec<LogLine>, SourceError>;
}
