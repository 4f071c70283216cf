//! Preprocessor: turns a raw log batch into a [`PreparedBatch`].
//!
//! Steps, in order:
//! 1. regexp filtering (per container)
//! 2. collapsing consecutive duplicates
//! 3. anonymization (per privacy flag)
//!
//! Pure and synchronous. Empty input yields an empty batch.

pub mod anonymize;
pub mod dedup;
pub mod filter;

pub use filter::LineFilter;

use loglens_config::{AppConfig, PrivacyConfig, RegexpFilterRule};
use loglens_core::batch::{FilterStats, PreparedBatch};
use loglens_core::log::LogLine;
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::debug;

/// Per-container filters plus global privacy flags.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    filters: HashMap<String, LineFilter>,
    privacy: PrivacyConfig,
}

impl Preprocessor {
    pub fn new(privacy: PrivacyConfig) -> Self {
        Self {
            filters: HashMap::new(),
            privacy,
        }
    }

    /// Build from validated configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, regex_lite::Error> {
        let mut pre = Self::new(config.privacy);
        for (name, container) in &config.containers {
            if let Some(rule) = &container.regexp_filter {
                pre = pre.with_rule(name, rule)?;
            }
        }
        Ok(pre)
    }

    /// Register the filter rule for one container.
    pub fn with_rule(
        mut self,
        container: impl Into<String>,
        rule: &RegexpFilterRule,
    ) -> Result<Self, regex_lite::Error> {
        let container = container.into();
        match LineFilter::compile(rule)? {
            Some(filter) => {
                self.filters.insert(container, filter);
            }
            None => {
                self.filters.remove(&container);
            }
        }
        Ok(self)
    }

    pub fn privacy(&self) -> PrivacyConfig {
        self.privacy
    }

    /// Run the full preprocessing chain for `container`.
    pub fn prepare(&self, container: &str, lines: Vec<LogLine>) -> PreparedBatch {
        let (kept, filter_stats) = match self.filters.get(container) {
            Some(filter) => filter.apply(lines),
            None => {
                let lines_total = lines.len();
                (
                    lines,
                    FilterStats {
                        lines_total,
                        lines_filtered: 0,
                    },
                )
            }
        };

        let original_count = kept.len();
        let mut entries = dedup::collapse(kept);
        let processed_count = entries.len();

        if self.privacy.anonymize_ips || self.privacy.anonymize_secrets {
            for entry in &mut entries {
                let message = &mut entry.line.message;
                if self.privacy.anonymize_ips {
                    if let Cow::Owned(s) = anonymize::anonymize_ips(message) {
                        *message = s;
                    }
                }
                if self.privacy.anonymize_secrets {
                    if let Cow::Owned(s) = anonymize::anonymize_secrets(message) {
                        *message = s;
                    }
                }
            }
        }

        debug!(
            container,
            lines_total = filter_stats.lines_total,
            lines_filtered = filter_stats.lines_filtered,
            original_count,
            processed_count,
            "Prepared log batch"
        );

        PreparedBatch {
            lines: entries,
            original_count,
            processed_count,
            filter_stats,
        }
    }
}
