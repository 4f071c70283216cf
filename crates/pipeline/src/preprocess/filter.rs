//! Regexp pre-filter: drop lines matching any enabled pattern.

use loglens_config::RegexpFilterRule;
use loglens_core::batch::FilterStats;
use loglens_core::log::LogLine;
use regex_lite::Regex;

/// The compiled, enabled form of a [`RegexpFilterRule`].
#[derive(Debug, Clone)]
pub struct LineFilter {
    patterns: Vec<Regex>,
}

impl LineFilter {
    /// Compile `rule`. Returns `None` when the rule is disabled or empty.
    pub fn compile(rule: &RegexpFilterRule) -> Result<Option<Self>, regex_lite::Error> {
        if !rule.enabled || rule.patterns.is_empty() {
            return Ok(None);
        }
        let patterns = rule
            .patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(Self { patterns }))
    }

    /// Unanchored search: any match anywhere in the message counts.
    pub fn matches(&self, message: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(message))
    }

    /// Keep the lines no pattern matches, in their original order.
    pub fn apply(&self, lines: Vec<LogLine>) -> (Vec<LogLine>, FilterStats) {
        let lines_total = lines.len();
        let kept: Vec<LogLine> = lines
            .into_iter()
            .filter(|l| !self.matches(&l.message))
            .collect();
        let stats = FilterStats {
            lines_total,
            lines_filtered: lines_total - kept.len(),
        };
        (kept, stats)
    }
}
