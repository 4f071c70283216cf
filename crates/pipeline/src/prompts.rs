//! Prompt templates for the three call kinds.
//!
//! A [`PromptTemplates`] value is built once by the caller and handed to the
//! analyzer. Templates use `{{name}}` placeholders; names without a value are
//! left in the text untouched.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const DEFAULT_SYSTEM: &str = "\
You are a site reliability engineer reviewing container logs.
Report only what the logs show. Quote error messages verbatim.
Lines marked \"(repeated N times)\" stand for N consecutive identical lines.
Placeholders such as <ip> and <redacted> hide sensitive values; do not speculate about them.";

const DEFAULT_ANALYSIS: &str = "\
Analyze the following {{line_count}} log entries from container `{{container}}`.

Start with a one-line headline. Then list:
- anomalies and errors, with the first time each was seen
- likely root causes
- suggested next steps

If nothing looks abnormal, say so in the headline.

Logs:
```
{{logs}}```";

const DEFAULT_CHUNK_SUMMARY: &str = "\
This is part {{chunk_index}} of {{chunk_total}} of the logs from container `{{container}}` \
({{line_count}} entries).

Summarize the errors, warnings and unusual events in this part. Keep timestamps and \
error text verbatim. Omit routine activity. Do not draw conclusions about the other parts.

Logs:
```
{{logs}}```";

const DEFAULT_SYNTHESIS: &str = "\
The logs from container `{{container}}` were too large for one request and were summarized \
in {{chunk_total}} parts, in order. Merge the summaries below into one analysis.

Start with a one-line headline. Then list:
- anomalies and errors, with the first time each was seen
- likely root causes
- suggested next steps

Summaries:
{{summaries}}";

/// Template file names looked up by [`PromptTemplates::load_dir`].
pub const SYSTEM_FILE: &str = "system.md";
pub const ANALYSIS_FILE: &str = "analysis.md";
pub const CHUNK_SUMMARY_FILE: &str = "chunk_summary.md";
pub const SYNTHESIS_FILE: &str = "synthesis.md";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Failed to read prompt template {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },
}

/// The system, analysis, chunk-summary and synthesis templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    pub system: String,
    pub analysis: String,
    pub chunk_summary: String,
    pub synthesis: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM.into(),
            analysis: DEFAULT_ANALYSIS.into(),
            chunk_summary: DEFAULT_CHUNK_SUMMARY.into(),
            synthesis: DEFAULT_SYNTHESIS.into(),
        }
    }
}

impl PromptTemplates {
    /// Built-in templates overlaid with any template files found in `dir`.
    ///
    /// A missing directory or missing file keeps the built-in text.
    pub fn load_dir(dir: &Path) -> Result<Self, PromptError> {
        let mut templates = Self::default();
        if !dir.is_dir() {
            debug!("No prompt directory at {}, using built-in prompts", dir.display());
            return Ok(templates);
        }

        for (file, slot) in [
            (SYSTEM_FILE, &mut templates.system),
            (ANALYSIS_FILE, &mut templates.analysis),
            (CHUNK_SUMMARY_FILE, &mut templates.chunk_summary),
            (SYNTHESIS_FILE, &mut templates.synthesis),
        ] {
            let path = dir.join(file);
            if !path.is_file() {
                continue;
            }
            let content = std::fs::read_to_string(&path).map_err(|e| PromptError::ReadError {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            debug!("Loaded prompt override {}", path.display());
            *slot = content;
        }
        Ok(templates)
    }

    /// Write the built-in templates into `dir`, leaving existing files alone.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let defaults = Self::default();
        let mut written = Vec::new();
        for (file, text) in [
            (SYSTEM_FILE, &defaults.system),
            (ANALYSIS_FILE, &defaults.analysis),
            (CHUNK_SUMMARY_FILE, &defaults.chunk_summary),
            (SYNTHESIS_FILE, &defaults.synthesis),
        ] {
            let path = dir.join(file);
            if !path.exists() {
                std::fs::write(&path, text)?;
                written.push(path);
            }
        }
        Ok(written)
    }

    /// The system prompt, with per-container ignore instructions appended.
    pub fn system_prompt(&self, ignore_instructions: Option<&str>) -> String {
        match ignore_instructions.map(str::trim).filter(|s| !s.is_empty()) {
            Some(extra) => format!("{}\n\n## Additional instructions\n{extra}", self.system.trim_end()),
            None => self.system.clone(),
        }
    }

    pub fn analysis_prompt(&self, container: &str, logs: &str, line_count: usize) -> String {
        render(
            &self.analysis,
            &[
                ("container", container),
                ("logs", logs),
                ("line_count", line_count.to_string().as_str()),
            ],
        )
    }

    pub fn chunk_summary_prompt(
        &self,
        container: &str,
        logs: &str,
        line_count: usize,
        chunk_index: usize,
        chunk_total: usize,
    ) -> String {
        render(
            &self.chunk_summary,
            &[
                ("container", container),
                ("logs", logs),
                ("line_count", line_count.to_string().as_str()),
                ("chunk_index", chunk_index.to_string().as_str()),
                ("chunk_total", chunk_total.to_string().as_str()),
            ],
        )
    }

    pub fn synthesis_prompt(&self, container: &str, summaries: &str, chunk_total: usize) -> String {
        render(
            &self.synthesis,
            &[
                ("container", container),
                ("summaries", summaries),
                ("chunk_total", chunk_total.to_string().as_str()),
            ],
        )
    }
}

/// Substitute `{{name}}` placeholders in one left-to-right pass.
///
/// Substituted values are not rescanned, so log text containing `{{logs}}`
/// comes through literally.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = after[..end].trim();
        match vars.iter().find(|(k, _)| *k == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}
