//! # LogLens Pipeline
//!
//! Turns a container's raw log lines into an LLM analysis under a token
//! budget:
//!
//! - [`preprocess`]: regexp filter, consecutive dedup, anonymization
//! - [`planner`]: single-pass or greedy chunking
//! - [`analyzer`]: Analyze, or SummarizeChunk × N then Synthesize
//! - [`scan`]: one sequential pass over many containers

pub mod analyzer;
pub mod planner;
pub mod preprocess;
pub mod prompts;
pub mod scan;
pub mod token;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use analyzer::{AnalysisError, Analyzer, AnalyzerSettings, Stage};
pub use planner::{Budget, Plan, PlanError, TemplateOverhead};
pub use preprocess::Preprocessor;
pub use prompts::{PromptError, PromptTemplates};
pub use scan::{Cursors, Retention, ScanCycle, ScanOutcome, ScanReport};
