//! # LogLens Core
//!
//! Domain types, traits, and error definitions for the LogLens container log
//! analyzer. This crate has **zero framework dependencies**; it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here:
//! - [`Provider`]: the LLM chat-completion endpoint
//! - [`LogSource`]: where container log lines come from
//! - [`KnowledgeBackend`]: where analyses accumulate over time
//!
//! Implementations live in their respective crates, so the pipeline can be
//! exercised end to end with scripted stand-ins.

pub mod analysis;
pub mod batch;
pub mod error;
pub mod knowledge;
pub mod log;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use analysis::AnalysisResult;
pub use batch::{Chunk, FilterStats, PreparedBatch, PreparedLine};
pub use error::{Error, Result};
pub use knowledge::{KnowledgeBackend, KnowledgeEntry, RollupEntry};
pub use log::{LogLine, LogSource, LogStream};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
