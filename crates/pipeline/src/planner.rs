//! Token budget planner.
//!
//! Decides between a single Analyze call and a chunk loop, and packs the
//! chunks. Line costs are additive, so the cost of a chunk is exactly the sum
//! of the costs of its lines.

use crate::token::estimate_line_tokens;
use loglens_config::AppConfig;
use loglens_core::batch::{Chunk, PreparedBatch, PreparedLine};
use thiserror::Error;
use tracing::{debug, warn};

/// Per-call token limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    /// Context budget per call (prompt + completion)
    pub max_tokens: usize,
    /// Completion allowance held back from the single-pass prompt
    pub reserved_completion: usize,
    /// Completion allowance sent with each chunk summary
    pub chunk_completion: usize,
}

impl Budget {
    /// A budget whose chunk calls get the same allowance as the single pass.
    pub fn new(max_tokens: usize, reserved_completion: usize) -> Self {
        Self {
            max_tokens,
            reserved_completion,
            chunk_completion: reserved_completion,
        }
    }

    pub fn with_chunk_completion(mut self, chunk_completion: usize) -> Self {
        self.chunk_completion = chunk_completion;
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.effective_max_tokens() as usize,
            config.reserved_completion as usize,
        )
        .with_chunk_completion(config.chunk_summary_tokens as usize)
    }

    /// Whether a prompt of `prompt_tokens` plus `completion` fits the window.
    pub fn fits(&self, prompt_tokens: usize, completion: usize) -> bool {
        prompt_tokens + completion <= self.max_tokens
    }

    /// Tokens a chunk prompt leaves free: the larger completion allowance.
    fn chunk_held_back(&self) -> usize {
        self.reserved_completion.max(self.chunk_completion)
    }
}

/// Fixed prompt cost of each call kind, excluding the log text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemplateOverhead {
    pub analysis: usize,
    pub chunk_summary: usize,
}

/// The chosen strategy for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    SinglePass { estimated_tokens: usize },
    Chunked { chunks: Vec<Chunk>, target: usize },
}

impl Plan {
    pub fn calls(&self) -> usize {
        match self {
            Plan::SinglePass { .. } => 1,
            Plan::Chunked { chunks, .. } if chunks.len() > 1 => chunks.len() + 1,
            Plan::Chunked { .. } => 1,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error(
        "token budget too small: max_tokens {max_tokens} leaves no room for logs after \
         reserving {reserved} completion tokens and {overhead} prompt tokens"
    )]
    BudgetTooSmall {
        max_tokens: usize,
        reserved: usize,
        overhead: usize,
    },
}

/// Plan the calls needed to analyze `batch`.
pub fn plan(
    batch: &PreparedBatch,
    budget: Budget,
    overhead: TemplateOverhead,
) -> Result<Plan, PlanError> {
    let line_costs: Vec<usize> = batch.lines.iter().map(estimate_line_tokens).collect();
    let log_tokens: usize = line_costs.iter().sum();
    let estimated_tokens = log_tokens + overhead.analysis;

    if estimated_tokens + budget.reserved_completion <= budget.max_tokens {
        debug!(estimated_tokens, max_tokens = budget.max_tokens, "Single-pass plan");
        return Ok(Plan::SinglePass { estimated_tokens });
    }

    let held_back = budget.chunk_held_back();
    let target = budget
        .max_tokens
        .saturating_sub(held_back)
        .saturating_sub(overhead.chunk_summary);
    if target == 0 {
        return Err(PlanError::BudgetTooSmall {
            max_tokens: budget.max_tokens,
            reserved: held_back,
            overhead: overhead.chunk_summary,
        });
    }

    let chunks = pack(batch.lines.iter().cloned().zip(line_costs), target);
    debug!(
        estimated_tokens,
        target,
        chunks = chunks.len(),
        "Chunked plan"
    );
    Ok(Plan::Chunked { chunks, target })
}

/// Greedily split `lines` into chunks of at most `target` tokens.
///
/// Lines stay in order and are never split. A line that alone exceeds the
/// target gets a chunk of its own.
pub fn split_into_chunks(lines: Vec<PreparedLine>, target: usize) -> Vec<Chunk> {
    pack(
        lines.into_iter().map(|l| {
            let cost = estimate_line_tokens(&l);
            (l, cost)
        }),
        target,
    )
}

fn pack(lines: impl IntoIterator<Item = (PreparedLine, usize)>, target: usize) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current: Vec<PreparedLine> = Vec::new();
    let mut current_tokens = 0usize;

    for (line, cost) in lines {
        if !current.is_empty() && current_tokens + cost > target {
            chunks.push(Chunk {
                index: chunks.len() + 1,
                lines: std::mem::take(&mut current),
                estimated_tokens: current_tokens,
            });
            current_tokens = 0;
        }
        if cost > target {
            warn!(
                tokens = cost,
                target, "Log line exceeds the chunk budget, sending it alone"
            );
        }
        current.push(line);
        current_tokens += cost;
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            index: chunks.len() + 1,
            lines: current,
            estimated_tokens: current_tokens,
        });
    }
    chunks
}
