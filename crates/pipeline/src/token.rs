//! Token estimation utilities.
//!
//! Uses a byte-based heuristic: ~4 bytes per token. This approximation is
//! accurate within ~10% for BPE tokenizers (GPT-3.5, GPT-4, Claude) on
//! English log text, and it is additive over lines, which the planner
//! relies on.

use loglens_core::batch::PreparedLine;
use loglens_core::message::Message;

/// Framing overhead per chat message (role name, delimiters).
pub const MESSAGE_OVERHEAD: usize = 4;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 bytes. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Estimate tokens for a single message including per-message overhead.
pub fn estimate_message_tokens(message: &Message) -> usize {
    MESSAGE_OVERHEAD + estimate_tokens(&message.content)
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

/// Estimate tokens for one prepared line as it will appear in a prompt.
pub fn estimate_line_tokens(line: &PreparedLine) -> usize {
    estimate_tokens(&line.render())
}

/// Estimate tokens for a run of prepared lines.
pub fn estimate_lines_tokens(lines: &[PreparedLine]) -> usize {
    lines.iter().map(estimate_line_tokens).sum()
}
