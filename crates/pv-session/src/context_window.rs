//! Prompt context assembly: a system turn followed by the tail of the history.

use pv_core::Turn;

/// Context window sized in turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextWindow {
    pub max_turns: usize,
}

impl ContextWindow {
    pub fn new(max_turns: usize) -> Self {
        Self { max_turns }
    }

    /// Build the context for one request. Recomputed every time, never cached.
    pub fn build(&self, history: &[Turn], system_prompt: &str) -> Vec<Turn> {
        build_context(history, self.max_turns, system_prompt)
    }

    /// Length the built context will have for a history of `history_len` turns.
    pub fn context_len(&self, history_len: usize) -> usize {
        history_len.min(self.max_turns) + 1
    }
}

/// `[system prompt] ++ last max_turns turns`, oldest of the window first.
pub fn build_context(history: &[Turn], max_turns: usize, system_prompt: &str) -> Vec<Turn> {
    let start = history.len().saturating_sub(max_turns);
    let window = &history[start..];

    let mut context = Vec::with_capacity(window.len() + 1);
    context.push(Turn::system(system_prompt));
    context.extend_from_slice(window);
    context
}
