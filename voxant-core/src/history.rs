//! Conversation store: a bounded sliding window of recent turns.

use std::collections::VecDeque;

use crate::types::Turn;

/// Default number of turns kept in the window.
pub const DEFAULT_MAX_HISTORY: usize = 10;

/// A capacity-bounded, insertion-ordered list of conversation turns.
///
/// Once the window is full, appending evicts the oldest turn (FIFO).
/// The fixed system prompt is not stored here; it is prepended by the
/// chat client at request-build time, so the cap applies only to
/// user/assistant turns.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<Turn>,
    max_len: usize,
}

impl ConversationHistory {
    /// Create a history bounded to `max_len` turns. A zero cap is
    /// clamped to one so `append` always retains the newest turn.
    pub fn new(max_len: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_len.max(1)),
            max_len: max_len.max(1),
        }
    }

    /// Append a turn at the tail, evicting the oldest turn if the
    /// window would exceed its cap.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.max_len {
            self.turns.pop_front();
        }
    }

    /// Ordered copy of the window, for request construction.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    /// Remove every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Number of turns currently held.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The configured window cap.
    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}
