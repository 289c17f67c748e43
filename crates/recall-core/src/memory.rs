//! Bounded per-session conversation memory.
//!
//! Each chat session owns one [`ConversationMemory`]. It keeps the most
//! recent turns up to a fixed capacity, evicting the oldest first, and
//! hands back a recency window for follow-up query rewriting. Memory is
//! process-local and never persisted.

use std::collections::VecDeque;

use crate::models::Turn;

/// FIFO-bounded turn buffer.
///
/// `append` drops the oldest turn once `max_turns` is reached, so the
/// buffer never grows past capacity. Sessions get independent instances;
/// nothing here is shared.
#[derive(Debug)]
pub struct ConversationMemory {
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl ConversationMemory {
    /// Create a memory holding at most `max_turns` turns. A capacity of
    /// zero means every append is immediately discarded.
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns),
            max_turns,
        }
    }

    /// Record a turn, evicting the oldest if at capacity.
    pub fn append(&mut self, turn: Turn) {
        if self.max_turns == 0 {
            return;
        }
        if self.turns.len() == self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// The last `n` turns, oldest first.
    pub fn context(&self, n: usize) -> Vec<&Turn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).collect()
    }

    /// Number of turns currently held.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
