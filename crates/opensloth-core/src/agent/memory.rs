//! Conversation history bounded by turn count.

use crate::llm::Message;
use std::collections::VecDeque;

/// The most recent turns of one chat, oldest first
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<Message>,
    limit: usize,
}

impl ConversationHistory {
    /// Create an empty history keeping at most `limit` turns
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(limit + 1),
            limit,
        }
    }

    /// Append a turn, evicting the oldest turns past the limit
    pub fn push(&mut self, message: Message) {
        self.turns.push_back(message);
        while self.turns.len() > self.limit {
            self.turns.pop_front();
        }
    }

    /// Turns in chronological order
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.turns.iter().cloned().collect()
    }

    /// Number of stored turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turns are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drop every turn
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_keeps_latest_turns() {
        let mut history = ConversationHistory::new(3);
        for i in 0..5 {
            history.push(Message::user(&format!("m{i}")));
        }
        let contents: Vec<String> = history.messages().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_zero_limit_keeps_nothing() {
        let mut history = ConversationHistory::new(0);
        history.push(Message::assistant("hi"));
        assert!(history.is_empty());
    }

    proptest! {
        #[test]
        fn prop_evicts_oldest_first(count in 0usize..40, limit in 1usize..15) {
            let mut history = ConversationHistory::new(limit);
            for i in 0..count {
                history.push(Message::user(&i.to_string()));
            }

            let kept: Vec<usize> = history
                .messages()
                .iter()
                .filter_map(|m| m.content.parse().ok())
                .collect();
            let expected: Vec<usize> = (count.saturating_sub(limit)..count).collect();
            prop_assert_eq!(kept, expected);
        }
    }
}
