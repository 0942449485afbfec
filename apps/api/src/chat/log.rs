use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation. Never mutated once appended.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    /// Written by the service (greeting, fallbacks, error text) rather than
    /// produced by the model. Not replayed to the model.
    #[serde(skip)]
    pub synthetic: bool,
    pub created_at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), false)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into(), false)
    }

    pub fn synthetic(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into(), true)
    }

    fn new(role: Role, content: String, synthetic: bool) -> Self {
        Self {
            role,
            content,
            synthetic,
            created_at: Utc::now(),
        }
    }
}

/// Append-only, chronologically ordered list of turns owned by one session.
#[derive(Debug, Default)]
pub struct ConversationLog {
    turns: Vec<ChatTurn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    /// The last `n` turns in original order (all of them if `n` exceeds the length).
    pub fn tail(&self, n: usize) -> &[ChatTurn] {
        &self.turns[self.turns.len().saturating_sub(n)..]
    }

    pub fn all(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(pairs: usize) -> ConversationLog {
        let mut log = ConversationLog::new();
        for i in 0..pairs {
            log.append(ChatTurn::user(format!("q{i}")));
            log.append(ChatTurn::assistant(format!("a{i}")));
        }
        log
    }

    #[test]
    fn test_tail_returns_last_k_in_order_for_every_k() {
        let n = 4;
        let log = filled(n);
        let all: Vec<_> = log.all().iter().map(|t| t.content.clone()).collect();

        for k in 0..=2 * n {
            let tail: Vec<_> = log.tail(k).iter().map(|t| t.content.clone()).collect();
            assert_eq!(tail.len(), k);
            assert_eq!(tail, all[all.len() - k..].to_vec(), "k = {k}");
        }
    }

    #[test]
    fn test_tail_larger_than_log_returns_everything() {
        let log = filled(1);
        assert_eq!(log.tail(10).len(), 2);
    }

    #[test]
    fn test_append_preserves_roles() {
        let log = filled(1);
        assert_eq!(log.all()[0].role, Role::User);
        assert_eq!(log.all()[1].role, Role::Assistant);
        assert!(!log.is_empty());
    }

    #[test]
    fn test_synthetic_turn_is_assistant() {
        let turn = ChatTurn::synthetic("Hi there!");
        assert_eq!(turn.role, Role::Assistant);
        assert!(turn.synthetic);
    }

    #[test]
    fn test_turn_serializes_without_synthetic_flag() {
        let value = serde_json::to_value(ChatTurn::user("hello")).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"], "hello");
        assert!(value.get("synthetic").is_none());
    }
}
