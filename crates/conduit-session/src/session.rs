// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use conduit_model::Message;

/// In-memory conversation session: the working set of recent messages plus
/// the token accounting used to decide when to compact.
#[derive(Debug, Clone)]
pub struct Session {
    pub key: String,
    pub messages: Vec<Message>,
    /// Messages appended since the last `save`, awaiting transcript flush.
    pub pending: Vec<Message>,
    /// Approximate total token count for the current message list.
    pub token_count: usize,
    /// Maximum context tokens this session's working set should stay under.
    pub max_tokens: usize,
}

impl Session {
    pub fn new(key: impl Into<String>, max_tokens: usize) -> Self {
        Self {
            key: key.into(),
            messages: Vec::new(),
            pending: Vec::new(),
            token_count: 0,
            max_tokens,
        }
    }

    /// Append a message to the working set and the pending-write buffer.
    pub fn push(&mut self, msg: Message) {
        self.token_count += msg.approx_tokens();
        self.pending.push(msg.clone());
        self.messages.push(msg);
    }

    pub fn push_many(&mut self, msgs: impl IntoIterator<Item = Message>) {
        for m in msgs {
            self.push(m);
        }
    }

    /// Fraction of the working-memory token budget consumed (0.0-1.0).
    pub fn context_fraction(&self) -> f32 {
        if self.max_tokens == 0 {
            return 0.0;
        }
        (self.token_count as f32) / (self.max_tokens as f32)
    }

    pub fn is_near_limit(&self, threshold: f32) -> bool {
        self.context_fraction() >= threshold
    }

    /// Recalculate token count from scratch (call after compaction).
    pub fn recalculate_tokens(&mut self) {
        self.token_count = self.messages.iter().map(|m| m.approx_tokens()).sum();
    }

    /// Replace the in-memory working set (e.g. after compression), keeping
    /// the pending-write buffer untouched - compaction only reshapes the
    /// working set, it never un-writes history already flushed to disk.
    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.recalculate_tokens();
    }

    /// Drain and return messages awaiting transcript flush.
    pub fn take_pending(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.pending)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn s() -> Session {
        Session::new("agent:a:main", 1000)
    }

    #[test]
    fn new_session_starts_empty() {
        let s = s();
        assert!(s.messages.is_empty());
        assert_eq!(s.token_count, 0);
    }

    #[test]
    fn push_increments_token_count() {
        let mut s = s();
        s.push(Message::user("12345678")); // 8 chars -> 2 tokens
        assert_eq!(s.token_count, 2);
    }

    #[test]
    fn push_many_accumulates_tokens() {
        let mut s = Session::new("k", 10_000);
        s.push_many([Message::user("12345678"), Message::assistant("abcd")]);
        assert_eq!(s.token_count, 3);
    }

    #[test]
    fn push_populates_pending_buffer() {
        let mut s = s();
        s.push(Message::user("hi"));
        assert_eq!(s.pending.len(), 1);
    }

    #[test]
    fn take_pending_drains_and_empties_buffer() {
        let mut s = s();
        s.push(Message::user("a"));
        s.push(Message::user("b"));
        let drained = s.take_pending();
        assert_eq!(drained.len(), 2);
        assert!(s.pending.is_empty());
    }

    #[test]
    fn recalculate_tokens_matches_push_sum() {
        let mut s = s();
        s.push(Message::user("hello world"));
        let after_push = s.token_count;
        s.recalculate_tokens();
        assert_eq!(s.token_count, after_push);
    }

    #[test]
    fn replace_messages_recalculates_but_keeps_pending() {
        let mut s = s();
        s.push(Message::user("first"));
        s.push(Message::assistant("reply"));
        let pending_before = s.pending.len();
        s.replace_messages(vec![Message::user("only")]);
        assert_eq!(s.messages.len(), 1);
        assert_eq!(s.token_count, 1);
        assert_eq!(s.pending.len(), pending_before);
    }

    #[test]
    fn context_fraction_zero_when_empty() {
        assert_eq!(s().context_fraction(), 0.0);
    }

    #[test]
    fn context_fraction_at_zero_max_does_not_panic() {
        let s = Session::new("k", 0);
        assert_eq!(s.context_fraction(), 0.0);
    }

    #[test]
    fn is_near_limit_true_when_over_threshold() {
        let mut s = Session::new("k", 4);
        s.push(Message::user("1234567890123"));
        s.push(Message::user("abcd"));
        assert!(s.is_near_limit(0.8));
    }

    #[test]
    fn is_near_limit_exactly_at_threshold() {
        let mut s = Session::new("k", 10);
        s.push(Message::user("12345678901234567890")); // 20 chars = 5 tokens
        assert!(s.is_near_limit(0.5));
        assert!(!s.is_near_limit(0.6));
    }
}
