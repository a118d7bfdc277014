// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tier 0: working-memory compression. Called from the supervisor agent's
//! context-build step whenever the running transcript would exceed its token
//! budget. Unlike consolidation (tier 1, LLM-backed), this compression is
//! cheap and synchronous: system messages are always kept, the most recent
//! `keep_recent` non-system messages are kept verbatim, and everything older
//! is collapsed into one synthesized summary message built from the
//! replaced messages' distinctive tokens rather than a model call.

use std::collections::HashSet;

use conduit_model::{Message, Role};

/// Words too common to carry topical signal in a synthesized summary.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "to", "of", "in", "on", "for", "and", "or",
    "but", "with", "that", "this", "it", "i", "you", "we", "can", "do", "does", "did", "be",
    "have", "has", "had", "my", "me", "your", "at", "as", "by", "from",
];

fn total_tokens(messages: &[Message]) -> usize {
    messages.iter().map(Message::approx_tokens).sum()
}

/// Pull out distinctive lowercase tokens from a batch of messages, in
/// first-seen order, capped at `limit`. Used to build the synthesized
/// summary standing in for messages dropped from the working set.
fn topic_tokens(messages: &[Message], limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for m in messages {
        let Some(text) = m.as_text() else { continue };
        for word in text.split_whitespace() {
            let lower: String = word.chars().filter(|c| c.is_alphanumeric()).collect::<String>().to_lowercase();
            if lower.len() < 3 || STOPWORDS.contains(&lower.as_str()) {
                continue;
            }
            if seen.insert(lower.clone()) {
                out.push(lower);
                if out.len() >= limit {
                    return out;
                }
            }
        }
    }
    out
}

/// Compress `messages` if their total approximate token count exceeds
/// `max_tokens`. Returns the (possibly unchanged) message list.
///
/// Compression keeps every `Role::System` message plus the `keep_recent`
/// most-recent non-system messages verbatim, and replaces everything else
/// with one synthesized assistant-authored summary message inserted right
/// after the system messages.
pub fn compress_working_set(messages: &[Message], max_tokens: usize, keep_recent: usize) -> Vec<Message> {
    if total_tokens(messages) <= max_tokens {
        return messages.to_vec();
    }

    let (system, rest): (Vec<&Message>, Vec<&Message>) =
        messages.iter().partition(|m| matches!(m.role, Role::System));

    if rest.len() <= keep_recent {
        return messages.to_vec();
    }

    let split_at = rest.len() - keep_recent;
    let (dropped, recent) = rest.split_at(split_at);

    let topics = topic_tokens(&dropped.iter().map(|m| (*m).clone()).collect::<Vec<_>>(), 12);
    let summary_text = if topics.is_empty() {
        format!("[summary of {} earlier messages]", dropped.len())
    } else {
        format!("[summary of {} earlier messages - topics: {}]", dropped.len(), topics.join(", "))
    };

    let mut out: Vec<Message> = system.into_iter().cloned().collect();
    out.push(Message::assistant(summary_text));
    out.extend(recent.iter().map(|m| (*m).clone()));
    out
}
