// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Parsing and canonicalization of session keys.
//!
//! Grammar: `sessionKey ::= "agent:" agentId ":" ( "main" | channel ( ":direct:" peerId | ":" peerId ) )`
//!
//! Both the 3-segment (`agent:<id>:main`) and 4-segment
//! (`agent:<id>:<channel>:<peerId>`) forms are accepted, along with the
//! 5-segment `:direct:` spelling, and normalized to a single canonical
//! string on load.

use std::fmt;

/// A parsed, canonical session key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub agent_id: String,
    pub scope: SessionScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionScope {
    /// The shared, channel-less conversation for this agent.
    Main,
    /// A specific channel/peer pair (Telegram chat, Discord DM, etc).
    Channel { channel: String, peer_id: String },
}

impl SessionKey {
    pub fn main(agent_id: impl Into<String>) -> Self {
        Self { agent_id: agent_id.into(), scope: SessionScope::Main }
    }

    pub fn channel(agent_id: impl Into<String>, channel: impl Into<String>, peer_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            scope: SessionScope::Channel { channel: channel.into(), peer_id: peer_id.into() },
        }
    }

    /// Parse any accepted spelling of a session key into its canonical form.
    pub fn parse(raw: &str) -> Result<Self, SessionKeyError> {
        let parts: Vec<&str> = raw.split(':').collect();
        if parts.len() < 3 || parts[0] != "agent" {
            return Err(SessionKeyError::Malformed(raw.to_string()));
        }
        let agent_id = parts[1].to_string();
        if agent_id.is_empty() {
            return Err(SessionKeyError::Malformed(raw.to_string()));
        }

        match parts.len() {
            3 if parts[2] == "main" => Ok(Self { agent_id, scope: SessionScope::Main }),
            4 => {
                let channel = parts[2].to_string();
                let peer_id = parts[3].to_string();
                if channel.is_empty() || peer_id.is_empty() {
                    return Err(SessionKeyError::Malformed(raw.to_string()));
                }
                Ok(Self { agent_id, scope: SessionScope::Channel { channel, peer_id } })
            }
            5 if parts[3] == "direct" => {
                let channel = parts[2].to_string();
                let peer_id = parts[4].to_string();
                if channel.is_empty() || peer_id.is_empty() {
                    return Err(SessionKeyError::Malformed(raw.to_string()));
                }
                Ok(Self { agent_id, scope: SessionScope::Channel { channel, peer_id } })
            }
            _ => Err(SessionKeyError::Malformed(raw.to_string())),
        }
    }

    /// Filesystem-safe representation used for the per-session transcript
    /// filename: every `:` is replaced with `_` so the key can't escape the
    /// transcripts directory or collide with path separators.
    pub fn sanitized(&self) -> String {
        self.to_string().replace(':', "_")
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            SessionScope::Main => write!(f, "agent:{}:main", self.agent_id),
            SessionScope::Channel { channel, peer_id } => {
                write!(f, "agent:{}:{channel}:{peer_id}", self.agent_id)
            }
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionKeyError {
    #[error("malformed session key: {0:?}")]
    Malformed(String),
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_segment_main_form() {
        let k = SessionKey::parse("agent:bob:main").unwrap();
        assert_eq!(k.agent_id, "bob");
        assert_eq!(k.scope, SessionScope::Main);
    }

    #[test]
    fn parses_four_segment_channel_form() {
        let k = SessionKey::parse("agent:bob:telegram:12345").unwrap();
        assert_eq!(
            k.scope,
            SessionScope::Channel { channel: "telegram".into(), peer_id: "12345".into() }
        );
    }

    #[test]
    fn parses_five_segment_direct_form_same_as_four_segment() {
        let direct = SessionKey::parse("agent:bob:telegram:direct:12345").unwrap();
        let plain = SessionKey::parse("agent:bob:telegram:12345").unwrap();
        assert_eq!(direct, plain);
    }

    #[test]
    fn rejects_missing_agent_prefix() {
        assert!(SessionKey::parse("bob:main").is_err());
    }

    #[test]
    fn rejects_empty_agent_id() {
        assert!(SessionKey::parse("agent::main").is_err());
    }

    #[test]
    fn rejects_too_few_segments() {
        assert!(SessionKey::parse("agent:bob").is_err());
    }

    #[test]
    fn rejects_unknown_five_segment_spelling() {
        assert!(SessionKey::parse("agent:bob:telegram:weird:12345").is_err());
    }

    #[test]
    fn display_round_trips_main_form() {
        let k = SessionKey::main("bob");
        assert_eq!(k.to_string(), "agent:bob:main");
        assert_eq!(SessionKey::parse(&k.to_string()).unwrap(), k);
    }

    #[test]
    fn display_round_trips_channel_form() {
        let k = SessionKey::channel("bob", "discord", "peer1");
        assert_eq!(k.to_string(), "agent:bob:discord:peer1");
        assert_eq!(SessionKey::parse(&k.to_string()).unwrap(), k);
    }

    #[test]
    fn sanitized_replaces_colons() {
        let k = SessionKey::channel("bob", "discord", "peer1");
        assert_eq!(k.sanitized(), "agent_bob_discord_peer1");
    }
}
