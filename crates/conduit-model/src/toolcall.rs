// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Extraction of `<tool_call>{...}</tool_call>` blocks from free-form model
//! text.
//!
//! Providers that lack native tool-calling are prompted to emit calls inline
//! as `<tool_call>{"name": "...", "arguments": {...}}</tool_call>`. This
//! module turns that convention back into structured [`ExtractedToolCall`]
//! values, leaving anything that does not parse as plain text rather than
//! raising an error - a malformed block is a model mistake, not a protocol
//! violation.

use serde::Deserialize;

/// A tool call recovered from inline text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedToolCall {
    pub name: String,
    /// JSON-encoded argument object, re-serialized from the parsed value so
    /// callers always get compact, valid JSON regardless of how the model
    /// formatted it.
    pub arguments: String,
}

#[derive(Deserialize)]
struct RawToolCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

const OPEN_TAG: &str = "<tool_call>";
const CLOSE_TAG: &str = "</tool_call>";

/// Scan `text` for `<tool_call>...</tool_call>` blocks, returning every call
/// that parses along with the text that remains once all recognised blocks
/// are removed (surrounding whitespace trimmed).
///
/// A block whose body is not `{"name": ..., "arguments": ...}` is left
/// untouched in the returned text - callers should always fall back to
/// displaying raw text when extraction yields nothing.
pub fn extract_tool_calls(text: &str) -> (Vec<ExtractedToolCall>, String) {
    let mut calls = Vec::new();
    let mut remainder = String::new();
    let mut rest = text;

    while let Some(start) = rest.find(OPEN_TAG) {
        remainder.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN_TAG.len()..];
        let Some(end) = after_open.find(CLOSE_TAG) else {
            // Unterminated block (model got cut off mid-stream); keep the
            // opening tag onward as plain text and stop scanning.
            remainder.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let body = after_open[..end].trim();
        match parse_call_body(body) {
            Some(call) => calls.push(call),
            None => {
                // Malformed JSON inside the tags: preserve the whole block
                // verbatim as text rather than dropping it silently.
                remainder.push_str(&rest[start..start + OPEN_TAG.len() + end + CLOSE_TAG.len()]);
            }
        }
        rest = &after_open[end + CLOSE_TAG.len()..];
    }
    remainder.push_str(rest);

    (calls, remainder.trim().to_string())
}

/// True if `text` contains an opening `<tool_call>` tag whose body does not
/// parse as a well-formed call, with or without a matching closing tag. Used
/// to decide whether a turn that produced no structured tool calls was
/// actually an attempt at one (and should be nudged/retried) versus genuine
/// prose.
pub fn contains_malformed_tool_call(text: &str) -> bool {
    let mut rest = text;
    while let Some(start) = rest.find(OPEN_TAG) {
        let after_open = &rest[start + OPEN_TAG.len()..];
        match after_open.find(CLOSE_TAG) {
            Some(end) => {
                let body = after_open[..end].trim();
                if parse_call_body(body).is_none() {
                    return true;
                }
                rest = &after_open[end + CLOSE_TAG.len()..];
            }
            None => return true,
        }
    }
    false
}

fn parse_call_body(body: &str) -> Option<ExtractedToolCall> {
    let raw: RawToolCall = serde_json::from_str(body).ok()?;
    if raw.name.trim().is_empty() {
        return None;
    }
    let arguments = serde_json::to_string(&raw.arguments).ok()?;
    Some(ExtractedToolCall {
        name: raw.name,
        arguments,
    })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
