// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::tool::{Tool, ToolCall, ToolOutput};

/// A note captured via [`MemoryNoteTool`], pending ingestion into long-term
/// memory. The supervisor agent drains this buffer after each turn and hands
/// captured notes to the memory system's write path.
#[derive(Debug, Clone)]
pub struct CapturedNote {
    pub text: String,
    pub importance: f32,
}

pub type NoteBuffer = Arc<Mutex<Vec<CapturedNote>>>;

#[derive(Deserialize)]
struct Args {
    text: String,
    #[serde(default = "default_importance")]
    importance: f32,
}

fn default_importance() -> f32 {
    0.5
}

/// Explicitly remember a fact, preference, or event for future conversations.
///
/// This tool does not write to long-term memory itself; it only stages the
/// note. The supervisor agent is responsible for forwarding staged notes to
/// the memory system so that consolidation and forgetting stay centralized
/// there rather than duplicated across every caller of this tool.
pub struct MemoryNoteTool {
    pub buffer: NoteBuffer,
}

#[async_trait]
impl Tool for MemoryNoteTool {
    fn name(&self) -> &str {
        "remember"
    }

    fn description(&self) -> &str {
        "Explicitly remember a fact or preference for future conversations."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "The fact or preference to remember" },
                "importance": {
                    "type": "number",
                    "description": "0.0-1.0, how important this is to retain",
                    "minimum": 0.0,
                    "maximum": 1.0
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let args: Args = match serde_json::from_value(call.args.clone()) {
            Ok(a) => a,
            Err(e) => return ToolOutput::err(&call.id, format!("invalid arguments: {e}")),
        };
        if args.text.trim().is_empty() {
            return ToolOutput::err(&call.id, "text must not be empty");
        }
        let importance = args.importance.clamp(0.0, 1.0);
        self.buffer.lock().await.push(CapturedNote { text: args.text, importance });
        ToolOutput::ok(&call.id, "noted")
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
