// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use conduit_tools::ToolCall;

/// Events emitted by the supervisor agent during a single turn. The gateway
/// subscribes to these to drive the `chat.delta`/`chat.end` streaming
/// contract; nothing downstream needs to know how the loop produced them.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A text chunk streamed from the model.
    TextDelta(String),
    /// The model has requested a tool call.
    ToolCallStarted(ToolCall),
    /// A tool call finished.
    ToolCallFinished { call_id: String, tool_name: String, output: String, is_error: bool },
    /// A destructive tool call is awaiting user confirmation; the turn ends
    /// here until the next message resolves it.
    NeedsConfirmation { tool_name: String, prompt: String },
    /// The turn finished normally, with a reason a caller can use for metrics.
    TurnComplete(TerminationReason),
    /// A recoverable error occurred; the turn still ends.
    Error(String),
}

/// Why a turn stopped. Tracked so the agent's termination-reason distribution
/// metric has something to bucket on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The model produced a final text reply with no further tool call.
    Text,
    /// A destructive tool call is pending user confirmation.
    NeedsConfirmation,
    /// `maxSteps` tool-call rounds were used without reaching a final reply.
    StepCapExceeded,
    /// The LLM call failed after exhausting its retry budget.
    Error,
}
